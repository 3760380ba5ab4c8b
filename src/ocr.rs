use std::path::{Path, PathBuf};
use std::process::Command;

use csv::ReaderBuilder;
use tracing::debug;

use crate::model::{BoundingBox, Token, TokenOrigin};

/// Tesseract's `level` value for word boxes.
const WORD_LEVEL: u32 = 5;

/// A recognized word in image pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    pub text: String,
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    pub confidence: f32,
}

impl OcrWord {
    #[must_use]
    pub fn into_token(self, pixel_scale: f32) -> Token {
        let x0 = self.left as f32 * pixel_scale;
        let top = self.top as f32 * pixel_scale;
        let x1 = self.left.saturating_add(self.width) as f32 * pixel_scale;
        let bottom = self.top.saturating_add(self.height) as f32 * pixel_scale;
        Token::new(
            self.text.trim(),
            BoundingBox::new(x0, top, x1, bottom),
            TokenOrigin::Ocr,
        )
        .with_confidence(self.confidence.clamp(0.0, 100.0))
    }
}

pub trait OcrEngine {
    /// Word boxes found in `image`. Errors are plain messages; the caller
    /// attaches page context.
    fn recognize(&self, image: &Path) -> Result<Vec<OcrWord>, String>;
}

/// Runs the `tesseract` binary and reads its TSV report.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: PathBuf,
    lang: String,
    dpi: u32,
}

impl TesseractEngine {
    #[must_use]
    pub fn new(binary: Option<&Path>, lang: &str, dpi: u32) -> Self {
        Self {
            binary: binary.map_or_else(|| PathBuf::from("tesseract"), Path::to_path_buf),
            lang: lang.to_string(),
            dpi,
        }
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &Path) -> Result<Vec<OcrWord>, String> {
        debug!(binary = %self.binary.display(), image = %image.display(), "running tesseract");
        let output = Command::new(&self.binary)
            .arg(image)
            .arg("stdout")
            .args(["-l", &self.lang])
            .args(["--dpi", &self.dpi.to_string()])
            .arg("tsv")
            .output()
            .map_err(|error| format!("failed to run {}: {error}", self.binary.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                stderr.trim()
            ));
        }

        parse_tsv(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parses tesseract's TSV output, keeping word-level rows with text.
pub fn parse_tsv(tsv: &str) -> Result<Vec<OcrWord>, String> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .has_headers(true)
        .from_reader(tsv.as_bytes());

    let headers = reader
        .headers()
        .map_err(|error| format!("unreadable TSV header: {error}"))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| format!("TSV output lacks a '{name}' column"))
    };
    let level_at = column("level")?;
    let left_at = column("left")?;
    let top_at = column("top")?;
    let width_at = column("width")?;
    let height_at = column("height")?;
    let conf_at = column("conf")?;
    let text_at = column("text")?;

    let mut words = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|error| format!("unreadable TSV row: {error}"))?;
        let level = record
            .get(level_at)
            .and_then(|value| value.trim().parse::<u32>().ok());
        if level != Some(WORD_LEVEL) {
            continue;
        }

        let text = record.get(text_at).unwrap_or_default().trim();
        if text.is_empty() {
            continue;
        }

        let number = |index: usize| {
            record
                .get(index)
                .and_then(|value| value.trim().parse::<u32>().ok())
                .ok_or_else(|| format!("invalid box geometry for word '{text}'"))
        };
        let confidence = record
            .get(conf_at)
            .and_then(|value| value.trim().parse::<f32>().ok())
            .unwrap_or(-1.0);
        if confidence < 0.0 {
            continue;
        }

        words.push(OcrWord {
            text: text.to_string(),
            left: number(left_at)?,
            top: number(top_at)?,
            width: number(width_at)?,
            height: number(height_at)?,
            confidence,
        });
    }

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::{OcrWord, parse_tsv};

    const SAMPLE: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t1700\t2200\t-1\t
4\t1\t1\t1\t1\t0\t120\t300\t900\t40\t-1\t
5\t1\t1\t1\t1\t1\t120\t302\t180\t36\t96.12\tHaemoglobin
5\t1\t1\t1\t1\t2\t700\t300\t60\t38\t41.5\t13.2
5\t1\t1\t1\t1\t3\t900\t300\t10\t38\t90\t
5\t1\t1\t1\t1\t4\t950\t301\t120\t38\t89\tg/dL\"
";

    #[test]
    fn keeps_word_rows_with_text() {
        let words = parse_tsv(SAMPLE).expect("sample should parse");
        assert_eq!(words.len(), 3);
        assert_eq!(
            words[0],
            OcrWord {
                text: "Haemoglobin".to_string(),
                left: 120,
                top: 302,
                width: 180,
                height: 36,
                confidence: 96.12,
            }
        );
        assert_eq!(words[1].confidence, 41.5);
        assert_eq!(words[2].text, "g/dL\"");
    }

    #[test]
    fn oversized_word_box_saturates_instead_of_overflowing() {
        let word = OcrWord {
            text: " edge ".to_string(),
            left: u32::MAX - 5,
            top: u32::MAX,
            width: 100,
            height: u32::MAX,
            confidence: 120.0,
        };
        let token = word.into_token(1.0);
        assert_eq!(token.text, "edge");
        assert_eq!(token.bbox.x1, u32::MAX as f32);
        assert_eq!(token.bbox.bottom, u32::MAX as f32);
        assert!(token.bbox.x0 <= token.bbox.x1);
        assert_eq!(token.confidence, Some(100.0));
    }

    #[test]
    fn rejects_output_without_expected_columns() {
        let err = parse_tsv("level\tleft\n5\t1\n").expect_err("missing columns");
        assert!(err.contains("'top'"));
    }

    #[test]
    fn empty_report_has_no_words() {
        let words = parse_tsv("level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n")
            .expect("header-only output parses");
        assert!(words.is_empty());
    }
}
