use std::path::PathBuf;

use serde::Serialize;

/// Axis-aligned box in page coordinates: PDF points, origin at the top-left
/// corner, `y` growing downward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x0: f32,
    pub top: f32,
    pub x1: f32,
    pub bottom: f32,
}

impl BoundingBox {
    #[must_use]
    pub fn new(x0: f32, top: f32, x1: f32, bottom: f32) -> Self {
        Self {
            x0: x0.min(x1),
            top: top.min(bottom),
            x1: x0.max(x1),
            bottom: top.max(bottom),
        }
    }

    #[must_use]
    pub fn x_center(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    #[must_use]
    pub fn y_center(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenOrigin {
    /// Positioned text from the PDF content stream.
    PdfText,
    /// Text-layer lines without geometry, laid out on a nominal grid.
    PdfLayoutText,
    Ocr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    pub bbox: BoundingBox,
    /// OCR confidence in `0..=100`; `None` for text-layer tokens.
    pub confidence: Option<f32>,
    pub origin: TokenOrigin,
    pub flagged: bool,
}

impl Token {
    #[must_use]
    pub fn new(text: impl Into<String>, bbox: BoundingBox, origin: TokenOrigin) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence: None,
            origin,
            flagged: false,
        }
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    #[must_use]
    pub fn x_center(&self) -> f32 {
        self.bbox.x_center()
    }

    #[must_use]
    pub fn y_center(&self) -> f32 {
        self.bbox.y_center()
    }
}

/// One physical table line.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub tokens: Vec<Token>,
    pub mean_y: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub page_number: u32,
    pub rows: Vec<Vec<String>>,
    pub column_count: usize,
    pub page_image: Option<PathBuf>,
    pub source: Option<TokenOrigin>,
    pub flagged_tokens: usize,
}

impl PageRecord {
    #[must_use]
    pub fn empty(page_number: u32, page_image: Option<PathBuf>) -> Self {
        Self {
            page_number,
            rows: Vec::new(),
            column_count: 0,
            page_image,
            source: None,
            flagged_tokens: 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Share of non-empty cells; `1.0` for an empty record.
    #[must_use]
    pub fn fill_ratio(&self) -> f32 {
        let total = self.rows.len() * self.column_count;
        if total == 0 {
            return 1.0;
        }
        let filled = self
            .rows
            .iter()
            .flatten()
            .filter(|cell| !cell.is_empty())
            .count();
        filled as f32 / total as f32
    }
}

#[cfg(test)]
mod tests {
    use super::{BoundingBox, PageRecord};

    #[test]
    fn normalizes_inverted_boxes() {
        let bbox = BoundingBox::new(10.0, 20.0, 2.0, 4.0);
        assert_eq!(bbox, BoundingBox::new(2.0, 4.0, 10.0, 20.0));
        assert_eq!(bbox.x_center(), 6.0);
        assert_eq!(bbox.y_center(), 12.0);
    }

    #[test]
    fn fill_ratio_counts_non_empty_cells() {
        let record = PageRecord {
            rows: vec![
                vec!["a".to_string(), String::new()],
                vec!["b".to_string(), "c".to_string()],
            ],
            column_count: 2,
            ..PageRecord::empty(1, None)
        };
        assert_eq!(record.fill_ratio(), 0.75);
        assert_eq!(PageRecord::empty(2, None).fill_ratio(), 1.0);
    }
}
