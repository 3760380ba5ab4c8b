use std::path::Path;

use tracing::debug;

use crate::error::ExtractError;
use crate::model::Token;
use crate::ocr::OcrEngine;
use crate::options::LowConfidenceAction;
use crate::pdf_reader::PdfDocument;
use crate::warning::{ExtractWarning, WarningCode};

/// Everything an adapter may need to produce tokens for one page.
#[derive(Debug, Clone)]
pub struct PageRequest<'a> {
    pub page_number: u32,
    pub image: Option<&'a Path>,
    /// Points per image pixel.
    pub pixel_scale: f32,
}

/// Turns one page into positioned tokens, from the text layer or a raster.
pub trait TokenSource {
    fn name(&self) -> &'static str;

    fn page_tokens(&self, request: &PageRequest<'_>) -> Result<Vec<Token>, ExtractError>;
}

/// Text-layer tokens of an already loaded PDF.
pub struct PdfTextSource<'a> {
    document: &'a PdfDocument,
}

impl<'a> PdfTextSource<'a> {
    #[must_use]
    pub fn new(document: &'a PdfDocument) -> Self {
        Self { document }
    }
}

impl TokenSource for PdfTextSource<'_> {
    fn name(&self) -> &'static str {
        "pdf-text"
    }

    fn page_tokens(&self, request: &PageRequest<'_>) -> Result<Vec<Token>, ExtractError> {
        Ok(self.document.page_tokens(request.page_number))
    }
}

/// OCR over the page image.
pub struct OcrSource<'a> {
    engine: &'a dyn OcrEngine,
}

impl<'a> OcrSource<'a> {
    #[must_use]
    pub fn new(engine: &'a dyn OcrEngine) -> Self {
        Self { engine }
    }
}

impl TokenSource for OcrSource<'_> {
    fn name(&self) -> &'static str {
        "ocr"
    }

    fn page_tokens(&self, request: &PageRequest<'_>) -> Result<Vec<Token>, ExtractError> {
        let Some(image) = request.image else {
            return Err(ExtractError::Ocr {
                page: request.page_number,
                message: "no page image available to recognize".to_string(),
            });
        };

        let words = self
            .engine
            .recognize(image)
            .map_err(|message| ExtractError::Ocr {
                page: request.page_number,
                message,
            })?;

        Ok(words
            .into_iter()
            .filter(|word| !word.text.trim().is_empty())
            .map(|word| word.into_token(request.pixel_scale))
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceFloor {
    pub min_confidence: Option<f32>,
    pub action: LowConfidenceAction,
}

/// Drops or flags tokens under the floor. Returns the number of flagged
/// tokens; every decision is reported through `warnings`.
pub fn apply_confidence_floor(
    tokens: &mut Vec<Token>,
    floor: ConfidenceFloor,
    page: u32,
    warnings: &mut Vec<ExtractWarning>,
) -> usize {
    let Some(min_confidence) = floor.min_confidence else {
        return 0;
    };

    let before = tokens.len();
    let mut flagged = 0;
    let mut kept = Vec::with_capacity(tokens.len());
    for mut token in tokens.drain(..) {
        let Some(confidence) = token.confidence else {
            kept.push(token);
            continue;
        };
        if confidence >= min_confidence {
            kept.push(token);
            continue;
        }

        match floor.action {
            LowConfidenceAction::Drop => {
                debug!(page, text = %token.text, confidence, "dropping low-confidence token");
            }
            LowConfidenceAction::Flag => {
                warnings.push(
                    ExtractWarning::new(
                        WarningCode::LowConfidenceToken,
                        format!("low-confidence token '{}' kept", token.text),
                    )
                    .with_page(page)
                    .with_confidence(confidence),
                );
                token.flagged = true;
                flagged += 1;
                kept.push(token);
            }
        }
    }
    *tokens = kept;

    let dropped = before - tokens.len();
    if dropped > 0 {
        warnings.push(
            ExtractWarning::new(
                WarningCode::LowConfidenceToken,
                format!("dropped {dropped} token(s) below confidence {min_confidence}"),
            )
            .with_page(page),
        );
    }

    flagged
}
