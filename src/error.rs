use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("unsupported file type '{extension}' for {}", path.display())]
    UnsupportedFileType { path: PathBuf, extension: String },

    #[error("page {page} is out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("invalid page selection: {0}")]
    InvalidPageSelection(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to load PDF: {0}")]
    PdfLoad(#[from] lopdf::Error),

    #[error("failed to render page {page}: {message}")]
    Render { page: u32, message: String },

    #[error("OCR failed on page {page}: {message}")]
    Ocr { page: u32, message: String },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("failed to write summary: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExtractError {
    /// Page-scoped failures are recorded against the page and do not stop a batch.
    #[must_use]
    pub fn is_page_local(&self) -> bool {
        matches!(
            self,
            Self::Render { .. } | Self::Ocr { .. } | Self::Image(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::ExtractError;

    #[test]
    fn collaborator_failures_are_page_local() {
        let render = ExtractError::Render {
            page: 3,
            message: "pdftoppm exited with status 1".to_string(),
        };
        assert!(render.is_page_local());
        assert_eq!(
            render.to_string(),
            "failed to render page 3: pdftoppm exited with status 1"
        );

        let fatal = ExtractError::PageOutOfRange {
            page: 9,
            page_count: 2,
        };
        assert!(!fatal.is_page_local());
    }
}
