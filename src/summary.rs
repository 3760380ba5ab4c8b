use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::error::ExtractError;
use crate::model::TokenOrigin;
use crate::warning::ExtractWarning;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageStatus {
    Succeeded { rows: usize },
    Empty,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSummary {
    pub page: u32,
    #[serde(flatten)]
    pub status: PageStatus,
    pub columns: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<TokenOrigin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_image: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embedded_images: Vec<PathBuf>,
    pub flagged_tokens: usize,
}

impl PageSummary {
    #[must_use]
    pub fn failed(page: u32, reason: impl Into<String>) -> Self {
        Self {
            page,
            status: PageStatus::Failed {
                reason: reason.into(),
            },
            columns: 0,
            source: None,
            csv: None,
            page_image: None,
            embedded_images: Vec::new(),
            flagged_tokens: 0,
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.status, PageStatus::Failed { .. })
    }
}

/// Outcome of one input file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionReport {
    pub input: PathBuf,
    pub pages: Vec<PageSummary>,
    pub warnings: Vec<ExtractWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combined_csv: Option<PathBuf>,
    pub row_count: usize,
}

impl ExtractionReport {
    #[must_use]
    pub fn new(input: &Path) -> Self {
        Self {
            input: input.to_path_buf(),
            pages: Vec::new(),
            warnings: Vec::new(),
            combined_csv: None,
            row_count: 0,
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> Vec<u32> {
        self.pages_where(|status| matches!(status, PageStatus::Succeeded { .. }))
    }

    #[must_use]
    pub fn empty(&self) -> Vec<u32> {
        self.pages_where(|status| matches!(status, PageStatus::Empty))
    }

    #[must_use]
    pub fn failed(&self) -> Vec<u32> {
        self.pages_where(|status| matches!(status, PageStatus::Failed { .. }))
    }

    fn pages_where(&self, predicate: impl Fn(&PageStatus) -> bool) -> Vec<u32> {
        self.pages
            .iter()
            .filter(|page| predicate(&page.status))
            .map(|page| page.page)
            .collect()
    }
}

#[derive(Serialize)]
struct SummaryDocument<'a> {
    generated_at: String,
    succeeded: Vec<u32>,
    empty: Vec<u32>,
    failed: Vec<u32>,
    #[serde(flatten)]
    report: &'a ExtractionReport,
}

/// Serializes `report` with a generation timestamp.
pub(crate) fn summary_json(report: &ExtractionReport) -> Result<String, ExtractError> {
    let document = SummaryDocument {
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        succeeded: report.succeeded(),
        empty: report.empty(),
        failed: report.failed(),
        report,
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

pub(crate) fn write_summary_json(path: &Path, report: &ExtractionReport) -> Result<(), ExtractError> {
    std::fs::write(path, summary_json(report)?)?;
    Ok(())
}

/// `<output_dir>/<stem>_summary.json`
#[must_use]
pub fn summary_path(output_dir: &Path, stem: &str) -> PathBuf {
    output_dir.join(format!("{stem}_summary.json"))
}
