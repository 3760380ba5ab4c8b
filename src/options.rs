use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ExtractError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderMode {
    /// Every assembled row is data.
    #[default]
    None,
    FirstRow,
    AutoDetect,
}

impl FromStr for HeaderMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "first-row" | "first_row" => Ok(Self::FirstRow),
            "auto" => Ok(Self::AutoDetect),
            other => Err(format!(
                "invalid header mode '{other}', expected none, first-row or auto"
            )),
        }
    }
}

/// What happens to an OCR token whose confidence is under the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LowConfidenceAction {
    #[default]
    Drop,
    Flag,
}

impl FromStr for LowConfidenceAction {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "flag" => Ok(Self::Flag),
            other => Err(format!(
                "invalid low-confidence action '{other}', expected drop or flag"
            )),
        }
    }
}

/// 1-based page selection; `all` (the default) selects every page.
/// Ranges stay unexpanded until they are checked against a document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageSelection {
    ranges: Option<Vec<RangeInclusive<u32>>>,
}

impl PageSelection {
    #[must_use]
    pub fn all() -> Self {
        Self { ranges: None }
    }

    #[must_use]
    pub fn contains(&self, page: u32) -> bool {
        self.ranges
            .as_ref()
            .is_none_or(|ranges| ranges.iter().any(|range| range.contains(&page)))
    }

    #[must_use]
    pub fn is_all(&self) -> bool {
        self.ranges.is_none()
    }

    /// Selected pages in ascending order, checked against the document length.
    pub fn resolve(&self, page_count: u32) -> Result<Vec<u32>, ExtractError> {
        let Some(ranges) = &self.ranges else {
            return Ok((1..=page_count).collect());
        };

        let first_missing = ranges
            .iter()
            .filter(|range| *range.end() > page_count)
            .map(|range| (*range.start()).max(page_count.saturating_add(1)))
            .min();
        if let Some(page) = first_missing {
            return Err(ExtractError::PageOutOfRange { page, page_count });
        }

        let pages = ranges.iter().cloned().flatten().collect::<BTreeSet<_>>();
        Ok(pages.into_iter().collect())
    }
}

impl FromStr for PageSelection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::all());
        }

        let mut ranges = Vec::new();
        for token in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if let Some((start, end)) = token.split_once('-') {
                let start: u32 = start
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid page range start: '{start}'"))?;
                let end: u32 = end
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid page range end: '{end}'"))?;
                if start == 0 || end == 0 {
                    return Err("pages are 1-based".to_string());
                }
                if end < start {
                    return Err(format!(
                        "invalid range '{token}': end is smaller than start"
                    ));
                }
                ranges.push(start..=end);
            } else {
                let page: u32 = token
                    .parse()
                    .map_err(|_| format!("invalid page number: '{token}'"))?;
                if page == 0 {
                    return Err("pages are 1-based".to_string());
                }
                ranges.push(page..=page);
            }
        }

        if ranges.is_empty() {
            return Err("page selection cannot be empty".to_string());
        }

        Ok(Self {
            ranges: Some(ranges),
        })
    }
}

/// Tolerances for the row and column sweeps, in page units (points).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterConfig {
    pub y_tol: f32,
    pub x_eps: f32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            y_tol: 6.0,
            x_eps: 25.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOptions {
    pub pages: PageSelection,
    pub output_dir: PathBuf,
    pub dpi: u32,
    pub cluster: ClusterConfig,
    pub min_confidence: Option<f32>,
    pub low_confidence: LowConfidenceAction,
    pub tesseract_path: Option<PathBuf>,
    pub pdftoppm_path: Option<PathBuf>,
    pub ocr_lang: String,
    pub force_ocr: bool,
    pub embedded_images: bool,
    pub header_mode: HeaderMode,
    pub delimiter: u8,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            pages: PageSelection::all(),
            output_dir: PathBuf::from("output"),
            dpi: 200,
            cluster: ClusterConfig::default(),
            min_confidence: None,
            low_confidence: LowConfidenceAction::Drop,
            tesseract_path: None,
            pdftoppm_path: None,
            ocr_lang: "eng".to_string(),
            force_ocr: false,
            embedded_images: false,
            header_mode: HeaderMode::None,
            delimiter: b',',
        }
    }
}

impl ExtractOptions {
    pub fn validate(&self) -> Result<(), ExtractError> {
        let ClusterConfig { y_tol, x_eps } = self.cluster;
        if !y_tol.is_finite() || y_tol <= 0.0 {
            return Err(ExtractError::InvalidOption(format!(
                "y_tol must be a positive number, got {y_tol}"
            )));
        }
        if !x_eps.is_finite() || x_eps <= 0.0 {
            return Err(ExtractError::InvalidOption(format!(
                "x_eps must be a positive number, got {x_eps}"
            )));
        }
        if !(36..=1200).contains(&self.dpi) {
            return Err(ExtractError::InvalidOption(format!(
                "dpi must be within 36..=1200, got {}",
                self.dpi
            )));
        }
        if let Some(floor) = self.min_confidence
            && !(0.0..=100.0).contains(&floor)
        {
            return Err(ExtractError::InvalidOption(format!(
                "min_confidence must be within 0..=100, got {floor}"
            )));
        }
        if self.ocr_lang.trim().is_empty() {
            return Err(ExtractError::InvalidOption(
                "ocr_lang cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Points per pixel for images rendered or scanned at the configured DPI.
    #[must_use]
    pub fn pixel_scale(&self) -> f32 {
        72.0 / self.dpi as f32
    }
}
