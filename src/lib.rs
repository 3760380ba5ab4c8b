mod assemble;
mod columns;
mod csv_out;
mod error;
mod header;
mod model;
mod ocr;
mod options;
mod pdf_reader;
mod raster;
mod render;
mod rows;
mod summary;
mod token_source;
mod warning;

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::csv_out::{
    combined_csv_path, page_csv_path, relative_image_path, write_combined_csv, write_page_csv,
};
use crate::header::apply_header_mode;
use crate::pdf_reader::PdfDocument;
use crate::raster::{InputKind, save_as_png};
use crate::summary::{summary_path, write_summary_json};
use crate::token_source::{
    ConfidenceFloor, OcrSource, PageRequest, PdfTextSource, TokenSource, apply_confidence_floor,
};

pub use assemble::{assemble_page, assemble_table};
pub use columns::{cluster_columns, nearest_column};
pub use error::ExtractError;
pub use model::{BoundingBox, PageRecord, Row, Token, TokenOrigin};
pub use ocr::{OcrEngine, OcrWord, TesseractEngine, parse_tsv};
pub use options::{ClusterConfig, ExtractOptions, HeaderMode, LowConfidenceAction, PageSelection};
pub use raster::{IMAGE_EXTENSIONS, list_input_files};
pub use render::{PageRenderer, PdftoppmRenderer};
pub use rows::group_rows;
pub use summary::{ExtractionReport, PageStatus, PageSummary};
pub use warning::{ExtractWarning, WarningCode};

/// Pages whose share of filled cells falls below this are reported as sparse.
const SPARSE_FILL_RATIO: f32 = 0.35;

/// Where one input's files land inside the output directory.
struct OutputLayout {
    output_dir: PathBuf,
    image_dir: PathBuf,
    stem: String,
}

impl OutputLayout {
    fn new(output_dir: &Path, input: &Path) -> Self {
        let stem = input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| "document".to_string());
        Self {
            output_dir: output_dir.to_path_buf(),
            image_dir: output_dir.join("images"),
            stem,
        }
    }

    fn page_image(&self, page: u32) -> PathBuf {
        self.image_dir
            .join(format!("{}_page{page}.png", self.stem))
    }

    fn relative(&self, path: &Path) -> PathBuf {
        PathBuf::from(relative_image_path(path, &self.output_dir))
    }
}

/// Runs the page pipeline for one input file at a time.
pub struct Extractor {
    options: ExtractOptions,
    renderer: Box<dyn PageRenderer>,
    ocr: Box<dyn OcrEngine>,
}

impl Extractor {
    /// Uses `pdftoppm` and `tesseract` from the configured paths or `PATH`.
    #[must_use]
    pub fn new(options: ExtractOptions) -> Self {
        let renderer = PdftoppmRenderer::new(options.pdftoppm_path.as_deref());
        let ocr = TesseractEngine::new(
            options.tesseract_path.as_deref(),
            &options.ocr_lang,
            options.dpi,
        );
        Self::with_collaborators(options, Box::new(renderer), Box::new(ocr))
    }

    #[must_use]
    pub fn with_collaborators(
        options: ExtractOptions,
        renderer: Box<dyn PageRenderer>,
        ocr: Box<dyn OcrEngine>,
    ) -> Self {
        Self {
            options,
            renderer,
            ocr,
        }
    }

    /// Extracts every selected page of `input` into per-page CSVs, a combined
    /// CSV and a JSON summary under the output directory.
    ///
    /// Page-level render, OCR and image failures are recorded in the report
    /// and do not stop the remaining pages; anything else aborts.
    pub fn extract(&self, input: &Path) -> Result<ExtractionReport, ExtractError> {
        self.options.validate()?;
        if !input.is_file() {
            return Err(ExtractError::InputNotFound(input.to_path_buf()));
        }
        let kind = InputKind::detect(input)?;

        let layout = OutputLayout::new(&self.options.output_dir, input);
        let mut report = ExtractionReport::new(input);

        // Page selection is checked before anything is written.
        let records = match kind {
            InputKind::Pdf => {
                let document = PdfDocument::open(input)?;
                let pages = self.options.pages.resolve(document.page_count())?;
                std::fs::create_dir_all(&layout.image_dir)?;
                info!(input = %input.display(), pages = pages.len(), "extracting PDF");
                self.extract_pdf(input, &document, &pages, &layout, &mut report)?
            }
            InputKind::Image => {
                std::fs::create_dir_all(&layout.image_dir)?;
                info!(input = %input.display(), "extracting image");
                self.extract_image(input, &layout, &mut report)?
            }
        };

        let combined = combined_csv_path(&layout.output_dir, &layout.stem);
        report.row_count = write_combined_csv(&combined, &records, self.options.delimiter)?;
        info!(path = %combined.display(), rows = report.row_count, "wrote combined CSV");
        report.combined_csv = Some(combined);

        let summary = summary_path(&layout.output_dir, &layout.stem);
        write_summary_json(&summary, &report)?;
        info!(
            path = %summary.display(),
            succeeded = report.succeeded().len(),
            empty = report.empty().len(),
            failed = report.failed().len(),
            "wrote summary"
        );

        Ok(report)
    }

    fn extract_pdf(
        &self,
        input: &Path,
        document: &PdfDocument,
        pages: &[u32],
        layout: &OutputLayout,
        report: &mut ExtractionReport,
    ) -> Result<Vec<PageRecord>, ExtractError> {
        let mut records = Vec::with_capacity(pages.len());
        for &page in pages {
            let image_path = layout.page_image(page);
            let image = match self
                .renderer
                .render_page(input, page, self.options.dpi, &image_path)
            {
                Ok(()) => Some(image_path.as_path()),
                Err(message) => {
                    let error = ExtractError::Render { page, message };
                    warn!(page, %error, "page image unavailable");
                    report.warnings.push(
                        ExtractWarning::new(WarningCode::RenderUnavailable, error.to_string())
                            .with_page(page),
                    );
                    None
                }
            };

            let request = PageRequest {
                page_number: page,
                image,
                pixel_scale: self.options.pixel_scale(),
            };
            let tokens = self.page_tokens(Some(document), &request, &mut report.warnings);
            let embedded = if self.options.embedded_images {
                self.export_embedded_images(document, page, layout, &mut report.warnings)
            } else {
                Vec::new()
            };

            if let Some(record) = self.record_page(&request, tokens, embedded, layout, report)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Raster inputs are a single page; any page selection is ignored.
    fn extract_image(
        &self,
        input: &Path,
        layout: &OutputLayout,
        report: &mut ExtractionReport,
    ) -> Result<Vec<PageRecord>, ExtractError> {
        const PAGE: u32 = 1;
        if !self.options.pages.is_all() {
            debug!(input = %input.display(), "page selection ignored for image input");
        }

        let image_path = layout.page_image(PAGE);
        let converted = save_as_png(input, &image_path);
        if let Ok((width, height)) = converted {
            debug!(width, height, path = %image_path.display(), "saved page image");
        }

        let request = PageRequest {
            page_number: PAGE,
            image: converted.is_ok().then_some(image_path.as_path()),
            pixel_scale: self.options.pixel_scale(),
        };
        let tokens = converted
            .and_then(|_| self.page_tokens(None, &request, &mut report.warnings));

        Ok(self
            .record_page(&request, tokens, Vec::new(), layout, report)?
            .into_iter()
            .collect())
    }

    /// Text layer first unless OCR is forced; OCR when the text layer has
    /// nothing for this page.
    fn page_tokens(
        &self,
        document: Option<&PdfDocument>,
        request: &PageRequest<'_>,
        warnings: &mut Vec<ExtractWarning>,
    ) -> Result<Vec<Token>, ExtractError> {
        let page = request.page_number;
        if let Some(document) = document
            && !self.options.force_ocr
        {
            let source = PdfTextSource::new(document);
            let tokens = source.page_tokens(request)?;
            if !tokens.is_empty() {
                debug!(page, source = source.name(), tokens = tokens.len(), "collected tokens");
                if tokens
                    .iter()
                    .any(|token| token.origin == TokenOrigin::PdfLayoutText)
                {
                    warnings.push(
                        ExtractWarning::new(
                            WarningCode::TextLayerFallback,
                            "text positions unavailable; columns approximated from text layout",
                        )
                        .with_page(page),
                    );
                }
                return Ok(tokens);
            }
            debug!(page, "no text layer; falling back to OCR");
        }

        let source = OcrSource::new(self.ocr.as_ref());
        let tokens = source.page_tokens(request)?;
        debug!(page, source = source.name(), tokens = tokens.len(), "collected tokens");
        Ok(tokens)
    }

    fn export_embedded_images(
        &self,
        document: &PdfDocument,
        page: u32,
        layout: &OutputLayout,
        warnings: &mut Vec<ExtractWarning>,
    ) -> Vec<PathBuf> {
        match document.extract_embedded_images(page, &layout.image_dir, &layout.stem) {
            Ok((written, skipped)) => {
                for note in skipped {
                    warnings.push(
                        ExtractWarning::new(WarningCode::EmbeddedImageSkipped, note).with_page(page),
                    );
                }
                written.iter().map(|path| layout.relative(path)).collect()
            }
            Err(error) => {
                warn!(page, %error, "embedded image export failed");
                warnings.push(
                    ExtractWarning::new(WarningCode::EmbeddedImageSkipped, error.to_string())
                        .with_page(page),
                );
                Vec::new()
            }
        }
    }

    /// Turns the page's tokens into a table, writes its CSV and records the
    /// outcome. Returns `None` for a failed page.
    fn record_page(
        &self,
        request: &PageRequest<'_>,
        tokens: Result<Vec<Token>, ExtractError>,
        embedded_images: Vec<PathBuf>,
        layout: &OutputLayout,
        report: &mut ExtractionReport,
    ) -> Result<Option<PageRecord>, ExtractError> {
        let page = request.page_number;
        let mut tokens = match tokens {
            Ok(tokens) => tokens,
            Err(error) if error.is_page_local() => {
                warn!(page, %error, "page failed");
                report.warnings.push(
                    ExtractWarning::new(WarningCode::PageFailed, error.to_string()).with_page(page),
                );
                report.pages.push(PageSummary {
                    embedded_images,
                    ..PageSummary::failed(page, error.to_string())
                });
                return Ok(None);
            }
            Err(error) => return Err(error),
        };

        let floor = ConfidenceFloor {
            min_confidence: self.options.min_confidence,
            action: self.options.low_confidence,
        };
        let flagged_tokens = apply_confidence_floor(&mut tokens, floor, page, &mut report.warnings);

        let mut record = PageRecord::empty(page, request.image.map(|image| layout.relative(image)));
        let mut header = None;
        if tokens.is_empty() {
            debug!(page, "no tokens on page");
            report.warnings.push(
                ExtractWarning::new(WarningCode::EmptyPage, "no text found on page").with_page(page),
            );
        } else {
            let (rows, column_count) = assemble_page(&tokens, &self.options.cluster);
            let (names, data) =
                apply_header_mode(rows, self.options.header_mode, &mut report.warnings, page);
            header = names;
            record.rows = data;
            record.column_count = column_count;
            record.source = tokens.first().map(|token| token.origin);
            record.flagged_tokens = flagged_tokens;

            let fill = record.fill_ratio();
            if fill < SPARSE_FILL_RATIO {
                report.warnings.push(
                    ExtractWarning::new(
                        WarningCode::SparseTable,
                        format!(
                            "only {:.0}% of cells are filled; consider adjusting y_tol/x_eps",
                            fill * 100.0
                        ),
                    )
                    .with_page(page)
                    .with_confidence(fill),
                );
            }
        }

        let csv_path = page_csv_path(&layout.output_dir, &layout.stem, page);
        write_page_csv(&csv_path, &record, header.as_deref(), self.options.delimiter)?;
        info!(
            page,
            rows = record.rows.len(),
            columns = record.column_count,
            path = %csv_path.display(),
            "wrote page CSV"
        );

        let status = if record.is_empty() {
            PageStatus::Empty
        } else {
            PageStatus::Succeeded {
                rows: record.rows.len(),
            }
        };
        report.pages.push(PageSummary {
            page,
            status,
            columns: record.column_count,
            source: record.source,
            csv: Some(csv_path),
            page_image: record.page_image.clone(),
            embedded_images,
            flagged_tokens: record.flagged_tokens,
        });

        Ok(Some(record))
    }
}

/// Extracts `input` with the default `pdftoppm`/`tesseract` collaborators.
pub fn extract_to_csv(
    input: &Path,
    options: &ExtractOptions,
) -> Result<ExtractionReport, ExtractError> {
    Extractor::new(options.clone()).extract(input)
}
