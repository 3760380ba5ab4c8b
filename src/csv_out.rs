use std::io::Write;
use std::path::{Path, PathBuf};

use csv::{Writer, WriterBuilder};

use crate::error::ExtractError;
use crate::header::column_names;
use crate::model::PageRecord;

pub const PAGE_IMAGE_COLUMN: &str = "page_image";
pub const PAGE_COLUMN: &str = "page";

/// `image` relative to `output_dir` with forward slashes, or the path as
/// given when it lies elsewhere.
#[must_use]
pub fn relative_image_path(image: &Path, output_dir: &Path) -> String {
    let Ok(relative) = image.strip_prefix(output_dir) else {
        return image.to_string_lossy().into_owned();
    };
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn image_cell(record: &PageRecord) -> String {
    record
        .page_image
        .as_deref()
        .map(|image| image.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn write_page<W: Write>(
    writer: &mut Writer<W>,
    record: &PageRecord,
    header: Option<&[String]>,
) -> Result<(), ExtractError> {
    let mut names = column_names(header, record.column_count);
    names.push(PAGE_IMAGE_COLUMN.to_string());
    writer.write_record(&names)?;

    let image = image_cell(record);
    for row in &record.rows {
        writer.write_record(row.iter().map(String::as_str).chain([image.as_str()]))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_combined<W: Write>(
    writer: &mut Writer<W>,
    pages: &[PageRecord],
) -> Result<usize, ExtractError> {
    let width = pages
        .iter()
        .map(|page| page.column_count)
        .max()
        .unwrap_or_default();

    let mut header = Vec::with_capacity(width + 2);
    header.push(PAGE_COLUMN.to_string());
    header.extend(column_names(None, width));
    header.push(PAGE_IMAGE_COLUMN.to_string());
    writer.write_record(&header)?;

    let mut ordered = pages.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|page| page.page_number);

    let mut written = 0;
    for page in ordered {
        let number = page.page_number.to_string();
        let image = image_cell(page);
        for row in &page.rows {
            let padding = width.saturating_sub(row.len());
            let record = std::iter::once(number.as_str())
                .chain(row.iter().map(String::as_str))
                .chain(std::iter::repeat_n("", padding))
                .chain([image.as_str()]);
            writer.write_record(record)?;
            written += 1;
        }
    }
    writer.flush()?;
    Ok(written)
}

/// Writes one page table. `header` supplies column names in place of
/// `col_N`; an empty record produces only the `page_image` header.
pub(crate) fn write_page_csv(
    path: &Path,
    record: &PageRecord,
    header: Option<&[String]>,
    delimiter: u8,
) -> Result<(), ExtractError> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)?;
    write_page(&mut writer, record, header)
}

/// Writes every page's rows into one file in page order, padded to the
/// widest page. Returns the number of data rows.
pub(crate) fn write_combined_csv(
    path: &Path,
    pages: &[PageRecord],
    delimiter: u8,
) -> Result<usize, ExtractError> {
    let mut writer = WriterBuilder::new().delimiter(delimiter).from_path(path)?;
    write_combined(&mut writer, pages)
}

/// `<output_dir>/<stem>_page<N>.csv`
#[must_use]
pub fn page_csv_path(output_dir: &Path, stem: &str, page: u32) -> PathBuf {
    output_dir.join(format!("{stem}_page{page}.csv"))
}

/// `<output_dir>/<stem>_combined.csv`
#[must_use]
pub fn combined_csv_path(output_dir: &Path, stem: &str) -> PathBuf {
    output_dir.join(format!("{stem}_combined.csv"))
}
