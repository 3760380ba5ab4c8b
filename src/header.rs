use crate::options::HeaderMode;
use crate::warning::{ExtractWarning, WarningCode};

const HEADER_CONFIDENCE_THRESHOLD: f32 = 0.55;

fn is_numeric(value: &str) -> bool {
    let trimmed = value
        .trim()
        .trim_end_matches('%')
        .replace(',', "");
    trimmed.parse::<f64>().is_ok()
}

fn non_numeric_ratio(cells: &[String]) -> f32 {
    let filled = cells
        .iter()
        .filter(|cell| !cell.trim().is_empty())
        .collect::<Vec<_>>();
    if filled.is_empty() {
        return 0.0;
    }

    let non_numeric = filled.iter().filter(|cell| !is_numeric(cell)).count();
    non_numeric as f32 / filled.len() as f32
}

/// Guesses whether the first row names the columns: mostly text over a row
/// that is mostly not. Returns the guess and a confidence in `0..=1`.
pub(crate) fn infer_has_header(rows: &[Vec<String>]) -> (bool, f32) {
    let Some(first) = rows.first() else {
        return (false, 0.0);
    };

    let first = non_numeric_ratio(first);
    let second = rows.get(1).map_or(0.0, |row| non_numeric_ratio(row));

    let confidence = (first * 0.6 + (1.0 - second) * 0.4).clamp(0.0, 1.0);
    let has_header = first >= 0.6 && second <= 0.7;
    (has_header, confidence)
}

/// Column names for a page; blank header cells become `col_N`.
#[must_use]
pub fn column_names(header: Option<&[String]>, column_count: usize) -> Vec<String> {
    (0..column_count)
        .map(|index| {
            header
                .and_then(|cells| cells.get(index))
                .map(|cell| cell.trim())
                .filter(|cell| !cell.is_empty())
                .map_or_else(|| format!("col_{}", index + 1), str::to_string)
        })
        .collect()
}

/// Splits assembled rows into an optional header row and the data rows.
pub(crate) fn apply_header_mode(
    rows: Vec<Vec<String>>,
    mode: HeaderMode,
    warnings: &mut Vec<ExtractWarning>,
    page: u32,
) -> (Option<Vec<String>>, Vec<Vec<String>>) {
    if rows.is_empty() {
        return (None, rows);
    }

    let take_first = match mode {
        HeaderMode::None => false,
        HeaderMode::FirstRow => true,
        HeaderMode::AutoDetect => {
            let (has_header, confidence) = infer_has_header(&rows);
            if confidence < HEADER_CONFIDENCE_THRESHOLD {
                warnings.push(
                    ExtractWarning::new(
                        WarningCode::HeaderInferenceLowConfidence,
                        "header inference confidence is low; keeping the first row as data",
                    )
                    .with_page(page)
                    .with_confidence(confidence),
                );
            }
            has_header && confidence >= HEADER_CONFIDENCE_THRESHOLD
        }
    };

    if !take_first {
        return (None, rows);
    }

    let mut rows = rows.into_iter();
    let header = rows.next();
    (header, rows.collect())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{apply_header_mode, column_names, infer_has_header};
    use crate::options::HeaderMode;
    use crate::warning::WarningCode;

    fn rows(cells: &[&[&str]]) -> Vec<Vec<String>> {
        cells
            .iter()
            .map(|row| row.iter().map(|cell| (*cell).to_string()).collect())
            .collect()
    }

    #[test]
    fn infers_headers_for_text_then_numeric_rows() {
        let table = rows(&[&["Test", "Result"], &["12.5", "3,400"]]);
        let (has_header, confidence) = infer_has_header(&table);
        assert!(has_header);
        assert!(confidence > 0.9);
    }

    #[test]
    fn auto_detect_strips_header_row() {
        let table = rows(&[&["Analyte", "Value", "Unit"], &["Na", "140", "mmol/L"]]);
        let mut warnings = Vec::new();
        let (header, data) = apply_header_mode(table, HeaderMode::AutoDetect, &mut warnings, 1);

        assert_eq!(
            header,
            Some(vec![
                "Analyte".to_string(),
                "Value".to_string(),
                "Unit".to_string()
            ])
        );
        assert_eq!(data, rows(&[&["Na", "140", "mmol/L"]]));
        assert!(warnings.is_empty());
    }

    #[test]
    fn auto_detect_keeps_numeric_first_row_and_warns() {
        let table = rows(&[&["1", "2"], &["Na", "K"]]);
        let mut warnings = Vec::new();
        let (header, data) =
            apply_header_mode(table.clone(), HeaderMode::AutoDetect, &mut warnings, 3);

        assert_eq!(header, None);
        assert_eq!(data, table);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, WarningCode::HeaderInferenceLowConfidence);
        assert_eq!(warnings[0].page, Some(3));
    }

    #[test]
    fn none_and_first_row_modes() {
        let table = rows(&[&["a", "b"], &["c", "d"]]);
        let mut warnings = Vec::new();

        let (header, data) = apply_header_mode(table.clone(), HeaderMode::None, &mut warnings, 1);
        assert_eq!(header, None);
        assert_eq!(data.len(), 2);

        let (header, data) = apply_header_mode(table, HeaderMode::FirstRow, &mut warnings, 1);
        assert_eq!(header, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(data, rows(&[&["c", "d"]]));
    }

    #[test]
    fn blank_header_cells_fall_back_to_positional_names() {
        let header = vec!["Test".to_string(), "  ".to_string()];
        assert_eq!(
            column_names(Some(&header), 3),
            vec!["Test".to_string(), "col_2".to_string(), "col_3".to_string()]
        );
        assert_eq!(column_names(None, 2), vec!["col_1", "col_2"]);
    }
}
