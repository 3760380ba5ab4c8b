use crate::columns::{cluster_columns, nearest_column};
use crate::model::{Row, Token};
use crate::options::ClusterConfig;
use crate::rows::group_rows;

/// Places every token of every row into its nearest column. The result is
/// rectangular: `rows.len()` records of `columns.len()` cells, with `""`
/// wherever no token landed.
#[must_use]
pub fn assemble_table(rows: &[Row], columns: &[f32]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| {
            let mut buckets: Vec<Vec<&Token>> = vec![Vec::new(); columns.len()];
            for token in &row.tokens {
                if let Some(column) = nearest_column(columns, token.x_center()) {
                    buckets[column].push(token);
                }
            }

            buckets
                .into_iter()
                .map(|mut cell| {
                    cell.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
                    cell.iter()
                        .map(|token| token.text.trim())
                        .filter(|text| !text.is_empty())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect()
        })
        .collect()
}

/// Row grouping, column clustering and cell assembly for one page.
#[must_use]
pub fn assemble_page(tokens: &[Token], config: &ClusterConfig) -> (Vec<Vec<String>>, usize) {
    let rows = group_rows(tokens, config.y_tol);
    let columns = cluster_columns(tokens, config.x_eps);
    (assemble_table(&rows, &columns), columns.len())
}

#[cfg(test)]
mod tests {
    use super::{assemble_page, assemble_table};
    use crate::model::{BoundingBox, Row, Token, TokenOrigin};
    use crate::options::ClusterConfig;

    fn word(text: &str, x0: f32, x1: f32, y: f32) -> Token {
        Token::new(
            text,
            BoundingBox::new(x0, y - 4.0, x1, y + 4.0),
            TokenOrigin::PdfText,
        )
    }

    #[test]
    fn missing_cells_are_empty_strings() {
        let rows = vec![
            Row {
                tokens: vec![word("Glucose", 10.0, 50.0, 20.0), word("5.4", 100.0, 115.0, 20.0)],
                mean_y: 20.0,
            },
            Row {
                tokens: vec![word("mmol/L", 180.0, 215.0, 40.0)],
                mean_y: 40.0,
            },
        ];
        let table = assemble_table(&rows, &[30.0, 107.0, 197.0]);
        assert_eq!(
            table,
            vec![
                vec!["Glucose".to_string(), "5.4".to_string(), String::new()],
                vec![String::new(), String::new(), "mmol/L".to_string()],
            ]
        );
    }

    #[test]
    fn tokens_in_one_cell_join_left_to_right() {
        let rows = vec![Row {
            tokens: vec![word("Blood", 10.0, 30.0, 5.0), word("Urea", 34.0, 50.0, 5.0)],
            mean_y: 5.0,
        }];
        let table = assemble_table(&rows, &[30.0]);
        assert_eq!(table, vec![vec!["Blood Urea".to_string()]]);
    }

    #[test]
    fn equidistant_token_goes_left() {
        let rows = vec![Row {
            tokens: vec![word("mid", 18.0, 22.0, 0.0)],
            mean_y: 0.0,
        }];
        let table = assemble_table(&rows, &[10.0, 30.0]);
        assert_eq!(table, vec![vec!["mid".to_string(), String::new()]]);
    }

    #[test]
    fn assembles_page_end_to_end() {
        let tokens = vec![
            word("Test", 50.0, 74.0, 62.0),
            word("Result", 200.0, 236.0, 62.0),
            word("Glucose", 50.0, 92.0, 82.0),
            word("5.4", 200.0, 218.0, 82.0),
            word("HbA1c", 50.0, 80.0, 102.0),
            word("6.1", 200.0, 218.0, 102.0),
        ];
        let (table, column_count) = assemble_page(&tokens, &ClusterConfig::default());
        assert_eq!(column_count, 2);
        assert_eq!(table.len(), 3);
        assert_eq!(table[0], vec!["Test", "Result"]);
        assert_eq!(table[2], vec!["HbA1c", "6.1"]);
    }

    #[test]
    fn empty_page_assembles_to_nothing() {
        let (table, column_count) = assemble_page(&[], &ClusterConfig::default());
        assert!(table.is_empty());
        assert_eq!(column_count, 0);
    }
}
