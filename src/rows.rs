use crate::model::{Row, Token};

/// Groups `tokens` into rows ordered top-to-bottom. Tokens inside a row are
/// ordered left-to-right.
///
/// Greedy: a token joins the open row when its center lies within `y_tol`
/// of the row's running mean, and is never reassigned afterwards.
#[must_use]
pub fn group_rows(tokens: &[Token], y_tol: f32) -> Vec<Row> {
    let mut sorted = tokens.iter().collect::<Vec<_>>();
    sorted.sort_by(|a, b| {
        a.y_center()
            .total_cmp(&b.y_center())
            .then_with(|| a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut rows = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    let mut mean_y = 0.0_f32;

    for token in sorted {
        let center = token.y_center();
        if !current.is_empty() && center - mean_y > y_tol {
            rows.push(close_row(std::mem::take(&mut current), mean_y));
        }

        if current.is_empty() {
            mean_y = center;
        } else {
            let count = current.len() as f32;
            mean_y = (mean_y * count + center) / (count + 1.0);
        }
        current.push(token.clone());
    }

    if !current.is_empty() {
        rows.push(close_row(current, mean_y));
    }

    rows
}

fn close_row(mut tokens: Vec<Token>, mean_y: f32) -> Row {
    tokens.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
    Row { tokens, mean_y }
}
