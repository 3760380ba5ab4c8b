use crate::model::Token;

/// Returns column centers ordered left-to-right. The column count depends
/// only on `x_eps`.
#[must_use]
pub fn cluster_columns(tokens: &[Token], x_eps: f32) -> Vec<f32> {
    let centers = tokens.iter().map(Token::x_center).collect::<Vec<_>>();
    cluster_centers(&centers, x_eps)
}

/// Sort-then-sweep merge: a center joins the open cluster when it lies
/// within `x_eps` of the cluster's running mean.
#[must_use]
pub fn cluster_centers(centers: &[f32], x_eps: f32) -> Vec<f32> {
    let mut sorted = centers.to_vec();
    sorted.sort_by(f32::total_cmp);

    let mut columns = Vec::new();
    let mut sum = 0.0_f32;
    let mut count = 0_usize;

    for center in sorted {
        if count > 0 {
            let mean = sum / count as f32;
            if center - mean > x_eps {
                columns.push(mean);
                sum = 0.0;
                count = 0;
            }
        }
        sum += center;
        count += 1;
    }

    if count > 0 {
        columns.push(sum / count as f32);
    }

    columns
}

/// Index of the column nearest to `x`; equidistant centers resolve to the
/// leftmost one.
#[must_use]
pub fn nearest_column(columns: &[f32], x: f32) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &center) in columns.iter().enumerate() {
        let distance = (center - x).abs();
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((index, distance)),
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::{cluster_centers, nearest_column};

    #[test]
    fn two_columns_from_four_centers() {
        let columns = cluster_centers(&[44.0, 5.0, 40.0, 7.0], 5.0);
        assert_eq!(columns, vec![6.0, 42.0]);
        assert_eq!(nearest_column(&columns, 6.0), Some(0));
        assert_eq!(nearest_column(&columns, 41.0), Some(1));
    }

    #[test]
    fn no_tokens_no_columns() {
        assert!(cluster_centers(&[], 5.0).is_empty());
        assert_eq!(nearest_column(&[], 3.0), None);
    }

    #[test]
    fn ties_go_to_leftmost_column() {
        let columns = [10.0, 20.0, 30.0];
        assert_eq!(nearest_column(&columns, 15.0), Some(0));
        assert_eq!(nearest_column(&columns, 25.0), Some(1));
    }

    #[test]
    fn columns_are_ordered_left_to_right() {
        let columns = cluster_centers(&[300.0, 12.0, 150.0, 14.0, 301.0, 149.0], 10.0);
        assert_eq!(columns.len(), 3);
        assert!(columns.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn larger_eps_never_adds_columns() {
        let centers = [
            3.0, 8.0, 11.0, 19.0, 26.0, 31.0, 45.0, 47.0, 52.0, 70.0, 71.0, 90.0,
        ];
        let counts = (1..=80)
            .map(|step| cluster_centers(&centers, step as f32 * 0.5).len())
            .collect::<Vec<_>>();
        assert!(counts.windows(2).all(|pair| pair[1] <= pair[0]), "{counts:?}");
        assert_eq!(counts.first(), Some(&centers.len()));
    }
}
