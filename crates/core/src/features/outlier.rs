//! Tukey-fence outlier removal.

/// Percentile with linear interpolation between closest ranks.
///
/// `sorted` must be ascending and non-empty; `q` is in [0, 100].
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Open interval `(p25 - 1.5*IQR, p75 + 1.5*IQR)`, or `None` for no data.
pub fn tukey_fences(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let p25 = percentile(&sorted, 25.0);
    let p75 = percentile(&sorted, 75.0);
    let iqr = p75 - p25;
    Some((p25 - 1.5 * iqr, p75 + 1.5 * iqr))
}

/// Keep only values strictly inside the Tukey fences, in input order.
pub fn remove_outliers(values: &[f64]) -> Vec<f64> {
    match tukey_fences(values) {
        Some((lower, upper)) => values
            .iter()
            .copied()
            .filter(|&v| v > lower && v < upper)
            .collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_linear() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&sorted, 25.0) - 1.75).abs() < 1e-12);
        assert!((percentile(&sorted, 50.0) - 2.5).abs() < 1e-12);
        assert!((percentile(&sorted, 75.0) - 3.25).abs() < 1e-12);
        assert_eq!(percentile(&[5.0], 75.0), 5.0);
    }

    #[test]
    fn test_removes_high_outlier() {
        // p25 = 100, p75 = 105, fences (92.5, 112.5)
        assert_eq!(
            remove_outliers(&[100.0, 105.0, 1000.0, 98.0, 102.0]),
            vec![100.0, 105.0, 98.0, 102.0]
        );
    }

    #[test]
    fn test_three_values_cannot_fence_out_the_largest() {
        // p25 = 102.5, p75 = 552.5: the IQR is dominated by 1000 itself
        assert_eq!(remove_outliers(&[100.0, 105.0, 1000.0]).len(), 3);
    }

    #[test]
    fn test_keeps_regular_values_in_order() {
        let v = [98.0, 102.0];
        assert_eq!(remove_outliers(&v), v.to_vec());
    }

    #[test]
    fn test_constant_input_is_removed() {
        // IQR = 0 leaves an empty open interval
        assert!(remove_outliers(&[3.0, 3.0, 3.0]).is_empty());
        assert!(remove_outliers(&[]).is_empty());
    }

    #[test]
    fn test_results_inside_fences() {
        let values: Vec<f64> = (0..200).map(|i| ((i * 37) % 101) as f64 + if i % 50 == 0 { 900.0 } else { 0.0 }).collect();
        let (lower, upper) = tukey_fences(&values).unwrap();
        let kept = remove_outliers(&values);
        assert!(kept.len() < values.len());
        assert!(kept.iter().all(|&v| v > lower && v < upper));
    }

    #[test]
    fn test_idempotent_on_filtered_output() {
        let values = [10.0, 11.0, 12.0, 11.5, 10.5, 11.2, 10.8, 12.1, 11.9, 10.9];
        let once = remove_outliers(&values);
        let twice = remove_outliers(&once);
        assert_eq!(once, twice);
    }
}
