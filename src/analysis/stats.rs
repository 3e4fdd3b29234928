//! Small numeric helpers shared by the assembler and the aggregator.

/// Guarded percentage `100 * num / den`.
///
/// A zero (or negative) denominator yields `0.0`, never NaN. A missing
/// denominator or numerator yields `None`, except that a zero denominator
/// still yields `0.0`.
pub fn percent(num: Option<f64>, den: Option<f64>) -> Option<f64> {
    let den = den?;
    if den <= 0.0 {
        return Some(0.0);
    }
    num.map(|n| 100.0 * n / den)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation; needs at least two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let n = values.len() as f64;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

/// Mean and sample std over the defined values only.
pub fn calculate_stats(values: &[Option<f64>]) -> (Option<f64>, Option<f64>) {
    let valid: Vec<f64> = values.iter().filter_map(|v| *v).collect();
    (mean(&valid), sample_std(&valid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_guards_zero_denominator() {
        assert_eq!(percent(Some(5.0), Some(0.0)), Some(0.0));
        assert_eq!(percent(None, Some(0.0)), Some(0.0));
        assert_eq!(percent(Some(80.0), Some(100.0)), Some(80.0));
        assert_eq!(percent(None, Some(100.0)), None);
        assert_eq!(percent(Some(1.0), None), None);
    }

    #[test]
    fn test_calculate_stats_ignores_missing() {
        let (m, s) = calculate_stats(&[Some(2.0), None, Some(4.0)]);
        assert_eq!(m, Some(3.0));
        assert!((s.unwrap() - 2.0_f64.sqrt()).abs() < 1e-12);

        let (m, s) = calculate_stats(&[Some(1.0)]);
        assert_eq!((m, s), (Some(1.0), None));
        assert_eq!(calculate_stats(&[None]), (None, None));
    }
}
