// =============================================================================
// Returns
// =============================================================================

use super::rolling::NAN;

/// One-bar simple return in percent. NaN on the first bar or a zero base.
pub fn daily_return(close: &[f64]) -> Vec<f64> {
    (0..close.len())
        .map(|i| {
            if i == 0 || close[i - 1] == 0.0 {
                NAN
            } else {
                (close[i] / close[i - 1] - 1.0) * 100.0
            }
        })
        .collect()
}

/// One-bar log return in percent.
pub fn daily_log_return(close: &[f64]) -> Vec<f64> {
    (0..close.len())
        .map(|i| {
            if i == 0 {
                NAN
            } else {
                (close[i].ln() - close[i - 1].ln()) * 100.0
            }
        })
        .collect()
}

/// Return since the first bar in percent; the first bar reads 0.
pub fn cumulative_return(close: &[f64]) -> Vec<f64> {
    let Some(&first) = close.first() else {
        return Vec::new();
    };
    close
        .iter()
        .map(|&c| if first == 0.0 { NAN } else { (c / first - 1.0) * 100.0 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_and_cumulative() {
        let close = [100.0, 110.0, 99.0];
        let daily = daily_return(&close);
        assert!(daily[0].is_nan());
        assert!((daily[1] - 10.0).abs() < 1e-9);
        assert!((daily[2] + 10.0).abs() < 1e-9);
        let cumulative = cumulative_return(&close);
        assert_eq!(cumulative[0], 0.0);
        assert!((cumulative[2] + 1.0).abs() < 1e-9);
    }

    #[test]
    fn log_returns_sum_to_total() {
        let close = [50.0, 55.0, 60.5, 48.0];
        let total: f64 = daily_log_return(&close)[1..].iter().sum();
        assert!((total - (48.0_f64 / 50.0).ln() * 100.0).abs() < 1e-9);
    }

    #[test]
    fn empty_input() {
        assert!(cumulative_return(&[]).is_empty());
        assert!(daily_return(&[]).is_empty());
    }
}
