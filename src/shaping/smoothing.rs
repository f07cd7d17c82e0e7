/// Trailing moving average with `min_periods = 1`.
///
/// The first `k < window` points average over the `k` values seen so far, and missing values
/// are skipped rather than poisoning the window. A position whose whole window is missing
/// stays missing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MovingAverage {
    window: usize,
}

impl MovingAverage {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn apply(&self, values: &[Option<f64>]) -> Vec<Option<f64>> {
        if self.window == 1 {
            return values.to_vec();
        }
        (0..values.len())
            .map(|end| {
                let start = (end + 1).saturating_sub(self.window);
                let window = &values[start..=end];
                let (sum, count) = window
                    .iter()
                    .flatten()
                    .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
                if count == 0 {
                    return None;
                }
                if sum.is_finite() {
                    Some(sum / count as f64)
                } else {
                    // the plain sum overflowed; scale each term first
                    let n = count as f64;
                    Some(window.iter().flatten().map(|v| v / n).sum())
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_of_one_is_identity() {
        let values = vec![Some(3.0), None, Some(-1.5), Some(8.25)];
        assert_eq!(MovingAverage::new(1).apply(&values), values);
        assert_eq!(MovingAverage::new(0).window(), 1);
    }

    #[test]
    fn constant_series_stays_constant() {
        let values = vec![Some(7.3); 25];
        for window in [2, 3, 5, 10, 40] {
            for v in MovingAverage::new(window).apply(&values) {
                assert!((v.unwrap() - 7.3).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn leading_points_use_what_is_available() {
        let values = vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)];
        assert_eq!(
            MovingAverage::new(3).apply(&values),
            vec![Some(1.0), Some(1.5), Some(2.0), Some(3.0)]
        );
    }

    #[test]
    fn huge_values_do_not_overflow() {
        let values = vec![Some(1e308), Some(1e308), Some(-1e308)];
        let smoothed = MovingAverage::new(2).apply(&values);
        assert_eq!(smoothed, vec![Some(1e308), Some(1e308), Some(0.0)]);
    }

    #[test]
    fn window_wider_than_data_averages_everything() {
        let values = vec![Some(2.0), Some(4.0), Some(6.0)];
        assert_eq!(
            MovingAverage::new(10_000).apply(&values),
            vec![Some(2.0), Some(3.0), Some(4.0)]
        );
    }

    #[test]
    fn missing_values_are_skipped() {
        let values = vec![None, Some(2.0), None, None, None];
        assert_eq!(
            MovingAverage::new(2).apply(&values),
            vec![None, Some(2.0), Some(2.0), None, None]
        );
    }
}
