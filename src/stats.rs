//! Statistical aggregation for measurement samples.

/// Arithmetic mean. Returns 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divide by N, not N-1).
///
/// This is the convention used for network jitter: the samples of one
/// probe run are the whole population, not a draw from a larger one.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mu = mean(values);
    let variance = values
        .iter()
        .map(|value| {
            let diff = value - mu;
            diff * diff
        })
        .sum::<f64>()
        / values.len() as f64;

    variance.sqrt()
}

/// Mean after discarding the lowest and highest decile.
///
/// Sorts ascending and drops `floor(n / 10)` samples from each end before
/// averaging. Ramp-up and ramp-down samples sit in the tails, so trimming
/// both symmetrically suppresses them. When the set is too small for the
/// trim to remove anything (n < 10) this degrades to a plain mean; it
/// never fails on too few samples.
pub fn trimmed_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let cut = sorted.len() / 10;
    if cut * 2 >= sorted.len() {
        return mean(&sorted);
    }

    mean(&sorted[cut..sorted.len() - cut])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_mean_empty() {
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_mean_simple() {
        assert!((mean(&[1.0, 2.0, 3.0, 4.0]) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_population_std_dev_constant_samples() {
        assert_eq!(population_std_dev(&[5.0, 5.0, 5.0]), 0.0);
    }

    #[test]
    fn test_population_std_dev_divides_by_n() {
        // Population std dev of [2, 4] is 1.0; the sample estimate
        // (divide by N-1) would be sqrt(2).
        assert!((population_std_dev(&[2.0, 4.0]) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_trimmed_mean_small_set_is_plain_mean() {
        // Below 10 samples nothing is cut, so the result must equal
        // the untrimmed mean.
        let samples = [3.0, 9.0, 6.0];
        assert!((trimmed_mean(&samples) - mean(&samples)).abs() < 1e-9);
    }

    #[test]
    fn test_trimmed_mean_idempotent_below_trim_threshold() {
        let samples = [10.0, 20.0, 30.0, 40.0];
        let once = trimmed_mean(&samples);
        assert!((once - 25.0).abs() < 1e-9);
        assert!((trimmed_mean(&[once]) - once).abs() < 1e-9);
    }

    #[test]
    fn test_trimmed_mean_drops_decile_each_end() {
        // 1..=20 with floor(20/10)=2 cut per end leaves 3..=18,
        // whose mean is 10.5.
        let samples: Vec<f64> = (1..=20).map(f64::from).collect();
        assert!((trimmed_mean(&samples) - 10.5).abs() < 1e-9);
    }

    #[test]
    fn test_trimmed_mean_insensitive_to_extreme_outlier() {
        // 101 values: 1..=100 plus a wild 100000. Trimming must keep
        // the result inside the untrimmed range of the honest samples.
        let mut samples: Vec<f64> = (1..=100).map(f64::from).collect();
        samples.push(100_000.0);

        let trimmed = trimmed_mean(&samples);
        assert!(trimmed >= 1.0 && trimmed <= 100.0, "got {trimmed}");

        // The outlier would drag the plain mean way outside that range.
        assert!(mean(&samples) > 100.0);
    }

    proptest! {
        #[test]
        fn population_std_dev_is_non_negative(
            samples in prop::collection::vec(0.0f64..10_000.0, 1..200)
        ) {
            prop_assert!(population_std_dev(&samples) >= 0.0);
        }

        #[test]
        fn trimmed_mean_within_sample_range(
            samples in prop::collection::vec(0.0f64..10_000.0, 1..200)
        ) {
            let lo = samples.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let trimmed = trimmed_mean(&samples);
            prop_assert!(trimmed >= lo - 1e-9 && trimmed <= hi + 1e-9);
        }

        #[test]
        fn mean_matches_sum_over_count(
            samples in prop::collection::vec(-1_000.0f64..1_000.0, 1..100)
        ) {
            let expected = samples.iter().sum::<f64>() / samples.len() as f64;
            prop_assert!((mean(&samples) - expected).abs() < 1e-9);
        }
    }
}
