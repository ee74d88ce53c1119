//! Outlier detection ensemble.
//!
//! Four detectors with different failure modes vote per data point; a point
//! is an outlier only when at least `vote_threshold` detectors agree. A
//! detector that cannot run on a given series (too few points, degenerate
//! spread) abstains rather than voting no.

use std::sync::Arc;

/// Minimum points any detector needs unless it says otherwise.
const MIN_POINTS: usize = 3;

/// One outlier detection strategy over a single numeric series.
///
/// `detect` returns one flag per input point, or `None` to abstain when the
/// series does not meet the detector's preconditions.
pub trait OutlierDetector: Send + Sync {
    fn name(&self) -> &'static str;

    fn min_points(&self) -> usize {
        MIN_POINTS
    }

    fn detect(&self, values: &[f64]) -> Option<Vec<bool>>;
}

/// Classic Tukey fences: outside `[q1 - 1.5*iqr, q3 + 1.5*iqr]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IqrDetector;

impl OutlierDetector for IqrDetector {
    fn name(&self) -> &'static str {
        "iqr"
    }

    fn detect(&self, values: &[f64]) -> Option<Vec<bool>> {
        if values.len() < self.min_points() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let q1 = quantile_of_sorted(&sorted, 0.25);
        let q3 = quantile_of_sorted(&sorted, 0.75);
        let iqr = q3 - q1;

        let low = q1 - 1.5 * iqr;
        let high = q3 + 1.5 * iqr;
        Some(values.iter().map(|v| *v < low || *v > high).collect())
    }
}

/// Modified z-score on the median absolute deviation, cutoff 3.5. Abstains
/// when the MAD collapses to zero (constant-ish series).
#[derive(Debug, Clone, Copy, Default)]
pub struct RobustZDetector;

const ROBUST_Z_SCALE: f64 = 0.6745;
const ROBUST_Z_CUTOFF: f64 = 3.5;

impl OutlierDetector for RobustZDetector {
    fn name(&self) -> &'static str {
        "robust_z"
    }

    fn detect(&self, values: &[f64]) -> Option<Vec<bool>> {
        if values.len() < self.min_points() {
            return None;
        }

        let center = median(values);
        let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
        let mad = median(&deviations);
        if mad <= f64::EPSILON {
            return None;
        }

        Some(
            values
                .iter()
                .map(|v| (ROBUST_Z_SCALE * (v - center).abs() / mad) > ROBUST_Z_CUTOFF)
                .collect(),
        )
    }
}

/// One-dimensional isolation forest. Points that isolate in few random
/// splits score high; the top ~5% by score are flagged. Seeded so results
/// are reproducible.
#[derive(Debug, Clone, Copy)]
pub struct IsolationForestDetector {
    trees: usize,
    contamination: f64,
    seed: u64,
}

impl Default for IsolationForestDetector {
    fn default() -> Self {
        Self {
            trees: 100,
            contamination: 0.05,
            seed: 0x5eed,
        }
    }
}

impl OutlierDetector for IsolationForestDetector {
    fn name(&self) -> &'static str {
        "isolation_forest"
    }

    fn min_points(&self) -> usize {
        4
    }

    fn detect(&self, values: &[f64]) -> Option<Vec<bool>> {
        if values.len() < self.min_points() {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !(max - min).is_normal() {
            return None;
        }

        let mut rng = fastrand::Rng::with_seed(self.seed);
        let mut depth_sums = vec![0.0f64; values.len()];
        for _ in 0..self.trees {
            for (idx, value) in values.iter().enumerate() {
                depth_sums[idx] += f64::from(isolation_depth(*value, values, &mut rng));
            }
        }

        // Shallow average depth means easy to isolate, which means anomalous.
        let mut ranked: Vec<usize> = (0..values.len()).collect();
        ranked.sort_by(|a, b| depth_sums[*a].total_cmp(&depth_sums[*b]));

        let flag_count = ((values.len() as f64 * self.contamination).ceil() as usize).max(1);
        let mut flags = vec![false; values.len()];
        for &idx in ranked.iter().take(flag_count) {
            // Only flag points that are actually easier to isolate than the
            // average, otherwise a uniform series would always flag one.
            let mean_depth = depth_sums.iter().sum::<f64>() / values.len() as f64;
            if depth_sums[idx] < mean_depth * 0.7 {
                flags[idx] = true;
            }
        }
        Some(flags)
    }
}

/// Depth at which `target` isolates under random axis splits of `values`.
fn isolation_depth(target: f64, values: &[f64], rng: &mut fastrand::Rng) -> u32 {
    let mut pool: Vec<f64> = values.to_vec();
    let mut depth = 0u32;

    while pool.len() > 1 && depth < 16 {
        let min = pool.iter().copied().fold(f64::INFINITY, f64::min);
        let max = pool.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max <= min {
            break;
        }
        let split = min + rng.f64() * (max - min);
        depth += 1;
        if target < split {
            pool.retain(|v| *v < split);
        } else {
            pool.retain(|v| *v >= split);
        }
    }

    depth
}

/// Z-score of residuals against a centered moving average. Needs a longer
/// series than the others to be meaningful.
#[derive(Debug, Clone, Copy)]
pub struct SeasonalResidualDetector {
    window: usize,
    z_cutoff: f64,
}

impl Default for SeasonalResidualDetector {
    fn default() -> Self {
        Self {
            window: 4,
            z_cutoff: 3.0,
        }
    }
}

impl OutlierDetector for SeasonalResidualDetector {
    fn name(&self) -> &'static str {
        "seasonal_residual"
    }

    fn min_points(&self) -> usize {
        8
    }

    fn detect(&self, values: &[f64]) -> Option<Vec<bool>> {
        if values.len() < self.min_points() {
            return None;
        }

        let half = self.window / 2;
        let residuals: Vec<f64> = values
            .iter()
            .enumerate()
            .map(|(idx, value)| {
                let start = idx.saturating_sub(half);
                let end = (idx + half + 1).min(values.len());
                let window = &values[start..end];
                let mean = window.iter().sum::<f64>() / window.len() as f64;
                value - mean
            })
            .collect();

        let mean = residuals.iter().sum::<f64>() / residuals.len() as f64;
        let variance = residuals
            .iter()
            .map(|r| (r - mean).powi(2))
            .sum::<f64>()
            / residuals.len() as f64;
        let std_dev = variance.sqrt();
        if std_dev <= f64::EPSILON {
            return None;
        }

        Some(
            residuals
                .iter()
                .map(|r| ((r - mean) / std_dev).abs() > self.z_cutoff)
                .collect(),
        )
    }
}

/// An index flagged by the ensemble, with the number of agreeing detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsembleOutlier {
    pub index: usize,
    pub votes: usize,
}

/// Voting ensemble over the configured detectors.
pub struct OutlierEnsemble {
    detectors: Vec<Arc<dyn OutlierDetector>>,
    vote_threshold: usize,
}

impl Default for OutlierEnsemble {
    fn default() -> Self {
        Self {
            detectors: vec![
                Arc::new(IqrDetector),
                Arc::new(RobustZDetector),
                Arc::new(IsolationForestDetector::default()),
                Arc::new(SeasonalResidualDetector::default()),
            ],
            vote_threshold: 2,
        }
    }
}

impl OutlierEnsemble {
    pub fn new(detectors: Vec<Arc<dyn OutlierDetector>>, vote_threshold: usize) -> Self {
        Self {
            detectors,
            vote_threshold: vote_threshold.max(1),
        }
    }

    /// Flags indices where at least `vote_threshold` detectors agree.
    /// Returns nothing when the series is too short for any detector.
    pub fn detect(&self, values: &[f64]) -> Vec<EnsembleOutlier> {
        if values.len() < MIN_POINTS {
            return Vec::new();
        }

        let mut votes = vec![0usize; values.len()];
        let mut any_ran = false;
        for detector in &self.detectors {
            if let Some(flags) = detector.detect(values) {
                any_ran = true;
                for (idx, flagged) in flags.iter().enumerate() {
                    if *flagged {
                        votes[idx] += 1;
                    }
                }
            }
        }
        if !any_ran {
            return Vec::new();
        }

        votes
            .into_iter()
            .enumerate()
            .filter(|(_, count)| *count >= self.vote_threshold)
            .map(|(index, votes)| EnsembleOutlier { index, votes })
            .collect()
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Linear-interpolated quantile of a sorted slice.
fn quantile_of_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let position = q * (sorted.len() - 1) as f64;
    let low = position.floor() as usize;
    let high = position.ceil() as usize;
    if low == high {
        sorted[low]
    } else {
        let fraction = position - low as f64;
        sorted[low] * (1.0 - fraction) + sorted[high] * fraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysFlagLast;

    impl OutlierDetector for AlwaysFlagLast {
        fn name(&self) -> &'static str {
            "always_flag_last"
        }

        fn detect(&self, values: &[f64]) -> Option<Vec<bool>> {
            let mut flags = vec![false; values.len()];
            if let Some(last) = flags.last_mut() {
                *last = true;
            }
            Some(flags)
        }
    }

    struct NeverFlag;

    impl OutlierDetector for NeverFlag {
        fn name(&self) -> &'static str {
            "never_flag"
        }

        fn detect(&self, values: &[f64]) -> Option<Vec<bool>> {
            Some(vec![false; values.len()])
        }
    }

    struct AlwaysAbstain;

    impl OutlierDetector for AlwaysAbstain {
        fn name(&self) -> &'static str {
            "always_abstain"
        }

        fn detect(&self, _values: &[f64]) -> Option<Vec<bool>> {
            None
        }
    }

    #[test]
    fn single_vote_is_not_enough() {
        let ensemble = OutlierEnsemble::new(
            vec![
                Arc::new(AlwaysFlagLast),
                Arc::new(NeverFlag),
                Arc::new(NeverFlag),
            ],
            2,
        );

        let outliers = ensemble.detect(&[100.0, 105.0, 110.0, 900.0]);
        assert!(outliers.is_empty());
    }

    #[test]
    fn two_agreeing_votes_flag_the_point() {
        let ensemble = OutlierEnsemble::new(
            vec![
                Arc::new(AlwaysFlagLast),
                Arc::new(AlwaysFlagLast),
                Arc::new(NeverFlag),
            ],
            2,
        );

        let outliers = ensemble.detect(&[100.0, 105.0, 110.0, 900.0]);
        assert_eq!(
            outliers,
            vec![EnsembleOutlier { index: 3, votes: 2 }]
        );
    }

    #[test]
    fn abstaining_detectors_do_not_vote_no() {
        let ensemble = OutlierEnsemble::new(
            vec![
                Arc::new(AlwaysFlagLast),
                Arc::new(AlwaysFlagLast),
                Arc::new(AlwaysAbstain),
                Arc::new(AlwaysAbstain),
            ],
            2,
        );

        let outliers = ensemble.detect(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(outliers.len(), 1);
    }

    #[test]
    fn all_abstaining_reports_nothing() {
        let ensemble = OutlierEnsemble::new(vec![Arc::new(AlwaysAbstain)], 1);
        assert!(ensemble.detect(&[1.0, 2.0, 3.0]).is_empty());
    }

    #[test]
    fn short_series_is_skipped_entirely() {
        let ensemble = OutlierEnsemble::default();
        assert!(ensemble.detect(&[1.0, 1000.0]).is_empty());
    }

    #[test]
    fn iqr_flags_extreme_spike() {
        let flags = IqrDetector
            .detect(&[100.0, 102.0, 98.0, 101.0, 99.0, 100.0, 5000.0])
            .expect("enough points");
        assert!(flags[6]);
        assert!(flags[..6].iter().all(|f| !f));
    }

    #[test]
    fn robust_z_abstains_on_constant_series() {
        assert!(RobustZDetector.detect(&[5.0, 5.0, 5.0, 5.0]).is_none());
    }

    #[test]
    fn robust_z_flags_extreme_spike() {
        let flags = RobustZDetector
            .detect(&[100.0, 102.0, 98.0, 101.0, 99.0, 5000.0])
            .expect("mad is positive");
        assert!(flags[5]);
        assert!(flags[..5].iter().all(|f| !f));
    }

    #[test]
    fn isolation_forest_is_deterministic() {
        let detector = IsolationForestDetector::default();
        let values = [100.0, 102.0, 98.0, 101.0, 99.0, 103.0, 5000.0];
        let first = detector.detect(&values).expect("runs");
        let second = detector.detect(&values).expect("runs");
        assert_eq!(first, second);
    }

    #[test]
    fn seasonal_detector_needs_eight_points() {
        let detector = SeasonalResidualDetector::default();
        assert!(detector.detect(&[1.0; 7]).is_none());
    }

    #[test]
    fn real_ensemble_agrees_on_obvious_spike() {
        let ensemble = OutlierEnsemble::default();
        let values = [100.0, 103.0, 98.0, 101.0, 99.0, 102.0, 5000.0];

        let outliers = ensemble.detect(&values);
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].index, 6);
        assert!(outliers[0].votes >= 2);
    }
}
