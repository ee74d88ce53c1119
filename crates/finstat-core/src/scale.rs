use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Monetary magnitude a set of reported values is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    Actual,
    Thousands,
    Millions,
    Billions,
}

impl Scale {
    pub const ALL: [Self; 4] = [Self::Actual, Self::Thousands, Self::Millions, Self::Billions];

    pub const fn multiplier(self) -> f64 {
        match self {
            Self::Actual => 1.0,
            Self::Thousands => 1.0e3,
            Self::Millions => 1.0e6,
            Self::Billions => 1.0e9,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Actual => "actual",
            Self::Thousands => "thousands",
            Self::Millions => "millions",
            Self::Billions => "billions",
        }
    }
}

impl Display for Scale {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of scale detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleDetection {
    pub scale: Scale,
    pub confidence: f64,
}

impl ScaleDetection {
    const fn new(scale: Scale, confidence: f64) -> Self {
        Self { scale, confidence }
    }
}

/// Context keywords that name a scale explicitly. Checked first and trusted
/// outright.
const CONTEXT_KEYWORDS: [(Scale, &[&str]); 4] = [
    (
        Scale::Thousands,
        &["in thousands", "thousands", "$k", "(000", "'000", "000s"],
    ),
    (
        Scale::Millions,
        &["in millions", "millions", "$m", "$mm", "mm)"],
    ),
    (Scale::Billions, &["in billions", "billions", "$b", "$bn"]),
    (Scale::Actual, &["in dollars", "in actual", "unscaled"]),
];

// Annual revenue brackets in actual dollars, used to test whether a candidate
// scale produces a plausible company size. Small/mid caps are weighted a
// little higher since they are the most common case. These bands are
// empirical rules of thumb inherited from the source system and are kept
// as-is (see DESIGN.md).
const REVENUE_BRACKETS: [(f64, f64, f64); 4] = [
    (1.0e7, 1.0e9, 1.2),   // small cap
    (1.0e9, 1.0e10, 1.1),  // mid cap
    (1.0e10, 1.0e11, 1.0), // large cap
    (1.0e11, 6.0e11, 0.9), // mega cap
];

const BRACKET_CONFIDENCE: f64 = 0.75;
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Detect the magnitude of `values`, optionally guided by free-text context.
///
/// Priority order:
/// 1. explicit context keyword (confidence 1.0, short-circuits);
/// 2. revenue-bracket fit over each candidate scale;
/// 3. generic magnitude bands on the median;
/// 4. default to millions at confidence 0.5.
///
/// Non-finite and non-positive values are ignored.
pub fn detect_scale(values: &[f64], context: Option<&str>) -> ScaleDetection {
    if let Some(context) = context {
        let lowered = context.to_lowercase();
        for (scale, keywords) in CONTEXT_KEYWORDS {
            if keywords.iter().any(|kw| lowered.contains(kw)) {
                return ScaleDetection::new(scale, 1.0);
            }
        }
    }

    let mut usable: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect();
    if usable.is_empty() {
        return ScaleDetection::new(Scale::Millions, DEFAULT_CONFIDENCE);
    }
    usable.sort_by(f64::total_cmp);
    let median = median_of_sorted(&usable);

    if let Some(detection) = bracket_fit(median) {
        return detection;
    }

    magnitude_band(median)
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Try each candidate scale and score how well the implied actual-dollar
/// revenue lands in a known company-size bracket.
fn bracket_fit(median: f64) -> Option<ScaleDetection> {
    let mut best: Option<(Scale, f64)> = None;

    for scale in Scale::ALL {
        let implied = median * scale.multiplier();
        for (low, high, weight) in REVENUE_BRACKETS {
            if implied >= low && implied < high {
                let better = match best {
                    Some((_, best_weight)) => weight > best_weight,
                    None => true,
                };
                if better {
                    best = Some((scale, weight));
                }
            }
        }
    }

    best.map(|(scale, _)| ScaleDetection::new(scale, BRACKET_CONFIDENCE))
}

/// Generic magnitude bands, used when no revenue bracket fits.
fn magnitude_band(median: f64) -> ScaleDetection {
    if median < 1.0 {
        ScaleDetection::new(Scale::Billions, 0.6)
    } else if median < 100.0 {
        // Ambiguous region: single-digit medians lean billions, the rest
        // millions. Inherited asymmetry, kept as-is.
        if median < 10.0 {
            ScaleDetection::new(Scale::Billions, 0.55)
        } else {
            ScaleDetection::new(Scale::Millions, 0.6)
        }
    } else if median < 10_000.0 {
        ScaleDetection::new(Scale::Millions, 0.8)
    } else if median < 1_000_000.0 {
        ScaleDetection::new(Scale::Thousands, 0.7)
    } else {
        ScaleDetection::new(Scale::Actual, 0.8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_context_wins_with_full_confidence() {
        let detection = detect_scale(&[123_456.0, 130_000.0], Some("All figures in thousands"));
        assert_eq!(detection.scale, Scale::Thousands);
        assert_eq!(detection.confidence, 1.0);
    }

    #[test]
    fn context_beats_magnitude_heuristics() {
        // Magnitude alone would say millions; the header says billions.
        let detection = detect_scale(&[150.0, 160.0], Some("(in billions of dollars)"));
        assert_eq!(detection.scale, Scale::Billions);
        assert_eq!(detection.confidence, 1.0);
    }

    #[test]
    fn typical_millions_values_detected_without_context() {
        let detection = detect_scale(&[450.0, 500.0, 520.0], None);
        assert_eq!(detection.scale, Scale::Millions);
        assert!(detection.confidence < 1.0);
    }

    #[test]
    fn raw_dollar_values_detected_as_actual_scale() {
        let detection = detect_scale(&[2.5e9, 2.7e9], None);
        assert_eq!(detection.scale, Scale::Actual);
    }

    #[test]
    fn thousand_scale_values_fit_small_cap_bracket() {
        // 85,000 thousands = $85M, inside the small-cap revenue bracket.
        let detection = detect_scale(&[80_000.0, 85_000.0, 90_000.0], None);
        assert_eq!(detection.scale, Scale::Thousands);
    }

    #[test]
    fn empty_input_defaults_to_millions() {
        let detection = detect_scale(&[], None);
        assert_eq!(detection.scale, Scale::Millions);
        assert_eq!(detection.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn ignores_non_positive_and_non_finite_values() {
        let detection = detect_scale(&[-5.0, f64::NAN, 450.0], None);
        assert_eq!(detection.scale, Scale::Millions);
    }
}
