//! Behavior-driven tests for data quality validation.

use finstat_tests::{
    write_income_csv, Arc, Pipeline, PipelineOptions, QualityValidator, Severity, Validator,
};

use finstat_core::validate::{EnsembleOutlier, OutlierDetector, OutlierEnsemble};
use finstat_core::IssueCategory;

// =============================================================================
// Ensemble voting
// =============================================================================

struct FlagIndex(usize);

impl OutlierDetector for FlagIndex {
    fn name(&self) -> &'static str {
        "flag_index"
    }

    fn detect(&self, values: &[f64]) -> Option<Vec<bool>> {
        let mut flags = vec![false; values.len()];
        if self.0 < flags.len() {
            flags[self.0] = true;
        }
        Some(flags)
    }
}

#[test]
fn when_only_one_detector_flags_a_point_the_ensemble_stays_quiet() {
    // Given: three detectors, only one of which sees an anomaly.
    let ensemble = OutlierEnsemble::new(
        vec![
            Arc::new(FlagIndex(2)),
            Arc::new(FlagIndex(0)),
            Arc::new(FlagIndex(1)),
        ],
        2,
    );

    // When: detection runs.
    let outliers = ensemble.detect(&[10.0, 11.0, 12.0, 13.0]);

    // Then: no point reaches the vote threshold.
    assert!(outliers.is_empty());
}

#[test]
fn when_two_detectors_agree_the_point_is_flagged_with_its_vote_count() {
    let ensemble = OutlierEnsemble::new(
        vec![
            Arc::new(FlagIndex(2)),
            Arc::new(FlagIndex(2)),
            Arc::new(FlagIndex(0)),
        ],
        2,
    );

    let outliers = ensemble.detect(&[10.0, 11.0, 12.0, 13.0]);
    assert_eq!(outliers, vec![EnsembleOutlier { index: 2, votes: 2 }]);
}

// =============================================================================
// End-to-end validation through the pipeline
// =============================================================================

#[tokio::test]
async fn when_a_revenue_spike_survives_extraction_validation_flags_it_by_year() {
    // Given: an otherwise flat revenue series with one absurd year.
    let file = write_income_csv(&[
        ",2017,2018,2019,2020,2021,2022,2023",
        "Revenue,100,103,98,101,99,102,5000",
    ]);
    let pipeline = Pipeline::default();

    // When: the full pipeline runs.
    let report = pipeline
        .run(&file.path().display().to_string(), &PipelineOptions::new())
        .await
        .expect("pipeline runs");

    // Then: the spike is reported as an outlier at the right year, as a
    // warning rather than a hard failure.
    assert_eq!(
        report.validation.outlier_indices.get("revenue"),
        Some(&vec![6])
    );
    let issue = report
        .validation
        .issues
        .iter()
        .find(|i| i.category == IssueCategory::Outlier)
        .expect("outlier issue reported");
    assert_eq!(issue.year, Some(2023));
    assert_eq!(issue.severity, Severity::Warning);
    assert!(report.validation.is_valid);
}

#[tokio::test]
async fn when_the_balance_sheet_does_not_reconcile_the_run_is_invalid() {
    // Given: assets off from liabilities + equity by 5%.
    let file = write_income_csv(&[
        ",2022,2023",
        "Revenue,100,110",
        "Total assets,200,210",
        "Total liabilities,120,125",
        "Total equity,70,75",
    ]);
    let pipeline = Pipeline::default();

    let report = pipeline
        .run(&file.path().display().to_string(), &PipelineOptions::new())
        .await
        .expect("extraction succeeds even when validation fails");

    assert!(!report.validation.is_valid);
    assert_eq!(
        report.validation.reconciliation.get("balance_sheet_2022"),
        Some(&false)
    );
    let issue = report
        .validation
        .issues
        .iter()
        .find(|i| i.category == IssueCategory::Consistency)
        .expect("consistency issue reported");
    assert_eq!(issue.severity, Severity::Error);
}

#[tokio::test]
async fn when_the_mismatch_is_within_one_percent_reconciliation_passes() {
    // Given: assets off by 0.5% of the total.
    let file = write_income_csv(&[
        ",2022,2023",
        "Revenue,100,110",
        "Total assets,200,210",
        "Total liabilities,120,125",
        "Total equity,79,84",
    ]);
    let pipeline = Pipeline::default();

    let report = pipeline
        .run(&file.path().display().to_string(), &PipelineOptions::new())
        .await
        .expect("pipeline runs");

    assert!(report.validation.is_valid);
    assert_eq!(
        report.validation.reconciliation.get("balance_sheet_2022"),
        Some(&true)
    );
    assert_eq!(
        report.validation.reconciliation.get("balance_sheet_2023"),
        Some(&true)
    );
}

#[tokio::test]
async fn when_cash_does_not_roll_forward_validation_warns_but_passes() {
    let file = write_income_csv(&[
        ",2022,2023",
        "Revenue,100,110",
        "Cash at beginning of period,50,60",
        "Net change in cash,10,5",
        "Cash at end of period,60,80",
    ]);
    let pipeline = Pipeline::default();

    let report = pipeline
        .run(&file.path().display().to_string(), &PipelineOptions::new())
        .await
        .expect("pipeline runs");

    // 2022 rolls forward exactly; 2023 is off by 15.
    assert_eq!(
        report.validation.reconciliation.get("cash_flow_2022"),
        Some(&true)
    );
    assert_eq!(
        report.validation.reconciliation.get("cash_flow_2023"),
        Some(&false)
    );
    assert!(report.validation.is_valid);
}

// =============================================================================
// Direct validator behavior
// =============================================================================

#[tokio::test]
async fn when_revenue_is_negative_the_verdict_is_critical() {
    let file = write_income_csv(&[",2022,2023", "Revenue,100,-50"]);
    let pipeline = Pipeline::default();

    let report = pipeline
        .run(&file.path().display().to_string(), &PipelineOptions::new())
        .await
        .expect("extraction succeeds");

    assert!(!report.validation.is_valid);
    assert_eq!(report.validation.max_severity(), Some(Severity::Critical));
}

#[tokio::test]
async fn when_strict_mode_is_on_informational_issues_fail_the_verdict() {
    let file = write_income_csv(&[",2022,2023", "Revenue,100,110"]);
    let pipeline = Pipeline::default();

    let report = pipeline
        .run(&file.path().display().to_string(), &PipelineOptions::new())
        .await
        .expect("pipeline runs");
    let data = report.data;

    let validator = QualityValidator::default();
    assert!(validator.validate(&data, false).is_valid);
    assert!(!validator.validate(&data, true).is_valid);
}
