//! Data quality validation.
//!
//! Validators never mutate the data and never fail the pipeline by
//! themselves; they produce a structured report. The overall verdict is
//! driven by issue severity: `Error` and `Critical` issues make the result
//! invalid, warnings and info do not (unless strict mode is on).

mod outliers;

pub use outliers::{
    EnsembleOutlier, IqrDetector, IsolationForestDetector, OutlierDetector, OutlierEnsemble,
    RobustZDetector, SeasonalResidualDetector,
};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::{series_present, FinancialData, YearSeries};

/// Relative tolerance for assets = liabilities + equity.
const BALANCE_TOLERANCE: f64 = 0.01;
/// Absolute tolerance in millions for beginning + change = ending cash.
const CASH_TOLERANCE: f64 = 0.1;

const COMPLETENESS_WARN_BELOW: f64 = 0.5;
const COMPLETENESS_INFO_BELOW: f64 = 0.8;

/// EBITDA margin plausibility band.
const EBITDA_MARGIN_RANGE: (f64, f64) = (-0.5, 1.0);
/// Net margin plausibility band.
const NET_MARGIN_RANGE: (f64, f64) = (-1.0, 0.5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Sanity,
    Consistency,
    Outlier,
    Completeness,
}

/// One finding about the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub category: IssueCategory,
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl ValidationIssue {
    fn new(
        severity: Severity,
        category: IssueCategory,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            field: field.into(),
            year: None,
            message: message.into(),
            detail: None,
        }
    }

    fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// Aggregated validation outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub issues: Vec<ValidationIssue>,
    /// Per-field indices (into the years vector) flagged as outliers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outlier_indices: BTreeMap<String, Vec<usize>>,
    pub completeness: f64,
    /// Named reconciliation checks and whether each passed.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reconciliation: BTreeMap<String, bool>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            issues: Vec::new(),
            outlier_indices: BTreeMap::new(),
            completeness: 0.0,
            reconciliation: BTreeMap::new(),
        }
    }

    /// Combine two results. The merged verdict is the AND of both.
    pub fn merge(&mut self, other: Self) {
        self.is_valid = self.is_valid && other.is_valid;
        self.issues.extend(other.issues);
        for (field, indices) in other.outlier_indices {
            self.outlier_indices.entry(field).or_default().extend(indices);
        }
        self.completeness = self.completeness.max(other.completeness);
        self.reconciliation.extend(other.reconciliation);
    }

    pub fn max_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|issue| issue.severity).max()
    }
}

/// Validation stage contract. `strict` escalates the verdict so that any
/// issue at all fails validation.
pub trait Validator: Send + Sync {
    fn name(&self) -> &'static str;
    fn validate(&self, data: &FinancialData, strict: bool) -> ValidationResult;
}

/// The standard quality validator: sanity ranges, cross-statement
/// reconciliation, ensemble outlier detection, and completeness scoring.
pub struct QualityValidator {
    ensemble: OutlierEnsemble,
}

impl Default for QualityValidator {
    fn default() -> Self {
        Self {
            ensemble: OutlierEnsemble::default(),
        }
    }
}

impl QualityValidator {
    pub fn with_ensemble(ensemble: OutlierEnsemble) -> Self {
        Self { ensemble }
    }

    fn check_sanity(&self, data: &FinancialData, issues: &mut Vec<ValidationIssue>) {
        for (idx, &year) in data.years.iter().enumerate() {
            let revenue = match data.income.revenue.get(idx).copied().flatten() {
                Some(revenue) => revenue,
                None => continue,
            };

            if revenue <= 0.0 {
                issues.push(
                    ValidationIssue::new(
                        Severity::Critical,
                        IssueCategory::Sanity,
                        "revenue",
                        format!("revenue must be positive, got {revenue:.2} in {year}"),
                    )
                    .with_year(year),
                );
                continue;
            }

            if let Some(ebitda) = data.income.ebitda.get(idx).copied().flatten() {
                let margin = ebitda / revenue;
                if margin < EBITDA_MARGIN_RANGE.0 || margin > EBITDA_MARGIN_RANGE.1 {
                    issues.push(
                        ValidationIssue::new(
                            Severity::Warning,
                            IssueCategory::Sanity,
                            "ebitda",
                            format!("EBITDA margin {margin:.2} outside plausible range in {year}"),
                        )
                        .with_year(year),
                    );
                }
            }

            if let Some(net_income) = data.income.net_income.get(idx).copied().flatten() {
                let margin = net_income / revenue;
                if margin < NET_MARGIN_RANGE.0 || margin > NET_MARGIN_RANGE.1 {
                    issues.push(
                        ValidationIssue::new(
                            Severity::Warning,
                            IssueCategory::Sanity,
                            "net_income",
                            format!("net margin {margin:.2} outside plausible range in {year}"),
                        )
                        .with_year(year),
                    );
                }
            }
        }

        for (idx, &year) in data.years.iter().enumerate() {
            if let Some(assets) = data.balance.total_assets.get(idx).copied().flatten() {
                if assets <= 0.0 {
                    issues.push(
                        ValidationIssue::new(
                            Severity::Error,
                            IssueCategory::Sanity,
                            "total_assets",
                            format!("total assets must be positive, got {assets:.2} in {year}"),
                        )
                        .with_year(year),
                    );
                }
            }
        }
    }

    fn check_consistency(
        &self,
        data: &FinancialData,
        issues: &mut Vec<ValidationIssue>,
        reconciliation: &mut BTreeMap<String, bool>,
    ) {
        for (idx, &year) in data.years.iter().enumerate() {
            let assets = data.balance.total_assets.get(idx).copied().flatten();
            let liabilities = data.balance.total_liabilities.get(idx).copied().flatten();
            let equity = data.balance.total_equity.get(idx).copied().flatten();

            // Checks with a missing operand are skipped, not failed.
            if let (Some(assets), Some(liabilities), Some(equity)) = (assets, liabilities, equity) {
                let expected = liabilities + equity;
                let denom = assets.abs().max(1.0);
                let passed = ((assets - expected) / denom).abs() <= BALANCE_TOLERANCE;
                reconciliation.insert(format!("balance_sheet_{year}"), passed);
                if !passed {
                    issues.push(
                        ValidationIssue::new(
                            Severity::Error,
                            IssueCategory::Consistency,
                            "total_assets",
                            format!(
                                "balance sheet does not reconcile in {year}: \
                                 assets {assets:.1} vs liabilities + equity {expected:.1}"
                            ),
                        )
                        .with_year(year)
                        .with_detail(serde_json::json!({
                            "assets": assets,
                            "liabilities": liabilities,
                            "equity": equity,
                        })),
                    );
                }
            }

            let beginning = data.cash_flow.beginning_cash.get(idx).copied().flatten();
            let change = data.cash_flow.net_change_in_cash.get(idx).copied().flatten();
            let ending = data.cash_flow.ending_cash.get(idx).copied().flatten();

            if let (Some(beginning), Some(change), Some(ending)) = (beginning, change, ending) {
                let passed = (beginning + change - ending).abs() <= CASH_TOLERANCE;
                reconciliation.insert(format!("cash_flow_{year}"), passed);
                if !passed {
                    issues.push(
                        ValidationIssue::new(
                            Severity::Warning,
                            IssueCategory::Consistency,
                            "ending_cash",
                            format!(
                                "cash does not roll forward in {year}: \
                                 {beginning:.1} + {change:.1} != {ending:.1}"
                            ),
                        )
                        .with_year(year),
                    );
                }
            }
        }
    }

    fn check_outliers(
        &self,
        data: &FinancialData,
        issues: &mut Vec<ValidationIssue>,
        outlier_indices: &mut BTreeMap<String, Vec<usize>>,
    ) {
        let candidates: [(&str, &YearSeries); 3] = [
            ("revenue", &data.income.revenue),
            ("ebitda", &data.income.ebitda),
            ("net_income", &data.income.net_income),
        ];

        for (field, series) in candidates {
            if !series_present(series) {
                continue;
            }

            // Detection runs on the present values; indices map back to
            // positions in the full series.
            let mut positions = Vec::new();
            let mut values = Vec::new();
            for (idx, value) in series.iter().enumerate() {
                if let Some(value) = value {
                    positions.push(idx);
                    values.push(*value);
                }
            }

            for outlier in self.ensemble.detect(&values) {
                let series_idx = positions[outlier.index];
                let year = data.years.get(series_idx).copied();
                outlier_indices
                    .entry(field.to_owned())
                    .or_default()
                    .push(series_idx);

                let mut issue = ValidationIssue::new(
                    Severity::Warning,
                    IssueCategory::Outlier,
                    field,
                    format!(
                        "{field} value {:.1} flagged by {} detectors",
                        values[outlier.index], outlier.votes
                    ),
                )
                .with_detail(serde_json::json!({ "votes": outlier.votes }));
                if let Some(year) = year {
                    issue = issue.with_year(year);
                }
                issues.push(issue);
            }
        }
    }

    fn check_completeness(&self, completeness: f64, issues: &mut Vec<ValidationIssue>) {
        if completeness < COMPLETENESS_WARN_BELOW {
            issues.push(ValidationIssue::new(
                Severity::Warning,
                IssueCategory::Completeness,
                "completeness",
                format!("only {:.0}% of expected fields are populated", completeness * 100.0),
            ));
        } else if completeness < COMPLETENESS_INFO_BELOW {
            issues.push(ValidationIssue::new(
                Severity::Info,
                IssueCategory::Completeness,
                "completeness",
                format!("{:.0}% of expected fields are populated", completeness * 100.0),
            ));
        }
    }
}

impl Validator for QualityValidator {
    fn name(&self) -> &'static str {
        "quality"
    }

    fn validate(&self, data: &FinancialData, strict: bool) -> ValidationResult {
        let mut issues = Vec::new();
        let mut outlier_indices = BTreeMap::new();
        let mut reconciliation = BTreeMap::new();

        self.check_sanity(data, &mut issues);
        self.check_consistency(data, &mut issues, &mut reconciliation);
        self.check_outliers(data, &mut issues, &mut outlier_indices);

        let completeness = data.completeness_score();
        self.check_completeness(completeness, &mut issues);

        let worst = issues.iter().map(|issue| issue.severity).max();
        let is_valid = if strict {
            issues.is_empty()
        } else {
            !matches!(worst, Some(Severity::Error | Severity::Critical))
        };

        ValidationResult {
            is_valid,
            issues,
            outlier_indices,
            completeness,
            reconciliation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        BalanceSheet, CashFlowStatement, CompanyInfo, ExtractionMetadata, IncomeStatement,
        MarketData,
    };

    fn build(
        income: IncomeStatement,
        balance: BalanceSheet,
        cash_flow: CashFlowStatement,
    ) -> FinancialData {
        let years: Vec<i32> = (0..income.revenue.len() as i32).map(|i| 2018 + i).collect();
        FinancialData::new(
            CompanyInfo::new("Test Corp").expect("valid"),
            years,
            income,
            balance,
            cash_flow,
            MarketData::default(),
            ExtractionMetadata::new("test"),
        )
        .expect("valid data")
    }

    #[test]
    fn clean_data_is_valid_with_no_errors() {
        let data = build(
            IncomeStatement {
                revenue: vec![Some(100.0), Some(110.0), Some(120.0)],
                ebitda: vec![Some(25.0), Some(27.0), Some(30.0)],
                net_income: vec![Some(10.0), Some(11.0), Some(12.0)],
                ..IncomeStatement::default()
            },
            BalanceSheet {
                total_assets: vec![Some(200.0), Some(210.0), Some(220.0)],
                total_liabilities: vec![Some(120.0), Some(125.0), Some(130.0)],
                total_equity: vec![Some(80.0), Some(85.0), Some(90.0)],
                ..BalanceSheet::default()
            },
            CashFlowStatement::default(),
        );

        let result = QualityValidator::default().validate(&data, false);
        assert!(result.is_valid);
        assert!(result
            .reconciliation
            .values()
            .all(|passed| *passed));
    }

    #[test]
    fn negative_revenue_is_critical() {
        let data = build(
            IncomeStatement {
                revenue: vec![Some(100.0), Some(-5.0), Some(120.0)],
                ..IncomeStatement::default()
            },
            BalanceSheet::default(),
            CashFlowStatement::default(),
        );

        let result = QualityValidator::default().validate(&data, false);
        assert!(!result.is_valid);
        assert_eq!(result.max_severity(), Some(Severity::Critical));
        let issue = result
            .issues
            .iter()
            .find(|i| i.severity == Severity::Critical)
            .expect("critical issue present");
        assert_eq!(issue.year, Some(2019));
    }

    #[test]
    fn balance_mismatch_beyond_one_percent_fails() {
        let data = build(
            IncomeStatement {
                revenue: vec![Some(100.0)],
                ..IncomeStatement::default()
            },
            BalanceSheet {
                total_assets: vec![Some(200.0)],
                total_liabilities: vec![Some(120.0)],
                total_equity: vec![Some(70.0)], // off by 10, 5% of assets
                ..BalanceSheet::default()
            },
            CashFlowStatement::default(),
        );

        let result = QualityValidator::default().validate(&data, false);
        assert!(!result.is_valid);
        assert_eq!(result.reconciliation.get("balance_sheet_2018"), Some(&false));
    }

    #[test]
    fn balance_mismatch_within_tolerance_passes() {
        let data = build(
            IncomeStatement {
                revenue: vec![Some(100.0)],
                ..IncomeStatement::default()
            },
            BalanceSheet {
                total_assets: vec![Some(200.0)],
                total_liabilities: vec![Some(120.0)],
                total_equity: vec![Some(79.0)], // off by 1, 0.5% of assets
                ..BalanceSheet::default()
            },
            CashFlowStatement::default(),
        );

        let result = QualityValidator::default().validate(&data, false);
        assert_eq!(result.reconciliation.get("balance_sheet_2018"), Some(&true));
        assert!(result.is_valid);
    }

    #[test]
    fn missing_operands_skip_reconciliation() {
        let data = build(
            IncomeStatement {
                revenue: vec![Some(100.0)],
                ..IncomeStatement::default()
            },
            BalanceSheet {
                total_assets: vec![Some(200.0)],
                // no liabilities or equity
                ..BalanceSheet::default()
            },
            CashFlowStatement::default(),
        );

        let result = QualityValidator::default().validate(&data, false);
        assert!(result.reconciliation.is_empty());
        assert!(result.is_valid);
    }

    #[test]
    fn cash_roll_forward_mismatch_warns() {
        let data = build(
            IncomeStatement {
                revenue: vec![Some(100.0)],
                ..IncomeStatement::default()
            },
            BalanceSheet::default(),
            CashFlowStatement {
                beginning_cash: vec![Some(50.0)],
                net_change_in_cash: vec![Some(10.0)],
                ending_cash: vec![Some(65.0)],
                ..CashFlowStatement::default()
            },
        );

        let result = QualityValidator::default().validate(&data, false);
        // Warning severity: reported but not invalidating.
        assert!(result.is_valid);
        assert_eq!(result.reconciliation.get("cash_flow_2018"), Some(&false));
        assert!(result
            .issues
            .iter()
            .any(|i| i.category == IssueCategory::Consistency
                && i.severity == Severity::Warning));
    }

    #[test]
    fn strict_mode_fails_on_any_issue() {
        let data = build(
            IncomeStatement {
                revenue: vec![Some(100.0)],
                ..IncomeStatement::default()
            },
            BalanceSheet::default(),
            CashFlowStatement::default(),
        );

        let lenient = QualityValidator::default().validate(&data, false);
        assert!(lenient.is_valid);
        // Sparse data produces at least a completeness issue.
        assert!(!lenient.issues.is_empty());

        let strict = QualityValidator::default().validate(&data, true);
        assert!(!strict.is_valid);
    }

    #[test]
    fn revenue_spike_is_reported_as_outlier_with_year() {
        let data = build(
            IncomeStatement {
                revenue: vec![
                    Some(100.0),
                    Some(103.0),
                    Some(98.0),
                    Some(101.0),
                    Some(99.0),
                    Some(102.0),
                    Some(5000.0),
                ],
                ..IncomeStatement::default()
            },
            BalanceSheet::default(),
            CashFlowStatement::default(),
        );

        let result = QualityValidator::default().validate(&data, false);
        assert_eq!(result.outlier_indices.get("revenue"), Some(&vec![6]));
        let issue = result
            .issues
            .iter()
            .find(|i| i.category == IssueCategory::Outlier)
            .expect("outlier issue present");
        assert_eq!(issue.year, Some(2024));
        // Outliers warn, they do not invalidate.
        assert!(result.is_valid);
    }

    #[test]
    fn outlier_indices_map_back_through_missing_values() {
        let data = build(
            IncomeStatement {
                revenue: vec![
                    Some(100.0),
                    Some(103.0),
                    Some(98.0),
                    Some(101.0),
                    Some(99.0),
                    Some(102.0),
                    Some(104.0),
                ],
                ebitda: vec![
                    Some(25.0),
                    None,
                    Some(26.0),
                    Some(24.0),
                    Some(25.5),
                    Some(26.5),
                    Some(900.0),
                ],
                ..IncomeStatement::default()
            },
            BalanceSheet::default(),
            CashFlowStatement::default(),
        );

        let result = QualityValidator::default().validate(&data, false);
        // The spike sits at series index 6 even though the detector only
        // saw six values.
        assert_eq!(result.outlier_indices.get("ebitda"), Some(&vec![6]));
    }

    #[test]
    fn implausible_margins_warn() {
        let data = build(
            IncomeStatement {
                revenue: vec![Some(100.0)],
                ebitda: vec![Some(150.0)],
                net_income: vec![Some(90.0)],
                ..IncomeStatement::default()
            },
            BalanceSheet::default(),
            CashFlowStatement::default(),
        );

        let result = QualityValidator::default().validate(&data, false);
        let sanity_warnings = result
            .issues
            .iter()
            .filter(|i| i.category == IssueCategory::Sanity)
            .count();
        assert_eq!(sanity_warnings, 2);
        assert!(result.is_valid);
    }

    #[test]
    fn merge_combines_verdicts_with_and() {
        let mut left = ValidationResult::valid();
        let mut right = ValidationResult::valid();
        right.is_valid = false;
        right.issues.push(ValidationIssue::new(
            Severity::Error,
            IssueCategory::Sanity,
            "revenue",
            "bad",
        ));

        left.merge(right);
        assert!(!left.is_valid);
        assert_eq!(left.issues.len(), 1);
    }
}
