use serde::{Deserialize, Serialize};

use crate::schema::company::CompanyInfo;
use crate::schema::metadata::ExtractionMetadata;
use crate::schema::statements::{
    series_present, BalanceSheet, CashFlowStatement, IncomeStatement, MarketData,
};
use crate::SchemaError;

/// Root aggregate produced by extractors and consumed by the rest of the
/// pipeline.
///
/// Invariants enforced at construction:
/// - at least one fiscal year, years strictly ascending;
/// - every populated per-year series has length `years.len()`;
/// - revenue is populated for every fiscal year.
///
/// Gaps between years are tolerated but recorded as a metadata warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialData {
    pub company: CompanyInfo,
    pub years: Vec<i32>,
    pub income: IncomeStatement,
    pub balance: BalanceSheet,
    pub cash_flow: CashFlowStatement,
    pub market: MarketData,
    pub metadata: ExtractionMetadata,
}

impl FinancialData {
    pub fn new(
        company: CompanyInfo,
        years: Vec<i32>,
        income: IncomeStatement,
        balance: BalanceSheet,
        cash_flow: CashFlowStatement,
        market: MarketData,
        mut metadata: ExtractionMetadata,
    ) -> Result<Self, SchemaError> {
        if years.is_empty() {
            return Err(SchemaError::NoYears);
        }

        for pair in years.windows(2) {
            if pair[1] <= pair[0] {
                return Err(SchemaError::YearsNotAscending {
                    prev: pair[0],
                    next: pair[1],
                });
            }
            if pair[1] - pair[0] > 1 {
                metadata.push_warning(format!(
                    "non-sequential fiscal years: gap between {} and {}",
                    pair[0], pair[1]
                ));
            }
        }

        let expected = years.len();
        for (field, series) in income
            .series()
            .into_iter()
            .chain(balance.series())
            .chain(cash_flow.series())
        {
            if !series.is_empty() && series.len() != expected {
                return Err(SchemaError::SeriesLengthMismatch {
                    field,
                    len: series.len(),
                    expected,
                });
            }
        }

        if income.revenue.len() != expected || income.revenue.iter().any(Option::is_none) {
            return Err(SchemaError::RevenueMissing);
        }

        let mut data = Self {
            company,
            years,
            income,
            balance,
            cash_flow,
            market,
            metadata,
        };
        data.recompute_completeness();
        Ok(data)
    }

    /// Weighted fraction of expected fields actually populated, in [0, 1].
    /// Revenue and the other anchor fields carry heavier weights.
    pub fn completeness_score(&self) -> f64 {
        let series_checks: [(f64, bool); 11] = [
            (3.0, series_present(&self.income.revenue)),
            (2.0, series_present(&self.income.ebitda)),
            (2.0, series_present(&self.income.net_income)),
            (1.0, series_present(&self.income.cogs)),
            (2.0, series_present(&self.balance.total_assets)),
            (1.0, series_present(&self.balance.total_liabilities)),
            (1.0, series_present(&self.balance.total_equity)),
            (1.0, series_present(&self.balance.cash_and_equivalents)),
            (1.0, series_present(&self.balance.total_debt)),
            (2.0, series_present(&self.cash_flow.operating_cash_flow)),
            (1.0, series_present(&self.cash_flow.capital_expenditures)),
        ];
        let scalar_checks: [(f64, bool); 2] = [
            (1.0, self.market.share_price.is_some()),
            (1.0, self.market.shares_outstanding.is_some()),
        ];

        let mut total = 0.0;
        let mut present = 0.0;
        for (weight, is_present) in series_checks.iter().chain(scalar_checks.iter()) {
            total += weight;
            if *is_present {
                present += weight;
            }
        }

        present / total
    }

    pub fn recompute_completeness(&mut self) {
        self.metadata.completeness = self.completeness_score();
    }

    /// Index of a fiscal year within the series, if covered.
    pub fn year_index(&self, year: i32) -> Option<usize> {
        self.years.iter().position(|&y| y == year)
    }
}
