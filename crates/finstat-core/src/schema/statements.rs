use serde::{Deserialize, Serialize};

/// One value per fiscal year; `None` marks a missing data point.
pub type YearSeries = Vec<Option<f64>>;

/// A series is "present" when it has been populated with at least one value.
/// An entirely unset field is represented as an empty vector.
pub fn series_present(series: &YearSeries) -> bool {
    !series.is_empty() && series.iter().any(Option::is_some)
}

/// Income statement series. Revenue is the anchor field: it must be fully
/// populated, which `FinancialData::new` enforces. Everything else is
/// optional and may be empty or partially populated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IncomeStatement {
    pub revenue: YearSeries,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cogs: YearSeries,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gross_profit: YearSeries,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operating_expenses: YearSeries,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ebitda: YearSeries,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depreciation_amortization: YearSeries,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ebit: YearSeries,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub interest_expense: YearSeries,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tax_expense: YearSeries,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub net_income: YearSeries,
}

impl IncomeStatement {
    pub fn series(&self) -> Vec<(&'static str, &YearSeries)> {
        vec![
            ("revenue", &self.revenue),
            ("cogs", &self.cogs),
            ("gross_profit", &self.gross_profit),
            ("operating_expenses", &self.operating_expenses),
            ("ebitda", &self.ebitda),
            ("depreciation_amortization", &self.depreciation_amortization),
            ("ebit", &self.ebit),
            ("interest_expense", &self.interest_expense),
            ("tax_expense", &self.tax_expense),
            ("net_income", &self.net_income),
        ]
    }

    pub fn series_mut(&mut self) -> Vec<(&'static str, &mut YearSeries)> {
        vec![
            ("revenue", &mut self.revenue),
            ("cogs", &mut self.cogs),
            ("gross_profit", &mut self.gross_profit),
            ("operating_expenses", &mut self.operating_expenses),
            ("ebitda", &mut self.ebitda),
            (
                "depreciation_amortization",
                &mut self.depreciation_amortization,
            ),
            ("ebit", &mut self.ebit),
            ("interest_expense", &mut self.interest_expense),
            ("tax_expense", &mut self.tax_expense),
            ("net_income", &mut self.net_income),
        ]
    }
}

/// Balance sheet series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceSheet {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub total_assets: YearSeries,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub current_assets: YearSeries,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cash_and_equivalents: YearSeries,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub total_liabilities: YearSeries,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub current_liabilities: YearSeries,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub total_debt: YearSeries,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub total_equity: YearSeries,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub net_working_capital: YearSeries,
}

impl BalanceSheet {
    pub fn series(&self) -> Vec<(&'static str, &YearSeries)> {
        vec![
            ("total_assets", &self.total_assets),
            ("current_assets", &self.current_assets),
            ("cash_and_equivalents", &self.cash_and_equivalents),
            ("total_liabilities", &self.total_liabilities),
            ("current_liabilities", &self.current_liabilities),
            ("total_debt", &self.total_debt),
            ("total_equity", &self.total_equity),
            ("net_working_capital", &self.net_working_capital),
        ]
    }

    pub fn series_mut(&mut self) -> Vec<(&'static str, &mut YearSeries)> {
        vec![
            ("total_assets", &mut self.total_assets),
            ("current_assets", &mut self.current_assets),
            ("cash_and_equivalents", &mut self.cash_and_equivalents),
            ("total_liabilities", &mut self.total_liabilities),
            ("current_liabilities", &mut self.current_liabilities),
            ("total_debt", &mut self.total_debt),
            ("total_equity", &mut self.total_equity),
            ("net_working_capital", &mut self.net_working_capital),
        ]
    }
}

/// Cash flow statement series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CashFlowStatement {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operating_cash_flow: YearSeries,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub capital_expenditures: YearSeries,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub free_cash_flow: YearSeries,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub beginning_cash: YearSeries,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub net_change_in_cash: YearSeries,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ending_cash: YearSeries,
}

impl CashFlowStatement {
    pub fn series(&self) -> Vec<(&'static str, &YearSeries)> {
        vec![
            ("operating_cash_flow", &self.operating_cash_flow),
            ("capital_expenditures", &self.capital_expenditures),
            ("free_cash_flow", &self.free_cash_flow),
            ("beginning_cash", &self.beginning_cash),
            ("net_change_in_cash", &self.net_change_in_cash),
            ("ending_cash", &self.ending_cash),
        ]
    }

    pub fn series_mut(&mut self) -> Vec<(&'static str, &mut YearSeries)> {
        vec![
            ("operating_cash_flow", &mut self.operating_cash_flow),
            ("capital_expenditures", &mut self.capital_expenditures),
            ("free_cash_flow", &mut self.free_cash_flow),
            ("beginning_cash", &mut self.beginning_cash),
            ("net_change_in_cash", &mut self.net_change_in_cash),
            ("ending_cash", &mut self.ending_cash),
        ]
    }
}

/// Point-in-time market snapshot. Not a time series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares_outstanding: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_debt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_debt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pe_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ev_to_ebitda: Option<f64>,
}

impl MarketData {
    /// Monetary scalars subject to scale conversion. Ratios (beta, multiples)
    /// and share counts are unit-less and excluded.
    pub fn monetary_scalars_mut(&mut self) -> Vec<(&'static str, &mut Option<f64>)> {
        vec![
            ("market_cap", &mut self.market_cap),
            ("total_debt", &mut self.total_debt),
            ("cash", &mut self.cash),
            ("net_debt", &mut self.net_debt),
            ("enterprise_value", &mut self.enterprise_value),
        ]
    }
}
