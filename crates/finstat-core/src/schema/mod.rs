//! Canonical data shapes shared by every pipeline stage.

mod company;
mod financial_data;
mod metadata;
mod statements;
mod ticker;

pub use company::CompanyInfo;
pub use financial_data::FinancialData;
pub use metadata::{ExtractionMetadata, UtcDateTime};
pub use statements::{
    series_present, BalanceSheet, CashFlowStatement, IncomeStatement, MarketData, YearSeries,
};
pub use ticker::Ticker;
