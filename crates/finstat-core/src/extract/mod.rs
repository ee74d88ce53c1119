//! Source extractors and the first-match-wins registry.

mod api;
mod grid;
mod providers;
mod spreadsheet;

pub use api::ApiExtractor;
pub use grid::{load_workbook, Cell, Sheet};
pub use providers::{
    AlphaVantageProvider, FetchFuture, FmpProvider, FundamentalsProvider, ProviderId,
    ProviderSnapshot, ProviderStatements,
};
pub use spreadsheet::SpreadsheetExtractor;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use crate::error::ExtractError;
use crate::schema::{FinancialData, Ticker};

/// File extensions the spreadsheet extractor accepts.
pub const SPREADSHEET_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "csv"];

/// An input the pipeline can extract from: a spreadsheet on disk or a
/// ticker to fetch from the provider chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Spreadsheet(PathBuf),
    Ticker(Ticker),
}

impl Source {
    /// Classify a raw source string. Spreadsheet extensions win over ticker
    /// shape, so a file named `AAPL.csv` routes to the spreadsheet extractor.
    pub fn parse(input: &str) -> Result<Self, ExtractError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ExtractError::invalid_source("source cannot be empty"));
        }

        if has_spreadsheet_extension(Path::new(trimmed)) {
            return Ok(Self::Spreadsheet(PathBuf::from(trimmed)));
        }

        // Users type tickers in either case; uppercase before the strict
        // shape check.
        let symbol = trimmed.to_ascii_uppercase();
        if let Ok(ticker) = Ticker::parse(&symbol) {
            return Ok(Self::Ticker(ticker));
        }

        Err(ExtractError::invalid_source(format!(
            "'{trimmed}' is neither a spreadsheet path nor a ticker (1-5 uppercase letters)"
        )))
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Spreadsheet(path) => path.display().to_string(),
            Self::Ticker(ticker) => ticker.to_string(),
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Spreadsheet(_) => "spreadsheet",
            Self::Ticker(_) => "ticker",
        }
    }
}

fn has_spreadsheet_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let lowered = ext.to_ascii_lowercase();
            SPREADSHEET_EXTENSIONS.contains(&lowered.as_str())
        })
        .unwrap_or(false)
}

/// Extraction knobs recognized by every extractor.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Limit historical depth to the most recent N fiscal years.
    pub years: Option<usize>,
    /// Per-call cache bypass for API extraction.
    pub use_cache: bool,
    /// Free-text hint passed through to normalization (e.g. "in thousands").
    pub context: Option<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            years: None,
            use_cache: true,
            context: None,
        }
    }
}

pub type ExtractFuture<'a> =
    Pin<Box<dyn Future<Output = Result<FinancialData, ExtractError>> + Send + 'a>>;

/// Source extractor contract.
///
/// `can_handle` is a pure predicate: no I/O beyond string and extension
/// inspection, and it must not fail. `extract` does the real work.
pub trait Extractor: Send + Sync {
    fn id(&self) -> &'static str;
    fn can_handle(&self, source: &Source) -> bool;
    fn extract<'a>(&'a self, source: &'a Source, options: &'a ExtractOptions) -> ExtractFuture<'a>;
}

/// Ordered extractor registry. Registration order is priority order; the
/// first extractor whose `can_handle` accepts the source wins.
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn Extractor>>,
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new(vec![
            Arc::new(SpreadsheetExtractor::default()),
            Arc::new(ApiExtractor::default()),
        ])
    }
}

impl ExtractorRegistry {
    pub fn new(extractors: Vec<Arc<dyn Extractor>>) -> Self {
        Self { extractors }
    }

    pub fn select(&self, source: &Source) -> Option<Arc<dyn Extractor>> {
        self.extractors
            .iter()
            .find(|extractor| extractor.can_handle(source))
            .cloned()
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.id()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spreadsheet_extension_beats_ticker_shape() {
        let source = Source::parse("AAPL.csv").expect("must parse");
        assert!(matches!(source, Source::Spreadsheet(_)));
    }

    #[test]
    fn lowercase_ticker_input_is_uppercased_at_the_boundary() {
        let source = Source::parse("msft").expect("must parse");
        assert_eq!(source, Source::Ticker(Ticker::parse("MSFT").expect("ok")));
        // The newtype itself stays strict.
        assert!(Ticker::parse("msft").is_err());
    }

    #[test]
    fn unrecognized_source_is_rejected() {
        let err = Source::parse("not a source!").expect_err("must fail");
        assert!(err.message().contains("not a source!"));
    }

    #[test]
    fn registry_routes_by_first_match() {
        let registry = ExtractorRegistry::default();

        let sheet = Source::parse("model.xlsx").expect("ok");
        assert_eq!(registry.select(&sheet).expect("found").id(), "spreadsheet");

        let ticker = Source::parse("AAPL").expect("ok");
        assert_eq!(registry.select(&ticker).expect("found").id(), "api");
    }
}
