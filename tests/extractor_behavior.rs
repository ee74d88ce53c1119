//! Behavior-driven tests for source routing and the provider fallback chain.

use std::future::Future;
use std::pin::Pin;

use finstat_tests::{
    write_income_csv, ApiExtractor, Arc, CacheStore, ExtractError, ExtractOptions, Extractor,
    ExtractorRegistry, FinancialData, FundamentalsProvider, ProviderId, ProviderStatements,
    Source, SpreadsheetExtractor, Ticker,
};

// =============================================================================
// Source classification
// =============================================================================

#[test]
fn when_a_path_has_a_spreadsheet_extension_it_routes_to_the_spreadsheet_extractor() {
    let registry = ExtractorRegistry::default();

    // A file named like a ticker is still a file.
    let source = Source::parse("AAPL.csv").expect("parses");
    assert!(matches!(source, Source::Spreadsheet(_)));
    assert_eq!(registry.select(&source).expect("selected").id(), "spreadsheet");

    let source = Source::parse("reports/fy2023 model.xlsx").expect("parses");
    assert_eq!(registry.select(&source).expect("selected").id(), "spreadsheet");
}

#[test]
fn when_input_looks_like_a_ticker_it_routes_to_the_api_extractor() {
    let registry = ExtractorRegistry::default();

    let source = Source::parse("msft").expect("parses");
    assert_eq!(source, Source::Ticker(Ticker::parse("MSFT").expect("ok")));
    assert_eq!(registry.select(&source).expect("selected").id(), "api");
}

#[test]
fn when_input_is_neither_path_nor_ticker_parsing_fails() {
    let err = Source::parse("TOOLONGTICKER").expect_err("must fail");
    assert!(!err.retryable());

    let err = Source::parse("").expect_err("must fail");
    assert!(err.message().contains("empty"));
}

// =============================================================================
// Spreadsheet extraction
// =============================================================================

#[tokio::test]
async fn when_a_csv_has_fuzzy_labels_the_extractor_maps_them_to_canonical_fields() {
    // Given: labels that are synonyms, not exact field names.
    let file = write_income_csv(&[
        ",FY2021,FY2022",
        "Net Sales,100,110",
        "Cost of Revenue,60,66",
        "Operating Cash Flow,20,22",
    ]);
    let extractor = SpreadsheetExtractor::default();
    let source = Source::Spreadsheet(file.path().to_owned());

    // When: extraction runs.
    let data = extractor
        .extract(&source, &ExtractOptions::default())
        .await
        .expect("extraction succeeds");

    // Then: synonyms landed in the canonical schema fields.
    assert_eq!(data.years, vec![2021, 2022]);
    assert_eq!(data.income.revenue, vec![Some(100.0), Some(110.0)]);
    assert_eq!(data.income.cogs, vec![Some(60.0), Some(66.0)]);
    assert_eq!(
        data.cash_flow.operating_cash_flow,
        vec![Some(20.0), Some(22.0)]
    );
    // Extraction alone does not normalize.
    assert!(!data.metadata.normalized);
}

#[tokio::test]
async fn when_years_run_most_recent_first_the_data_comes_back_ascending() {
    // Given: the header order published statements actually use.
    let file = write_income_csv(&[
        ",2023,2022,2021",
        "Revenue,121,110,100",
        "Net Income,12,11,10",
    ]);
    let extractor = SpreadsheetExtractor::default();
    let source = Source::Spreadsheet(file.path().to_owned());

    // When: extraction runs.
    let data = extractor
        .extract(&source, &ExtractOptions::default())
        .await
        .expect("extraction succeeds");

    // Then: years and values are reordered oldest-first together.
    assert_eq!(data.years, vec![2021, 2022, 2023]);
    assert_eq!(
        data.income.revenue,
        vec![Some(100.0), Some(110.0), Some(121.0)]
    );
    assert_eq!(
        data.income.net_income,
        vec![Some(10.0), Some(11.0), Some(12.0)]
    );
}

#[tokio::test]
async fn when_no_sheet_has_a_year_layout_extraction_reports_unavailable() {
    let file = write_income_csv(&["Revenue,abc,def", "Cash,ghi,jkl"]);
    let extractor = SpreadsheetExtractor::default();
    let source = Source::Spreadsheet(file.path().to_owned());

    let err = extractor
        .extract(&source, &ExtractOptions::default())
        .await
        .expect_err("must fail");
    assert!(err.message().contains("year"));
}

// =============================================================================
// Provider fallback chain
// =============================================================================

struct FailingProvider {
    id: ProviderId,
    message: &'static str,
}

impl FundamentalsProvider for FailingProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn snapshot(&self) -> finstat_core::ProviderSnapshot {
        finstat_core::ProviderSnapshot {
            id: self.id,
            mock_mode: true,
            has_api_key: false,
        }
    }

    fn fetch<'a>(
        &'a self,
        _ticker: &'a Ticker,
        _years: usize,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderStatements, ExtractError>> + Send + 'a>> {
        Box::pin(async move { Err(ExtractError::unavailable(self.message)) })
    }
}

/// Wraps the mock-mode FMP provider so tests can chain a working provider
/// behind failing ones.
struct WorkingProvider {
    inner: finstat_core::FmpProvider,
}

impl WorkingProvider {
    fn new() -> Self {
        Self {
            inner: finstat_core::FmpProvider::default(),
        }
    }
}

impl FundamentalsProvider for WorkingProvider {
    fn id(&self) -> ProviderId {
        ProviderId::AlphaVantage
    }

    fn snapshot(&self) -> finstat_core::ProviderSnapshot {
        finstat_core::ProviderSnapshot {
            id: self.id(),
            mock_mode: true,
            has_api_key: false,
        }
    }

    fn fetch<'a>(
        &'a self,
        ticker: &'a Ticker,
        years: usize,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderStatements, ExtractError>> + Send + 'a>> {
        self.inner.fetch(ticker, years)
    }
}

#[tokio::test]
async fn when_the_first_provider_fails_the_next_one_is_tried() {
    // Given: a chain where the primary provider is down.
    let extractor = ApiExtractor::new(
        vec![
            Arc::new(FailingProvider {
                id: ProviderId::Fmp,
                message: "connection refused",
            }),
            Arc::new(WorkingProvider::new()),
        ],
        CacheStore::disabled(),
    );
    let source = Source::parse("AAPL").expect("ok");

    // When: extraction runs.
    let data: FinancialData = extractor
        .extract(&source, &ExtractOptions::default())
        .await
        .expect("fallback provider serves data");

    // Then: the report is attributed to the fallback provider.
    assert_eq!(data.metadata.source, "api:alphavantage");
}

#[tokio::test]
async fn when_every_provider_fails_the_error_names_each_attempt() {
    let extractor = ApiExtractor::new(
        vec![
            Arc::new(FailingProvider {
                id: ProviderId::Fmp,
                message: "http 503 from upstream",
            }),
            Arc::new(FailingProvider {
                id: ProviderId::AlphaVantage,
                message: "free-tier quota exhausted",
            }),
        ],
        CacheStore::disabled(),
    );
    let source = Source::parse("AAPL").expect("ok");

    let err = extractor
        .extract(&source, &ExtractOptions::default())
        .await
        .expect_err("no provider can serve");

    // Every provider and its reason appears in the aggregated message.
    assert!(err.message().contains("AAPL"));
    assert!(err.message().contains("fmp: http 503 from upstream"));
    assert!(err.message().contains("alphavantage: free-tier quota exhausted"));
}

#[tokio::test]
async fn when_a_result_is_cached_later_provider_failures_are_invisible() {
    // Given: a shared cache warmed by a working chain.
    let cache = CacheStore::with_default_ttl();
    let warm = ApiExtractor::new(vec![Arc::new(WorkingProvider::new())], cache.clone());
    let source = Source::parse("MSFT").expect("ok");
    let options = ExtractOptions::default();

    let first = warm
        .extract(&source, &options)
        .await
        .expect("warms the cache");

    // When: the chain is now completely broken but shares the cache.
    let broken = ApiExtractor::new(
        vec![Arc::new(FailingProvider {
            id: ProviderId::AlphaVantage,
            message: "down",
        })],
        cache,
    );
    let second = broken
        .extract(&source, &options)
        .await
        .expect("cache hit short-circuits the chain");

    // Then: the cached report is served unchanged.
    assert_eq!(first, second);
}

#[tokio::test]
async fn when_the_cache_is_bypassed_the_chain_is_consulted_again() {
    let cache = CacheStore::with_default_ttl();
    let warm = ApiExtractor::new(vec![Arc::new(WorkingProvider::new())], cache.clone());
    let source = Source::parse("MSFT").expect("ok");

    warm.extract(&source, &ExtractOptions::default())
        .await
        .expect("warms the cache");

    let broken = ApiExtractor::new(
        vec![Arc::new(FailingProvider {
            id: ProviderId::AlphaVantage,
            message: "down",
        })],
        cache,
    );
    let bypass = ExtractOptions {
        use_cache: false,
        ..ExtractOptions::default()
    };

    broken
        .extract(&source, &bypass)
        .await
        .expect_err("bypass must hit the broken chain");
}
