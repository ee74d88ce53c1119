//! Ticker extraction through the provider fallback chain.

use std::sync::Arc;

use crate::cache::{CacheKey, CacheStore};
use crate::error::ExtractError;
use crate::extract::providers::{
    AlphaVantageProvider, FmpProvider, FundamentalsProvider, ProviderSnapshot, ProviderStatements,
};
use crate::extract::{ExtractFuture, ExtractOptions, Extractor, Source};
use crate::schema::{ExtractionMetadata, FinancialData, Ticker};

const DEFAULT_YEARS: usize = 5;

/// Extracts fundamentals for a ticker by walking the provider chain in
/// priority order. The first provider that returns usable statements wins;
/// a provider failure falls through to the next one, and only when every
/// provider has failed does the extractor report an error naming each
/// attempt.
pub struct ApiExtractor {
    providers: Vec<Arc<dyn FundamentalsProvider>>,
    cache: CacheStore,
}

impl Default for ApiExtractor {
    fn default() -> Self {
        Self {
            providers: vec![
                Arc::new(FmpProvider::default()),
                Arc::new(AlphaVantageProvider::default()),
            ],
            cache: CacheStore::with_default_ttl(),
        }
    }
}

impl ApiExtractor {
    pub fn new(providers: Vec<Arc<dyn FundamentalsProvider>>, cache: CacheStore) -> Self {
        Self { providers, cache }
    }

    /// Status of each provider in chain order, for diagnostics.
    pub fn provider_snapshots(&self) -> Vec<ProviderSnapshot> {
        self.providers.iter().map(|p| p.snapshot()).collect()
    }

    async fn extract_ticker(
        &self,
        ticker: &Ticker,
        options: &ExtractOptions,
    ) -> Result<FinancialData, ExtractError> {
        let years = options.years.unwrap_or(DEFAULT_YEARS);
        let cache_key = CacheKey::new(ticker.clone(), years);

        if options.use_cache {
            if let Some(body) = self.cache.get(&cache_key).await {
                if let Ok(data) = serde_json::from_str::<FinancialData>(&body) {
                    return Ok(data);
                }
                // Unreadable entries are treated as a miss and overwritten.
            }
        }

        let mut failures: Vec<String> = Vec::new();
        for provider in &self.providers {
            match provider.fetch(ticker, years).await {
                Ok(statements) => {
                    let data = into_financial_data(statements, provider.id().as_str())?;
                    if options.use_cache {
                        if let Ok(body) = serde_json::to_string(&data) {
                            self.cache.put(cache_key, body, None).await;
                        }
                    }
                    return Ok(data);
                }
                Err(error) => {
                    failures.push(format!("{}: {}", provider.id(), error.message()));
                }
            }
        }

        Err(ExtractError::unavailable(format!(
            "all providers failed for '{ticker}': {}",
            failures.join("; ")
        )))
    }
}

impl Extractor for ApiExtractor {
    fn id(&self) -> &'static str {
        "api"
    }

    fn can_handle(&self, source: &Source) -> bool {
        matches!(source, Source::Ticker(_))
    }

    fn extract<'a>(&'a self, source: &'a Source, options: &'a ExtractOptions) -> ExtractFuture<'a> {
        Box::pin(async move {
            match source {
                Source::Ticker(ticker) => self.extract_ticker(ticker, options).await,
                Source::Spreadsheet(path) => Err(ExtractError::invalid_source(format!(
                    "api extractor cannot handle spreadsheet '{}'",
                    path.display()
                ))),
            }
        })
    }
}

/// Provider output is already in millions, so the result is marked
/// normalized and scale detection is skipped downstream.
fn into_financial_data(
    statements: ProviderStatements,
    provider_id: &str,
) -> Result<FinancialData, ExtractError> {
    let ProviderStatements {
        company,
        years,
        income,
        mut balance,
        cash_flow,
        market,
        ..
    } = statements;

    let mut metadata = ExtractionMetadata::new(format!("api:{provider_id}"));
    metadata.normalized = true;
    metadata.record_conversion(format!("{provider_id} values reported in millions"));

    // NWC is rarely reported directly; derive it when both operands exist.
    if balance.net_working_capital.is_empty()
        && !balance.current_assets.is_empty()
        && !balance.current_liabilities.is_empty()
    {
        balance.net_working_capital = balance
            .current_assets
            .iter()
            .zip(&balance.current_liabilities)
            .map(|(assets, liabilities)| match (assets, liabilities) {
                (Some(a), Some(l)) => Some(a - l),
                _ => None,
            })
            .collect();
        metadata.record_derived_field("net_working_capital");
    }

    FinancialData::new(company, years, income, balance, cash_flow, market, metadata)
        .map_err(ExtractError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ExtractOptions {
        ExtractOptions::default()
    }

    #[tokio::test]
    async fn mock_chain_returns_normalized_data_from_first_provider() {
        let extractor = ApiExtractor::default();
        let source = Source::parse("AAPL").expect("ok");

        let data = extractor
            .extract(&source, &options())
            .await
            .expect("mock providers always serve data");

        assert_eq!(data.metadata.source, "api:fmp");
        assert!(data.metadata.normalized);
        assert!(data
            .metadata
            .derived_fields_calculated
            .contains(&"net_working_capital".to_owned()));
        assert!(data.income.revenue.iter().all(Option::is_some));
    }

    #[tokio::test]
    async fn cache_hit_short_circuits_providers() {
        let extractor = ApiExtractor::default();
        let source = Source::parse("MSFT").expect("ok");

        let first = extractor
            .extract(&source, &options())
            .await
            .expect("first call fetches");
        assert_eq!(extractor.cache.len().await, 1);

        let second = extractor
            .extract(&source, &options())
            .await
            .expect("second call reads the cache");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn cache_bypass_does_not_store() {
        let extractor = ApiExtractor::default();
        let source = Source::parse("MSFT").expect("ok");
        let bypass = ExtractOptions {
            use_cache: false,
            ..ExtractOptions::default()
        };

        extractor
            .extract(&source, &bypass)
            .await
            .expect("fetch succeeds");
        assert_eq!(extractor.cache.len().await, 0);
    }

    #[tokio::test]
    async fn spreadsheet_source_is_rejected() {
        let extractor = ApiExtractor::default();
        let source = Source::parse("model.xlsx").expect("ok");

        assert!(!extractor.can_handle(&source));
        let err = extractor
            .extract(&source, &options())
            .await
            .expect_err("must fail");
        assert!(err.message().contains("model.xlsx"));
    }
}
