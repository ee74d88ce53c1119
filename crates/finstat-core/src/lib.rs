//! Core pipeline for finstat.
//!
//! This crate contains:
//! - Canonical financial statement schema and validation
//! - Spreadsheet and web-API extractors with a routing registry
//! - Scale normalization and derived-field computation
//! - Data quality validation with an outlier detection ensemble
//! - The extract/transform/validate orchestrator

pub mod cache;
pub mod error;
pub mod extract;
pub mod fuzzy;
pub mod http_client;
pub mod normalize;
pub mod pipeline;
pub mod scale;
pub mod schema;
pub mod throttling;
pub mod validate;

pub use cache::{CacheKey, CacheStore};
pub use error::{ExtractError, ExtractErrorKind, SchemaError};
pub use extract::{
    AlphaVantageProvider, ApiExtractor, ExtractOptions, Extractor, ExtractorRegistry, FmpProvider,
    FundamentalsProvider, ProviderId, ProviderSnapshot, ProviderStatements, Source,
    SpreadsheetExtractor,
};
pub use fuzzy::LabelMatcher;
pub use http_client::{
    HttpClient, HttpError, HttpRequest, HttpResponse, NoopHttpClient, ReqwestHttpClient,
};
pub use normalize::{ScaleNormalizer, Transformer};
pub use pipeline::{
    BatchReport, Pipeline, PipelineMeta, PipelineOptions, PipelinePerformance, PipelineReport,
    PipelineStats, StageTiming, PIPELINE_VERSION,
};
pub use scale::{detect_scale, Scale, ScaleDetection};
pub use schema::{
    BalanceSheet, CashFlowStatement, CompanyInfo, ExtractionMetadata, FinancialData,
    IncomeStatement, MarketData, Ticker, UtcDateTime, YearSeries,
};
pub use throttling::{BackoffPolicy, ProviderPolicy, ThrottlingQueue};
pub use validate::{
    IssueCategory, OutlierDetector, OutlierEnsemble, QualityValidator, Severity, ValidationIssue,
    ValidationResult, Validator,
};
