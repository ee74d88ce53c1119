use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Hard schema invariant violations.
///
/// These always propagate: a caller must never receive a `FinancialData`
/// that was constructed with mismatched series lengths or without revenue.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    #[error("company name cannot be empty")]
    EmptyCompanyName,
    #[error("ticker cannot be empty")]
    EmptyTicker,
    #[error("ticker must be 1-5 uppercase ASCII letters: '{value}'")]
    InvalidTicker { value: String },
    #[error("at least one fiscal year is required")]
    NoYears,
    #[error("fiscal years must be strictly ascending: {prev} then {next}")]
    YearsNotAscending { prev: i32, next: i32 },
    #[error("series '{field}' has {len} entries, expected {expected}")]
    SeriesLengthMismatch {
        field: &'static str,
        len: usize,
        expected: usize,
    },
    #[error("revenue must be present for every fiscal year")]
    RevenueMissing,
}

/// Extraction-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractErrorKind {
    /// The source could not be reached or parsed at all.
    Unavailable,
    /// A provider refused the request for rate/quota reasons.
    RateLimited,
    /// The input is not a source shape any extractor understands.
    InvalidSource,
    /// Extracted data violated a hard schema invariant.
    Schema,
    Internal,
}

/// Structured extraction error carried through the fallback chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractError {
    kind: ExtractErrorKind,
    message: String,
    retryable: bool,
}

impl ExtractError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: ExtractErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: ExtractErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_source(message: impl Into<String>) -> Self {
        Self {
            kind: ExtractErrorKind::InvalidSource,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: ExtractErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> ExtractErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            ExtractErrorKind::Unavailable => "extract.unavailable",
            ExtractErrorKind::RateLimited => "extract.rate_limited",
            ExtractErrorKind::InvalidSource => "extract.invalid_source",
            ExtractErrorKind::Schema => "extract.schema",
            ExtractErrorKind::Internal => "extract.internal",
        }
    }
}

impl Display for ExtractError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for ExtractError {}

impl From<SchemaError> for ExtractError {
    fn from(error: SchemaError) -> Self {
        Self {
            kind: ExtractErrorKind::Schema,
            message: error.to_string(),
            retryable: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_errors_map_to_non_retryable_extract_errors() {
        let error: ExtractError = SchemaError::RevenueMissing.into();
        assert_eq!(error.kind(), ExtractErrorKind::Schema);
        assert!(!error.retryable());
        assert_eq!(error.code(), "extract.schema");
    }

    #[test]
    fn rate_limited_errors_are_retryable() {
        let error = ExtractError::rate_limited("quota exceeded");
        assert!(error.retryable());
        assert_eq!(error.to_string(), "quota exceeded (extract.rate_limited)");
    }
}
