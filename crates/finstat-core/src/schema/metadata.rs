use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Moment a record was produced. Always UTC, serialized as an RFC3339
/// string. Records only need "now" and serde; there is no public parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtcDateTime(#[serde(with = "time::serde::rfc3339")] OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }
}

/// Provenance and quality record attached to every `FinancialData`.
///
/// Every pipeline stage appends to this record: the extractor sets the
/// source and timestamp, the normalizer records conversions and derived
/// fields, the validator appends warnings and quality flags. It is never
/// reset once populated except by explicit re-extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    /// Extractor-specific source identifier, e.g. `spreadsheet` or `api:fmp`.
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    pub extracted_at: UtcDateTime,
    /// Weighted fraction of expected fields present, in [0, 1].
    pub completeness: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quality_flags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unit_conversions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived_fields_calculated: Vec<String>,
    /// Set once values are expressed in the canonical unit (millions).
    /// Normalization checks this flag and becomes a no-op when it is set.
    #[serde(default)]
    pub normalized: bool,
}

impl ExtractionMetadata {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            source_path: None,
            extracted_at: UtcDateTime::now(),
            completeness: 0.0,
            warnings: Vec::new(),
            quality_flags: Vec::new(),
            unit_conversions: Vec::new(),
            derived_fields_calculated: Vec::new(),
            normalized: false,
        }
    }

    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn push_quality_flag(&mut self, flag: impl Into<String>) {
        let flag = flag.into();
        if !self.quality_flags.contains(&flag) {
            self.quality_flags.push(flag);
        }
    }

    pub fn record_conversion(&mut self, conversion: impl Into<String>) {
        self.unit_conversions.push(conversion.into());
    }

    pub fn record_derived_field(&mut self, field: impl Into<String>) {
        let field = field.into();
        if !self.derived_fields_calculated.contains(&field) {
            self.derived_fields_calculated.push(field);
        }
    }
}
