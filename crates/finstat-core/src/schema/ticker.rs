use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::SchemaError;

const MAX_TICKER_LEN: usize = 5;

/// Normalized exchange ticker: 1-5 uppercase ASCII letters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Parse a ticker. The shape is strict: lowercase input is rejected,
    /// case normalization belongs to the input boundary (`Source::parse`).
    pub fn parse(input: &str) -> Result<Self, SchemaError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SchemaError::EmptyTicker);
        }

        if trimmed.len() > MAX_TICKER_LEN || !trimmed.chars().all(|ch| ch.is_ascii_uppercase()) {
            return Err(SchemaError::InvalidTicker {
                value: trimmed.to_owned(),
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Ticker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Ticker {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Ticker {
    type Error = SchemaError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Ticker> for String {
    fn from(value: Ticker) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trimmed_uppercase_ticker() {
        let parsed = Ticker::parse(" MSFT ").expect("ticker should parse");
        assert_eq!(parsed.as_str(), "MSFT");
    }

    #[test]
    fn rejects_lowercase_input() {
        let err = Ticker::parse("msft").expect_err("must fail");
        assert!(matches!(err, SchemaError::InvalidTicker { .. }));
    }

    #[test]
    fn rejects_digits_and_punctuation() {
        assert!(Ticker::parse("BRK.B").is_err());
        assert!(Ticker::parse("1AAPL").is_err());
    }

    #[test]
    fn rejects_overlong_ticker() {
        let err = Ticker::parse("TOOLONG").expect_err("must fail");
        assert!(matches!(err, SchemaError::InvalidTicker { .. }));
    }
}
