use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Extract(#[from] finstat_core::ExtractError),

    #[error("command error: {0}")]
    Command(String),

    #[error("validation failed: {issue_count} issue(s), worst severity {worst}")]
    DataInvalid { issue_count: usize, worst: String },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Extract(_) => 2,
            Self::DataInvalid { .. } => 5,
            Self::Command(_) | Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}
