//! Domain error types.

use chrono::NaiveDate;
use std::fmt;

/// Why the Date Validator rejected a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRejection {
    Today,
    Weekend,
    Future,
}

impl fmt::Display for DateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            DateRejection::Today => "today not allowed",
            DateRejection::Weekend => "weekend not allowed",
            DateRejection::Future => "future date not allowed",
        };
        f.write_str(msg)
    }
}

/// Top-level error type for carteira.
#[derive(Debug, thiserror::Error)]
pub enum CarteiraError {
    #[error("invalid date {date}: {reason}")]
    InvalidDate {
        date: NaiveDate,
        reason: DateRejection,
    },

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("no usable rows after {stage}")]
    EmptyResult { stage: String },

    #[error("no data available for {what}")]
    NoData { what: String },

    #[error("provider request to {endpoint} failed: {reason}")]
    Provider { endpoint: String, reason: String },

    #[error("provider request to {endpoint} returned status {status}")]
    ProviderStatus { endpoint: String, status: u16 },

    #[error("no portfolio selection has been generated yet")]
    NoSelection,

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("malformed data: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CarteiraError {
    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        CarteiraError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn empty_result(stage: &str) -> Self {
        CarteiraError::EmptyResult {
            stage: stage.to_string(),
        }
    }

    /// True for failures of the remote collaborator itself, as opposed to
    /// a successful answer that carried no rows.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            CarteiraError::Provider { .. } | CarteiraError::ProviderStatus { .. }
        )
    }
}

impl From<&CarteiraError> for std::process::ExitCode {
    fn from(err: &CarteiraError) -> Self {
        let code: u8 = match err {
            CarteiraError::Io(_) => 1,
            CarteiraError::ConfigParse { .. }
            | CarteiraError::ConfigMissing { .. }
            | CarteiraError::ConfigInvalid { .. } => 2,
            CarteiraError::Provider { .. } | CarteiraError::ProviderStatus { .. } => 3,
            CarteiraError::InvalidDate { .. }
            | CarteiraError::InvalidDateRange { .. }
            | CarteiraError::InvalidParameter { .. } => 4,
            CarteiraError::EmptyResult { .. }
            | CarteiraError::NoData { .. }
            | CarteiraError::Data { .. } => 5,
            CarteiraError::NoSelection => 6,
        };
        std::process::ExitCode::from(code)
    }
}
