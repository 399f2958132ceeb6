use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reasons reported by a datasource endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    AccessDenied,
    UserNotAuthenticated,
    InvalidQuery,
    InvalidRequest,
    NotSupported,
    Timeout,
    InternalError,
    #[default]
    #[serde(other)]
    Other,
}

/// One entry of a datasource error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasourceError {
    #[serde(default)]
    pub reason: ErrorReason,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub detailed_message: String,
}

impl DatasourceError {
    pub fn new(
        reason: ErrorReason,
        message: impl Into<String>,
        detailed_message: impl Into<String>,
    ) -> Self {
        Self {
            reason,
            message: message.into(),
            detailed_message: detailed_message.into(),
        }
    }
}

/// A failed query as surfaced to the table: a short message plus detail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}: {detail}")]
pub struct QueryError {
    pub message: String,
    pub detail: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: detail.into(),
        }
    }
}

impl From<DatasourceError> for QueryError {
    fn from(value: DatasourceError) -> Self {
        let message = if value.message.is_empty() {
            format!("{:?}", value.reason)
        } else {
            value.message
        };
        Self {
            message,
            detail: value.detailed_message,
        }
    }
}
