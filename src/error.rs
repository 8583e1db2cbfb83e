use thiserror::Error;

use serde::{Deserialize, Serialize};

/// Stable numeric error codes, kept for wire compatibility with clients
/// that branch on `errorCode`.
pub const CODE_PQL_PARSING: i32 = 150;
pub const CODE_QUERY_VALIDATION: i32 = 300;
pub const CODE_BROKER_GATHER: i32 = 425;
pub const CODE_REQUEST_DESERIALIZATION: i32 = 500;
pub const CODE_MERGE_RESPONSE: i32 = 700;
pub const CODE_INTERNAL: i32 = -100;

/// Error taxonomy for the broker core. Variants that correspond to a
/// subset of shards are never propagated with `?` out of the pipeline;
/// they are converted to a [`ProcessingException`] and collected onto the
/// response instead. Only `PqlParsing` and `QueryValidation` are allowed
/// to short-circuit a whole query.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("failed to compile query: {0}")]
    PqlParsing(String),

    #[error("query validation failed: {0}")]
    QueryValidation(String),

    #[error("gather error for server {server}: {reason}")]
    BrokerGather { server: String, reason: String },

    #[error("failed to deserialize response from server {server}: {reason}")]
    RequestDeserialization { server: String, reason: String },

    #[error("schema mismatch, dropped servers: {dropped_servers:?}")]
    MergeResponse { dropped_servers: Vec<String> },

    #[error("internal error: {0}")]
    Internal(String),
}

impl BrokerError {
    pub fn code(&self) -> i32 {
        match self {
            BrokerError::PqlParsing(_) => CODE_PQL_PARSING,
            BrokerError::QueryValidation(_) => CODE_QUERY_VALIDATION,
            BrokerError::BrokerGather { .. } => CODE_BROKER_GATHER,
            BrokerError::RequestDeserialization { .. } => CODE_REQUEST_DESERIALIZATION,
            BrokerError::MergeResponse { .. } => CODE_MERGE_RESPONSE,
            BrokerError::Internal(_) => CODE_INTERNAL,
        }
    }

    pub fn into_exception(self) -> ProcessingException {
        let error_code = self.code();
        ProcessingException {
            error_code,
            message: self.to_string(),
        }
    }
}

/// A single exception attached to a [`crate::model::BrokerResponse`].
/// Shard-scoped failures accumulate here rather than failing the whole
/// query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessingException {
    #[serde(rename = "errorCode")]
    pub error_code: i32,
    pub message: String,
}

pub type BrokerResult<T> = Result<T, BrokerError>;
