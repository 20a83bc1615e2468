//! Outbound port to the execution backend.

use crate::domain::conditional::TransactionConditional;
use crate::domain::error::ApiError;
use crate::domain::types::Bytes;
use async_trait::async_trait;

/// JSON-RPC method invoked on the backend for accepted conditionals
pub const SEND_RAW_TRANSACTION_CONDITIONAL: &str = "eth_sendRawTransactionConditional";

/// Errors from a backend call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    /// The backend answered with a JSON-RPC error
    #[error("{0}")]
    Rpc(ApiError),

    /// The backend did not answer in time
    #[error("backend request timed out")]
    Timeout,

    /// Connection or protocol failure
    #[error("backend transport error: {0}")]
    Transport(String),
}

impl From<BackendError> for ApiError {
    fn from(e: BackendError) -> Self {
        match e {
            // Backend verdicts reach the caller untouched
            BackendError::Rpc(inner) => inner,
            other => ApiError::internal(other.to_string()),
        }
    }
}

/// Forwards accepted conditionals to the node that will include them.
///
/// Called at most once per admitted request, never retried.
#[async_trait]
pub trait ConditionalBackend: Send + Sync {
    async fn send_raw_transaction_conditional(
        &self,
        tx: &Bytes,
        condition: &TransactionConditional,
    ) -> Result<(), BackendError>;
}
