//! Backend decorator that records RPC client metrics around every call.

use crate::domain::conditional::TransactionConditional;
use crate::domain::types::Bytes;
use crate::middleware::metrics::BackendMetrics;
use crate::ports::{BackendError, ConditionalBackend, SEND_RAW_TRANSACTION_CONDITIONAL};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Wraps any backend with request, response and latency metrics.
pub struct InstrumentedBackend {
    inner: Arc<dyn ConditionalBackend>,
    metrics: BackendMetrics,
}

impl InstrumentedBackend {
    pub fn new(inner: Arc<dyn ConditionalBackend>, metrics: BackendMetrics) -> Self {
        Self { inner, metrics }
    }
}

/// Bounded `error` label: the JSON-RPC code, or the failure kind.
fn error_label(result: &Result<(), BackendError>) -> String {
    match result {
        Ok(()) => "none".to_string(),
        Err(BackendError::Rpc(e)) => e.code.to_string(),
        Err(BackendError::Timeout) => "timeout".to_string(),
        Err(BackendError::Transport(_)) => "transport".to_string(),
    }
}

#[async_trait]
impl ConditionalBackend for InstrumentedBackend {
    async fn send_raw_transaction_conditional(
        &self,
        tx: &Bytes,
        condition: &TransactionConditional,
    ) -> Result<(), BackendError> {
        self.metrics.record_request(SEND_RAW_TRANSACTION_CONDITIONAL);
        let start = Instant::now();

        let result = self.inner.send_raw_transaction_conditional(tx, condition).await;

        self.metrics.record_response(
            SEND_RAW_TRANSACTION_CONDITIONAL,
            &error_label(&result),
            start.elapsed(),
        );
        result
    }
}

impl std::fmt::Debug for InstrumentedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentedBackend").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ApiError;
    use crate::middleware::ConditionalMetrics;

    struct FixedBackend(Result<(), BackendError>);

    #[async_trait]
    impl ConditionalBackend for FixedBackend {
        async fn send_raw_transaction_conditional(
            &self,
            _tx: &Bytes,
            _condition: &TransactionConditional,
        ) -> Result<(), BackendError> {
            self.0.clone()
        }
    }

    async fn call(metrics: &ConditionalMetrics, outcome: Result<(), BackendError>) {
        let backend = InstrumentedBackend::new(
            Arc::new(FixedBackend(outcome.clone())),
            metrics.backend().clone(),
        );
        let result = backend
            .send_raw_transaction_conditional(&Bytes::default(), &TransactionConditional::default())
            .await;
        assert_eq!(result, outcome);
    }

    #[tokio::test]
    async fn test_success_recorded() {
        let metrics = ConditionalMetrics::new().unwrap();
        call(&metrics, Ok(())).await;

        let backend = metrics.backend();
        assert_eq!(backend.requests(SEND_RAW_TRANSACTION_CONDITIONAL), 1);
        assert_eq!(backend.responses(SEND_RAW_TRANSACTION_CONDITIONAL, "none"), 1);
        assert_eq!(backend.duration_count(SEND_RAW_TRANSACTION_CONDITIONAL), 1);
    }

    #[tokio::test]
    async fn test_errors_labelled_by_kind() {
        let metrics = ConditionalMetrics::new().unwrap();
        call(&metrics, Err(BackendError::Rpc(ApiError::new(-32000, "nonce too low")))).await;
        call(&metrics, Err(BackendError::Timeout)).await;
        call(&metrics, Err(BackendError::Transport("connection refused".into()))).await;

        let backend = metrics.backend();
        assert_eq!(backend.requests(SEND_RAW_TRANSACTION_CONDITIONAL), 3);
        assert_eq!(backend.responses(SEND_RAW_TRANSACTION_CONDITIONAL, "-32000"), 1);
        assert_eq!(backend.responses(SEND_RAW_TRANSACTION_CONDITIONAL, "timeout"), 1);
        assert_eq!(backend.responses(SEND_RAW_TRANSACTION_CONDITIONAL, "transport"), 1);
        assert_eq!(backend.responses(SEND_RAW_TRANSACTION_CONDITIONAL, "none"), 0);
        assert_eq!(backend.duration_count(SEND_RAW_TRANSACTION_CONDITIONAL), 3);
    }
}
