//! JSON-RPC client for the execution backend.

use crate::domain::conditional::TransactionConditional;
use crate::domain::error::GatewayError;
use crate::domain::types::Bytes;
use crate::ports::{BackendError, ConditionalBackend, SEND_RAW_TRANSACTION_CONDITIONAL};
use async_trait::async_trait;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use std::time::Duration;
use tracing::debug;

/// Backend reached over HTTP JSON-RPC
pub struct RpcBackend {
    client: HttpClient,
    url: String,
}

impl RpcBackend {
    /// Build a client for `url`. No request is sent until the first call.
    pub fn connect(url: &str, request_timeout: Duration) -> Result<Self, GatewayError> {
        let client = HttpClientBuilder::default()
            .request_timeout(request_timeout)
            .build(url)
            .map_err(|e| GatewayError::Backend {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ConditionalBackend for RpcBackend {
    async fn send_raw_transaction_conditional(
        &self,
        tx: &Bytes,
        condition: &TransactionConditional,
    ) -> Result<(), BackendError> {
        let mut params = ArrayParams::new();
        params
            .insert(tx)
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        params
            .insert(condition)
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        // The result is not consumed, only success or failure
        let _: serde_json::Value = self
            .client
            .request(SEND_RAW_TRANSACTION_CONDITIONAL, params)
            .await?;

        debug!(url = %self.url, "Backend accepted conditional transaction");
        Ok(())
    }
}

impl std::fmt::Debug for RpcBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcBackend").field("url", &self.url).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        assert!(matches!(
            RpcBackend::connect("not a url", Duration::from_secs(1)),
            Err(GatewayError::Backend { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_is_lazy() {
        let backend = RpcBackend::connect("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.url(), "http://127.0.0.1:1");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let backend =
            RpcBackend::connect("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        let result = backend
            .send_raw_transaction_conditional(
                &Bytes::from(vec![0xc0]),
                &TransactionConditional::default(),
            )
            .await;
        assert!(matches!(
            result,
            Err(BackendError::Transport(_)) | Err(BackendError::Timeout)
        ));
    }
}
