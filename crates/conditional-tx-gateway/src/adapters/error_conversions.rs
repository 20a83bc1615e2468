//! Error conversions from infrastructure types.
//!
//! These conversions involve client library types and belong in the adapters layer.

use crate::domain::ApiError;
use crate::ports::BackendError;
use jsonrpsee::core::client::Error as ClientError;

impl From<ClientError> for BackendError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Call(obj) => {
                let data = obj
                    .data()
                    .and_then(|raw| serde_json::from_str(raw.get()).ok());
                BackendError::Rpc(ApiError {
                    code: obj.code(),
                    message: obj.message().to_string(),
                    data,
                })
            }
            ClientError::RequestTimeout => BackendError::Timeout,
            other => BackendError::Transport(other.to_string()),
        }
    }
}
