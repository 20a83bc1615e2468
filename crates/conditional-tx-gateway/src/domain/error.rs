//! Gateway error types with JSON-RPC 2.0 error codes.
//!
//! Conditional rejections reuse the conditional-transaction error taxonomy:
//! everything the caller can retry or fix is `-32003`, except the static cost
//! bound which gets its own `-32005` so clients can tell "try a cheaper
//! condition" apart from "try later".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Standard JSON-RPC 2.0 error codes
pub mod codes {
    // JSON-RPC 2.0 standard errors (-32700 to -32600)
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    // Server errors (-32000 to -32099)
    pub const SERVER_ERROR: i32 = -32000;

    /// Conditional transaction rejected (disabled, auth, target, validation, rate limit)
    pub const CONDITIONAL_REJECTED: i32 = -32003;
    /// Conditional cost exceeded the protocol maximum
    pub const CONDITIONAL_COST_EXCEEDED_MAX: i32 = -32005;
}

/// JSON-RPC error object as it appears on the wire
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    /// JSON-RPC error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Optional additional data
    pub data: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create error with additional data
    pub fn with_data(code: i32, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Parse error - invalid JSON
    pub fn parse_error(details: impl Into<String>) -> Self {
        Self::new(
            codes::PARSE_ERROR,
            format!("Parse error: {}", details.into()),
        )
    }

    /// Invalid request - not a valid JSON-RPC request
    pub fn invalid_request(details: impl Into<String>) -> Self {
        Self::new(
            codes::INVALID_REQUEST,
            format!("Invalid request: {}", details.into()),
        )
    }

    /// Method not found
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
        )
    }

    /// Invalid parameters
    pub fn invalid_params(details: impl Into<String>) -> Self {
        Self::new(
            codes::INVALID_PARAMS,
            format!("Invalid params: {}", details.into()),
        )
    }

    /// Internal error
    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(
            codes::INTERNAL_ERROR,
            format!("Internal error: {}", details.into()),
        )
    }

    /// Conditional rejected with the generic rejection code
    pub fn conditional_rejected(message: impl Into<String>) -> Self {
        Self::new(codes::CONDITIONAL_REJECTED, message)
    }

    /// Conditional cost above the static maximum
    pub fn cost_exceeded_max(cost: u64, max: u64) -> Self {
        Self::new(
            codes::CONDITIONAL_COST_EXCEEDED_MAX,
            format!("conditional cost, {}, exceeded max: {}", cost, max),
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl Serialize for ApiError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ApiError", 3)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("message", &self.message)?;
        if let Some(ref data) = self.data {
            state.serialize_field("data", data)?;
        }
        state.end()
    }
}

impl<'de> Deserialize<'de> for ApiError {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ErrorHelper {
            code: i32,
            message: String,
            data: Option<serde_json::Value>,
        }

        let helper = ErrorHelper::deserialize(deserializer)?;
        Ok(ApiError {
            code: helper.code,
            message: helper.message,
            data: helper.data,
        })
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_syntax() || e.is_eof() {
            ApiError::parse_error(e.to_string())
        } else {
            ApiError::invalid_params(e.to_string())
        }
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Terminal outcome of a rejected conditional submission.
///
/// Every variant is surfaced synchronously; nothing in the pipeline retries.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConditionalError {
    #[error("endpoint disabled")]
    EndpointDisabled,

    #[error("missing authentication")]
    MissingAuthentication,

    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("only 4337 Entrypoint contract support")]
    UnsupportedTarget,

    #[error("failed conditional validation: {0}")]
    ConditionalValidationFailed(String),

    #[error("conditional cost, {cost}, exceeded max: {max}")]
    CostExceedsMaximum { cost: u64, max: u64 },

    #[error("rate limited")]
    RateLimited,

    /// Whatever the backend reported, passed through untouched
    #[error("backend error: {0}")]
    Backend(ApiError),
}

impl ConditionalError {
    /// Metrics label for this rejection
    pub fn reason(&self) -> FailureReason {
        match self {
            ConditionalError::EndpointDisabled => FailureReason::Disabled,
            ConditionalError::MissingAuthentication => FailureReason::MissingAuth,
            ConditionalError::MalformedTransaction(_) => FailureReason::Malformed,
            ConditionalError::UnsupportedTarget => FailureReason::UnsupportedTarget,
            ConditionalError::ConditionalValidationFailed(_) => FailureReason::InvalidCondition,
            ConditionalError::CostExceedsMaximum { .. } => FailureReason::CostExceeded,
            ConditionalError::RateLimited => FailureReason::RateLimited,
            ConditionalError::Backend(_) => FailureReason::Backend,
        }
    }

    /// Only rate limiting is transient; everything else needs new input or operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConditionalError::RateLimited)
    }
}

impl From<ConditionalError> for ApiError {
    fn from(e: ConditionalError) -> Self {
        match e {
            ConditionalError::Backend(inner) => inner,
            ConditionalError::MalformedTransaction(details) => ApiError::invalid_params(details),
            ConditionalError::CostExceedsMaximum { cost, max } => {
                ApiError::cost_exceeded_max(cost, max)
            }
            other => ApiError::conditional_rejected(other.to_string()),
        }
    }
}

/// Closed set of failure labels for the failure counter.
///
/// Backend error text never becomes a label; all of it lands under `backend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    Disabled,
    MissingAuth,
    Malformed,
    UnsupportedTarget,
    InvalidCondition,
    CostExceeded,
    RateLimited,
    Backend,
}

impl FailureReason {
    pub const ALL: [FailureReason; 8] = [
        FailureReason::Disabled,
        FailureReason::MissingAuth,
        FailureReason::Malformed,
        FailureReason::UnsupportedTarget,
        FailureReason::InvalidCondition,
        FailureReason::CostExceeded,
        FailureReason::RateLimited,
        FailureReason::Backend,
    ];

    pub fn as_label(&self) -> &'static str {
        match self {
            FailureReason::Disabled => "disabled",
            FailureReason::MissingAuth => "missing_auth",
            FailureReason::Malformed => "malformed",
            FailureReason::UnsupportedTarget => "unsupported_target",
            FailureReason::InvalidCondition => "invalid_condition",
            FailureReason::CostExceeded => "cost_exceeded",
            FailureReason::RateLimited => "rate_limited",
            FailureReason::Backend => "backend",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Gateway-level errors (startup and serving, not JSON-RPC)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Backend client could not be constructed
    #[error("failed to dial backend {url}: {reason}")]
    Backend { url: String, reason: String },

    /// Metrics registration failed
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}
