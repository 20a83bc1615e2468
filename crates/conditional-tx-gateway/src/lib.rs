// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! Conditional transaction gateway.
//!
//! Admission control in front of an execution node for
//! `eth_sendRawTransactionConditional`: authenticated callers submit a raw
//! transaction plus a set of on-chain preconditions; accepted submissions are
//! forwarded verbatim to the backend.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  CONDITIONAL TX GATEWAY                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │   HTTP JSON-RPC (POST /)     /health      /metrics            │
//! │              │                                                │
//! │   ┌──────────┴──────────────────────────────┐                 │
//! │   │ Middleware: Tracing → Signature Auth     │                 │
//! │   └──────────┬──────────────────────────────┘                 │
//! │              │  Option<CallerIdentity>                        │
//! │   ┌──────────┴──────────────────────────────┐                 │
//! │   │ Admission pipeline                       │                 │
//! │   │  enabled → auth → decode → EntryPoint    │                 │
//! │   │  → validate → max cost → cost limiter    │                 │
//! │   └──────────┬──────────────────────────────┘                 │
//! └──────────────┼───────────────────────────────────────────────┘
//!                │ eth_sendRawTransactionConditional
//!                ▼
//!          Execution backend
//! ```
//!
//! # Error codes
//!
//! - `-32003`: rejected (disabled, missing auth, unsupported target,
//!   invalid conditional, rate limited)
//! - `-32005`: conditional cost exceeds the protocol maximum
//! - `-32602`: malformed transaction or parameters
//! - backend errors pass through unchanged
//!
//! # Usage
//!
//! ```ignore
//! use conditional_tx_gateway::{ConditionalGatewayService, GatewayConfig, RpcBackend};
//!
//! let config = GatewayConfig::from_toml_file("gateway.toml")?;
//! let backend = RpcBackend::connect(&config.conditional.backend_url, config.backend.request_timeout)?;
//! let service = ConditionalGatewayService::new(config, Arc::new(backend))?;
//! service.start().await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod middleware;
pub mod ports;
pub mod rpc;
pub mod service;

// Re-exports
pub use adapters::{InstrumentedBackend, RpcBackend};
pub use domain::config::GatewayConfig;
pub use domain::error::{ApiError, ApiResult, ConditionalError, FailureReason, GatewayError};
pub use domain::types::*;
pub use middleware::{ConditionalMetrics, CostRateLimiter};
pub use ports::{BackendError, ConditionalBackend};
pub use rpc::ConditionalTxService;
pub use service::ConditionalGatewayService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
