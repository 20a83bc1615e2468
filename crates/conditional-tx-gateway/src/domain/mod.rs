//! Domain types for the conditional gateway.
//!
//! Pure data and rules: conditionals and their cost, transaction decoding,
//! the EntryPoint allow-list, configuration and error taxonomy. Nothing here
//! performs I/O besides reading a config file.

pub mod conditional;
pub mod config;
pub mod entrypoints;
pub mod error;
pub mod transaction;
pub mod types;

// Re-exports for convenience
pub use conditional::{
    ConditionError, KnownAccount, TransactionConditional, MAX_CONDITIONAL_COST,
};
pub use config::{ConfigError, GatewayConfig};
pub use entrypoints::EntrypointAllowList;
pub use error::{ApiError, ApiResult, ConditionalError, FailureReason, GatewayError};
pub use transaction::{decode_transaction, DecodeError, DecodedTransaction, TxType};
pub use types::*;
