//! Ports (hexagonal architecture boundaries).

pub mod backend;

pub use backend::{BackendError, ConditionalBackend, SEND_RAW_TRANSACTION_CONDITIONAL};
