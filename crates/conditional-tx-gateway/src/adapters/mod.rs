//! Adapters for the conditional gateway.
//!
//! Infrastructure implementations of the ports.

mod error_conversions;
pub mod instrumented_backend;
pub mod rpc_backend;

pub use instrumented_backend::InstrumentedBackend;
pub use rpc_backend::RpcBackend;
