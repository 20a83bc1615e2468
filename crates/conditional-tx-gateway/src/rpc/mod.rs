//! RPC method handlers for JSON-RPC API.

pub mod conditional;

pub use conditional::{ConditionalSettings, ConditionalTxService};
