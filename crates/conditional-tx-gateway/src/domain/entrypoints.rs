//! Permitted targets for conditional transactions.
//!
//! Conditionals are only accepted for ERC-4337 EntryPoint contracts, so the
//! set is tiny and fixed at construction.

use crate::domain::types::Address;
use std::collections::HashSet;
use std::str::FromStr;

/// ERC-4337 EntryPoint v0.6.0
pub const ENTRYPOINT_V060: &str = "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789";
/// ERC-4337 EntryPoint v0.7.0
pub const ENTRYPOINT_V070: &str = "0x0000000071727De22E5E9d8BAf0edAc6f37da032";

/// Immutable set of permitted target addresses.
#[derive(Debug, Clone)]
pub struct EntrypointAllowList {
    addresses: HashSet<Address>,
}

impl EntrypointAllowList {
    /// Allow-list with exactly the given addresses
    pub fn new(addresses: impl IntoIterator<Item = Address>) -> Self {
        Self {
            addresses: addresses.into_iter().collect(),
        }
    }

    /// The known EntryPoint deployments plus any operator-supplied extras
    pub fn with_extra(extra: impl IntoIterator<Item = Address>) -> Self {
        let mut list = Self::default();
        list.addresses.extend(extra);
        list
    }

    /// `false` for contract creation (no target)
    pub fn permits(&self, to: Option<&Address>) -> bool {
        to.is_some_and(|addr| self.addresses.contains(addr))
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl Default for EntrypointAllowList {
    fn default() -> Self {
        Self::new([entrypoint_v060(), entrypoint_v070()])
    }
}

pub fn entrypoint_v060() -> Address {
    parse_const(ENTRYPOINT_V060)
}

pub fn entrypoint_v070() -> Address {
    parse_const(ENTRYPOINT_V070)
}

fn parse_const(s: &str) -> Address {
    // Constants above are well-formed; fall back to zero rather than panic
    Address::from_str(s.trim_start_matches("0x")).unwrap_or_default()
}
