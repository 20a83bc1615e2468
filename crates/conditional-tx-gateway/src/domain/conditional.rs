//! Transaction conditionals: on-chain preconditions attached to a submission.
//!
//! The backend re-checks every assertion at inclusion time; the gateway only
//! validates the shape of the condition and prices it.

use crate::domain::types::{hex_u64, Address, Hash, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Protocol maximum cost of a single conditional.
///
/// Also the sustained refill rate of the cost limiter, in cost units per second.
pub const MAX_CONDITIONAL_COST: u64 = 1000;

/// Assertion about a single account's storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KnownAccount {
    /// The whole storage trie must have this root
    StorageRoot(Hash),
    /// Individual slots must hold these values
    StorageSlots(BTreeMap<Hash, Hash>),
}

impl KnownAccount {
    fn cost(&self) -> u64 {
        match self {
            KnownAccount::StorageRoot(_) => 1,
            KnownAccount::StorageSlots(slots) => slots.len() as u64,
        }
    }
}

/// Preconditions that must hold for the backend to include the transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionConditional {
    #[serde(default)]
    pub known_accounts: BTreeMap<Address, KnownAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number_min: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number_max: Option<U256>,
    #[serde(default, with = "hex_u64", skip_serializing_if = "Option::is_none")]
    pub timestamp_min: Option<u64>,
    #[serde(default, with = "hex_u64", skip_serializing_if = "Option::is_none")]
    pub timestamp_max: Option<u64>,
}

/// Structural problems with a conditional
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    #[error("block number minimum constraint must be less than the maximum")]
    BlockNumberRange,

    #[error("timestamp minimum constraint must be less than the maximum")]
    TimestampRange,
}

impl TransactionConditional {
    /// Check that every min/max pair is ordered.
    pub fn validate(&self) -> Result<(), ConditionError> {
        if let (Some(min), Some(max)) = (self.block_number_min, self.block_number_max) {
            if min > max {
                return Err(ConditionError::BlockNumberRange);
            }
        }
        if let (Some(min), Some(max)) = (self.timestamp_min, self.timestamp_max) {
            if min > max {
                return Err(ConditionError::TimestampRange);
            }
        }
        Ok(())
    }

    /// Price of checking this conditional at inclusion time.
    ///
    /// One unit per known account, plus one for a storage root or one per
    /// asserted slot, plus one for each bounded dimension (block number,
    /// timestamp).
    pub fn cost(&self) -> u64 {
        let mut cost = self
            .known_accounts
            .values()
            .map(|account| 1 + account.cost())
            .fold(0u64, u64::saturating_add);

        if self.block_number_min.is_some() || self.block_number_max.is_some() {
            cost = cost.saturating_add(1);
        }
        if self.timestamp_min.is_some() || self.timestamp_max.is_some() {
            cost = cost.saturating_add(1);
        }
        cost
    }
}
