//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use conditional_tx_gateway::domain::conditional::{KnownAccount, TransactionConditional};
use conditional_tx_gateway::domain::entrypoints::entrypoint_v060;
use conditional_tx_gateway::{Address, ApiError, BackendError, Bytes, ConditionalBackend, Hash};
use rlp::RlpStream;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Backend double that records every forwarded call.
#[derive(Default)]
pub struct MockBackend {
    calls: Mutex<Vec<(Bytes, TransactionConditional)>>,
    error: Option<ApiError>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that answers every call with `error`
    pub fn failing(error: ApiError) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            error: Some(error),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(Bytes, TransactionConditional)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConditionalBackend for MockBackend {
    async fn send_raw_transaction_conditional(
        &self,
        tx: &Bytes,
        condition: &TransactionConditional,
    ) -> Result<(), BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push((tx.clone(), condition.clone()));
        match &self.error {
            Some(e) => Err(BackendError::Rpc(e.clone())),
            None => Ok(()),
        }
    }
}

/// Signed-looking legacy transaction to `to` (`None` = contract creation)
pub fn legacy_tx(to: Option<Address>, nonce: u64) -> Bytes {
    let mut stream = RlpStream::new_list(9);
    stream.append(&nonce);
    stream.append(&1_000_000_000u64);
    stream.append(&100_000u64);
    match to {
        Some(addr) => stream.append(&addr),
        None => stream.append_empty_data(),
    };
    stream.append(&0u64);
    stream.append(&vec![0xab_u8; 4]);
    stream.append(&37u64);
    stream.append(&vec![0x11u8; 32]);
    stream.append(&vec![0x22u8; 32]);
    Bytes::from(stream.out().to_vec())
}

/// Transaction to the v0.6.0 EntryPoint
pub fn entrypoint_tx(nonce: u64) -> Bytes {
    legacy_tx(Some(entrypoint_v060()), nonce)
}

/// Conditional with exactly `cost` (>= 2) using one account's storage slots
pub fn conditional_with_cost(cost: u64) -> TransactionConditional {
    assert!(cost >= 2, "one account costs at least 2");
    let slots: BTreeMap<Hash, Hash> = (0..cost - 1)
        .map(|i| (Hash::from_low_u64_be(i), Hash::from_low_u64_be(i + 1)))
        .collect();

    let mut cond = TransactionConditional::default();
    cond.known_accounts
        .insert(Address::repeat_byte(0x42), KnownAccount::StorageSlots(slots));
    assert_eq!(cond.cost(), cost);
    cond
}

/// Conditional of `2 * accounts` cost built from storage-root assertions
pub fn conditional_with_roots(accounts: u64) -> TransactionConditional {
    let mut cond = TransactionConditional::default();
    for i in 0..accounts {
        cond.known_accounts.insert(
            Address::from_low_u64_be(i + 1),
            KnownAccount::StorageRoot(Hash::repeat_byte(0x01)),
        );
    }
    cond
}
