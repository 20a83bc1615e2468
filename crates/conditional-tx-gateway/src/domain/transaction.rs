//! Raw transaction decoding for conditional submissions.
//!
//! Only what admission needs is extracted: the envelope type, the target
//! address and the transaction hash. Every field is still checked against
//! its envelope's layout, so anything the backend would fail to decode is
//! rejected here. Signatures are left to the backend.

use crate::domain::types::{Address, Hash};
use primitive_types::U256;
use rlp::{DecoderError, Rlp};
use sha3::{Digest, Keccak256};
use tracing::debug;

/// Maximum allowed transaction size (128 KB)
pub const MAX_TX_SIZE: usize = 128 * 1024;

/// Transaction envelope type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxType {
    Legacy,
    AccessList, // EIP-2930
    DynamicFee, // EIP-1559
    Blob,       // EIP-4844
    SetCode,    // EIP-7702
}

/// Shape of a single payload field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    /// Canonical big-endian integer of at most 32 bytes
    Scalar,
    /// Arbitrary byte string
    Data,
    /// 20-byte address, or empty for contract creation
    OptionalTarget,
    /// 20-byte address
    Target,
    /// `[[address, [slot, ...]], ...]`
    AccessList,
    /// `[hash, ...]`
    BlobHashes,
    /// `[[chainId, address, nonce, yParity, r, s], ...]`
    AuthorizationList,
}

use Field::*;

const LEGACY_FIELDS: &[Field] = &[
    Scalar,         // nonce
    Scalar,         // gasPrice
    Scalar,         // gas
    OptionalTarget, // to
    Scalar,         // value
    Data,           // data
    Scalar,         // v
    Scalar,         // r
    Scalar,         // s
];

const ACCESS_LIST_FIELDS: &[Field] = &[
    Scalar, // chainId
    Scalar, // nonce
    Scalar, // gasPrice
    Scalar, // gas
    OptionalTarget,
    Scalar, // value
    Data,
    AccessList,
    Scalar, // yParity
    Scalar, // r
    Scalar, // s
];

const DYNAMIC_FEE_FIELDS: &[Field] = &[
    Scalar, // chainId
    Scalar, // nonce
    Scalar, // maxPriorityFeePerGas
    Scalar, // maxFeePerGas
    Scalar, // gas
    OptionalTarget,
    Scalar, // value
    Data,
    AccessList,
    Scalar, // yParity
    Scalar, // r
    Scalar, // s
];

const BLOB_FIELDS: &[Field] = &[
    Scalar, // chainId
    Scalar, // nonce
    Scalar, // maxPriorityFeePerGas
    Scalar, // maxFeePerGas
    Scalar, // gas
    Target, // blob transactions cannot create contracts
    Scalar, // value
    Data,
    AccessList,
    Scalar, // maxFeePerBlobGas
    BlobHashes,
    Scalar, // yParity
    Scalar, // r
    Scalar, // s
];

const SET_CODE_FIELDS: &[Field] = &[
    Scalar, // chainId
    Scalar, // nonce
    Scalar, // maxPriorityFeePerGas
    Scalar, // maxFeePerGas
    Scalar, // gas
    Target, // set-code transactions cannot create contracts
    Scalar, // value
    Data,
    AccessList,
    AuthorizationList,
    Scalar, // yParity
    Scalar, // r
    Scalar, // s
];

impl TxType {
    fn from_type_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(TxType::AccessList),
            0x02 => Some(TxType::DynamicFee),
            0x03 => Some(TxType::Blob),
            0x04 => Some(TxType::SetCode),
            _ => None,
        }
    }

    fn type_byte(&self) -> Option<u8> {
        match self {
            TxType::Legacy => None,
            TxType::AccessList => Some(0x01),
            TxType::DynamicFee => Some(0x02),
            TxType::Blob => Some(0x03),
            TxType::SetCode => Some(0x04),
        }
    }

    fn fields(&self) -> &'static [Field] {
        match self {
            TxType::Legacy => LEGACY_FIELDS,
            TxType::AccessList => ACCESS_LIST_FIELDS,
            TxType::DynamicFee => DYNAMIC_FEE_FIELDS,
            TxType::Blob => BLOB_FIELDS,
            TxType::SetCode => SET_CODE_FIELDS,
        }
    }

    /// Index of the `to` field in the payload list
    fn to_index(&self) -> usize {
        match self {
            // [nonce, gasPrice, gasLimit, to, ...]
            TxType::Legacy => 3,
            // [chainId, nonce, gasPrice, gasLimit, to, ...]
            TxType::AccessList => 4,
            // [chainId, nonce, maxPriorityFeePerGas, maxFeePerGas, gasLimit, to, ...]
            TxType::DynamicFee | TxType::Blob | TxType::SetCode => 5,
        }
    }
}

/// Decoded view of a raw transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransaction {
    pub hash: Hash,
    /// `None` for contract creation
    pub to: Option<Address>,
    pub tx_type: TxType,
}

/// Reasons a payload is not a transaction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("empty transaction")]
    Empty,

    #[error("transaction size {size} exceeds limit {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("unknown transaction type: 0x{0:02x}")]
    UnknownType(u8),

    #[error("transaction must be an RLP list")]
    NotAList,

    #[error("{0} trailing bytes after transaction")]
    TrailingBytes(usize),

    #[error("{tx_type:?} transaction must have {expected} fields, got {got}")]
    FieldCount {
        tx_type: TxType,
        expected: usize,
        got: usize,
    },

    #[error("invalid address length: {0} bytes")]
    AddressLength(usize),

    #[error("RLP decode error for {field}: {reason}")]
    Rlp { field: String, reason: String },
}

/// Decode raw transaction bytes into the fields admission needs.
pub fn decode_transaction(raw: &[u8]) -> Result<DecodedTransaction, DecodeError> {
    if raw.len() > MAX_TX_SIZE {
        return Err(DecodeError::TooLarge {
            size: raw.len(),
            limit: MAX_TX_SIZE,
        });
    }

    let (tx_type, payload) = detect_tx_type(raw)?;
    let rlp = Rlp::new(payload);
    check_single_list(&rlp, payload.len())?;

    // Blob transactions may arrive in network form: [tx, blobs, commitments, proofs]
    let (tx, wrapped) = match tx_type {
        TxType::Blob if is_list_at(&rlp, 0) => (unwrap_blob_sidecar(&rlp)?, true),
        _ => (rlp, false),
    };

    check_fields(&tx, tx_type)?;
    let to = decode_address(&tx.at(tx_type.to_index()).map_err(|e| rlp_error("to", e))?)?;

    // The hash covers the type byte and the bare transaction, never the sidecar
    let hash = if wrapped {
        let mut hasher = Keccak256::new();
        if let Some(byte) = tx_type.type_byte() {
            hasher.update([byte]);
        }
        hasher.update(tx.as_raw());
        Hash::from_slice(&hasher.finalize())
    } else {
        Hash::from_slice(&Keccak256::digest(raw))
    };

    debug!(hash = ?hash, to = ?to, tx_type = ?tx_type, "Decoded raw transaction");

    Ok(DecodedTransaction { hash, to, tx_type })
}

/// Detect transaction type from first byte
fn detect_tx_type(raw: &[u8]) -> Result<(TxType, &[u8]), DecodeError> {
    let first_byte = *raw.first().ok_or(DecodeError::Empty)?;

    // EIP-2718: typed transactions have first byte < 0x7f,
    // legacy transactions start with an RLP list prefix (0xc0-0xff)
    if first_byte < 0x7f {
        TxType::from_type_byte(first_byte)
            .map(|tx_type| (tx_type, &raw[1..]))
            .ok_or(DecodeError::UnknownType(first_byte))
    } else {
        Ok((TxType::Legacy, raw))
    }
}

/// The payload must be exactly one RLP list with nothing after it.
fn check_single_list(rlp: &Rlp, len: usize) -> Result<(), DecodeError> {
    if !rlp.is_list() {
        return Err(DecodeError::NotAList);
    }
    let total = rlp
        .payload_info()
        .map_err(|e| rlp_error("envelope", e))?
        .total();
    if total < len {
        return Err(DecodeError::TrailingBytes(len - total));
    }
    Ok(())
}

fn is_list_at(rlp: &Rlp, index: usize) -> bool {
    rlp.at(index).map(|item| item.is_list()).unwrap_or(false)
}

/// Strip the blob sidecar, returning the bare transaction list.
///
/// Accepts `[tx, blobs, commitments, proofs]` and the versioned
/// `[tx, version, blobs, commitments, cell_proofs]`.
fn unwrap_blob_sidecar<'a>(rlp: &Rlp<'a>) -> Result<Rlp<'a>, DecodeError> {
    let count = rlp.item_count().map_err(|e| rlp_error("sidecar", e))?;
    let lists: &[usize] = match count {
        4 => &[1, 2, 3],
        5 => {
            rlp.at(1)
                .and_then(|r| r.as_val::<u8>())
                .map_err(|e| rlp_error("sidecar version", e))?;
            &[2, 3, 4]
        }
        got => {
            return Err(DecodeError::Rlp {
                field: "sidecar".into(),
                reason: format!("expected 4 or 5 items, got {}", got),
            })
        }
    };

    for &index in lists {
        if !is_list_at(rlp, index) {
            return Err(DecodeError::Rlp {
                field: format!("sidecar item {}", index),
                reason: "expected a list".into(),
            });
        }
    }

    rlp.at(0).map_err(|e| rlp_error("sidecar transaction", e))
}

/// Check every field of `tx` against the layout of `tx_type`.
fn check_fields(tx: &Rlp, tx_type: TxType) -> Result<(), DecodeError> {
    let fields = tx_type.fields();
    let got = tx.item_count().map_err(|e| rlp_error("item count", e))?;
    if got != fields.len() {
        return Err(DecodeError::FieldCount {
            tx_type,
            expected: fields.len(),
            got,
        });
    }

    for (index, field) in fields.iter().enumerate() {
        let item = tx
            .at(index)
            .map_err(|e| rlp_error(&format!("field {}", index), e))?;
        check_field(&item, *field).map_err(|e| match e {
            DecodeError::Rlp { reason, .. } => DecodeError::Rlp {
                field: format!("field {}", index),
                reason,
            },
            other => other,
        })?;
    }
    Ok(())
}

fn check_field(item: &Rlp, field: Field) -> Result<(), DecodeError> {
    match field {
        Scalar => scalar(item),
        Data => item.as_val::<Vec<u8>>().map(drop).map_err(|e| rlp_error("data", e)),
        OptionalTarget => decode_address(item).map(drop),
        Target => match decode_address(item)? {
            Some(_) => Ok(()),
            None => Err(DecodeError::AddressLength(0)),
        },
        AccessList => for_each_entry(item, |entry| {
            if entry.item_count().map_err(|e| rlp_error("access list", e))? != 2 {
                return Err(rlp_error("access list", DecoderError::RlpIncorrectListLen));
            }
            required_address(&entry.at(0).map_err(|e| rlp_error("access list", e))?)?;
            let slots = entry.at(1).map_err(|e| rlp_error("access list", e))?;
            for_each_entry(&slots, |slot| fixed_bytes(&slot, 32, "storage key"))
        }),
        BlobHashes => for_each_entry(item, |hash| fixed_bytes(&hash, 32, "blob hash")),
        AuthorizationList => for_each_entry(item, |auth| {
            if auth.item_count().map_err(|e| rlp_error("authorization", e))? != 6 {
                return Err(rlp_error("authorization", DecoderError::RlpIncorrectListLen));
            }
            for index in 0..6 {
                let value = auth.at(index).map_err(|e| rlp_error("authorization", e))?;
                if index == 1 {
                    required_address(&value)?;
                } else {
                    scalar(&value)?;
                }
            }
            Ok(())
        }),
    }
}

/// Run `check` on every entry of a list item.
fn for_each_entry<F>(item: &Rlp, mut check: F) -> Result<(), DecodeError>
where
    F: FnMut(Rlp) -> Result<(), DecodeError>,
{
    if !item.is_list() {
        return Err(rlp_error("list", DecoderError::RlpExpectedToBeList));
    }
    for entry in item.iter() {
        check(entry)?;
    }
    Ok(())
}

fn scalar(item: &Rlp) -> Result<(), DecodeError> {
    item.as_val::<U256>().map(drop).map_err(|e| rlp_error("scalar", e))
}

fn fixed_bytes(item: &Rlp, len: usize, what: &str) -> Result<(), DecodeError> {
    let bytes: Vec<u8> = item.as_val().map_err(|e| rlp_error(what, e))?;
    if bytes.len() != len {
        return Err(DecodeError::Rlp {
            field: what.to_string(),
            reason: format!("expected {} bytes, got {}", len, bytes.len()),
        });
    }
    Ok(())
}

fn required_address(item: &Rlp) -> Result<Address, DecodeError> {
    decode_address(item)?.ok_or(DecodeError::AddressLength(0))
}

fn decode_address(item: &Rlp) -> Result<Option<Address>, DecodeError> {
    let bytes: Vec<u8> = item.as_val().map_err(|e| rlp_error("address", e))?;

    match bytes.len() {
        0 => Ok(None),
        20 => Ok(Some(Address::from_slice(&bytes))),
        n => Err(DecodeError::AddressLength(n)),
    }
}

fn rlp_error(field: &str, e: DecoderError) -> DecodeError {
    DecodeError::Rlp {
        field: field.to_string(),
        reason: format!("{:?}", e),
    }
}
