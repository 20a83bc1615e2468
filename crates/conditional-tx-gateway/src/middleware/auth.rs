//! Signature-header authentication.
//!
//! Callers sign `keccak256(body)` as an EIP-191 personal message and send
//! `<address>:<signature>` in the configured header. A request whose
//! recovered signer matches the claimed address gets a [`CallerIdentity`]
//! extension. Requests without the header pass through unauthenticated; the
//! handler decides what that means.

use crate::domain::error::ApiError;
use crate::domain::types::{Address, CallerIdentity};
use axum::{
    body::{to_bytes, Body},
    http::{HeaderName, Request, StatusCode},
    response::Response,
};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, PublicKey, Secp256k1, SecretKey,
};
use sha3::{Digest, Keccak256};
use std::str::FromStr;
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::{debug, warn};

const EIP191_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Header carrying `<address>:<signature>`
    pub header: HeaderName,
    /// Largest body that will be buffered for verification
    pub max_body_size: usize,
}

impl AuthConfig {
    pub fn new(header: &str, max_body_size: usize) -> Result<Self, AuthError> {
        let header =
            HeaderName::from_str(header).map_err(|_| AuthError::InvalidHeaderName(header.into()))?;
        Ok(Self {
            header,
            max_body_size,
        })
    }
}

/// Reasons a signature header is rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid auth header name: {0}")]
    InvalidHeaderName(String),

    #[error("invalid auth header")]
    MalformedHeader,

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("mismatched recovered signer")]
    SignerMismatch,
}

/// Authentication layer
#[derive(Clone)]
pub struct AuthLayer {
    config: Arc<AuthConfig>,
}

impl AuthLayer {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            config: Arc::clone(&self.config),
        }
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    config: Arc<AuthConfig>,
}

impl<S> Service<Request<Body>> for AuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let config = Arc::clone(&self.config);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let header_value = match req.headers().get(&config.header) {
                None => return inner.call(req).await,
                Some(value) => value.to_str().map(str::to_owned),
            };

            let (claimed, signature) = match header_value
                .ok()
                .and_then(|v| parse_signature_header(&v).ok())
            {
                Some(parsed) => parsed,
                None => {
                    warn!(header = %config.header, "Rejecting malformed auth header");
                    return Ok(error_response(
                        StatusCode::BAD_REQUEST,
                        &AuthError::MalformedHeader.to_string(),
                    ));
                }
            };

            let (mut parts, body) = req.into_parts();
            let bytes = match to_bytes(body, config.max_body_size).await {
                Ok(bytes) => bytes,
                Err(_) => {
                    return Ok(error_response(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        "request body too large",
                    ))
                }
            };

            if let Err(e) = verify_body_signature(&claimed, &signature, &bytes) {
                warn!(claimed = ?claimed, error = %e, "Rejecting request with bad signature");
                return Ok(error_response(StatusCode::BAD_REQUEST, &e.to_string()));
            }

            debug!(caller = ?claimed, "Authenticated request");
            parts.extensions.insert(CallerIdentity::new(claimed));
            inner.call(Request::from_parts(parts, Body::from(bytes))).await
        })
    }
}

/// Split `<address>:<signature>` into its decoded halves.
pub fn parse_signature_header(value: &str) -> Result<(Address, [u8; 65]), AuthError> {
    let (addr, sig) = value.trim().split_once(':').ok_or(AuthError::MalformedHeader)?;

    let addr_bytes = decode_hex(addr)?;
    if addr_bytes.len() != 20 {
        return Err(AuthError::MalformedHeader);
    }

    let signature: [u8; 65] = decode_hex(sig)?
        .try_into()
        .map_err(|_| AuthError::MalformedHeader)?;

    Ok((Address::from_slice(&addr_bytes), signature))
}

/// Check that `signature` over `body` was produced by `claimed`.
pub fn verify_body_signature(
    claimed: &Address,
    signature: &[u8; 65],
    body: &[u8],
) -> Result<(), AuthError> {
    let recovered = recover_signer(&personal_message_hash(body), signature)?;
    if &recovered != claimed {
        return Err(AuthError::SignerMismatch);
    }
    Ok(())
}

/// Header value a client sends for `body`, signed with `secret`.
pub fn signature_header_value(secret: &SecretKey, body: &[u8]) -> String {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest(personal_message_hash(body));
    let (rec_id, compact) = secp
        .sign_ecdsa_recoverable(&message, secret)
        .serialize_compact();

    let mut signature = [0u8; 65];
    signature[..64].copy_from_slice(&compact);
    signature[64] = rec_id.to_i32() as u8;

    let address = public_key_address(&PublicKey::from_secret_key(&secp, secret));
    format!("{:?}:0x{}", address, hex::encode(signature))
}

/// Ethereum address of a secp256k1 public key
pub fn public_key_address(public_key: &PublicKey) -> Address {
    // Last 20 bytes of keccak256 of the uncompressed key without the 0x04 prefix
    let uncompressed = public_key.serialize_uncompressed();
    let hash = Keccak256::digest(&uncompressed[1..]);
    Address::from_slice(&hash[12..])
}

/// EIP-191 hash of `keccak256(body)`
fn personal_message_hash(body: &[u8]) -> [u8; 32] {
    let body_hash = Keccak256::digest(body);
    let mut hasher = Keccak256::new();
    hasher.update(EIP191_PREFIX);
    hasher.update(body_hash);
    hasher.finalize().into()
}

fn recover_signer(digest: &[u8; 32], signature: &[u8; 65]) -> Result<Address, AuthError> {
    // Accept both raw (0/1) and legacy (27/28) recovery bytes
    let v = match signature[64] {
        v @ (0 | 1) => v,
        v @ (27 | 28) => v - 27,
        other => {
            return Err(AuthError::InvalidSignature(format!(
                "invalid recovery byte {}",
                other
            )))
        }
    };

    let rec_id = RecoveryId::from_i32(i32::from(v))
        .map_err(|e| AuthError::InvalidSignature(e.to_string()))?;
    let signature = RecoverableSignature::from_compact(&signature[..64], rec_id)
        .map_err(|e| AuthError::InvalidSignature(e.to_string()))?;

    let public_key = Secp256k1::verification_only()
        .recover_ecdsa(&Message::from_digest(*digest), &signature)
        .map_err(|e| AuthError::InvalidSignature(e.to_string()))?;

    Ok(public_key_address(&public_key))
}

fn decode_hex(s: &str) -> Result<Vec<u8>, AuthError> {
    let s = s.trim();
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex::decode(s).map_err(|_| AuthError::MalformedHeader)
}

/// Create JSON-RPC error response with the given HTTP status
fn error_response(status: StatusCode, message: &str) -> Response {
    let error = ApiError::invalid_request(message);
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "error": error,
        "id": null
    });

    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
