//! Ed25519 request signing for the Pacifica API.
//!
//! Every authenticated request is signed over the canonical form of an
//! envelope `{timestamp, expiry_window, type, data}`. The signer holds the
//! account identity and an immutable keypair, so it can be shared freely
//! across tasks.

use std::time::{SystemTime, UNIX_EPOCH};

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::sign::canonical::canonical_json;

/// Default signature expiry window in milliseconds (30 seconds).
pub const DEFAULT_EXPIRY_WINDOW_MS: i64 = 30_000;

/// Auth fields reserved by [`Signer::build_signed_request`]; operation data may
/// not reuse these names.
pub const RESERVED_FIELDS: [&str; 5] = [
    "account",
    "agent_wallet",
    "signature",
    "timestamp",
    "expiry_window",
];

/// Signing-related errors.
#[derive(Debug, Clone, Error)]
pub enum SignError {
    /// Private key material could not be decoded or has the wrong length
    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    /// Operation data is not a JSON object, so it cannot be flattened
    #[error("Operation data must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// Operation data reuses a reserved auth field name
    #[error("Operation field '{0}' collides with a reserved auth field")]
    ReservedField(String),

    /// Operation data could not be serialized
    #[error("Failed to serialize operation data: {0}")]
    Serialize(String),
}

/// Result type alias for signing operations.
pub type SignResult<T> = Result<T, SignError>;

/// Header fields attached to every signed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureHeader {
    /// Wall-clock time the signature was created (ms since epoch)
    pub timestamp: i64,
    /// How long the signature remains valid (ms)
    pub expiry_window: i64,
    /// Operation type, e.g. `create_order`
    #[serde(rename = "type")]
    pub operation_type: String,
}

/// Signs Pacifica API requests with an Ed25519 keypair.
///
/// Construction fails fast on malformed key material; signing itself only
/// reads the clock and never fails.
#[derive(Debug, Clone)]
pub struct Signer {
    account: String,
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl Signer {
    /// Create a signer from a Base58-encoded private key and an account id.
    ///
    /// Accepts either a 32-byte seed or a 64-byte expanded key (seed followed
    /// by the public key, the layout most wallets export).
    pub fn new(private_key_bs58: &str, account: impl Into<String>) -> SignResult<Self> {
        let key_bytes = bs58::decode(private_key_bs58)
            .into_vec()
            .map_err(|e| SignError::InvalidKey(format!("not valid Base58: {}", e)))?;

        let seed: [u8; 32] = match key_bytes.len() {
            32 => key_bytes.as_slice().try_into().expect("length checked"),
            64 => key_bytes[..32].try_into().expect("length checked"),
            n => {
                return Err(SignError::InvalidKey(format!(
                    "expected 32 or 64 bytes, got {}",
                    n
                )))
            }
        };

        let signing_key = SigningKey::from_bytes(&seed);
        let verifying_key = signing_key.verifying_key();

        Ok(Self {
            account: account.into(),
            signing_key,
            verifying_key,
        })
    }

    /// The account identifier this signer authenticates as.
    pub fn account(&self) -> &str {
        &self.account
    }

    /// The Base58-encoded public key.
    pub fn public_key(&self) -> String {
        bs58::encode(self.verifying_key.as_bytes()).into_string()
    }

    /// Sign an operation, returning the header and the Base58 signature.
    ///
    /// `expiry_window == 0` selects the default of
    /// [`DEFAULT_EXPIRY_WINDOW_MS`]. The signature covers the canonical form
    /// of `{timestamp, expiry_window, type, data}`.
    pub fn create_signature(
        &self,
        operation_type: &str,
        operation_data: &Value,
        expiry_window: i64,
    ) -> (SignatureHeader, String) {
        let timestamp = now_ms();
        let expiry_window = if expiry_window == 0 {
            DEFAULT_EXPIRY_WINDOW_MS
        } else {
            expiry_window
        };

        let header = SignatureHeader {
            timestamp,
            expiry_window,
            operation_type: operation_type.to_string(),
        };

        let envelope = serde_json::json!({
            "timestamp": header.timestamp,
            "expiry_window": header.expiry_window,
            "type": header.operation_type,
            "data": operation_data,
        });

        let message = canonical_json(&envelope);
        let signature = self.sign_message(&message);

        (header, signature)
    }

    /// Sign raw message bytes, returning the Base58-encoded signature.
    pub fn sign_message(&self, message: &str) -> String {
        let signature = self.signing_key.sign(message.as_bytes());
        bs58::encode(signature.to_bytes()).into_string()
    }

    /// Verify a Base58-encoded signature against a message.
    ///
    /// The message must be the exact signed bytes (callers pass the canonical
    /// string themselves). Malformed signature text yields `false`, never an
    /// error; `false` means "untrusted", not "fault".
    pub fn verify_signature(&self, message: &str, signature_bs58: &str) -> bool {
        let Ok(signature_bytes) = bs58::decode(signature_bs58).into_vec() else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&signature_bytes) else {
            return false;
        };
        self.verifying_key
            .verify(message.as_bytes(), &signature)
            .is_ok()
    }

    /// Build the complete request body for a signed operation.
    ///
    /// Produces one flat map holding the auth fields (`account`,
    /// `agent_wallet`, `signature`, `timestamp`, `expiry_window`) alongside
    /// every top-level field of `operation_data`. Fails if the data is not an
    /// object, or if one of its fields reuses a reserved auth name.
    pub fn build_signed_request(
        &self,
        operation_type: &str,
        operation_data: &Value,
        expiry_window: i64,
    ) -> SignResult<Map<String, Value>> {
        let data_map = match operation_data {
            Value::Object(map) => map,
            Value::Null => return Err(SignError::NotAnObject("null")),
            Value::Array(_) => return Err(SignError::NotAnObject("array")),
            Value::String(_) => return Err(SignError::NotAnObject("string")),
            Value::Number(_) => return Err(SignError::NotAnObject("number")),
            Value::Bool(_) => return Err(SignError::NotAnObject("bool")),
        };

        for field in data_map.keys() {
            if RESERVED_FIELDS.contains(&field.as_str()) {
                return Err(SignError::ReservedField(field.clone()));
            }
        }

        let (header, signature) = self.create_signature(operation_type, operation_data, expiry_window);

        let mut request = Map::new();
        request.insert("account".to_string(), Value::String(self.account.clone()));
        request.insert("agent_wallet".to_string(), Value::String(self.public_key()));
        request.insert("signature".to_string(), Value::String(signature));
        request.insert("timestamp".to_string(), Value::from(header.timestamp));
        request.insert("expiry_window".to_string(), Value::from(header.expiry_window));

        for (field, value) in data_map {
            request.insert(field.clone(), value.clone());
        }

        Ok(request)
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
