//! Request signing for the Pacifica API.
//!
//! Authenticated REST operations are signed with Ed25519 over a canonical
//! JSON envelope. The flow is:
//!
//! 1. Build the envelope `{timestamp, expiry_window, type, data}`
//! 2. Serialize it canonically (sorted keys, no whitespace)
//! 3. Sign the bytes with the account's Ed25519 key
//! 4. Flatten the operation data and auth fields into one request body
//!
//! The server re-derives the identical canonical string from the flat request
//! to check the signature, so byte-exact determinism is the whole game.

pub mod canonical;
pub mod signer;

pub use canonical::canonical_json;
pub use signer::{
    SignError, SignResult, SignatureHeader, Signer, DEFAULT_EXPIRY_WINDOW_MS, RESERVED_FIELDS,
};
