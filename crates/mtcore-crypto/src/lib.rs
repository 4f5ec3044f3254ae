//! Cryptographic primitives for the MTProto transport and auth-key core.
//!
//! Provides:
//! - AES-256-IGE block chaining and a continuous AES-256-CTR keystream
//! - A `sha1!` hashing macro
//! - Pollard-rho PQ factorization
//! - Classic RSA raw-padding encryption for `req_DH_params`
//! - `AuthKey` — the 256-byte session key and its derived identifiers
//! - Nonce-pair to AES-IGE `(key, iv)` derivation

#![deny(unsafe_code)]

pub mod aes;
mod auth_key;
mod factorize;
mod nonce;
pub mod rsa;
mod sha;

pub use auth_key::AuthKey;
pub use factorize::factorize;
pub use nonce::generate_key_data_from_nonce;
pub use sha::sha1_bytes;

/// Not part of the public API. Lets the `sha1!` macro expand correctly
/// when invoked from other crates without requiring them to depend on
/// the `sha1` crate directly.
#[doc(hidden)]
pub mod __private {
    pub use sha1;
}
