//! Nonce-derived key material for the AES-IGE-wrapped DH inner exchange.

use crate::sha1;

/// Derive `(key, iv)` for AES-256-IGE from `server_nonce` and `new_nonce`,
/// used to decrypt `ServerDhParams.encrypted_answer` and to encrypt the
/// client's `SetClientDhParams` payload.
pub fn generate_key_data_from_nonce(server_nonce: &[u8; 16], new_nonce: &[u8; 32]) -> ([u8; 32], [u8; 32]) {
    let h1 = sha1!(new_nonce, server_nonce);
    let h2 = sha1!(server_nonce, new_nonce);
    let h3 = sha1!(new_nonce, new_nonce);

    let mut key = [0u8; 32];
    key[..20].copy_from_slice(&h1);
    key[20..].copy_from_slice(&h2[..12]);

    let mut iv = [0u8; 32];
    iv[..8].copy_from_slice(&h2[12..]);
    iv[8..28].copy_from_slice(&h3);
    iv[28..].copy_from_slice(&new_nonce[..4]);

    (key, iv)
}
