//! Telegram `AuthKey` — the 256-byte shared secret produced by the DH handshake.

use crate::sha1;

/// A Telegram authorization key (256 bytes) plus its derived identifiers.
#[derive(Clone)]
pub struct AuthKey {
    data: [u8; 256],
    aux_hash: [u8; 8],
    key_id: [u8; 8],
}

impl AuthKey {
    /// Construct from the raw 256-byte DH output (`g_ab`, left-zero-padded).
    pub fn from_bytes(data: [u8; 256]) -> Self {
        let sha = sha1!(&data);
        let mut aux_hash = [0u8; 8];
        aux_hash.copy_from_slice(&sha[..8]);
        let mut key_id = [0u8; 8];
        key_id.copy_from_slice(&sha[12..20]);
        Self { data, aux_hash, key_id }
    }

    /// The raw 256-byte representation.
    pub fn to_bytes(&self) -> [u8; 256] { self.data }

    /// The 8-byte key identifier (`SHA1(key)[12..20]`).
    pub fn key_id(&self) -> [u8; 8] { self.key_id }

    /// The 8-byte auxiliary hash (`SHA1(key)[0..8]`), used to compute
    /// `retry_id` on a `dh_gen_retry` resend.
    pub fn aux_hash(&self) -> [u8; 8] { self.aux_hash }

    /// Compute the new-nonce hash expected in `dh_gen_ok/retry/fail`.
    ///
    /// `number` is `1` for `dh_gen_ok`, `2` for `dh_gen_retry`, `3` for
    /// `dh_gen_fail`.
    pub fn calc_new_nonce_hash(&self, new_nonce: &[u8; 32], number: u8) -> [u8; 16] {
        let mut data = Vec::with_capacity(32 + 1 + 8);
        data.extend_from_slice(new_nonce);
        data.push(number);
        data.extend_from_slice(&self.aux_hash);
        let sha = sha1!(&data);
        let mut out = [0u8; 16];
        out.copy_from_slice(&sha[4..]);
        out
    }
}

impl std::fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthKey(id={})", u64::from_le_bytes(self.key_id))
    }
}

impl PartialEq for AuthKey {
    fn eq(&self, other: &Self) -> bool { self.key_id == other.key_id }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_id_is_deterministic() {
        let data = [0x5au8; 256];
        let a = AuthKey::from_bytes(data);
        let b = AuthKey::from_bytes(data);
        assert_eq!(a.key_id(), b.key_id());
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_keys_have_distinct_ids() {
        let a = AuthKey::from_bytes([0x01u8; 256]);
        let b = AuthKey::from_bytes([0x02u8; 256]);
        assert_ne!(a.key_id(), b.key_id());
    }

    #[test]
    fn new_nonce_hash_is_16_bytes_from_sha1_tail() {
        let key = AuthKey::from_bytes([0x11u8; 256]);
        let new_nonce = [0x22u8; 32];
        let h1 = key.calc_new_nonce_hash(&new_nonce, 1);
        let h2 = key.calc_new_nonce_hash(&new_nonce, 2);
        assert_ne!(h1, h2, "the number byte must be mixed into the hash");
    }
}
