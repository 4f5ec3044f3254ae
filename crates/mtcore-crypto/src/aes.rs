//! AES block-mode primitives used by the handshake: IGE for the encrypted
//! DH inner-data exchange, and a continuous-state CTR keystream for
//! transport obfuscation.

use aes::Aes256;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit, KeyIvInit, StreamCipher, generic_array::GenericArray};
use ctr::Ctr128BE;

// ─── AES-256-IGE ──────────────────────────────────────────────────────────────

/// Encrypt `data` in place with AES-256 in Infinite Garble Extension mode.
///
/// `key` is 32 bytes, `iv` is 32 bytes (`iv[0..16]` seeds the running
/// ciphertext block, `iv[16..32]` seeds the running plaintext block).
/// `data.len()` must be a non-zero multiple of 16.
pub fn ige_encrypt(data: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) {
    assert!(!data.is_empty() && data.len() % 16 == 0, "IGE input must be a multiple of 16 bytes");
    let cipher = Aes256::new(GenericArray::from_slice(key));

    let mut prev_cipher = [0u8; 16];
    let mut prev_plain = [0u8; 16];
    prev_cipher.copy_from_slice(&iv[..16]);
    prev_plain.copy_from_slice(&iv[16..]);

    for block in data.chunks_mut(16) {
        let mut buf = [0u8; 16];
        for i in 0..16 { buf[i] = block[i] ^ prev_cipher[i]; }

        let mut ga = *GenericArray::from_slice(&buf);
        cipher.encrypt_block(&mut ga);

        for i in 0..16 { buf[i] = ga[i] ^ prev_plain[i]; }

        prev_plain.copy_from_slice(block);
        block.copy_from_slice(&buf);
        prev_cipher.copy_from_slice(block);
    }
}

/// Decrypt `data` in place with AES-256-IGE. Same key/iv layout as
/// [`ige_encrypt`]; it is its own inverse given the same `(key, iv)`.
pub fn ige_decrypt(data: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) {
    assert!(!data.is_empty() && data.len() % 16 == 0, "IGE input must be a multiple of 16 bytes");
    let cipher = Aes256::new(GenericArray::from_slice(key));

    let mut prev_cipher = [0u8; 16];
    let mut prev_plain = [0u8; 16];
    prev_cipher.copy_from_slice(&iv[..16]);
    prev_plain.copy_from_slice(&iv[16..]);

    for block in data.chunks_mut(16) {
        let orig_cipher: [u8; 16] = block.try_into().unwrap();

        let mut buf = [0u8; 16];
        for i in 0..16 { buf[i] = block[i] ^ prev_plain[i]; }

        let mut ga = *GenericArray::from_slice(&buf);
        cipher.decrypt_block(&mut ga);

        for i in 0..16 { buf[i] = ga[i] ^ prev_cipher[i]; }

        block.copy_from_slice(&buf);
        prev_plain.copy_from_slice(block);
        prev_cipher = orig_cipher;
    }
}

// ─── AES-256-CTR keystream ────────────────────────────────────────────────────

/// A stateful AES-256-CTR keystream with continuous state across calls —
/// used to obfuscate an entire TCP byte stream rather than per-packet.
pub struct CtrStream(Ctr128BE<Aes256>);

impl CtrStream {
    /// Build a keystream from a 32-byte key and 16-byte initial counter/IV.
    pub fn new(key: &[u8; 32], iv: &[u8; 16]) -> Self {
        Self(Ctr128BE::new(key.into(), iv.into()))
    }

    /// XOR `data` in place with the next bytes of the keystream.
    pub fn apply(&mut self, data: &mut [u8]) {
        self.0.apply_keystream(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ige_round_trip() {
        let key = [0x2bu8; 32];
        let iv = [0x7cu8; 32];
        let mut data = (0..64u8).collect::<Vec<u8>>();
        let original = data.clone();

        ige_encrypt(&mut data, &key, &iv);
        assert_ne!(data, original);

        ige_decrypt(&mut data, &key, &iv);
        assert_eq!(data, original);
    }

    #[test]
    fn ige_changes_every_byte() {
        let key = [0x11u8; 32];
        let iv = [0x22u8; 32];
        let mut data = [0u8; 16];
        ige_encrypt(&mut data, &key, &iv);
        assert_ne!(data, [0u8; 16]);
    }

    #[test]
    fn ctr_stream_is_its_own_inverse() {
        let key = [0x5au8; 32];
        let iv = [0x01u8; 16];
        let plaintext = b"the quick brown fox jumps".to_vec();

        let mut enc = CtrStream::new(&key, &iv);
        let mut ciphertext = plaintext.clone();
        enc.apply(&mut ciphertext);
        assert_ne!(ciphertext, plaintext);

        let mut dec = CtrStream::new(&key, &iv);
        let mut roundtrip = ciphertext.clone();
        dec.apply(&mut roundtrip);
        assert_eq!(roundtrip, plaintext);
    }

    #[test]
    fn ctr_stream_state_is_continuous() {
        // Encrypting in two separate calls must equal one call over the
        // concatenation: the keystream must not reset between `apply`s.
        let key = [0x9fu8; 32];
        let iv = [0x00u8; 16];

        let mut one_shot = vec![0u8; 32];
        CtrStream::new(&key, &iv).apply(&mut one_shot);

        let mut split = vec![0u8; 32];
        let mut stream = CtrStream::new(&key, &iv);
        let (a, b) = split.split_at_mut(13);
        stream.apply(a);
        stream.apply(b);

        assert_eq!(one_shot, split);
    }
}
