//! RSA raw-padding encryption used by `req_DH_params`.
//!
//! This is Telegram's original (pre-2020) padding scheme: a SHA-1 digest of
//! the plaintext prefixed to the plaintext itself, random-padded to exactly
//! 255 bytes, then raw modular exponentiation (no PKCS#1 padding). It is a
//! simpler, older scheme than the `RSA-PAD` variant Telegram's current
//! clients use for `req_DH_params`; this core targets the classic one.

use num_bigint::BigUint;

use crate::sha1;

/// An RSA public key (`n`, `e`).
pub struct Key {
    n: BigUint,
    e: BigUint,
}

impl Key {
    /// Parse decimal `n` and `e` strings.
    pub fn new(n: &str, e: &str) -> Option<Self> {
        Some(Self {
            n: BigUint::parse_bytes(n.as_bytes(), 10)?,
            e: BigUint::parse_bytes(e.as_bytes(), 10)?,
        })
    }
}

/// RSA-encrypt `data` (the serialized `PQInnerData`) against `key`.
///
/// `random_pad` must supply at least `255 - 20 - data.len()` bytes; only
/// that many are consumed. `data` must be small enough to leave room for
/// the 20-byte SHA-1 prefix within the 255-byte block (`data.len() <= 235`).
/// Returns the 256-byte big-endian ciphertext, left-zero-padded.
pub fn encrypt(data: &[u8], key: &Key, random_pad: &[u8]) -> Vec<u8> {
    const BLOCK_LEN: usize = 255;
    let hash = sha1!(data);
    let pad_len = BLOCK_LEN - hash.len() - data.len();
    assert!(random_pad.len() >= pad_len, "not enough random padding for RSA block");

    let mut block = Vec::with_capacity(BLOCK_LEN);
    block.extend_from_slice(&hash);
    block.extend_from_slice(data);
    block.extend_from_slice(&random_pad[..pad_len]);
    debug_assert_eq!(block.len(), BLOCK_LEN);

    let m = BigUint::from_bytes_be(&block);
    let c = m.modpow(&key.e, &key.n);

    let mut out = c.to_bytes_be();
    while out.len() < 256 { out.insert(0, 0); }
    out
}

/// RSA public key by server fingerprint. Includes both production and test
/// DC keys, the same pair Telegram publishes for its official clients.
#[allow(clippy::unreadable_literal)]
pub fn key_for_fingerprint(fp: i64) -> Option<Key> {
    Some(match fp {
        // Production DC key (fingerprint -3414540481677951611)
        -3414540481677951611 => Key::new(
            "29379598170669337022986177149456128565388431120058863768162556424047512191330847455146576344487764408661701890505066208632169112269581063774293102577308490531282748465986139880977280302242772832972539403531316010870401287642763009136156734339538042419388722777357134487746169093539093850251243897188928735903389451772730245253062963384108812842079887538976360465290946139638691491496062099570836476454855996319192747663615955633778034897140982517446405334423701359108810182097749467210509584293428076654573384828809574217079944388301239431309115013843331317877374435868468779972014486325557807783825502498215169806323",
            "65537"
        )?,
        // Test DC key (fingerprint -5595554452916591101)
        -5595554452916591101 => Key::new(
            "25342889448840415564971689590713473206898847759084779052582026594546022463853940585885215951168491965708222649399180603818074200620463776135424884632162512403163793083921641631564740959529419359595852941166848940585952337613333022396096584117954892216031229237302943701877588456738335398602461675225081791820393153757504952636234951323237820036543581047826906120927972487366805292115792231423684261262330394324750785450942589751755390156647751460719351439969059949569615302809050721500330239005077889855323917509948255722081644689442127297605422579707142646660768825302832201908302295573257427896031830742328565032949",
            "65537"
        )?,
        _ => return None,
    })
}
