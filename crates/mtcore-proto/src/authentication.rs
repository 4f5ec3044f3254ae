//! The three-round Diffie–Hellman authorization-key handshake.
//!
//! ```text
//! let (req, s1) = authentication::step1()?;
//! // send req, receive resp
//! let (req, s2) = authentication::step2(s1, &resp)?;
//! // send req, receive resp
//! let (req, s3) = authentication::step3(s2, &resp)?;
//! // send req, receive resp
//! match authentication::finish(s3, &resp)? {
//!     FinishOutcome::Done(finished) => { /* auth_key ready */ }
//!     FinishOutcome::Retry(req, s3) => { /* resend req, call finish again */ }
//! }
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use mtcore_crypto::{aes, factorize, generate_key_data_from_nonce, rsa, AuthKey};
use num_bigint::BigUint;

use crate::wire::{u64_from_be_minimal, u64_to_be_minimal, Reader, Writer};
use crate::Error;

// ─── Constructor ids (§4.5) ───────────────────────────────────────────────────

const ID_REQ_PQ_MULTI: u32 = 0x6046_9778;
const ID_RES_PQ: u32 = 0x0516_2463;
const ID_VECTOR: u32 = 0x1cb5_c415;
const ID_PQ_INNER_DATA: u32 = 0x83c9_5aec;
const ID_REQ_DH_PARAMS: u32 = 0xd712_e4be;
const ID_SERVER_DH_PARAMS_FAIL: u32 = 0x79cb_045d;
const ID_SERVER_DH_PARAMS_OK: u32 = 0xd0e8_075c;
const ID_SERVER_DH_INNER_DATA: u32 = 0xb589_0dba;
const ID_SET_CLIENT_DH_PARAMS: u32 = 0xf504_5f1f;
const ID_CLIENT_DH_INNER_DATA: u32 = 0x6643_b654;
const ID_DH_GEN_OK: u32 = 0x3bcb_f734;
const ID_DH_GEN_RETRY: u32 = 0x46dc_1fb9;
const ID_DH_GEN_FAIL: u32 = 0xa69d_ae02;

// ─── Wire requests / responses ────────────────────────────────────────────────

pub struct ReqPqMulti { pub nonce: [u8; 16] }

impl ReqPqMulti {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_u32(ID_REQ_PQ_MULTI);
        w.write_raw(&self.nonce);
        w.into_bytes()
    }
}

pub struct ResPq {
    pub nonce: [u8; 16],
    pub server_nonce: [u8; 16],
    pub pq: Vec<u8>,
    pub fingerprints: Vec<i64>,
}

impl ResPq {
    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(data);
        let ctor = r.read_u32()?;
        if ctor != ID_RES_PQ {
            return Err(Error::ProtocolMismatch(format!("expected res_pq, got {ctor:#010x}")));
        }
        let nonce = r.read_raw(16)?.try_into().unwrap();
        let server_nonce = r.read_raw(16)?.try_into().unwrap();
        let pq = r.read_tg_bytes()?;
        let vector_id = r.read_u32()?;
        if vector_id != ID_VECTOR {
            return Err(Error::ProtocolMismatch(format!("expected vector tag, got {vector_id:#010x}")));
        }
        let count = r.read_i32()?;
        if count < 0 {
            return Err(Error::MalformedFrame);
        }
        let mut fingerprints = Vec::with_capacity(count as usize);
        for _ in 0..count {
            fingerprints.push(r.read_i64()?);
        }
        Ok(Self { nonce, server_nonce, pq, fingerprints })
    }
}

pub struct ReqDhParams {
    pub nonce: [u8; 16],
    pub server_nonce: [u8; 16],
    pub p: Vec<u8>,
    pub q: Vec<u8>,
    pub fingerprint: i64,
    pub encrypted_data: Vec<u8>,
}

impl ReqDhParams {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_u32(ID_REQ_DH_PARAMS);
        w.write_raw(&self.nonce);
        w.write_raw(&self.server_nonce);
        w.write_tg_bytes(&self.p);
        w.write_tg_bytes(&self.q);
        w.write_i64(self.fingerprint);
        w.write_tg_bytes(&self.encrypted_data);
        w.into_bytes()
    }
}

pub enum ServerDhParams {
    Ok { nonce: [u8; 16], server_nonce: [u8; 16], encrypted_answer: Vec<u8> },
    Fail { nonce: [u8; 16], server_nonce: [u8; 16], new_nonce_hash: [u8; 16] },
}

impl ServerDhParams {
    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(data);
        let ctor = r.read_u32()?;
        let nonce = r.read_raw(16)?.try_into().unwrap();
        let server_nonce = r.read_raw(16)?.try_into().unwrap();
        match ctor {
            ID_SERVER_DH_PARAMS_FAIL => {
                let new_nonce_hash = r.read_raw(16)?.try_into().unwrap();
                Ok(Self::Fail { nonce, server_nonce, new_nonce_hash })
            }
            ID_SERVER_DH_PARAMS_OK => {
                let encrypted_answer = r.read_tg_bytes()?;
                Ok(Self::Ok { nonce, server_nonce, encrypted_answer })
            }
            other => Err(Error::ProtocolMismatch(format!("unexpected server_DH_params constructor {other:#010x}"))),
        }
    }
}

struct ServerDhInnerData {
    nonce: [u8; 16],
    server_nonce: [u8; 16],
    g: i32,
    dh_prime: Vec<u8>,
    g_a: Vec<u8>,
    server_time: i32,
}

impl ServerDhInnerData {
    fn from_bytes(data: &[u8]) -> Result<(Self, usize), Error> {
        let mut r = Reader::new(data);
        let ctor = r.read_u32()?;
        if ctor != ID_SERVER_DH_INNER_DATA {
            return Err(Error::ProtocolMismatch(format!("expected server_DH_inner_data, got {ctor:#010x}")));
        }
        let nonce = r.read_raw(16)?.try_into().unwrap();
        let server_nonce = r.read_raw(16)?.try_into().unwrap();
        let g = r.read_i32()?;
        let dh_prime = r.read_tg_bytes()?;
        let g_a = r.read_tg_bytes()?;
        let server_time = r.read_i32()?;
        let consumed = r.pos();
        Ok((Self { nonce, server_nonce, g, dh_prime, g_a, server_time }, consumed))
    }
}

pub struct SetClientDhParams {
    pub nonce: [u8; 16],
    pub server_nonce: [u8; 16],
    pub encrypted_data: Vec<u8>,
}

impl SetClientDhParams {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_u32(ID_SET_CLIENT_DH_PARAMS);
        w.write_raw(&self.nonce);
        w.write_raw(&self.server_nonce);
        w.write_tg_bytes(&self.encrypted_data);
        w.into_bytes()
    }
}

struct DhGenResponse { nonce: [u8; 16], server_nonce: [u8; 16], hash: [u8; 16], number: u8 }

impl DhGenResponse {
    fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(data);
        let ctor = r.read_u32()?;
        let nonce = r.read_raw(16)?.try_into().unwrap();
        let server_nonce = r.read_raw(16)?.try_into().unwrap();
        let hash = r.read_raw(16)?.try_into().unwrap();
        let number = match ctor {
            ID_DH_GEN_OK => 1,
            ID_DH_GEN_RETRY => 2,
            ID_DH_GEN_FAIL => 3,
            other => return Err(Error::ProtocolMismatch(format!("unexpected dh_gen answer {other:#010x}"))),
        };
        Ok(Self { nonce, server_nonce, hash, number })
    }
}

// ─── Step state ──────────────────────────────────────────────────────────────

pub struct Step1 { nonce: [u8; 16] }

pub struct Step2 { nonce: [u8; 16], server_nonce: [u8; 16], new_nonce: [u8; 32] }

/// State carried after step 3, including everything needed to resend
/// `set_client_DH_params` with a bumped `retry_id` on `dh_gen_retry` without
/// restarting the handshake.
pub struct Step3 {
    nonce: [u8; 16],
    server_nonce: [u8; 16],
    new_nonce: [u8; 32],
    gab: BigUint,
    time_offset: i32,
    g_b: Vec<u8>,
    key: [u8; 32],
    iv: [u8; 32],
}

/// The final output of a successful handshake.
#[derive(Clone, Debug, PartialEq)]
pub struct Finished {
    pub auth_key: [u8; 256],
    pub time_offset: i32,
    pub first_salt: i64,
}

/// What [`finish`] produces: either the handshake is done, or the server
/// asked for `dh_gen_retry` and a resend (reusing the same DH secret) is
/// required.
pub enum FinishOutcome {
    Done(Finished),
    Retry(SetClientDhParams, Step3),
}

// ─── Step 1: req_pq_multi ─────────────────────────────────────────────────────

pub fn step1() -> Result<(ReqPqMulti, Step1), Error> {
    let mut nonce = [0u8; 16];
    getrandom::getrandom(&mut nonce).map_err(getrandom_err)?;
    do_step1(&nonce)
}

fn do_step1(random: &[u8; 16]) -> Result<(ReqPqMulti, Step1), Error> {
    let nonce = *random;
    Ok((ReqPqMulti { nonce }, Step1 { nonce }))
}

// ─── Step 2: req_DH_params ────────────────────────────────────────────────────

pub fn step2(data: Step1, response: &ResPq) -> Result<(ReqDhParams, Step2), Error> {
    let mut rnd = [0u8; 32 + 235];
    getrandom::getrandom(&mut rnd).map_err(getrandom_err)?;
    do_step2(data, response, &rnd)
}

fn do_step2(data: Step1, response: &ResPq, random: &[u8]) -> Result<(ReqDhParams, Step2), Error> {
    let Step1 { nonce } = data;
    check_nonce(&response.nonce, &nonce)?;

    if response.pq.is_empty() || response.pq.len() > 8 {
        return Err(Error::SecurityError(format!("pq size {} invalid, expected 1..=8", response.pq.len())));
    }
    let pq = u64_from_be_minimal(&response.pq)?;
    let (p, q) = factorize(pq);

    let mut new_nonce = [0u8; 32];
    new_nonce.copy_from_slice(&random[..32]);
    let rand_pad = &random[32..];

    let p_bytes = u64_to_be_minimal(p);
    let q_bytes = u64_to_be_minimal(q);
    let pq_bytes = u64_to_be_minimal(pq);

    let mut inner = Writer::new();
    inner.write_u32(ID_PQ_INNER_DATA);
    inner.write_tg_bytes(&pq_bytes);
    inner.write_tg_bytes(&p_bytes);
    inner.write_tg_bytes(&q_bytes);
    inner.write_raw(&nonce);
    inner.write_raw(&response.server_nonce);
    inner.write_raw(&new_nonce);
    let inner_bytes = inner.into_bytes();

    let fingerprint = response.fingerprints.iter().copied()
        .find(|&fp| rsa::key_for_fingerprint(fp).is_some())
        .ok_or(Error::NoValidRsaKey)?;
    let key = rsa::key_for_fingerprint(fingerprint).unwrap();
    let ciphertext = rsa::encrypt(&inner_bytes, &key, rand_pad);

    Ok((
        ReqDhParams {
            nonce,
            server_nonce: response.server_nonce,
            p: p_bytes,
            q: q_bytes,
            fingerprint,
            encrypted_data: ciphertext,
        },
        Step2 { nonce, server_nonce: response.server_nonce, new_nonce },
    ))
}

// ─── Step 3: set_client_DH_params ─────────────────────────────────────────────

pub fn step3(data: Step2, response: &ServerDhParams) -> Result<(SetClientDhParams, Step3), Error> {
    let mut rnd = [0u8; 256 + 16];
    getrandom::getrandom(&mut rnd).map_err(getrandom_err)?;
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i32;
    do_step3(data, response, &rnd, now)
}

fn do_step3(data: Step2, response: &ServerDhParams, random: &[u8], now: i32) -> Result<(SetClientDhParams, Step3), Error> {
    let Step2 { nonce, server_nonce, new_nonce } = data;

    let encrypted_answer = match response {
        ServerDhParams::Fail { nonce: n, server_nonce: sn, .. } => {
            check_nonce(n, &nonce)?;
            check_server_nonce(sn, &server_nonce)?;
            return Err(Error::SecurityError("server_DH_params_fail".into()));
        }
        ServerDhParams::Ok { nonce: n, server_nonce: sn, encrypted_answer } => {
            check_nonce(n, &nonce)?;
            check_server_nonce(sn, &server_nonce)?;
            encrypted_answer
        }
    };

    if encrypted_answer.len() % 16 != 0 {
        return Err(Error::MalformedFrame);
    }

    let (key, iv) = generate_key_data_from_nonce(&server_nonce, &new_nonce);
    let mut plain = encrypted_answer.clone();
    aes::ige_decrypt(&mut plain, &key, &iv);

    if plain.len() < 20 {
        return Err(Error::MalformedFrame);
    }
    let got_hash: [u8; 20] = plain[..20].try_into().unwrap();
    let (inner, consumed) = ServerDhInnerData::from_bytes(&plain[20..])?;

    let expected_hash = mtcore_crypto_sha1(&plain[20..20 + consumed]);
    if got_hash != expected_hash {
        return Err(Error::SecurityError("server_DH_inner_data hash mismatch".into()));
    }

    check_nonce(&inner.nonce, &nonce)?;
    check_server_nonce(&inner.server_nonce, &server_nonce)?;

    let dh_prime = BigUint::from_bytes_be(&inner.dh_prime);
    if dh_prime.bits() != 2048 {
        return Err(Error::SecurityError(format!("dh_prime is {} bits, expected 2048", dh_prime.bits())));
    }
    if !(2..=7).contains(&inner.g) {
        return Err(Error::SecurityError(format!("g={} not in {{2..7}}", inner.g)));
    }
    let g = BigUint::from(inner.g as u32);
    let g_a = BigUint::from_bytes_be(&inner.g_a);
    let time_offset = inner.server_time - now;

    let b = BigUint::from_bytes_be(&random[..256]);
    let g_b = g.modpow(&b, &dh_prime);
    let gab = g_a.modpow(&b, &dh_prime);

    let one = BigUint::from(1u32);
    check_range(&g_a, &one, &(&dh_prime - &one))?;
    check_range(&g_b, &one, &(&dh_prime - &one))?;
    let safety = one.clone() << 2048usize.saturating_sub(64);
    check_range(&g_a, &safety, &(&dh_prime - &safety))?;
    check_range(&g_b, &safety, &(&dh_prime - &safety))?;

    let g_b_bytes = g_b.to_bytes_be();
    let req = build_set_client_dh_params(nonce, server_nonce, new_nonce, 0, &g_b_bytes, &key, &iv, &random[256..]);

    Ok((req, Step3 { nonce, server_nonce, new_nonce, gab, time_offset, g_b: g_b_bytes, key, iv }))
}

/// Build the `set_client_DH_params` request + AES-IGE-wrapped
/// `client_DH_inner_data` for a given `retry_id`.
fn build_set_client_dh_params(
    nonce: [u8; 16],
    server_nonce: [u8; 16],
    new_nonce: [u8; 32],
    retry_id: i64,
    g_b: &[u8],
    key: &[u8; 32],
    iv: &[u8; 32],
    rand_pad: &[u8],
) -> SetClientDhParams {
    let mut inner = Writer::new();
    inner.write_u32(ID_CLIENT_DH_INNER_DATA);
    inner.write_raw(&nonce);
    inner.write_raw(&server_nonce);
    inner.write_i64(retry_id);
    inner.write_tg_bytes(g_b);
    let inner_bytes = inner.into_bytes();

    let digest = mtcore_crypto_sha1(&inner_bytes);
    let pad_len = (16 - (20 + inner_bytes.len()) % 16) % 16;

    let mut hashed = Vec::with_capacity(20 + inner_bytes.len() + pad_len);
    hashed.extend_from_slice(&digest);
    hashed.extend_from_slice(&inner_bytes);
    hashed.extend_from_slice(&rand_pad[..pad_len.min(rand_pad.len())]);
    while hashed.len() % 16 != 0 {
        hashed.push(0);
    }

    aes::ige_encrypt(&mut hashed, key, iv);

    SetClientDhParams { nonce, server_nonce, encrypted_data: hashed }
}

// ─── finish: dh_gen_ok / retry / fail ─────────────────────────────────────────

pub fn finish(data: Step3, response: &[u8]) -> Result<FinishOutcome, Error> {
    let dh = DhGenResponse::from_bytes(response)?;
    do_finish(data, dh)
}

fn do_finish(data: Step3, dh: DhGenResponse) -> Result<FinishOutcome, Error> {
    let Step3 { nonce, server_nonce, new_nonce, gab, time_offset, g_b, key, iv } = data;

    check_nonce(&dh.nonce, &nonce)?;
    check_server_nonce(&dh.server_nonce, &server_nonce)?;

    let mut key_bytes = [0u8; 256];
    let gab_bytes = gab.to_bytes_be();
    let skip = 256 - gab_bytes.len();
    key_bytes[skip..].copy_from_slice(&gab_bytes);
    let auth_key = AuthKey::from_bytes(key_bytes);

    let expected_hash = auth_key.calc_new_nonce_hash(&new_nonce, dh.number);
    if dh.hash != expected_hash {
        return Err(Error::SecurityError("new_nonce_hash mismatch".into()));
    }

    match dh.number {
        1 => {
            let mut salt_buf = [0u8; 8];
            for ((dst, a), b) in salt_buf.iter_mut().zip(&new_nonce[..8]).zip(&server_nonce[..8]) {
                *dst = a ^ b;
            }
            Ok(FinishOutcome::Done(Finished {
                auth_key: auth_key.to_bytes(),
                time_offset,
                first_salt: i64::from_le_bytes(salt_buf),
            }))
        }
        2 => {
            let mut rand_pad = [0u8; 16];
            getrandom::getrandom(&mut rand_pad).map_err(getrandom_err)?;
            let retry_id = i64::from_le_bytes(auth_key.aux_hash());
            let req = build_set_client_dh_params(nonce, server_nonce, new_nonce, retry_id, &g_b, &key, &iv, &rand_pad);
            Ok(FinishOutcome::Retry(
                req,
                Step3 { nonce, server_nonce, new_nonce, gab, time_offset, g_b, key, iv },
            ))
        }
        _ => Err(Error::SecurityError("dh_gen_fail".into())),
    }
}

// ─── Helpers ───────────────────────────────────────────────────────────────────

fn getrandom_err(_: getrandom::Error) -> Error {
    Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "getrandom failed"))
}

fn mtcore_crypto_sha1(data: &[u8]) -> [u8; 20] {
    mtcore_crypto::sha1_bytes(data)
}

fn check_nonce(got: &[u8; 16], expected: &[u8; 16]) -> Result<(), Error> {
    if got == expected { Ok(()) } else { Err(Error::SecurityError("nonce mismatch".into())) }
}
fn check_server_nonce(got: &[u8; 16], expected: &[u8; 16]) -> Result<(), Error> {
    if got == expected { Ok(()) } else { Err(Error::SecurityError("server_nonce mismatch".into())) }
}
fn check_range(val: &BigUint, lo: &BigUint, hi: &BigUint) -> Result<(), Error> {
    if lo < val && val < hi { Ok(()) } else { Err(Error::SecurityError("DH parameter out of range".into())) }
}
