//! Little/big-endian integer I/O and `tg_bytes` length-prefixed encoding.
//!
//! Scaled down from the generated-TL-catalogue split (`Cursor` /
//! `Serializable` / `Deserializable`) to the handful of primitives the
//! handshake and plaintext envelope actually need.

use crate::Error;

/// An append-only little-endian byte buffer.
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self { Self { buf: Vec::new() } }

    pub fn write_u32(&mut self, v: u32) { self.buf.extend_from_slice(&v.to_le_bytes()); }
    pub fn write_i32(&mut self, v: i32) { self.buf.extend_from_slice(&v.to_le_bytes()); }
    pub fn write_u64(&mut self, v: u64) { self.buf.extend_from_slice(&v.to_le_bytes()); }
    pub fn write_i64(&mut self, v: i64) { self.buf.extend_from_slice(&v.to_le_bytes()); }

    /// Big-endian counterparts, used only where the handshake's
    /// cryptographic constructors explicitly require them (pq/p/q/dh_prime/
    /// g_a/g_b — see §9's "signed vs unsigned decoding" note).
    pub fn write_u32_be(&mut self, v: u32) { self.buf.extend_from_slice(&v.to_be_bytes()); }
    pub fn write_i32_be(&mut self, v: i32) { self.buf.extend_from_slice(&v.to_be_bytes()); }
    pub fn write_u64_be(&mut self, v: u64) { self.buf.extend_from_slice(&v.to_be_bytes()); }
    pub fn write_i64_be(&mut self, v: i64) { self.buf.extend_from_slice(&v.to_be_bytes()); }

    pub fn write_raw(&mut self, data: &[u8]) { self.buf.extend_from_slice(data); }

    /// Write a `tg_bytes` length-prefixed, 4-byte-aligned byte string.
    pub fn write_tg_bytes(&mut self, data: &[u8]) {
        let prefix_len = if data.len() < 254 {
            self.buf.push(data.len() as u8);
            1
        } else {
            self.buf.push(0xfe);
            self.buf.push((data.len() & 0xff) as u8);
            self.buf.push(((data.len() >> 8) & 0xff) as u8);
            self.buf.push(((data.len() >> 16) & 0xff) as u8);
            4
        };
        self.buf.extend_from_slice(data);
        let written = prefix_len + data.len();
        let pad = (4 - written % 4) % 4;
        self.buf.extend(std::iter::repeat(0u8).take(pad));
    }

    pub fn into_bytes(self) -> Vec<u8> { self.buf }
    pub fn as_slice(&self) -> &[u8] { &self.buf }
}

/// A position-tracked view over a byte slice.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self { Self { data, pos: 0 } }

    pub fn pos(&self) -> usize { self.pos }
    pub fn remaining(&self) -> usize { self.data.len() - self.pos }

    pub fn read_raw(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.remaining() < n { return Err(Error::MalformedFrame); }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.read_raw(4)?.try_into().unwrap()))
    }
    pub fn read_i32(&mut self) -> Result<i32, Error> {
        Ok(i32::from_le_bytes(self.read_raw(4)?.try_into().unwrap()))
    }
    pub fn read_u64(&mut self) -> Result<u64, Error> {
        Ok(u64::from_le_bytes(self.read_raw(8)?.try_into().unwrap()))
    }
    pub fn read_i64(&mut self) -> Result<i64, Error> {
        Ok(i64::from_le_bytes(self.read_raw(8)?.try_into().unwrap()))
    }

    /// Big-endian counterparts, used only where the handshake's
    /// cryptographic constructors explicitly require them.
    pub fn read_u32_be(&mut self) -> Result<u32, Error> {
        Ok(u32::from_be_bytes(self.read_raw(4)?.try_into().unwrap()))
    }
    pub fn read_i32_be(&mut self) -> Result<i32, Error> {
        Ok(i32::from_be_bytes(self.read_raw(4)?.try_into().unwrap()))
    }
    pub fn read_u64_be(&mut self) -> Result<u64, Error> {
        Ok(u64::from_be_bytes(self.read_raw(8)?.try_into().unwrap()))
    }
    pub fn read_i64_be(&mut self) -> Result<i64, Error> {
        Ok(i64::from_be_bytes(self.read_raw(8)?.try_into().unwrap()))
    }

    /// Read a `tg_bytes` length-prefixed, 4-byte-aligned byte string.
    pub fn read_tg_bytes(&mut self) -> Result<Vec<u8>, Error> {
        let first = self.read_raw(1)?[0];
        let (len, prefix_len) = if first < 0xfe {
            (first as usize, 1usize)
        } else {
            let b = self.read_raw(3)?;
            let len = b[0] as usize | (b[1] as usize) << 8 | (b[2] as usize) << 16;
            (len, 4)
        };
        let payload = self.read_raw(len)?.to_vec();
        let written = prefix_len + len;
        let pad = (4 - written % 4) % 4;
        self.read_raw(pad)?;
        Ok(payload)
    }
}

/// Strip all leading zero bytes from a big-endian unsigned integer's byte
/// representation, keeping at least one byte (the minimal encoding
/// required for `pq`, `p`, `q`, `dh_prime`, `g_a`, `g_b`).
pub fn trim_be_unsigned(bytes: &[u8]) -> &[u8] {
    let skip = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    &bytes[skip..]
}

/// Encode `v` as a minimally-sized big-endian unsigned integer (no leading
/// zero bytes, at least one byte) — the wire form `pq`/`p`/`q` take inside
/// `PQInnerData`/`req_DH_params`.
pub fn u64_to_be_minimal(v: u64) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_u64_be(v);
    trim_be_unsigned(w.as_slice()).to_vec()
}

/// Decode a 1-to-8-byte minimally-encoded big-endian unsigned integer (as
/// read out of a `tg_bytes` field) back into a `u64`, left-zero-padding to
/// 8 bytes before the big-endian read.
pub fn u64_from_be_minimal(bytes: &[u8]) -> Result<u64, Error> {
    if bytes.is_empty() || bytes.len() > 8 {
        return Err(Error::MalformedFrame);
    }
    let mut padded = [0u8; 8];
    padded[8 - bytes.len()..].copy_from_slice(bytes);
    Reader::new(&padded).read_u64_be()
}
