//! The unencrypted MTProto message envelope used only during handshake.

use std::io::{Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::transport::TransportFramer;
use crate::wire::{Reader, Writer};
use crate::Error;

/// Builds and parses the MTProto "plain" envelope
/// (`auth_key_id(0) || msg_id || msg_len || payload`) on top of a
/// [`TransportFramer`].
pub struct PlainSender<S> {
    framer: TransportFramer<S>,
    last_msg_id: u64,
}

impl<S: Read + Write> PlainSender<S> {
    pub fn new(framer: TransportFramer<S>) -> Self {
        Self { framer, last_msg_id: 0 }
    }

    /// A monotonically increasing message id: seconds in the high 32 bits,
    /// sub-second nanoseconds in the low 32 bits with the low two bits
    /// cleared. Bumped to `last + 4` if the clock-derived value would not
    /// strictly increase (clock went backward, or two calls landed in the
    /// same nanosecond bucket).
    fn next_msg_id(&mut self) -> u64 {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        let mut id = (now.as_secs() << 32) | (u64::from(now.subsec_nanos()) & !0b11);
        if id <= self.last_msg_id {
            id = self.last_msg_id + 4;
        }
        self.last_msg_id = id;
        id
    }

    /// Send `payload` wrapped in the plaintext envelope.
    pub fn send(&mut self, payload: &[u8]) -> Result<(), Error> {
        let msg_id = self.next_msg_id();
        let mut w = Writer::new();
        w.write_u64(0); // auth_key_id
        w.write_u64(msg_id);
        w.write_i32(payload.len() as i32);
        w.write_raw(payload);
        self.framer.send(&w.into_bytes())
    }

    /// Receive the next plaintext envelope, stripping it down to the payload.
    ///
    /// `msg_id` validity is not enforced here — that belongs to the (out of
    /// core) session layer.
    pub fn recv(&mut self) -> Result<Vec<u8>, Error> {
        let raw = self.framer.recv()?;
        let mut r = Reader::new(&raw);
        let auth_key_id = r.read_u64()?;
        if auth_key_id != 0 {
            return Err(Error::ProtocolMismatch(format!(
                "plaintext response carried non-zero auth_key_id {auth_key_id:#x}"
            )));
        }
        let _msg_id = r.read_u64()?;
        let len = r.read_i32()?;
        if len < 0 {
            return Err(Error::MalformedFrame);
        }
        Ok(r.read_raw(len as usize)?.to_vec())
    }

    pub fn framer_mut(&mut self) -> &mut TransportFramer<S> { &mut self.framer }
    pub fn into_framer(self) -> TransportFramer<S> { self.framer }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ConnectionMode;
    use std::collections::VecDeque;

    #[test]
    fn envelope_round_trip() {
        let pipe: VecDeque<u8> = VecDeque::new();
        let framer = TransportFramer::new(pipe, ConnectionMode::Intermediate).unwrap();
        let mut sender = PlainSender::new(framer);

        sender.send(b"req_pq_multi body").unwrap();
        let got = sender.recv().unwrap();
        assert_eq!(got, b"req_pq_multi body");
    }

    #[test]
    fn msg_ids_strictly_increase() {
        let pipe: VecDeque<u8> = VecDeque::new();
        let framer = TransportFramer::new(pipe, ConnectionMode::Intermediate).unwrap();
        let mut sender = PlainSender::new(framer);

        let a = sender.next_msg_id();
        let b = sender.next_msg_id();
        let c = sender.next_msg_id();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn rejects_nonzero_auth_key_id() {
        let pipe: VecDeque<u8> = VecDeque::new();
        let framer = TransportFramer::new(pipe, ConnectionMode::Intermediate).unwrap();
        let mut sender = PlainSender::new(framer);

        let mut w = Writer::new();
        w.write_u64(1); // non-zero auth_key_id
        w.write_u64(0);
        w.write_i32(0);
        sender.framer_mut().send(&w.into_bytes()).unwrap();

        let err = sender.recv().unwrap_err();
        assert!(matches!(err, Error::ProtocolMismatch(_)));
    }
}
