//! Error types shared across the transport and handshake layers.

use std::{fmt, io};

/// Errors that can occur while framing, driving the handshake, or talking to
/// the socket.
#[derive(Debug)]
pub enum Error {
    /// Nonce mismatch, invalid new-nonce hash, `dh_gen_fail`, out-of-range DH
    /// parameters, or no known RSA fingerprint.
    SecurityError(String),
    /// A constructor id was received where a specific one was required.
    ProtocolMismatch(String),
    /// `full`-mode CRC-32 mismatch on a received frame.
    InvalidChecksum,
    /// Short read, or a length field implying a negative or absurd size.
    MalformedFrame,
    /// The socket was closed mid-read or mid-write.
    ConnectionClosed,
    /// The socket's read deadline elapsed.
    Timeout,
    /// None of the server's advertised RSA fingerprints are known locally.
    NoValidRsaKey,
    /// Underlying socket I/O failure not otherwise classified above.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SecurityError(msg)    => write!(f, "security error: {msg}"),
            Self::ProtocolMismatch(msg) => write!(f, "protocol mismatch: {msg}"),
            Self::InvalidChecksum       => write!(f, "full-mode CRC-32 mismatch"),
            Self::MalformedFrame        => write!(f, "malformed frame"),
            Self::ConnectionClosed      => write!(f, "connection closed"),
            Self::Timeout               => write!(f, "read timed out"),
            Self::NoValidRsaKey         => write!(f, "no known RSA fingerprint advertised by server"),
            Self::Io(e)                 => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout,
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::ConnectionClosed,
            _ => Self::Io(e),
        }
    }
}
