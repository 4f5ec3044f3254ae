//! MTProto transport framing and the Diffie–Hellman authorization-key
//! handshake over a blocking TCP socket.
//!
//! - [`wire`] — `tg_bytes` length-prefixed encoding, the integer
//!   primitives the handshake needs.
//! - [`transport`] — `full` / `intermediate` / `abridged` / `obfuscated`
//!   framing via [`transport::TransportFramer`].
//! - [`plain`] — the unencrypted message envelope used only during
//!   handshake, via [`plain::PlainSender`].
//! - [`authentication`] — the three-round DH key exchange.
//! - [`config`] / [`connection`] — dialing, timeouts, retries, and the
//!   single-call [`connection::Connection::generate_auth_key`] entry point.

#![deny(unsafe_code)]

pub mod authentication;
pub mod config;
pub mod connection;
mod error;
pub mod plain;
pub mod transport;
pub mod wire;

pub use authentication::Finished;
pub use config::Config;
pub use connection::Connection;
pub use error::Error;
pub use transport::ConnectionMode;
