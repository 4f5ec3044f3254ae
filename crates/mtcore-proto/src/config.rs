//! Connection configuration: timeouts, retry budget, and optional proxying.

use std::io;
use std::net::TcpStream;
use std::time::Duration;

use crate::transport::ConnectionMode;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_RETRIES: u32 = 5;

/// Dials a `TcpStream` to a server address. Implemented directly for a
/// plain connection; a SOCKS5 hop or other proxy layers in front of the
/// same interface.
pub trait ProxyConnector: Send + Sync {
    fn connect(&self, addr: &str, timeout: Duration) -> io::Result<TcpStream>;
}

/// Connects directly, with no intermediate proxy.
pub struct DirectConnector;

impl ProxyConnector for DirectConnector {
    fn connect(&self, addr: &str, timeout: Duration) -> io::Result<TcpStream> {
        use std::net::ToSocketAddrs;
        let socket_addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("no address resolved for {addr}")))?;
        TcpStream::connect_timeout(&socket_addr, timeout)
    }
}

/// How a [`Connection`](crate::connection::Connection) dials and retries.
pub struct Config {
    pub mode: ConnectionMode,
    pub timeout: Duration,
    retries: u32,
    pub connector: Box<dyn ProxyConnector>,
}

impl Config {
    pub fn new(mode: ConnectionMode) -> Self {
        Self {
            mode,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            connector: Box::new(DirectConnector),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the handshake retry budget. Clamped to at least 1 — a
    /// handshake always gets at least one attempt.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries.max(1);
        self
    }

    pub fn with_connector(mut self, connector: Box<dyn ProxyConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn retries(&self) -> u32 { self.retries }
}

impl Default for Config {
    fn default() -> Self { Self::new(ConnectionMode::Intermediate) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_clamp_to_at_least_one() {
        let cfg = Config::new(ConnectionMode::Abridged).with_retries(0);
        assert_eq!(cfg.retries(), 1);
    }

    #[test]
    fn default_config_is_intermediate_with_five_retries() {
        let cfg = Config::default();
        assert_eq!(cfg.mode, ConnectionMode::Intermediate);
        assert_eq!(cfg.retries(), 5);
    }
}
