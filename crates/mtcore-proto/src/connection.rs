//! Ties a dialed socket, the transport framer, and the handshake state
//! machine together behind a single retrying entry point.

use crate::authentication::{self, Finished, FinishOutcome};
use crate::config::Config;
use crate::plain::PlainSender;
use crate::transport::TransportFramer;
use crate::Error;

/// A not-yet-authorized MTProto endpoint: an address plus how to dial and
/// retry it. Running [`generate_auth_key`](Self::generate_auth_key) drives
/// the full handshake and returns the resulting [`Finished`] key material.
pub struct Connection {
    addr: String,
    config: Config,
}

/// Bounds how many times a single handshake attempt will resend
/// `set_client_DH_params` in response to `dh_gen_retry` before giving up on
/// that attempt (distinct from [`Config::retries`](Config::retries), which
/// bounds full restarts from `req_pq_multi`).
const MAX_DH_GEN_RETRIES: u32 = 5;

impl Connection {
    pub fn new(addr: impl Into<String>, config: Config) -> Self {
        Self { addr: addr.into(), config }
    }

    /// Run the handshake, restarting from `req_pq_multi` up to
    /// `config.retries()` times on a security error or protocol mismatch
    /// (an exhausted `dh_gen_retry` budget surfaces as one of these too).
    /// Per spec §7, every other error kind — `InvalidChecksum`,
    /// `MalformedFrame`, `ConnectionClosed`, `Timeout`, `NoValidRsaKey`,
    /// `Io` — is surfaced to the caller on first occurrence instead of
    /// being retried here.
    pub fn generate_auth_key(&self) -> Result<Finished, Error> {
        let mut last_err = None;
        for attempt in 1..=self.config.retries() {
            match self.try_handshake() {
                Ok(finished) => return Ok(finished),
                Err(e @ (Error::SecurityError(_) | Error::ProtocolMismatch(_))) => {
                    log::warn!("handshake attempt {attempt}/{} failed: {e}", self.config.retries());
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.expect("retries() is clamped to at least 1"))
    }

    fn try_handshake(&self) -> Result<Finished, Error> {
        let stream = self.config.connector.connect(&self.addr, self.config.timeout)?;
        stream.set_read_timeout(Some(self.config.timeout))?;
        stream.set_write_timeout(Some(self.config.timeout))?;

        let framer = TransportFramer::new(stream, self.config.mode)?;
        let mut sender = PlainSender::new(framer);

        let (req, s1) = authentication::step1()?;
        log::debug!("sending req_pq_multi");
        sender.send(&req.to_bytes())?;

        let res_pq = authentication::ResPq::from_bytes(&sender.recv()?)?;
        let (req, s2) = authentication::step2(s1, &res_pq)?;
        log::debug!("sending req_DH_params");
        sender.send(&req.to_bytes())?;

        let dh_params = authentication::ServerDhParams::from_bytes(&sender.recv()?)?;
        let (req, mut s3) = authentication::step3(s2, &dh_params)?;
        log::debug!("sending set_client_DH_params");
        sender.send(&req.to_bytes())?;

        for _ in 0..MAX_DH_GEN_RETRIES {
            let raw = sender.recv()?;
            match authentication::finish(s3, &raw)? {
                FinishOutcome::Done(finished) => {
                    log::info!("authorization key established (time_offset={})", finished.time_offset);
                    return Ok(finished);
                }
                FinishOutcome::Retry(req, next_s3) => {
                    log::debug!("dh_gen_retry: resending set_client_DH_params with bumped retry_id");
                    sender.send(&req.to_bytes())?;
                    s3 = next_s3;
                }
            }
        }
        Err(Error::SecurityError("exhausted dh_gen_retry budget".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConnector;
    use std::io;
    use std::net::TcpStream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// A connector that always fails to dial and counts how many times it
    /// was asked to.
    struct CountingFailingConnector {
        attempts: Arc<AtomicUsize>,
        kind: io::ErrorKind,
    }

    impl ProxyConnector for CountingFailingConnector {
        fn connect(&self, _addr: &str, _timeout: Duration) -> io::Result<TcpStream> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::new(self.kind, "simulated dial failure"))
        }
    }

    /// `ConnectionClosed`/`Timeout`/`Io` must surface on the very first
    /// attempt, per spec §7, even when the retry budget allows more.
    #[test]
    fn non_security_errors_do_not_retry() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let config = Config::new(crate::transport::ConnectionMode::Intermediate)
            .with_retries(5)
            .with_connector(Box::new(CountingFailingConnector {
                attempts: attempts.clone(),
                kind: io::ErrorKind::ConnectionRefused,
            }));

        let conn = Connection::new("127.0.0.1:0", config);
        let err = conn.generate_auth_key().unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
