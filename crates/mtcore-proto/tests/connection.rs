//! Exercises the public `Connection`/`Config` surface against sockets this
//! process controls, without depending on a live Telegram endpoint.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use mtcore_proto::config::{Config, ProxyConnector};
use mtcore_proto::{Connection, Error};

struct FixedConnector(std::net::SocketAddr);

impl ProxyConnector for FixedConnector {
    fn connect(&self, _addr: &str, timeout: Duration) -> std::io::Result<TcpStream> {
        TcpStream::connect_timeout(&self.0, timeout)
    }
}

/// A listener that accepts and immediately drops every connection,
/// simulating a server that refuses the handshake outright.
fn spawn_hangup_server() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        for stream in listener.incoming().take(8) {
            if let Ok(stream) = stream {
                drop(stream);
            }
        }
    });
    addr
}

#[test]
fn connection_closed_surfaces_on_first_attempt_without_retrying() {
    let addr = spawn_hangup_server();
    let config = Config::new(mtcore_proto::ConnectionMode::Intermediate)
        .with_timeout(Duration::from_millis(500))
        .with_retries(3)
        .with_connector(Box::new(FixedConnector(addr)));

    let conn = Connection::new(addr.to_string(), config);
    let err = conn.generate_auth_key().unwrap_err();
    // A server that closes the socket immediately after accept surfaces as
    // either a connection-closed or a malformed-frame error depending on
    // exactly how much of the first read lands before the reset — per
    // spec §7 neither is retried by the outer driver, so this fails on the
    // very first attempt even though `retries` is 3.
    assert!(matches!(err, Error::ConnectionClosed | Error::Io(_) | Error::MalformedFrame));
}

/// A minimal fake server that speaks only enough of `intermediate` framing
/// to prove `Connection` drives the wire protocol correctly up through
/// `req_pq_multi`, then hangs up — enough to prove the client sent a
/// well-formed first frame without needing a real RSA private key.
#[test]
fn first_frame_is_a_well_formed_req_pq_multi_envelope() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut prefix = [0u8; 4];
        stream.read_exact(&mut prefix).unwrap();
        assert_eq!(prefix, [0xee, 0xee, 0xee, 0xee]);

        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).unwrap();
        let len = u32::from_le_bytes(len_buf) as usize;
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).unwrap();

        // auth_key_id(8, zero) || msg_id(8) || len(4) || req_pq_multi payload
        assert_eq!(&body[..8], &[0u8; 8]);
        let payload_len = u32::from_le_bytes(body[16..20].try_into().unwrap()) as usize;
        assert_eq!(payload_len, 20); // constructor(4) + nonce(16)
        let ctor = u32::from_le_bytes(body[20..24].try_into().unwrap());
        assert_eq!(ctor, 0x6046_9778);

        // Hang up without answering; the client will report a connection
        // error, which is fine — this test only checks the outbound frame.
        drop(stream);
    });

    let config = Config::new(mtcore_proto::ConnectionMode::Intermediate)
        .with_timeout(Duration::from_millis(500))
        .with_retries(1)
        .with_connector(Box::new(FixedConnector(addr)));
    let conn = Connection::new(addr.to_string(), config);
    let _ = conn.generate_auth_key(); // expected to fail; frame shape already asserted server-side

    handle.join().unwrap();
}
