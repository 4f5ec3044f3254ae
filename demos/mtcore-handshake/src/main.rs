//! Dials a Telegram test datacenter, runs the DH handshake to completion,
//! and prints the resulting authorization key id.
//!
//! ```text
//! cargo run -p mtcore-handshake -- --mode abridged
//! ```

use std::env;
use std::time::Duration;

use mtcore_proto::config::Config;
use mtcore_proto::{Connection, ConnectionMode};

/// Test DC1 — safe to hammer during development, unlike the production DCs.
const DC1_TEST: &str = "149.154.167.40:80";

fn parse_mode(arg: Option<&str>) -> ConnectionMode {
    match arg {
        Some("full") => ConnectionMode::Full,
        Some("abridged") => ConnectionMode::Abridged,
        Some("obfuscated") => ConnectionMode::Obfuscated,
        _ => ConnectionMode::Intermediate,
    }
}

fn main() {
    env_logger::init();

    let mut mode_arg = None;
    let mut args = env::args().skip(1);
    while let Some(flag) = args.next() {
        if flag == "--mode" {
            mode_arg = args.next();
        }
    }
    let mode = parse_mode(mode_arg.as_deref());

    let config = Config::new(mode).with_timeout(Duration::from_secs(10)).with_retries(3);
    let conn = Connection::new(DC1_TEST, config);

    match conn.generate_auth_key() {
        Ok(finished) => {
            let auth_key = mtcore_crypto::AuthKey::from_bytes(finished.auth_key);
            println!("authorization key established");
            println!("  time_offset = {}", finished.time_offset);
            println!("  first_salt  = {}", finished.first_salt);
            println!("  key_id      = {:#018x}", u64::from_le_bytes(auth_key.key_id()));
        }
        Err(e) => {
            eprintln!("handshake against {DC1_TEST} failed: {e}");
            std::process::exit(1);
        }
    }
}
