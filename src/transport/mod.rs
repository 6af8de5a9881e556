//! Datagram transport to a single gateway.
//!
//! The correlator only needs whole-datagram send/receive and an idempotent
//! close, so the session is hidden behind the [`Transport`] trait. The
//! production implementation is a PSK-authenticated DTLS session
//! ([`dtls::DtlsTransport`]); [`memory::MemoryTransport`] connects two ends
//! in-process for tests and simulations.

pub mod dtls;
pub mod memory;

pub use dtls::{DtlsDialer, DtlsTransport};
pub use memory::MemoryTransport;

use crate::error::{Result, TradfriError};
use async_trait::async_trait;
use std::net::Ipv6Addr;
use std::sync::Arc;
use tokio::time::Duration;

/// Default CoAP-over-DTLS port of the gateway.
pub const DEFAULT_PORT: u16 = 5684;
/// Upper bound for the DTLS handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Receive buffer size; datagrams are never split.
pub const MAX_FRAME_SIZE: usize = 65 * 1024;

/// A connected, message-oriented channel to one peer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one whole datagram.
    async fn send(&self, datagram: &[u8]) -> Result<()>;

    /// Receives one whole datagram.
    ///
    /// Returns [`TradfriError::SessionClosed`] once the channel is gone for good;
    /// any other error is transient.
    async fn recv(&self) -> Result<Vec<u8>>;

    /// Closes the channel. Safe to call more than once.
    async fn close(&self);
}

/// Opens transports to a gateway.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, address: &str, identity: &str, key: &[u8])
    -> Result<Arc<dyn Transport>>;
}

/// Rejects empty identities or keys before any network activity.
pub fn validate_credentials(identity: &str, key: &[u8]) -> Result<()> {
    if identity.is_empty() {
        return Err(TradfriError::InvalidCredential("empty identity"));
    }
    if key.is_empty() {
        return Err(TradfriError::InvalidCredential("empty key"));
    }
    Ok(())
}

/// Appends [`DEFAULT_PORT`] when the address carries no port.
///
/// Accepts `host`, `host:port`, bare IPv6 literals and `[v6]` / `[v6]:port`.
pub fn normalize_address(address: &str) -> String {
    let address = address.trim();
    if let Some(rest) = address.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((_, port)) if port.starts_with(':') => address.to_string(),
            _ => format!("{}:{}", address, DEFAULT_PORT),
        };
    }
    if address.parse::<Ipv6Addr>().is_ok() {
        return format!("[{}]:{}", address, DEFAULT_PORT);
    }
    if address.contains(':') {
        address.to_string()
    } else {
        format!("{}:{}", address, DEFAULT_PORT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_is_appended() {
        assert_eq!(normalize_address("192.168.1.10"), "192.168.1.10:5684");
        assert_eq!(normalize_address("gw.local"), "gw.local:5684");
        assert_eq!(normalize_address("192.168.1.10:6000"), "192.168.1.10:6000");
        assert_eq!(normalize_address("fe80::1"), "[fe80::1]:5684");
        assert_eq!(normalize_address("[fe80::1]"), "[fe80::1]:5684");
        assert_eq!(normalize_address("[fe80::1]:6000"), "[fe80::1]:6000");
    }

    #[test]
    fn empty_credentials_are_rejected() {
        assert_eq!(
            validate_credentials("", b"key"),
            Err(TradfriError::InvalidCredential("empty identity"))
        );
        assert_eq!(
            validate_credentials("client", b""),
            Err(TradfriError::InvalidCredential("empty key"))
        );
        assert!(validate_credentials("", b"").is_err());
        assert!(validate_credentials("client", b"key").is_ok());
    }
}
