//! PSK-authenticated DTLS session over a connected UDP socket.

use super::{CONNECT_TIMEOUT, Dialer, MAX_FRAME_SIZE, Transport};
use super::{normalize_address, validate_credentials};
use crate::error::{Result, TradfriError};
use async_trait::async_trait;
use log::{debug, info};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::{UdpSocket, lookup_host};
use tokio::time::{Duration, timeout};
use webrtc_dtls::cipher_suite::CipherSuiteId;
use webrtc_dtls::config::Config;
use webrtc_dtls::conn::DTLSConn;
use webrtc_util::conn::Conn;

/// One live DTLS session to a gateway.
pub struct DtlsTransport {
    conn: DTLSConn,
    remote: SocketAddr,
    closed: AtomicBool,
}

impl DtlsTransport {
    /// Resolves `address`, connects and performs the PSK handshake.
    ///
    /// Credentials are checked before anything touches the network.
    pub async fn open(
        address: &str,
        identity: &str,
        key: &[u8],
        connect_timeout: Duration,
    ) -> Result<Self> {
        validate_credentials(identity, key)?;

        let address = normalize_address(address);
        let remote = lookup_host(&address)
            .await
            .map_err(|e| TradfriError::Network(format!("Failed to resolve {}: {}", address, e)))?
            .next()
            .ok_or_else(|| TradfriError::Network(format!("No address found for {}", address)))?;

        let local: SocketAddr = if remote.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(remote).await?;
        let socket: Arc<dyn Conn + Send + Sync> = Arc::new(socket);

        let psk_bytes = key.to_vec();
        let config = Config {
            psk: Some(Arc::new(move |_hint: &[u8]| {
                Ok::<Vec<u8>, webrtc_dtls::Error>(psk_bytes.clone())
            })),
            psk_identity_hint: Some(identity.as_bytes().to_vec()),
            cipher_suites: vec![CipherSuiteId::Tls_Psk_With_Aes_128_Ccm_8],
            ..Default::default()
        };

        info!("Connecting to gateway at {} as '{}'", remote, identity);
        let conn = timeout(
            connect_timeout,
            DTLSConn::new(socket, config, true, None),
        )
        .await
        .map_err(|_| TradfriError::ConnectTimeout)?
        .map_err(|e| TradfriError::Network(format!("DTLS handshake failed: {}", e)))?;

        debug!("DTLS session established with {}", remote);
        Ok(Self {
            conn,
            remote,
            closed: AtomicBool::new(false),
        })
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// Errors meaning the session can never carry another datagram map to
    /// `SessionClosed`. A peer close_notify or fatal alert drops the
    /// decrypted channel, after which every read fails the same way.
    fn classify(&self, err: webrtc_dtls::Error) -> TradfriError {
        let gone = matches!(
            err,
            webrtc_dtls::Error::ErrConnClosed | webrtc_dtls::Error::ErrAlertFatalOrClose
        );
        if gone || self.closed.load(Ordering::SeqCst) {
            TradfriError::SessionClosed
        } else {
            TradfriError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl Transport for DtlsTransport {
    async fn send(&self, datagram: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TradfriError::SessionClosed);
        }
        self.conn
            .write(datagram, None)
            .await
            .map(|_| ())
            .map_err(|e| self.classify(e))
    }

    async fn recv(&self) -> Result<Vec<u8>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TradfriError::SessionClosed);
        }
        let mut buf = vec![0u8; MAX_FRAME_SIZE];
        let len = self
            .conn
            .read(&mut buf, None)
            .await
            .map_err(|e| self.classify(e))?;
        buf.truncate(len);
        Ok(buf)
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Closing DTLS session with {}", self.remote);
        if let Err(e) = self.conn.close().await {
            debug!("DTLS close for {} reported: {}", self.remote, e);
        }
    }
}

/// Dials [`DtlsTransport`] sessions.
#[derive(Debug, Clone)]
pub struct DtlsDialer {
    pub connect_timeout: Duration,
}

impl Default for DtlsDialer {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

impl DtlsDialer {
    pub fn with_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

#[async_trait]
impl Dialer for DtlsDialer {
    async fn dial(
        &self,
        address: &str,
        identity: &str,
        key: &[u8],
    ) -> Result<Arc<dyn Transport>> {
        let transport = DtlsTransport::open(address, identity, key, self.connect_timeout).await?;
        Ok(Arc::new(transport))
    }
}
