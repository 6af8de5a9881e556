//! In-memory transport connecting two ends through tokio channels.
//!
//! Useful for exercising the correlator without sockets: one end is handed
//! to a [`Client`](crate::Client), the other is driven by a test responder
//! playing the gateway.

use super::Transport;
use crate::error::{Result, TradfriError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

pub struct MemoryTransport {
    /// Datagrams towards the peer
    to_peer: mpsc::Sender<Vec<u8>>,
    /// Datagrams from the peer
    from_peer: Mutex<mpsc::Receiver<Vec<u8>>>,
    closed: AtomicBool,
    cancel_token: CancellationToken,
}

impl MemoryTransport {
    pub fn new(to_peer: mpsc::Sender<Vec<u8>>, from_peer: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            to_peer,
            from_peer: Mutex::new(from_peer),
            closed: AtomicBool::new(false),
            cancel_token: CancellationToken::new(),
        }
    }

    /// Creates two connected ends, each buffering up to `buffer_size` datagrams.
    pub fn create_pair(buffer_size: usize) -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::channel(buffer_size);
        let (b_tx, b_rx) = mpsc::channel(buffer_size);
        (Self::new(a_tx, b_rx), Self::new(b_tx, a_rx))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, datagram: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(TradfriError::SessionClosed);
        }
        self.to_peer
            .send(datagram.to_vec())
            .await
            .map_err(|_| TradfriError::SessionClosed)
    }

    async fn recv(&self) -> Result<Vec<u8>> {
        if self.is_closed() {
            return Err(TradfriError::SessionClosed);
        }
        let mut rx = self.from_peer.lock().await;
        tokio::select! {
            _ = self.cancel_token.cancelled() => Err(TradfriError::SessionClosed),
            datagram = rx.recv() => datagram.ok_or(TradfriError::SessionClosed),
        }
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.cancel_token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_exchanges_datagrams() {
        let (a, b) = MemoryTransport::create_pair(4);
        a.send(b"ping").await.unwrap();
        assert_eq!(b.recv().await.unwrap(), b"ping");
        b.send(b"pong").await.unwrap();
        assert_eq!(a.recv().await.unwrap(), b"pong");
    }

    #[tokio::test]
    async fn close_is_idempotent_and_wakes_receiver() {
        let (a, _b) = MemoryTransport::create_pair(4);
        let a = std::sync::Arc::new(a);

        let reader = {
            let a = a.clone();
            tokio::spawn(async move { a.recv().await })
        };
        tokio::task::yield_now().await;

        a.close().await;
        a.close().await;
        assert_eq!(reader.await.unwrap(), Err(TradfriError::SessionClosed));
        assert_eq!(a.send(b"late").await, Err(TradfriError::SessionClosed));
    }

    #[tokio::test]
    async fn dropped_peer_reads_as_closed() {
        let (a, b) = MemoryTransport::create_pair(4);
        drop(b);
        assert_eq!(a.recv().await, Err(TradfriError::SessionClosed));
    }
}
