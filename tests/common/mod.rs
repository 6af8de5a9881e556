//! Scripted gateway used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rustfri::correlator::CorrelatorConfig;
use rustfri::error::{Result, TradfriError};
use rustfri::protocol::{Message, MessageType, Status, pack_message, unpack_message};
use rustfri::transport::{Dialer, MemoryTransport, Transport, validate_credentials};
use rustfri::Client;
use std::sync::Arc;
use tokio::time::Duration;

/// Maps a request to `(status, payload)`; `None` leaves it unanswered.
pub type Handler = Arc<dyn Fn(&Message) -> Option<(Status, Vec<u8>)> + Send + Sync>;

pub type RequestLog = Arc<Mutex<Vec<Message>>>;

pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&Message) -> Option<(Status, Vec<u8>)> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub fn test_config() -> CorrelatorConfig {
    CorrelatorConfig {
        response_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

/// Starts a gateway task answering on the far end of a memory pair.
pub fn spawn_gateway(handler: Handler) -> (Arc<MemoryTransport>, RequestLog) {
    let (client_end, gateway_end) = MemoryTransport::create_pair(16);
    let requests: RequestLog = Arc::new(Mutex::new(Vec::new()));
    let log = requests.clone();

    tokio::spawn(async move {
        while let Ok(data) = gateway_end.recv().await {
            let Ok(request) = unpack_message(&data) else {
                continue;
            };
            if request.mtype == MessageType::Acknowledgement {
                continue;
            }
            log.lock().push(request.clone());

            if let Some((status, payload)) = handler(&request) {
                let reply = Message {
                    mtype: MessageType::Acknowledgement,
                    code: status.code(),
                    message_id: request.message_id,
                    token: request.token.clone(),
                    payload,
                    ..Default::default()
                };
                let Ok(packed) = pack_message(&reply) else {
                    continue;
                };
                if gateway_end.send(&packed).await.is_err() {
                    break;
                }
            }
        }
    });

    (Arc::new(client_end), requests)
}

pub fn mock_client(handler: Handler, config: CorrelatorConfig) -> (Client, RequestLog) {
    let (transport, requests) = spawn_gateway(handler);
    (Client::with_transport(transport, config), requests)
}

pub struct Dialed {
    pub identity: String,
    pub key: Vec<u8>,
    pub transport: Arc<MemoryTransport>,
}

/// Dialer handing out sessions to a scripted gateway.
pub struct MockDialer {
    handler: Handler,
    accepted_key: Option<Vec<u8>>,
    pub dialed: Mutex<Vec<Dialed>>,
}

impl MockDialer {
    pub fn new(handler: Handler) -> Self {
        Self {
            handler,
            accepted_key: None,
            dialed: Mutex::new(Vec::new()),
        }
    }

    /// Fails the handshake, the way a real gateway does, for any other key.
    pub fn accepting_only(mut self, key: &[u8]) -> Self {
        self.accepted_key = Some(key.to_vec());
        self
    }

    pub fn dial_count(&self) -> usize {
        self.dialed.lock().len()
    }
}

#[async_trait]
impl Dialer for MockDialer {
    async fn dial(
        &self,
        _address: &str,
        identity: &str,
        key: &[u8],
    ) -> Result<Arc<dyn Transport>> {
        validate_credentials(identity, key)?;
        if self.accepted_key.as_deref().is_some_and(|accepted| accepted != key) {
            return Err(TradfriError::Network(
                "DTLS handshake failed: Alert is Fatal or Close Notify".to_string(),
            ));
        }
        let (transport, _) = spawn_gateway(self.handler.clone());
        self.dialed.lock().push(Dialed {
            identity: identity.to_string(),
            key: key.to_vec(),
            transport: transport.clone(),
        });
        Ok(transport)
    }
}
