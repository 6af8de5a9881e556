//! Typed gateway operations over one correlated session.
//!
//! Every operation is a single round trip: build the resource path, issue the
//! request, check the status, decode the JSON body.

use crate::correlator::{Correlator, CorrelatorConfig};
use crate::error::{Result, TradfriError};
use crate::models::{DeviceInfo, DeviceSettings, GatewayInfo, GroupInfo, SceneInfo};
use crate::protocol::{Message, Request, Status};
use crate::resource;
use crate::transport::{CONNECT_TIMEOUT, Dialer, DtlsDialer, Transport};
use log::{debug, info};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Settings for [`ClientBuilder::connect`].
pub struct ClientBuilder {
    address: String,
    identity: String,
    psk: Vec<u8>,
    connect_timeout: Duration,
    correlator: CorrelatorConfig,
    dialer: Option<Arc<dyn Dialer>>,
}

impl ClientBuilder {
    /// Address may omit the port; 5684 is assumed.
    pub fn new<A, I, K>(address: A, identity: I, psk: K) -> Self
    where
        A: Into<String>,
        I: Into<String>,
        K: Into<Vec<u8>>,
    {
        Self {
            address: address.into(),
            identity: identity.into(),
            psk: psk.into(),
            connect_timeout: CONNECT_TIMEOUT,
            correlator: CorrelatorConfig::default(),
            dialer: None,
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.correlator.response_timeout = timeout;
        self
    }

    /// How long a response nobody waits for is kept around.
    pub fn stale_after(mut self, window: Duration) -> Self {
        self.correlator.stale_after = window;
        self
    }

    pub fn max_unclaimed(mut self, max: usize) -> Self {
        self.correlator.max_unclaimed = max;
        self
    }

    /// Replaces the DTLS dialer; `connect_timeout` is then up to the dialer.
    pub fn dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = Some(dialer);
        self
    }

    /// Opens the session. Fails with `InvalidCredential` before any network
    /// activity when the identity or key is empty.
    pub async fn connect(self) -> Result<Client> {
        let transport = match &self.dialer {
            Some(dialer) => {
                dialer
                    .dial(&self.address, &self.identity, &self.psk)
                    .await?
            }
            None => {
                DtlsDialer::default()
                    .with_timeout(self.connect_timeout)
                    .dial(&self.address, &self.identity, &self.psk)
                    .await?
            }
        };
        info!("Connected to gateway {} as '{}'", self.address, self.identity);
        Ok(Client::with_transport(transport, self.correlator))
    }
}

/// Handle to one gateway session. Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct Client {
    correlator: Arc<Correlator>,
}

impl Client {
    /// Shortcut for `ClientBuilder::new(..).connect()` with default settings.
    pub async fn connect<A, I, K>(address: A, identity: I, psk: K) -> Result<Self>
    where
        A: Into<String>,
        I: Into<String>,
        K: Into<Vec<u8>>,
    {
        ClientBuilder::new(address, identity, psk).connect().await
    }

    /// Runs the client over an already established transport.
    pub fn with_transport(transport: Arc<dyn Transport>, config: CorrelatorConfig) -> Self {
        Self {
            correlator: Arc::new(Correlator::new(transport, config)),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.correlator.is_closed()
    }

    /// Issues a raw request and returns the response whatever its status.
    pub async fn request(&self, request: &Request) -> Result<Message> {
        self.correlator.round_trip(request).await
    }

    // -------------------------------------------------------------------------
    // Generic JSON access
    // -------------------------------------------------------------------------

    /// GETs `path` and decodes its body. Only 2.05 Content is accepted.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.request(&Request::get(path)).await?;
        expect_status(&response, Status::Content)?;
        decode(&response)
    }

    /// PUTs `body` as JSON to `path`. Only 2.04 Changed is accepted.
    pub async fn put_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<()> {
        let payload = serde_json::to_vec(body)?;
        let response = self.request(&Request::put(path, payload)).await?;
        expect_status(&response, Status::Changed)
    }

    // -------------------------------------------------------------------------
    // Gateway resources
    // -------------------------------------------------------------------------

    pub async fn gateway_info(&self) -> Result<GatewayInfo> {
        self.get_json(&resource::gateway_info()).await
    }

    pub async fn list_device_ids(&self) -> Result<Vec<u32>> {
        self.get_json(&resource::devices()).await
    }

    pub async fn device(&self, id: u32) -> Result<DeviceInfo> {
        self.get_json(&resource::device(id)).await
    }

    /// Fetches every device listed by the gateway, one request each.
    pub async fn devices(&self) -> Result<Vec<DeviceInfo>> {
        let mut devices = Vec::new();
        for id in self.list_device_ids().await? {
            devices.push(self.device(id).await?);
        }
        Ok(devices)
    }

    /// Sends only the attributes set in `settings`.
    pub async fn update_device(&self, id: u32, settings: &DeviceSettings) -> Result<()> {
        debug!("Updating device {}", id);
        self.put_json(&resource::device(id), settings).await
    }

    pub async fn list_group_ids(&self) -> Result<Vec<u32>> {
        self.get_json(&resource::groups()).await
    }

    pub async fn group(&self, id: u32) -> Result<GroupInfo> {
        self.get_json(&resource::group(id)).await
    }

    pub async fn list_scene_ids(&self, group_id: u32) -> Result<Vec<u32>> {
        self.get_json(&resource::scenes(group_id)).await
    }

    pub async fn scene(&self, group_id: u32, scene_id: u32) -> Result<SceneInfo> {
        self.get_json(&resource::scene(group_id, scene_id)).await
    }

    /// Ends the session. Safe to call more than once.
    pub async fn close(&self) {
        self.correlator.close().await;
    }
}

fn expect_status(response: &Message, expected: Status) -> Result<()> {
    let actual = response.status();
    if actual == expected {
        Ok(())
    } else {
        Err(TradfriError::UnexpectedStatus { expected, actual })
    }
}

fn decode<T: DeserializeOwned>(response: &Message) -> Result<T> {
    serde_json::from_slice(&response.payload).map_err(|e| {
        TradfriError::MalformedPayload(format!(
            "{} ({} bytes): {}",
            e,
            response.payload.len(),
            String::from_utf8_lossy(&response.payload)
        ))
    })
}
