//! One-shot exchange of the gateway's printed security code for a PSK.
//!
//! The security code only authenticates the bootstrap identity. A client
//! registers its own identity once and keeps the returned key; the code is
//! not needed again afterwards.

use crate::correlator::{Correlator, CorrelatorConfig};
use crate::error::{Result, TradfriError};
use crate::protocol::{Request, Status};
use crate::resource;
use crate::transport::{Dialer, DtlsDialer};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Identity the gateway accepts together with its security code.
pub const BOOTSTRAP_IDENTITY: &str = "Client_identity";

#[derive(Serialize)]
struct ProvisionRequest<'a> {
    #[serde(rename = "9090")]
    identity: &'a str,
}

#[derive(Deserialize)]
struct ProvisionResponse {
    #[serde(rename = "9091", default)]
    key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningState {
    Unprovisioned,
    KeyObtained(Vec<u8>),
}

/// Runs the provisioning exchange at most once and remembers the key.
pub struct Provisioner {
    dialer: Arc<dyn Dialer>,
    config: CorrelatorConfig,
    state: ProvisioningState,
}

impl Default for Provisioner {
    fn default() -> Self {
        Self::new(Arc::new(DtlsDialer::default()))
    }
}

impl Provisioner {
    pub fn new(dialer: Arc<dyn Dialer>) -> Self {
        Self {
            dialer,
            config: CorrelatorConfig::default(),
            state: ProvisioningState::Unprovisioned,
        }
    }

    pub fn with_config(mut self, config: CorrelatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> &ProvisioningState {
        &self.state
    }

    /// Registers `identity` with the gateway and returns its PSK.
    ///
    /// Once a key has been obtained it is returned again without contacting
    /// the gateway. The bootstrap session is closed on every path.
    pub async fn obtain_psk(&mut self, address: &str, identity: &str, code: &str) -> Result<Vec<u8>> {
        if let ProvisioningState::KeyObtained(key) = &self.state {
            return Ok(key.clone());
        }
        if identity.is_empty() {
            return Err(TradfriError::InvalidCredential("empty identity"));
        }
        if code.is_empty() {
            return Err(TradfriError::InvalidCredential("empty security code"));
        }

        info!("Provisioning identity '{}' at {}", identity, address);
        // The code is the bootstrap PSK, so a wrong one fails the handshake.
        let transport = self
            .dialer
            .dial(address, BOOTSTRAP_IDENTITY, code.as_bytes())
            .await
            .map_err(|e| match e {
                TradfriError::Network(reason) => {
                    warn!("Bootstrap handshake with {} failed: {}", address, reason);
                    TradfriError::ProvisioningFailed(format!(
                        "security code rejected: {}",
                        reason
                    ))
                }
                other => other,
            })?;
        let correlator = Correlator::new(transport, self.config.clone());
        let result = exchange(&correlator, identity).await;
        correlator.close().await;

        let key = result?;
        info!("Obtained key for identity '{}'", identity);
        self.state = ProvisioningState::KeyObtained(key.clone());
        Ok(key)
    }
}

async fn exchange(correlator: &Correlator, identity: &str) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(&ProvisionRequest { identity })?;
    let response = correlator
        .round_trip(&Request::post(resource::provisioning(), body))
        .await?;

    let status = response.status();
    if status != Status::Created {
        warn!("Gateway refused provisioning with {}", status);
        return Err(TradfriError::ProvisioningFailed(format!(
            "gateway answered {} (expected {})",
            status,
            Status::Created
        )));
    }

    let decoded: ProvisionResponse = serde_json::from_slice(&response.payload)
        .map_err(|e| TradfriError::ProvisioningFailed(format!("undecodable response: {}", e)))?;
    if decoded.key.is_empty() {
        return Err(TradfriError::ProvisioningFailed(
            "gateway returned an empty key".to_string(),
        ));
    }
    Ok(decoded.key.into_bytes())
}

/// Provisions `identity` over DTLS with default settings.
pub async fn provision(address: &str, identity: &str, code: &str) -> Result<Vec<u8>> {
    Provisioner::default().obtain_psk(address, identity, code).await
}
