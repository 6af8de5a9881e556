//! # Rustfri
//!
//! Asynchronous client for IKEA TRÅDFRI gateways. Talks CoAP over a
//! PSK-authenticated DTLS session and correlates responses by transaction id.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rustfri::{Client, DeviceSettings, LightSettings};
//!
//! # async fn run() -> rustfri::error::Result<()> {
//! let client = Client::connect("192.168.1.20", "my-identity", "PSK_FROM_PROVISIONING").await?;
//! for id in client.list_device_ids().await? {
//!     println!("{}", client.device(id).await?.name);
//! }
//! client
//!     .update_device(65537, &DeviceSettings::light(LightSettings::new().power(true)))
//!     .await?;
//! client.close().await;
//! # Ok(())
//! # }
//! ```
//!
#[macro_use]
pub mod macros;
pub mod client;
pub mod correlator;
pub mod error;
pub mod models;
pub mod protocol;
pub mod provision;
pub mod resource;
pub mod scanner;
pub mod transport;

pub use client::{Client, ClientBuilder};
pub use error::TradfriError;
pub use models::{
    DeviceInfo, DeviceSettings, DeviceType, GatewayInfo, GroupInfo, LightSettings,
    OutletSettings, SceneInfo,
};
pub use provision::{Provisioner, provision};
pub use scanner::{Scanner, discover};
pub use transport::{DEFAULT_PORT, Dialer, Transport};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version() -> &'static str {
    VERSION
}
