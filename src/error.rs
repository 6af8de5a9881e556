//! Error types and result definitions for the rustfri crate.
//! Includes conversions from standard IO/JSON errors.

use crate::protocol::Status;
use thiserror::Error;

/// Represents all possible errors that can occur when talking to a gateway.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradfriError {
    /// Identity, key or security code was empty
    #[error("Invalid credential: {0}")]
    InvalidCredential(&'static str),

    /// Address resolution, socket or handshake failure
    #[error("Network error: {0}")]
    Network(String),

    /// The DTLS handshake did not complete within the connect timeout
    #[error("Timeout connecting to gateway")]
    ConnectTimeout,

    /// No response carrying the request's transaction id arrived in time
    #[error("Timeout waiting for response")]
    ResponseTimeout,

    /// A response was delivered for another transaction
    #[error("Unexpected transaction id {actual:#06x} (expected {expected:#06x})")]
    UnexpectedTransaction { expected: u16, actual: u16 },

    /// The gateway answered with a status the operation does not accept
    #[error("Unexpected status {actual} (expected {expected})")]
    UnexpectedStatus { expected: Status, actual: Status },

    /// The response body could not be decoded into the expected shape
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// The security code exchange did not yield a key
    #[error("Provisioning failed: {0}")]
    ProvisioningFailed(String),

    /// The session was closed locally or by the peer
    #[error("Session closed")]
    SessionClosed,

    /// A datagram could not be encoded or decoded as a CoAP message
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

/// A specialized Result type for gateway operations.
pub type Result<T> = std::result::Result<T, TradfriError>;

impl From<std::io::Error> for TradfriError {
    fn from(err: std::io::Error) -> Self {
        TradfriError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for TradfriError {
    fn from(err: serde_json::Error) -> Self {
        TradfriError::MalformedPayload(err.to_string())
    }
}

impl TradfriError {
    /// Errors after which the session cannot carry any more traffic.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TradfriError::SessionClosed)
    }
}
