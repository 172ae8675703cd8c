//! Application error types.

use std::time::Duration;

use linking_protocol::EncodeError;
use uuid::Uuid;

use crate::ports::AdapterError;

/// Errors raised while talking to one device.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device is already connected")]
    AlreadyConnected,

    /// The operation needs an established connection.
    #[error("device is not connected")]
    NotConnected,

    /// A BLE operation failed.
    #[error("BLE transport failed while {stage}")]
    Transport {
        stage: &'static str,
        #[source]
        source: AdapterError,
    },

    /// The Linking primary service is not exposed by the peripheral.
    #[error("Linking service not found")]
    ServiceNotFound,

    #[error("characteristic {uuid} not found")]
    CharacteristicNotFound { uuid: Uuid },

    /// The request could not be encoded.
    #[error("invalid request parameters")]
    InvalidParameters(#[from] EncodeError),

    /// The matching response carried no decodable parameter.
    #[error("unknown response to {0}")]
    UnknownResponse(&'static str),

    /// The message is a one-way reply and has to go through `send`.
    #[error("{0} has no response")]
    NoResponse(&'static str),

    #[error("no response to {message} within {timeout:?}")]
    Timeout {
        message: &'static str,
        timeout: Duration,
    },

    /// The link dropped while waiting for a response.
    #[error("device disconnected")]
    Disconnected,

    /// Every connect attempt failed; `source` is the last failure.
    #[error("failed to connect after {attempts} attempt(s)")]
    ConnectFailed {
        attempts: u32,
        #[source]
        source: Box<DeviceError>,
    },

    #[error("invalid device name: {0}")]
    InvalidDeviceName(&'static str),

    #[error("{0} is not available on this device")]
    CapabilityUnavailable(&'static str),
}

impl DeviceError {
    pub(crate) fn transport(stage: &'static str) -> impl FnOnce(AdapterError) -> Self {
        move |source| Self::Transport { stage, source }
    }
}

/// Errors raised by the discovery manager.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// `init()` has not completed yet.
    #[error("discovery has not been initialized")]
    NotInitialized,

    #[error("a scan is already in progress")]
    ScanInProgress,

    #[error("BLE adapter error")]
    Adapter(#[from] AdapterError),
}
