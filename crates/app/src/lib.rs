//! # linking-app
//!
//! Application layer: device lifecycle, discovery and **port definitions**
//! (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that BLE adapters must implement:
//!   - `BleAdapter`: power state, scanning, discovered peripherals
//!   - `BlePeripheral`: connect, GATT discovery, indications, read/write
//! - Drive one connected device ([`connection::DeviceConnection`]):
//!   - connect with retries and the Linking handshake
//!   - request/response correlation with timeout
//!   - notification dispatch through a typed event stream
//! - Expose what a device can do ([`capability`]) from what it reported
//!   during the handshake ([`device_info`])
//! - Find devices and decode their advertisements ([`discovery`])
//!
//! ## Dependency rule
//! Depends on `linking-protocol` only (plus `tokio` for tasks, timers and
//! channels). Never imports adapter crates. Adapters depend on *this* crate,
//! not the reverse.

pub mod capability;
pub mod config;
pub mod connection;
pub mod device_info;
pub mod discovery;
pub mod error;
pub mod event_bus;
pub mod ports;

#[cfg(test)]
pub(crate) mod mock;

pub use config::{ConnectionConfig, DiscoveryConfig};
pub use connection::{ConnectionState, DeviceConnection, DeviceEvent, Response};
pub use discovery::{Advertisement, DiscoverOptions, Discovery, ScanFilter};
pub use error::{DeviceError, DiscoveryError};
