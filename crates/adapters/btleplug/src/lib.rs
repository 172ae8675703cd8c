//! # linking-adapter-btleplug
//!
//! BLE adapter backed by [`btleplug`], the cross-platform BLE library
//! (BlueZ, CoreBluetooth, WinRT).
//!
//! ## How it works
//!
//! [`BtleplugAdapter`] wraps one btleplug central and implements
//! [`BleAdapter`](linking_app::ports::BleAdapter): scans are filtered on the
//! Linking service UUIDs and every discovered or updated peripheral is
//! turned into an
//! [`AdvertisementData`](linking_app::ports::AdvertisementData).
//! [`BtleplugPeripheral`] implements
//! [`BlePeripheral`](linking_app::ports::BlePeripheral); its event stream
//! merges the peripheral's notifications with the central's disconnect
//! events for that peripheral.
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `linking-app` (ports) and
//! `linking-protocol` (UUIDs), never the reverse.

mod adapter;
mod config;
mod error;
mod peripheral;

pub use adapter::BtleplugAdapter;
pub use config::BtleplugConfig;
pub use error::BtleplugError;
pub use peripheral::BtleplugPeripheral;
