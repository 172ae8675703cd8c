//! # linking-protocol
//!
//! Wire protocol for the Linking family of BLE sensors and actuators.
//!
//! ## Responsibilities
//! - Decode the compressed float readings ([`ieee754`])
//! - Read and write TLV parameter blocks ([`tlv`])
//! - Per-service payload codecs ([`service`]) and the message router that
//!   sits in front of them ([`multiplexer`])
//! - Re-assemble fragmented indications ([`reassembler`])
//! - Decode the vendor data carried in advertisements ([`advertisement`])
//!
//! ## Packet layout
//!
//! | Offset | Field | Type |
//! |--------|-------|------|
//! | 0 | Header (bit0 = final fragment) | u8 |
//! | 1 | Service ID | u8 |
//! | 2–3 | Message ID | u16 LE |
//! | 4 | Parameter count | u8 |
//! | 5.. | Parameters | `id:u8 len:u24 LE value` |
//!
//! ## Dependency rule
//! This crate performs no IO. Transport concerns live in `linking-app`
//! (ports) and the adapter crates.

pub mod advertisement;
pub mod error;
pub mod ieee754;
pub mod multiplexer;
pub mod reassembler;
pub mod request;
pub mod service;
pub mod tlv;
pub mod uuids;
pub mod value;

pub use error::{EncodeError, ParseError, ReassemblyError};
pub use multiplexer::ParsedMessage;
pub use request::Request;
pub use value::{Entry, Fields, Parameter, SettingInformation, Value};
