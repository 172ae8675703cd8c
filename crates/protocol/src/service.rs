//! Per-service payload codecs.
//!
//! Each Linking service owns a message table, a parameter table and the
//! encoders for the requests it accepts. The codecs are stateless unit
//! structs; [`ServiceId::codec`] hands out the matching one.

use crate::error::{EncodeError, ParseError};
use crate::request::Request;
use crate::tlv::Reader;
use crate::value::{Entry, Parameter, Value};

pub mod notification;
pub mod operation;
pub mod property;
pub mod sensor;
pub mod setting;

/// Encode and decode the payloads of one Linking service.
pub trait ServiceCodec: Send + Sync {
    fn service_id(&self) -> ServiceId;

    fn service_name(&self) -> &'static str;

    /// Name of `message_id`, or `None` when the service does not define it.
    fn message_name(&self, message_id: u16) -> Option<&'static str>;

    /// Decode `count` TLV blocks from `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Truncated`] when a block or a fixed-size value
    /// runs past the available bytes.
    fn parse_payload(&self, count: u8, payload: &[u8]) -> Result<Vec<Parameter>, ParseError>;

    /// Serialize `request` into a complete packet.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::UnsupportedMessage`] when the request belongs to
    /// another service, or another [`EncodeError`] when a value cannot be
    /// represented on the wire.
    fn create_request(&self, request: &Request) -> Result<Vec<u8>, EncodeError>;
}

/// Service IDs found at byte 1 of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceId {
    Property = 0x00,
    Notification = 0x01,
    Operation = 0x02,
    Sensor = 0x03,
    Setting = 0x04,
}

impl ServiceId {
    pub const ALL: [Self; 5] = [
        Self::Property,
        Self::Notification,
        Self::Operation,
        Self::Sensor,
        Self::Setting,
    ];

    #[must_use]
    pub fn from_u8(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Property => "PeripheralDevicePropertyInformation",
            Self::Notification => "PeripheralDeviceNotification",
            Self::Operation => "PeripheralDeviceOperation",
            Self::Sensor => "PeripheralDeviceSensorInformation",
            Self::Setting => "PeripheralDeviceSettingOperation",
        }
    }

    #[must_use]
    pub fn codec(self) -> &'static dyn ServiceCodec {
        match self {
            Self::Property => &property::PropertyCodec,
            Self::Notification => &notification::NotificationCodec,
            Self::Operation => &operation::OperationCodec,
            Self::Sensor => &sensor::SensorCodec,
            Self::Setting => &setting::SettingCodec,
        }
    }
}

/// `(message id, message name)` pairs of one service.
pub(crate) type MessageTable = &'static [(u16, &'static str)];

pub(crate) fn lookup_message(table: MessageTable, message_id: u16) -> Option<&'static str> {
    table
        .iter()
        .find(|(id, _)| *id == message_id)
        .map(|(_, name)| *name)
}

pub(crate) fn message_id(table: MessageTable, name: &str) -> Option<u16> {
    table.iter().find(|(_, n)| *n == name).map(|(id, _)| *id)
}

pub(crate) fn unsupported(request: &Request, service: ServiceId) -> EncodeError {
    EncodeError::UnsupportedMessage {
        message: request.message_name(),
        service: service.name(),
    }
}

/// Label of a code in a dense table, empty when out of range.
pub(crate) fn label(table: &[&'static str], code: u8) -> &'static str {
    table.get(usize::from(code)).copied().unwrap_or("")
}

const RESULT_CODES: &[&str] = &[
    "OK, request processed correctly",
    "Cancel",
    "Error, failed",
    "Error, no reason defined",
    "Error, data not available",
    "Error, not supported",
];

pub(crate) fn parse_result_code(id: u8, value: &[u8]) -> Result<Parameter, ParseError> {
    let code = Reader::new(value).u8()?;
    Ok(Parameter::new(id, "ResultCode")
        .with("resultCode", code)
        .with("resultText", label(RESULT_CODES, code)))
}

pub(crate) fn parse_cancel(id: u8, value: &[u8]) -> Result<Parameter, ParseError> {
    let code = Reader::new(value).u8()?;
    let text = if code == 0 { "User cancel" } else { "" };
    Ok(Parameter::new(id, "Cancel")
        .with("cancelCode", code)
        .with("cancelText", text))
}

/// Expand a bitmap into named entries, one per `(bit, entry)` set.
pub(crate) fn bitmap(bits: u16, table: &[(u8, Entry)]) -> Value {
    Value::Entries(
        table
            .iter()
            .filter(|(bit, _)| bits & (1 << bit) != 0)
            .map(|(_, entry)| entry.clone())
            .collect(),
    )
}

pub(crate) fn utf8(value: &[u8]) -> String {
    String::from_utf8_lossy(value).into_owned()
}
