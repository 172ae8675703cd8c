//! Routes packets to the service codec that owns them.

use serde::Serialize;

use crate::error::{EncodeError, ParseError};
use crate::request::Request;
use crate::service::ServiceId;
use crate::tlv::PACKET_HEADER_LEN;
use crate::value::{self, Fields, Parameter};

/// Writable message names and the service that encodes them.
pub const WRITE_MESSAGES: &[(&str, ServiceId)] = &[
    ("GET_DEVICE_INFORMATION", ServiceId::Property),
    ("CONFIRM_NOTIFY_CATEGORY", ServiceId::Notification),
    ("NOTIFY_INFORMATION", ServiceId::Notification),
    ("GET_PD_NOTIFY_DETAIL_DATA_RESP", ServiceId::Notification),
    ("START_PD_APPLICATION_RESP", ServiceId::Notification),
    ("GET_SENSOR_INFO", ServiceId::Sensor),
    ("SET_NOTIFY_SENSOR_INFO", ServiceId::Sensor),
    ("GET_APP_VERSION", ServiceId::Setting),
    ("CONFIRM_INSTALL_APP", ServiceId::Setting),
    ("GET_SETTING_INFORMATION", ServiceId::Setting),
    ("GET_SETTING_NAME", ServiceId::Setting),
    ("SELECT_SETTING_INFORMATION", ServiceId::Setting),
];

/// A fully decoded packet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMessage {
    pub header: u8,
    pub service_id: u8,
    pub service_name: &'static str,
    pub message_id: u16,
    pub message_name: &'static str,
    pub parameters: Vec<Parameter>,
}

impl ParsedMessage {
    /// Responses are answers to a pending request; everything else is a
    /// notification.
    #[must_use]
    pub fn is_response(&self) -> bool {
        self.message_name.ends_with("_RESP")
    }

    /// All decoded fields flattened into one map.
    #[must_use]
    pub fn fields(&self) -> Fields {
        value::merge(&self.parameters)
    }

    /// First parameter with the given ID.
    #[must_use]
    pub fn parameter(&self, id: u8) -> Option<&Parameter> {
        self.parameters.iter().find(|parameter| parameter.id == id)
    }
}

/// Decode a reassembled packet.
///
/// # Errors
///
/// Returns [`ParseError::ShortPacket`] when the header is incomplete,
/// [`ParseError::UnknownService`] / [`ParseError::UnknownMessage`] when no
/// codec owns the packet, or the codec's error when the payload is malformed.
pub fn try_parse_response(packet: &[u8]) -> Result<ParsedMessage, ParseError> {
    if packet.len() < PACKET_HEADER_LEN {
        return Err(ParseError::ShortPacket(packet.len()));
    }
    let service = ServiceId::from_u8(packet[1]).ok_or(ParseError::UnknownService(packet[1]))?;
    let codec = service.codec();
    let message_id = u16::from_le_bytes([packet[2], packet[3]]);
    let message_name = codec
        .message_name(message_id)
        .ok_or(ParseError::UnknownMessage {
            service: codec.service_name(),
            message_id,
        })?;
    let parameters = codec.parse_payload(packet[4], &packet[PACKET_HEADER_LEN..])?;

    Ok(ParsedMessage {
        header: packet[0],
        service_id: service.as_u8(),
        service_name: codec.service_name(),
        message_id,
        message_name,
        parameters,
    })
}

/// Decode a reassembled packet, dropping anything that cannot be decoded.
#[must_use]
pub fn parse_response(packet: &[u8]) -> Option<ParsedMessage> {
    match try_parse_response(packet) {
        Ok(message) => Some(message),
        Err(err) => {
            tracing::debug!(%err, len = packet.len(), "dropping undecodable packet");
            None
        }
    }
}

/// Encode `request` with the codec of the service that owns it.
///
/// # Errors
///
/// Returns [`EncodeError::UnknownMessage`] when no service accepts the
/// message, or the codec's error when a value cannot be represented.
pub fn create_request(request: &Request) -> Result<Vec<u8>, EncodeError> {
    let name = request.message_name();
    let service = WRITE_MESSAGES
        .iter()
        .find(|(message, _)| *message == name)
        .map(|(_, service)| *service)
        .ok_or(EncodeError::UnknownMessage(name))?;
    service.codec().create_request(request)
}
