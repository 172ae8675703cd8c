//! `PeripheralDeviceOperation` (service 0x02): button presses.

use super::{
    MessageTable, ServiceCodec, ServiceId, label, lookup_message, parse_cancel,
    parse_result_code, unsupported,
};
use crate::error::{EncodeError, ParseError};
use crate::request::Request;
use crate::tlv::{RawParameter, Reader, read_blocks};
use crate::value::Parameter;

/// Message ID of `NOTIFY_PD_OPERATION`.
pub const NOTIFY_PD_OPERATION: u16 = 0x00;

/// Parameter ID of `ButtonId`.
pub const BUTTON_ID: u8 = 0x02;

const MESSAGES: MessageTable = &[(NOTIFY_PD_OPERATION, "NOTIFY_PD_OPERATION")];

const BUTTONS: &[&str] = &[
    "Power",
    "Return",
    "SingleClick",
    "Home",
    "DoubleClick",
    "VolumeUp",
    "VolumeDown",
    "LongPress",
    "Pause",
    "LongPressRelease",
    "FastForward",
    "ReWind",
    "Shutter",
    "Up",
    "Down",
    "Left",
    "Right",
    "Enter",
    "Menu",
    "Play",
    "Stop",
];

/// Name of a button code, empty when unknown.
#[must_use]
pub fn button_name(code: u8) -> &'static str {
    label(BUTTONS, code)
}

/// Codec for the operation service. The device only ever pushes
/// notifications here; no request is accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationCodec;

impl OperationCodec {
    fn parse_parameter(raw: RawParameter<'_>) -> Result<Parameter, ParseError> {
        let RawParameter { id, value } = raw;
        let parameter = match id {
            0x00 => parse_result_code(id, value)?,
            0x01 => parse_cancel(id, value)?,
            BUTTON_ID => {
                let code = Reader::new(value).u8()?;
                Parameter::new(id, "ButtonId")
                    .with("buttonId", code)
                    .with("buttonName", button_name(code))
            }
            _ => Parameter::unknown(id),
        };
        Ok(parameter)
    }
}

impl ServiceCodec for OperationCodec {
    fn service_id(&self) -> ServiceId {
        ServiceId::Operation
    }

    fn service_name(&self) -> &'static str {
        ServiceId::Operation.name()
    }

    fn message_name(&self, message_id: u16) -> Option<&'static str> {
        lookup_message(MESSAGES, message_id)
    }

    fn parse_payload(&self, count: u8, payload: &[u8]) -> Result<Vec<Parameter>, ParseError> {
        read_blocks(count, payload)?
            .into_iter()
            .map(Self::parse_parameter)
            .collect()
    }

    fn create_request(&self, request: &Request) -> Result<Vec<u8>, EncodeError> {
        Err(unsupported(request, ServiceId::Operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn should_decode_button_press() {
        let payload = [0x02, 0x01, 0x00, 0x00, 0x02];
        let parameters = OperationCodec.parse_payload(1, &payload).unwrap();
        assert_eq!(parameters[0].get("buttonId"), Some(&Value::Int(2)));
        assert_eq!(
            parameters[0].get("buttonName"),
            Some(&Value::Text("SingleClick".into()))
        );
    }

    #[test]
    fn should_name_last_button_code() {
        assert_eq!(button_name(0x14), "Stop");
        assert_eq!(button_name(0x15), "");
    }

    #[test]
    fn should_reject_every_request() {
        assert!(
            OperationCodec
                .create_request(&Request::GetDeviceInformation)
                .is_err()
        );
    }
}
