//! `PeripheralDevicePropertyInformation` (service 0x00).

use super::{
    MessageTable, ServiceCodec, ServiceId, bitmap, label, lookup_message, message_id,
    parse_cancel, parse_result_code, unsupported, utf8,
};
use crate::error::{EncodeError, ParseError};
use crate::request::Request;
use crate::tlv::{PacketWriter, RawParameter, Reader, read_blocks};
use crate::value::{Entry, Parameter};

const MESSAGES: MessageTable = &[
    (0x00, "GET_DEVICE_INFORMATION"),
    (0x01, "GET_DEVICE_INFORMATION_RESP"),
];

const SERVICE_LIST: &[(u8, Entry)] = &[
    (0, Entry::new(0, "PeripheralDevicePropertyInformation")),
    (1, Entry::new(1, "PeripheralDeviceNotification")),
    (2, Entry::new(2, "PeripheralDeviceOperation")),
    (3, Entry::new(3, "PeripheralDeviceSensorInformation")),
    (4, Entry::new(4, "PeripheralDeviceSettingOperation")),
];

const DEVICE_CAPABILITY: &[(u8, Entry)] = &[
    (1, Entry::new(1, "Gyroscope")),
    (2, Entry::new(2, "Accelerometer")),
    (3, Entry::new(3, "Orientation")),
    (4, Entry::new(4, "Battery")),
    (5, Entry::new(5, "Temperature")),
    (6, Entry::new(6, "Humidity")),
    (7, Entry::new(7, "Atmospheric pressure")),
];

const EX_SENSOR_TYPE: &[(u8, Entry)] = &[
    (0, Entry::new(0, "Version")),
    (1, Entry::new(1, "Version")),
    (2, Entry::new(2, "Flag")),
    (3, Entry::new(3, "Button")),
    (4, Entry::new(4, "Opening and closing")),
    (5, Entry::new(5, "Human detection")),
    (6, Entry::new(6, "Move")),
    (7, Entry::new(7, "Illuminance")),
];

const ORIGINAL_INFORMATION: &[&str] = &[
    "AppName",
    "AppNameLocal",
    "AppDLURL1",
    "AppDLURL2",
    "AppDLURL3",
    "AppExecInfo1",
    "AppExecInfo2",
    "AppExecInfo3",
    "AppPackage",
];

/// Codec for the device property service.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyCodec;

impl PropertyCodec {
    fn parse_parameter(raw: RawParameter<'_>) -> Result<Parameter, ParseError> {
        let RawParameter { id, value } = raw;
        let parameter = match id {
            0x00 => parse_result_code(id, value)?,
            0x01 => parse_cancel(id, value)?,
            0x02 => Parameter::new(id, "ServiceList").with(
                "serviceList",
                bitmap(u16::from(Reader::new(value).u8()?), SERVICE_LIST),
            ),
            0x03 => Parameter::new(id, "DeviceId").with("deviceId", hex(value)),
            0x04 => Parameter::new(id, "DeviceUid").with("deviceUid", hex(value)),
            0x05 => Parameter::new(id, "DeviceCapability").with(
                "deviceCapability",
                bitmap(u16::from(Reader::new(value).u8()?), DEVICE_CAPABILITY),
            ),
            0x06 => {
                let mut reader = Reader::new(value);
                let code = reader.u8()?;
                Parameter::new(id, "OriginalInformation")
                    .with("originalInformationCode", code)
                    .with("originalInformationName", label(ORIGINAL_INFORMATION, code))
                    .with("originalInformationText", utf8(reader.rest()))
            }
            0x07 => Parameter::new(id, "ExSensorType").with(
                "exSensorType",
                bitmap(u16::from(Reader::new(value).u8()?), EX_SENSOR_TYPE),
            ),
            _ => Parameter::unknown(id),
        };
        Ok(parameter)
    }
}

impl ServiceCodec for PropertyCodec {
    fn service_id(&self) -> ServiceId {
        ServiceId::Property
    }

    fn service_name(&self) -> &'static str {
        ServiceId::Property.name()
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
        let Request::GetDeviceInformation = request else {
            return Err(unsupported(request, ServiceId::Property));
        };
        let id = message_id(MESSAGES, request.message_name())
            .ok_or(EncodeError::UnknownMessage(request.message_name()))?;
        PacketWriter::new(ServiceId::Property.as_u8(), id).finish()
    }
}

fn hex(value: &[u8]) -> String {
    use std::fmt::Write;

    value.iter().fold(String::with_capacity(value.len() * 2), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}
