//! `PeripheralDeviceSettingOperation` (service 0x04): LED, vibration and
//! beep settings plus companion app metadata.

use super::{
    MessageTable, ServiceCodec, ServiceId, label, lookup_message, message_id, parse_cancel,
    parse_result_code, unsupported, utf8,
};
use crate::error::{EncodeError, ParseError};
use crate::request::{Request, SettingNameType, SettingRequest, SettingSelection};
use crate::tlv::{PacketWriter, RawParameter, Reader, read_blocks};
use crate::value::{Parameter, SettingInformation, Value};

const MESSAGES: MessageTable = &[
    (0x00, "GET_APP_VERSION"),
    (0x01, "GET_APP_VERSION_RESP"),
    (0x02, "CONFIRM_INSTALL_APP"),
    (0x03, "CONFIRM_INSTALL_APP_RESP"),
    (0x04, "GET_SETTING_INFORMATION"),
    (0x05, "GET_SETTING_INFORMATION_RESP"),
    (0x06, "GET_SETTING_NAME"),
    (0x07, "GET_SETTING_NAME_RESP"),
    (0x08, "SELECT_SETTING_INFORMATION"),
    (0x09, "SELECT_SETTING_INFORMATION_RESP"),
];

const SETTING_NAME_TYPE: u8 = 0x02;
const APP_NAME: u8 = 0x03;
const FILE_VERSION: u8 = 0x04;
const FILE_SIZE: u8 = 0x05;
const SETTING_INFORMATION_REQUEST: u8 = 0x07;
const SETTING_INFORMATION_DATA: u8 = 0x08;

const LED: u8 = 0x00;
const VIBRATION: u8 = 0x01;
const BEEP: u8 = 0x02;

/// Name of a setting record code as used in the device information.
#[must_use]
pub fn setting_name(code: u8) -> Option<&'static str> {
    match code {
        LED => Some("LED"),
        VIBRATION => Some("Vibration"),
        BEEP => Some("Beep"),
        _ => None,
    }
}

/// Decode setting records until the value is exhausted or an unknown record
/// code shows up.
fn parse_setting_records(value: &[u8]) -> Result<Vec<SettingInformation>, ParseError> {
    let mut reader = Reader::new(value);
    let mut records = Vec::new();
    while !reader.is_empty() {
        let code = reader.u8()?;
        let Some(name) = setting_name(code) else {
            break;
        };
        let (color_max, color_number) = if code == LED {
            (Some(reader.u8()?), Some(reader.u8()?))
        } else {
            (None, None)
        };
        records.push(SettingInformation {
            id: code,
            name,
            color_max,
            color_number,
            pattern_max: reader.u8()?,
            pattern_number: reader.u8()?,
            duration: reader.u8()?,
        });
    }
    Ok(records)
}

fn parse_names(value: &[u8]) -> Result<Vec<String>, ParseError> {
    let mut reader = Reader::new(value);
    let mut names = Vec::new();
    while !reader.is_empty() {
        let len = reader.u8()?;
        names.push(utf8(reader.take(usize::from(len))?));
    }
    Ok(names)
}

fn encode_selections(data: &[SettingSelection]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 6);
    for selection in data {
        match *selection {
            SettingSelection::Led {
                color,
                pattern,
                duration,
            } => out.extend_from_slice(&[LED, 0, color, 0, pattern, duration]),
            SettingSelection::Vibration { pattern, duration } => {
                out.extend_from_slice(&[VIBRATION, 0, pattern, duration]);
            }
            SettingSelection::Beep { pattern, duration } => {
                out.extend_from_slice(&[BEEP, 0, pattern, duration]);
            }
        }
    }
    out
}

fn app_name(name: &str) -> Result<Vec<u8>, EncodeError> {
    if name.is_empty() {
        return Err(EncodeError::InvalidParameter {
            field: "AppName",
            reason: "must not be empty",
        });
    }
    Ok(name.as_bytes().to_vec())
}

/// Codec for the setting operation service.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettingCodec;

impl SettingCodec {
    fn parse_parameter(raw: RawParameter<'_>) -> Result<Parameter, ParseError> {
        let RawParameter { id, value } = raw;
        let mut reader = Reader::new(value);
        let parameter = match id {
            0x00 => parse_result_code(id, value)?,
            0x01 => parse_cancel(id, value)?,
            SETTING_NAME_TYPE => {
                let code = reader.u8()?;
                Parameter::new(id, "SettingNameType")
                    .with("settingNameTypeCode", code)
                    .with(
                        "settingNameTypeText",
                        SettingNameType::from_code(code).map_or("", SettingNameType::name),
                    )
            }
            APP_NAME => Parameter::new(id, "AppName").with("appName", utf8(value)),
            FILE_VERSION => Parameter::new(id, "FileVersion").with("fileVersion", reader.u32_le()?),
            FILE_SIZE => Parameter::new(id, "FileSize").with("fileSize", reader.u32_le()?),
            0x06 => {
                let code = reader.u8()?;
                Parameter::new(id, "InstallConfirmStatus")
                    .with("installConfirmStatusCode", code)
                    .with(
                        "installConfirmStatusText",
                        label(&["Installed", "Not installed"], code),
                    )
            }
            SETTING_INFORMATION_REQUEST => {
                let code = reader.u8()?;
                Parameter::new(id, "SettingInformationRequest")
                    .with("requestCode", code)
                    .with(
                        "requestName",
                        SettingRequest::from_code(code).map_or("", SettingRequest::name),
                    )
            }
            SETTING_INFORMATION_DATA => Parameter::new(id, "SettingInformationData").with(
                "settingInformationData",
                Value::Settings(parse_setting_records(value)?),
            ),
            0x09 => Parameter::new(id, "SettingNameData")
                .with("settingNameData", Value::TextList(parse_names(value)?)),
            _ => Parameter::unknown(id),
        };
        Ok(parameter)
    }
}

impl ServiceCodec for SettingCodec {
    fn service_id(&self) -> ServiceId {
        ServiceId::Setting
    }

    fn service_name(&self) -> &'static str {
        ServiceId::Setting.name()
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
        let id = message_id(MESSAGES, request.message_name())
            .ok_or_else(|| unsupported(request, ServiceId::Setting))?;
        let writer = PacketWriter::new(ServiceId::Setting.as_u8(), id);
        match request {
            Request::GetAppVersion { app_name: name } => {
                writer.parameter(APP_NAME, app_name(name)?).finish()
            }
            Request::ConfirmInstallApp {
                app_name: name,
                file_version,
                file_size,
            } => writer
                .parameter(APP_NAME, app_name(name)?)
                .parameter(FILE_VERSION, file_version.to_le_bytes())
                .parameter(FILE_SIZE, file_size.to_le_bytes())
                .finish(),
            Request::GetSettingInformation => writer.finish(),
            Request::GetSettingName { kind } => {
                writer.parameter(SETTING_NAME_TYPE, [kind.code()]).finish()
            }
            Request::SelectSettingInformation {
                request: action,
                data,
            } => {
                if action.requires_data() && data.is_empty() {
                    return Err(EncodeError::InvalidParameter {
                        field: "SettingInformationData",
                        reason: "at least one setting is required for this request",
                    });
                }
                let records = (!data.is_empty()).then(|| encode_selections(data));
                writer
                    .parameter(SETTING_INFORMATION_REQUEST, [action.code()])
                    .optional(SETTING_INFORMATION_DATA, records)
                    .finish()
            }
            _ => Err(unsupported(request, ServiceId::Setting)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(id: u8, value: &[u8]) -> Vec<u8> {
        let mut out = vec![id, value.len() as u8, 0, 0];
        out.extend_from_slice(value);
        out
    }

    #[test]
    fn should_encode_get_setting_name() {
        let packet = SettingCodec
            .create_request(&Request::GetSettingName {
                kind: SettingNameType::VibrationPattern,
            })
            .unwrap();
        assert_eq!(
            packet,
            vec![0x03, 0x04, 0x06, 0x00, 0x01, 0x02, 0x01, 0x00, 0x00, 0x02]
        );
    }

    #[test]
    fn should_encode_led_demonstration() {
        let packet = SettingCodec
            .create_request(&Request::SelectSettingInformation {
                request: SettingRequest::StartDemonstration,
                data: vec![SettingSelection::Led {
                    color: 1,
                    pattern: 2,
                    duration: 5,
                }],
            })
            .unwrap();
        assert_eq!(
            packet,
            vec![
                0x03, 0x04, 0x08, 0x00, 0x02, //
                0x07, 0x01, 0x00, 0x00, 0x01, //
                0x08, 0x06, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x05,
            ]
        );
    }

    #[test]
    fn should_encode_stop_demonstration_without_records() {
        let packet = SettingCodec
            .create_request(&Request::SelectSettingInformation {
                request: SettingRequest::StopDemonstration,
                data: Vec::new(),
            })
            .unwrap();
        assert_eq!(packet[4], 1);
    }

    #[test]
    fn should_require_records_to_start_demonstration() {
        let err = SettingCodec
            .create_request(&Request::SelectSettingInformation {
                request: SettingRequest::StartDemonstration,
                data: Vec::new(),
            })
            .unwrap_err();
        assert!(matches!(err, EncodeError::InvalidParameter { .. }));
    }

    #[test]
    fn should_reject_empty_app_name() {
        let err = SettingCodec
            .create_request(&Request::GetAppVersion {
                app_name: String::new(),
            })
            .unwrap_err();
        assert!(matches!(err, EncodeError::InvalidParameter { field: "AppName", .. }));
    }

    #[test]
    fn should_round_trip_confirm_install_app() {
        let packet = SettingCodec
            .create_request(&Request::ConfirmInstallApp {
                app_name: "Linking".into(),
                file_version: 3,
                file_size: 0x0001_0000,
            })
            .unwrap();
        let parameters = SettingCodec.parse_payload(packet[4], &packet[5..]).unwrap();
        assert_eq!(parameters[0].get("appName"), Some(&Value::Text("Linking".into())));
        assert_eq!(parameters[1].get("fileVersion"), Some(&Value::Int(3)));
        assert_eq!(parameters[2].get("fileSize"), Some(&Value::Int(0x0001_0000)));
    }

    #[test]
    fn should_decode_setting_information_records() {
        let payload = block(
            0x08,
            &[
                0x00, 6, 1, 3, 2, 5, // LED
                0x01, 4, 1, 10, // Vibration
            ],
        );
        let parameters = SettingCodec.parse_payload(1, &payload).unwrap();
        let settings = parameters[0]
            .get("settingInformationData")
            .and_then(Value::as_settings)
            .unwrap();
        assert_eq!(settings.len(), 2);
        assert_eq!(settings[0].name, "LED");
        assert_eq!(settings[0].color_max, Some(6));
        assert_eq!(settings[0].pattern_max, 3);
        assert_eq!(settings[1].name, "Vibration");
        assert_eq!(settings[1].color_max, None);
        assert_eq!(settings[1].duration, 10);
    }

    #[test]
    fn should_stop_at_unknown_record_code() {
        let payload = block(0x08, &[0x02, 3, 1, 5, 0x7F, 0xAA]);
        let parameters = SettingCodec.parse_payload(1, &payload).unwrap();
        let settings = parameters[0]
            .get("settingInformationData")
            .and_then(Value::as_settings)
            .unwrap();
        assert_eq!(settings.len(), 1);
        assert_eq!(settings[0].name, "Beep");
    }

    #[test]
    fn should_fail_on_truncated_record() {
        let payload = block(0x08, &[0x00, 6, 1]);
        assert!(SettingCodec.parse_payload(1, &payload).is_err());
    }

    #[test]
    fn should_decode_setting_names() {
        let payload = block(0x09, b"\x03Red\x05Green");
        let parameters = SettingCodec.parse_payload(1, &payload).unwrap();
        assert_eq!(
            parameters[0].get("settingNameData"),
            Some(&Value::TextList(vec!["Red".into(), "Green".into()]))
        );
    }
}
