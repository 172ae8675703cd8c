//! `PeripheralDeviceNotification` (service 0x01).
//!
//! The layout of `ParameterIdList` depends on the notification category
//! announced by an earlier `NotifyCategoryID` block, so the parse loop
//! threads the last seen category through every block.

use chrono::{NaiveDate, NaiveDateTime};

use super::{
    MessageTable, ServiceCodec, ServiceId, bitmap, label, lookup_message, message_id,
    parse_cancel, parse_result_code, unsupported, utf8,
};
use crate::error::{EncodeError, ParseError};
use crate::request::{NotifyCategory, Request};
use crate::tlv::{PacketWriter, RawParameter, Reader, read_blocks};
use crate::value::{Entry, Parameter, Value};

const MESSAGES: MessageTable = &[
    (0x00, "CONFIRM_NOTIFY_CATEGORY"),
    (0x01, "CONFIRM_NOTIFY_CATEGORY_RESP"),
    (0x02, "NOTIFY_INFORMATION"),
    (0x03, "GET_PD_NOTIFY_DETAIL_DATA"),
    (0x04, "GET_PD_NOTIFY_DETAIL_DATA_RESP"),
    (0x05, "NOTIFY_PD_GENERAL_INFORMATION"),
    (0x06, "START_PD_APPLICATION"),
    (0x07, "START_PD_APPLICATION_RESP"),
];

const NOTIFY_CATEGORY_ID: u8 = 0x04;
const UNIQUE_ID: u8 = 0x08;

const GET_STATUS: &[&str] = &[
    "OK, request processed correctly",
    "OK, request processed ,but some parameter not",
    "Cancel",
    "Error, failed",
    "Error, no reason defined",
    "Error, data not available",
    "Error, not supported",
];

const NOTIFICATION_OPERATION: &[&str] = &["AlreadyRead", "Delete"];

const RUMBLING_SETTING: &[(u8, Entry)] = &[
    (0, Entry::new(0, "LED")),
    (1, Entry::new(1, "Vibration")),
    (2, Entry::new(2, "Beep")),
];

const CONTENTS: [&str; 10] = [
    "Contents1",
    "Contents2",
    "Contents3",
    "Contents4",
    "Contents5",
    "Contents6",
    "Contents7",
    "Contents8",
    "Contents9",
    "Contents10",
];

const NOTIFY_ID: Entry = Entry::new(0x09, "NotifyId");
const CATEGORY_ID: Entry = Entry::new(0x04, "NotifyCategoryID");
const APP_NAME: Entry = Entry::new(0x0D, "AppName");
const APP_NAME_LOCAL: Entry = Entry::new(0x0E, "AppNameLocal");
const PACKAGE: Entry = Entry::new(0x28, "Package");
const TITLE: Entry = Entry::new(0x0B, "Title");
const TEXT: Entry = Entry::new(0x0C, "Text");

const PHONE_IDS: &[(u8, Entry)] = &[(0, NOTIFY_ID), (1, CATEGORY_ID)];

const MAIL_IDS: &[(u8, Entry)] = &[
    (0, APP_NAME),
    (1, APP_NAME_LOCAL),
    (2, PACKAGE),
    (3, TITLE),
    (4, TEXT),
    (5, Entry::new(0x13, "Sender")),
    (6, Entry::new(0x14, "SenderAddress")),
    (7, Entry::new(0x15, "ReceiveDate")),
    (8, NOTIFY_ID),
    (9, CATEGORY_ID),
];

const SCHEDULE_IDS: &[(u8, Entry)] = &[
    (0, APP_NAME),
    (1, APP_NAME_LOCAL),
    (2, PACKAGE),
    (3, TITLE),
    (4, Entry::new(0x16, "StartDate")),
    (5, Entry::new(0x17, "EndDate")),
    (6, Entry::new(0x18, "Area")),
    (7, Entry::new(0x19, "Person")),
    (8, TEXT),
    (9, Entry::new(0x1D, "Contents1")),
    (10, Entry::new(0x1E, "Contents2")),
    (11, Entry::new(0x1F, "Contents3")),
    (12, NOTIFY_ID),
    (13, CATEGORY_ID),
];

const GENERAL_IDS: &[(u8, Entry)] = &[
    (0, APP_NAME),
    (1, APP_NAME_LOCAL),
    (2, PACKAGE),
    (3, TITLE),
    (4, TEXT),
    (5, NOTIFY_ID),
    (6, CATEGORY_ID),
];

const ETC_IDS: &[(u8, Entry)] = &[
    (0, APP_NAME),
    (1, APP_NAME_LOCAL),
    (2, PACKAGE),
    (3, Entry::new(0x1D, "Contents1")),
    (4, Entry::new(0x1E, "Contents2")),
    (5, Entry::new(0x1F, "Contents3")),
    (6, Entry::new(0x20, "Contents4")),
    (7, Entry::new(0x21, "Contents5")),
    (8, Entry::new(0x22, "Contents6")),
    (9, Entry::new(0x23, "Contents7")),
    (10, Entry::new(0x1B, "MimeTypeForMedia")),
    (11, Entry::new(0x27, "Media")),
    (12, Entry::new(0x1A, "MimeTypeForImage")),
    (13, Entry::new(0x1C, "Image")),
    (14, NOTIFY_ID),
    (15, CATEGORY_ID),
];

/// `ParameterIdList` bit layout for a category; empty for categories that
/// do not define one.
fn parameter_id_layout(category: Option<NotifyCategory>) -> &'static [(u8, Entry)] {
    match category {
        Some(
            NotifyCategory::PhoneIncomingCall
            | NotifyCategory::PhoneInCall
            | NotifyCategory::PhoneIdle,
        ) => PHONE_IDS,
        Some(NotifyCategory::Mail) => MAIL_IDS,
        Some(NotifyCategory::Schedule) => SCHEDULE_IDS,
        Some(NotifyCategory::General) => GENERAL_IDS,
        Some(NotifyCategory::Etc) => ETC_IDS,
        Some(NotifyCategory::NotNotify | NotifyCategory::All) | None => &[],
    }
}

/// Read the two-byte category bitmap: byte 0 holds categories 0-7, bit 0 of
/// byte 1 holds `Etc`.
fn category_bits(value: &[u8]) -> Result<u16, ParseError> {
    let mut reader = Reader::new(value);
    let low = reader.u8()?;
    let high = reader.u8()?;
    Ok(u16::from(low) | (u16::from(high & 0x01) << 8))
}

fn parse_date(id: u8, name: &'static str, key: &'static str, value: &[u8]) -> Result<Parameter, ParseError> {
    let mut reader = Reader::new(value);
    let year = reader.u16_le()?;
    let [month, day, hour, minute, second] = [
        reader.u8()?,
        reader.u8()?,
        reader.u8()?,
        reader.u8()?,
        reader.u8()?,
    ];
    let date: Option<NaiveDateTime> =
        NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day)).and_then(|d| {
            d.and_hms_opt(u32::from(hour), u32::from(minute), u32::from(second))
        });
    let parameter = Parameter::new(id, name);
    Ok(match date {
        Some(date) => parameter.with(key, Value::Date(date)),
        None => parameter,
    })
}

/// Sequence of `len:u8` + bytes entries running to the end of the value.
fn parse_name_list(value: &[u8]) -> Result<Value, ParseError> {
    let mut reader = Reader::new(value);
    let mut names = Vec::new();
    while !reader.is_empty() {
        let len = reader.u8()?;
        names.push(utf8(reader.take(usize::from(len))?));
    }
    Ok(Value::TextList(names))
}

/// NUL-separated strings; empty pieces are dropped.
fn parse_person(value: &[u8]) -> Value {
    Value::TextList(
        value
            .split(|byte| *byte == 0)
            .filter(|piece| !piece.is_empty())
            .map(utf8)
            .collect(),
    )
}

fn text(id: u8, name: &'static str, key: &'static str, value: &[u8]) -> Parameter {
    Parameter::new(id, name).with(key, utf8(value))
}

/// Codec for the notification service.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationCodec;

impl NotificationCodec {
    fn parse_parameter(
        raw: RawParameter<'_>,
        category: Option<NotifyCategory>,
    ) -> Result<Parameter, ParseError> {
        let RawParameter { id, value } = raw;
        let mut reader = Reader::new(value);
        let parameter = match id {
            0x00 => parse_result_code(id, value)?,
            0x01 => parse_cancel(id, value)?,
            0x02 => {
                let code = reader.u8()?;
                Parameter::new(id, "GetStatus")
                    .with("getStatusCode", code)
                    .with("getStatusText", label(GET_STATUS, code))
            }
            0x03 => {
                let bits = category_bits(value)?;
                let table: Vec<(u8, Entry)> = NotifyCategory::ALL
                    .iter()
                    .map(|c| (c.id(), Entry::new(c.id(), c.name())))
                    .collect();
                Parameter::new(id, "NotifyCategory").with("notifyCategory", bitmap(bits, &table))
            }
            NOTIFY_CATEGORY_ID => {
                let bits = category_bits(value)?;
                let parameter = Parameter::new(id, "NotifyCategoryID");
                match NotifyCategory::ALL.iter().find(|c| bits & (1 << c.id()) != 0) {
                    Some(found) => parameter
                        .with("notifyCategoryId", found.id())
                        .with("notifyCategoryText", found.name()),
                    None => parameter.with("notifyCategoryText", ""),
                }
            }
            0x05 => Parameter::new(id, "GetParameterID").with("getParameterId", reader.u8()?),
            0x06 => Parameter::new(id, "GetParameterLength")
                .with("getParameterLength", reader.u32_le()?),
            0x07 => {
                let bits = reader.u16_le()?;
                Parameter::new(id, "ParameterIdList").with(
                    "parameterIdList",
                    bitmap(bits, parameter_id_layout(category)),
                )
            }
            UNIQUE_ID => Parameter::new(id, "UniqueId").with("uniqueId", reader.u16_le()?),
            0x09 => Parameter::new(id, "NotifyId").with("notifyId", reader.u16_le()?),
            0x0A => {
                let code = reader.u8()?;
                Parameter::new(id, "NotificationOperation")
                    .with("notificationOperationCode", code)
                    .with(
                        "notificationOperationText",
                        label(NOTIFICATION_OPERATION, code),
                    )
            }
            0x0B => text(id, "Title", "title", value),
            0x0C => text(id, "Text", "text", value),
            0x0D => text(id, "AppName", "appName", value),
            0x0E => text(id, "AppNameLocal", "appNameLocal", value),
            0x0F => text(id, "NotifyApp", "notifyApp", value),
            0x10 => Parameter::new(id, "RumblingSetting").with(
                "rumblingSetting",
                bitmap(u16::from(reader.u8()?), RUMBLING_SETTING),
            ),
            0x11 => Parameter::new(id, "VibrationPattern")
                .with("vibrationPattern", parse_name_list(value)?),
            0x12 => Parameter::new(id, "LedPattern").with("ledPattern", parse_name_list(value)?),
            0x13 => text(id, "Sender", "sender", value),
            0x14 => text(id, "SenderAddress", "senderAddress", value),
            0x15 => parse_date(id, "ReceiveDate", "receiveDate", value)?,
            0x16 => parse_date(id, "StartDate", "startDate", value)?,
            0x17 => parse_date(id, "EndDate", "endDate", value)?,
            0x18 => text(id, "Area", "area", value),
            0x19 => Parameter::new(id, "Person").with("person", parse_person(value)),
            0x1A => text(id, "MimeTypeForImage", "mimeTypeForImage", value),
            0x1B => text(id, "MimeTypeForMedia", "mimeTypeForMedia", value),
            0x1C => Parameter::new(id, "Image").with("image", Value::Bytes(value.to_vec())),
            0x1D..=0x26 => text(id, CONTENTS[usize::from(id - 0x1D)], "contents", value),
            0x27 => Parameter::new(id, "Media").with("media", Value::Bytes(value.to_vec())),
            0x28 => text(id, "Package", "package", value),
            0x29 => text(id, "Class", "class", value),
            0x2A => text(id, "SharingInformation", "sharingInformation", value),
            0x2B => Parameter::new(id, "BeepPattern").with("beepPattern", parse_name_list(value)?),
            _ => Parameter::unknown(id),
        };
        Ok(parameter)
    }
}

impl ServiceCodec for NotificationCodec {
    fn service_id(&self) -> ServiceId {
        ServiceId::Notification
    }

    fn service_name(&self) -> &'static str {
        ServiceId::Notification.name()
    }

    fn message_name(&self, message_id: u16) -> Option<&'static str> {
        lookup_message(MESSAGES, message_id)
    }

    fn parse_payload(&self, count: u8, payload: &[u8]) -> Result<Vec<Parameter>, ParseError> {
        let mut category = None;
        let mut parameters = Vec::with_capacity(usize::from(count));
        for raw in read_blocks(count, payload)? {
            let parameter = Self::parse_parameter(raw, category)?;
            if raw.id == NOTIFY_CATEGORY_ID {
                category = parameter
                    .get("notifyCategoryId")
                    .and_then(Value::as_int)
                    .and_then(|id| u8::try_from(id).ok())
                    .and_then(NotifyCategory::from_id);
            }
            parameters.push(parameter);
        }
        Ok(parameters)
    }

    fn create_request(&self, request: &Request) -> Result<Vec<u8>, EncodeError> {
        let id = message_id(MESSAGES, request.message_name())
            .ok_or_else(|| unsupported(request, ServiceId::Notification))?;
        let writer = PacketWriter::new(ServiceId::Notification.as_u8(), id);
        match request {
            Request::ConfirmNotifyCategory => writer.finish(),
            Request::NotifyInformation {
                category,
                unique_id,
            } => writer
                .parameter(0x03, category.bitmap())
                .parameter(UNIQUE_ID, unique_id.to_le_bytes())
                .finish(),
            Request::GetPdNotifyDetailDataResp {
                result_code,
                unique_id,
            } => writer
                .parameter(0x00, [*result_code])
                .parameter(UNIQUE_ID, unique_id.to_le_bytes())
                .finish(),
            Request::StartPdApplicationResp { result_code } => {
                writer.parameter(0x00, [*result_code]).finish()
            }
            _ => Err(unsupported(request, ServiceId::Notification)),
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

    fn entry_names(parameter: &Parameter, key: &str) -> Vec<&'static str> {
        parameter
            .get(key)
            .and_then(Value::as_entries)
            .unwrap()
            .iter()
            .map(|e| e.name)
            .collect()
    }

    #[test]
    fn should_encode_confirm_notify_category() {
        let packet = NotificationCodec
            .create_request(&Request::ConfirmNotifyCategory)
            .unwrap();
        assert_eq!(packet, vec![0x03, 0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn should_encode_detail_data_response() {
        let packet = NotificationCodec
            .create_request(&Request::GetPdNotifyDetailDataResp {
                result_code: 0,
                unique_id: 0x0102,
            })
            .unwrap();
        assert_eq!(
            packet,
            vec![
                0x03, 0x01, 0x04, 0x00, 0x02, //
                0x00, 0x01, 0x00, 0x00, 0x00, //
                0x08, 0x02, 0x00, 0x00, 0x02, 0x01,
            ]
        );
    }

    #[test]
    fn should_round_trip_notify_information() {
        let packet = NotificationCodec
            .create_request(&Request::NotifyInformation {
                category: NotifyCategory::Etc,
                unique_id: 7,
            })
            .unwrap();
        assert_eq!(&packet[..4], &[0x03, 0x01, 0x02, 0x00]);
        let parameters = NotificationCodec.parse_payload(packet[4], &packet[5..]).unwrap();
        assert_eq!(entry_names(&parameters[0], "notifyCategory"), vec!["Etc"]);
        assert_eq!(parameters[1].get("uniqueId"), Some(&Value::Int(7)));
    }

    #[test]
    fn should_pick_parameter_id_layout_from_category_id() {
        let mut payload = block(0x04, &[0b0010_0000, 0x00]); // Mail
        payload.extend(block(0x07, &[0b1000_0001, 0x02]));
        let parameters = NotificationCodec.parse_payload(2, &payload).unwrap();
        assert_eq!(parameters[0].get("notifyCategoryId"), Some(&Value::Int(5)));
        assert_eq!(
            entry_names(&parameters[1], "parameterIdList"),
            vec!["AppName", "ReceiveDate", "NotifyCategoryID"]
        );
    }

    #[test]
    fn should_decode_same_bits_differently_per_category() {
        let mut payload = block(0x04, &[0x00, 0x01]); // Etc
        payload.extend(block(0x07, &[0b0000_1000, 0x00]));
        let parameters = NotificationCodec.parse_payload(2, &payload).unwrap();
        assert_eq!(entry_names(&parameters[1], "parameterIdList"), vec!["Contents1"]);

        let mut payload = block(0x04, &[0b1000_0000, 0x00]); // General
        payload.extend(block(0x07, &[0b0000_1000, 0x00]));
        let parameters = NotificationCodec.parse_payload(2, &payload).unwrap();
        assert_eq!(entry_names(&parameters[1], "parameterIdList"), vec!["Title"]);
    }

    #[test]
    fn should_decode_parameter_id_list_as_empty_without_category() {
        let payload = block(0x07, &[0xFF, 0xFF]);
        let parameters = NotificationCodec.parse_payload(1, &payload).unwrap();
        assert!(entry_names(&parameters[0], "parameterIdList").is_empty());
    }

    #[test]
    fn should_leave_category_id_empty_when_no_bit_set() {
        let payload = block(0x04, &[0x00, 0x00]);
        let parameters = NotificationCodec.parse_payload(1, &payload).unwrap();
        assert_eq!(parameters[0].get("notifyCategoryId"), None);
        assert_eq!(
            parameters[0].get("notifyCategoryText"),
            Some(&Value::Text(String::new()))
        );
    }

    #[test]
    fn should_decode_dates_with_one_based_month() {
        let payload = block(0x15, &[0xE3, 0x07, 12, 31, 23, 59, 58]);
        let parameters = NotificationCodec.parse_payload(1, &payload).unwrap();
        let expected = NaiveDate::from_ymd_opt(2019, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 58)
            .unwrap();
        assert_eq!(parameters[0].get("receiveDate"), Some(&Value::Date(expected)));
    }

    #[test]
    fn should_omit_invalid_date() {
        let payload = block(0x16, &[0xE3, 0x07, 13, 1, 0, 0, 0]);
        let parameters = NotificationCodec.parse_payload(1, &payload).unwrap();
        assert_eq!(parameters[0].name, "StartDate");
        assert!(parameters[0].fields.is_empty());
    }

    #[test]
    fn should_split_person_on_nul() {
        let payload = block(0x19, b"\0alice\0\0bob");
        let parameters = NotificationCodec.parse_payload(1, &payload).unwrap();
        assert_eq!(
            parameters[0].get("person"),
            Some(&Value::TextList(vec!["alice".into(), "bob".into()]))
        );
    }

    #[test]
    fn should_decode_length_prefixed_pattern_names() {
        let payload = block(0x11, b"\x04Slow\x04Fast");
        let parameters = NotificationCodec.parse_payload(1, &payload).unwrap();
        assert_eq!(
            parameters[0].get("vibrationPattern").and_then(Value::as_text_list),
            Some(&["Slow".to_owned(), "Fast".to_owned()][..])
        );
    }

    #[test]
    fn should_fail_on_pattern_name_underrun() {
        let payload = block(0x2B, b"\x09Short");
        assert!(NotificationCodec.parse_payload(1, &payload).is_err());
    }

    #[test]
    fn should_name_contents_blocks() {
        let payload = block(0x26, b"last");
        let parameters = NotificationCodec.parse_payload(1, &payload).unwrap();
        assert_eq!(parameters[0].name, "Contents10");
        assert_eq!(parameters[0].get("contents"), Some(&Value::Text("last".into())));
    }

    #[test]
    fn should_refuse_sensor_request() {
        let err = NotificationCodec
            .create_request(&Request::GetSettingInformation)
            .unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedMessage { .. }));
    }
}
