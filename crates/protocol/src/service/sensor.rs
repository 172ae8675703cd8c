//! `PeripheralDeviceSensorInformation` (service 0x03).
//!
//! `OriginalData` has no meaning on its own: its 12-bit reading is decoded
//! according to the `SensorType` that precedes it in the same payload.

use super::{
    MessageTable, ServiceCodec, ServiceId, label, lookup_message, message_id, parse_cancel,
    parse_result_code, unsupported,
};
use crate::error::{EncodeError, ParseError};
use crate::ieee754::{self, FloatFormat};
use crate::request::{Request, SensorType, Thresholds};
use crate::tlv::{PacketWriter, RawParameter, Reader, read_blocks};
use crate::value::Parameter;

/// Message ID of `NOTIFY_PD_SENSOR_INFO`.
pub const NOTIFY_PD_SENSOR_INFO: u16 = 0x04;

/// Parameter ID of `SensorType`.
pub const SENSOR_TYPE: u8 = 0x02;

const MESSAGES: MessageTable = &[
    (0x00, "GET_SENSOR_INFO"),
    (0x01, "GET_SENSOR_INFO_RESP"),
    (0x02, "SET_NOTIFY_SENSOR_INFO"),
    (0x03, "SET_NOTIFY_SENSOR_INFO_RESP"),
    (NOTIFY_PD_SENSOR_INFO, "NOTIFY_PD_SENSOR_INFO"),
];

const STATUS: &[&str] = &["OFF", "ON"];

const READING_MASK: u16 = 0x0FFF;
const FLAG_BIT: u16 = 1 << 11;
const COUNT_MASK: u16 = 0x07FF;

/// Battery reading: `(charge required, level in %)`.
#[must_use]
pub fn battery(reading: u16) -> (bool, f64) {
    let level = (f64::from(reading & COUNT_MASK) / 10.0).min(100.0);
    (reading & FLAG_BIT != 0, level)
}

/// Event sensors (opening, human detection, move): `(flag, count)`.
#[must_use]
pub fn flag_and_count(reading: u16) -> (bool, u16) {
    (reading & FLAG_BIT != 0, reading & COUNT_MASK)
}

/// Illuminance in lux. Readings above 2047 switch to 50 lx steps.
#[must_use]
pub fn illuminance(reading: u16) -> u32 {
    let reading = u32::from(reading & READING_MASK);
    if reading >> 11 == 0 {
        reading
    } else {
        (reading - 2047) * 50 + 2000
    }
}

/// Decode a 12-bit `OriginalData` reading for `sensor`.
///
/// Motion sensors and unknown types carry no reading and yield an empty
/// parameter.
#[must_use]
pub fn original_data(id: u8, sensor: Option<SensorType>, reading: u16) -> Parameter {
    let parameter = Parameter::new(id, "OriginalData");
    let reading = reading & READING_MASK;
    match sensor {
        Some(SensorType::Battery) => {
            let (charge_required, level) = battery(reading);
            parameter
                .with("chargeRequired", charge_required)
                .with("chargeLevel", level)
        }
        Some(SensorType::Temperature) => parameter.with(
            "temperature",
            ieee754::decode(reading, FloatFormat::TEMPERATURE),
        ),
        Some(SensorType::Humidity) => {
            parameter.with("humidity", ieee754::decode(reading, FloatFormat::HUMIDITY))
        }
        Some(SensorType::Pressure) => {
            parameter.with("pressure", ieee754::decode(reading, FloatFormat::PRESSURE))
        }
        Some(SensorType::OpenClose) => {
            let (open, count) = flag_and_count(reading);
            parameter
                .with("openingStatus", open)
                .with("openingCount", count)
        }
        Some(SensorType::HumanDetection) => {
            let (detected, count) = flag_and_count(reading);
            parameter
                .with("humanDetectionResponse", detected)
                .with("humanDetectionCount", count)
        }
        Some(SensorType::Move) => {
            let (moved, count) = flag_and_count(reading);
            parameter
                .with("moveResponse", moved)
                .with("moveCount", count)
        }
        Some(SensorType::Illuminance) => parameter.with("illuminance", illuminance(reading)),
        Some(SensorType::Gyroscope | SensorType::Accelerometer | SensorType::Orientation)
        | None => parameter,
    }
}

/// Codec for the sensor information service.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorCodec;

impl SensorCodec {
    fn parse_parameter(
        raw: RawParameter<'_>,
        sensor: Option<SensorType>,
    ) -> Result<Parameter, ParseError> {
        let RawParameter { id, value } = raw;
        let mut reader = Reader::new(value);
        let parameter = match id {
            0x00 => parse_result_code(id, value)?,
            0x01 => parse_cancel(id, value)?,
            SENSOR_TYPE => {
                let code = reader.u8()?;
                let text = SensorType::from_code(code).map_or("", SensorType::name);
                Parameter::new(id, "SensorType")
                    .with("sensorTypeCode", code)
                    .with("sensorTypeText", text)
            }
            0x03 => {
                let code = reader.u8()?;
                Parameter::new(id, "Status")
                    .with("statusCode", code)
                    .with("statusText", label(STATUS, code))
            }
            0x04 => Parameter::new(id, "X_value").with("xValue", reader.f32_le()?),
            0x05 => Parameter::new(id, "Y_value").with("yValue", reader.f32_le()?),
            0x06 => Parameter::new(id, "Z_value").with("zValue", reader.f32_le()?),
            0x07 => Parameter::new(id, "X_threshold").with("xThreshold", reader.f32_le()?),
            0x08 => Parameter::new(id, "Y_threshold").with("yThreshold", reader.f32_le()?),
            0x09 => Parameter::new(id, "Z_threshold").with("zThreshold", reader.f32_le()?),
            0x0A => original_data(id, sensor, reader.u16_le()?),
            _ => Parameter::unknown(id),
        };
        Ok(parameter)
    }

    fn write_thresholds(
        mut writer: PacketWriter,
        thresholds: Thresholds,
    ) -> Result<PacketWriter, EncodeError> {
        let axes = [
            (0x07, "X_threshold", thresholds.x),
            (0x08, "Y_threshold", thresholds.y),
            (0x09, "Z_threshold", thresholds.z),
        ];
        for (id, field, value) in axes {
            if let Some(value) = value {
                if !value.is_finite() {
                    return Err(EncodeError::InvalidParameter {
                        field,
                        reason: "threshold must be a finite number",
                    });
                }
                writer = writer.parameter(id, value.to_le_bytes());
            }
        }
        Ok(writer)
    }
}

impl ServiceCodec for SensorCodec {
    fn service_id(&self) -> ServiceId {
        ServiceId::Sensor
    }

    fn service_name(&self) -> &'static str {
        ServiceId::Sensor.name()
    }

    fn message_name(&self, message_id: u16) -> Option<&'static str> {
        lookup_message(MESSAGES, message_id)
    }

    fn parse_payload(&self, count: u8, payload: &[u8]) -> Result<Vec<Parameter>, ParseError> {
        let mut sensor = None;
        let mut parameters = Vec::with_capacity(usize::from(count));
        for raw in read_blocks(count, payload)? {
            let parameter = Self::parse_parameter(raw, sensor)?;
            if raw.id == SENSOR_TYPE {
                sensor = parameter
                    .get("sensorTypeCode")
                    .and_then(crate::value::Value::as_int)
                    .and_then(|code| u8::try_from(code).ok())
                    .and_then(SensorType::from_code);
            }
            parameters.push(parameter);
        }
        Ok(parameters)
    }

    fn create_request(&self, request: &Request) -> Result<Vec<u8>, EncodeError> {
        let id = message_id(MESSAGES, request.message_name())
            .ok_or_else(|| unsupported(request, ServiceId::Sensor))?;
        let writer = PacketWriter::new(ServiceId::Sensor.as_u8(), id);
        match request {
            Request::GetSensorInfo { sensor_type } => writer
                .parameter(SENSOR_TYPE, [sensor_type.code()])
                .finish(),
            Request::SetNotifySensorInfo {
                sensor_type,
                enabled,
                thresholds,
                original_data,
            } => {
                let mut writer = writer
                    .parameter(SENSOR_TYPE, [sensor_type.code()])
                    .parameter(0x03, [u8::from(*enabled)]);
                if sensor_type.is_motion() {
                    writer = Self::write_thresholds(writer, *thresholds)?;
                }
                writer.optional(0x0A, original_data.clone()).finish()
            }
            _ => Err(unsupported(request, ServiceId::Sensor)),
        }
    }
}
