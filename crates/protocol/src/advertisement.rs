//! Vendor data carried in the manufacturer-specific advertisement field.
//!
//! | Bytes | Content |
//! |-------|---------|
//! | 0-1 | Company ID (LE) |
//! | 2-6 | version:4, vendor ID:8, individual number:20 (BE bit stream) |
//! | 6.. | beacon records, 2 bytes each (BE): service ID:4, payload:12 |

use serde::Serialize;

use crate::ieee754::{self, FloatFormat};
use crate::service::{operation, sensor};

/// Company ID assigned to NTT docomo.
pub const NTT_DOCOMO: u16 = 0x02E2;

const MIN_LEN: usize = 8;
const BEACON_OFFSET: usize = 6;

/// Decoded manufacturer data of a Linking advertisement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorData {
    pub company_id: u16,
    pub company_name: &'static str,
    pub version: u8,
    pub vendor_id: u8,
    pub individual_number: u32,
    pub beacons: Vec<BeaconData>,
}

/// One beacon record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BeaconData {
    General,
    Temperature { temperature: f64 },
    Humidity { humidity: f64 },
    Pressure { pressure: f64 },
    #[serde(rename_all = "camelCase")]
    Battery { charge_required: bool, charge_level: f64 },
    #[serde(rename_all = "camelCase")]
    Button { button_id: u16, button_name: &'static str },
    #[serde(rename_all = "camelCase")]
    OpenClose { opening_status: bool, opening_count: u16 },
    #[serde(rename_all = "camelCase")]
    HumanDetection {
        human_detection_response: bool,
        human_detection_count: u16,
    },
    #[serde(rename_all = "camelCase")]
    Move { move_response: bool, move_count: u16 },
    Illuminance { illuminance: u32 },
    /// Vendor-defined bits rendered as a 12-character binary string.
    Vendor { bin: String },
    #[serde(rename_all = "camelCase")]
    Unknown { service_id: u8, payload: u16 },
}

impl BeaconData {
    fn decode(record: u16) -> Self {
        // The shift leaves 4 bits, the cast cannot truncate.
        #[allow(clippy::cast_possible_truncation)]
        let service_id = (record >> 12) as u8;
        let payload = record & 0x0FFF;
        match service_id {
            0 => Self::General,
            1 => Self::Temperature {
                temperature: ieee754::decode(payload, FloatFormat::TEMPERATURE),
            },
            2 => Self::Humidity {
                humidity: ieee754::decode(payload, FloatFormat::HUMIDITY),
            },
            3 => Self::Pressure {
                pressure: ieee754::decode(payload, FloatFormat::PRESSURE),
            },
            4 => {
                let (charge_required, charge_level) = sensor::battery(payload);
                Self::Battery {
                    charge_required,
                    charge_level,
                }
            }
            5 => Self::Button {
                button_id: payload,
                button_name: u8::try_from(payload).map_or("", operation::button_name),
            },
            6 => {
                let (opening_status, opening_count) = sensor::flag_and_count(payload);
                Self::OpenClose {
                    opening_status,
                    opening_count,
                }
            }
            7 => {
                let (response, count) = sensor::flag_and_count(payload);
                Self::HumanDetection {
                    human_detection_response: response,
                    human_detection_count: count,
                }
            }
            8 => {
                let (move_response, move_count) = sensor::flag_and_count(payload);
                Self::Move {
                    move_response,
                    move_count,
                }
            }
            9 => Self::Illuminance {
                illuminance: sensor::illuminance(payload),
            },
            15 => Self::Vendor {
                bin: format!("{payload:012b}"),
            },
            _ => Self::Unknown {
                service_id,
                payload,
            },
        }
    }

    /// Beacon service ID (0-15).
    #[must_use]
    pub fn service_id(&self) -> u8 {
        match self {
            Self::General => 0,
            Self::Temperature { .. } => 1,
            Self::Humidity { .. } => 2,
            Self::Pressure { .. } => 3,
            Self::Battery { .. } => 4,
            Self::Button { .. } => 5,
            Self::OpenClose { .. } => 6,
            Self::HumanDetection { .. } => 7,
            Self::Move { .. } => 8,
            Self::Illuminance { .. } => 9,
            Self::Vendor { .. } => 15,
            Self::Unknown { service_id, .. } => *service_id,
        }
    }

    /// Human-readable label of the record kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Temperature { .. } => "Temperature (°C)",
            Self::Humidity { .. } => "Humidity (%)",
            Self::Pressure { .. } => "Air pressure (hPa)",
            Self::Battery { .. } => "Remaining battery power (Threshold value or less)",
            Self::Button { .. } => "Pressed button information",
            Self::OpenClose { .. } => "Opening/closing",
            Self::HumanDetection { .. } => "Human detection",
            Self::Move { .. } => "Vibration",
            Self::Illuminance { .. } => "Illuminance (lx)",
            Self::Vendor { .. } => "Vendor",
            Self::Unknown { .. } => "",
        }
    }
}

/// Decode manufacturer data, company ID included.
///
/// Returns `None` when fewer than 8 bytes are present.
#[must_use]
pub fn decode_vendor_data(data: &[u8]) -> Option<VendorData> {
    if data.len() < MIN_LEN {
        return None;
    }
    let company_id = u16::from_le_bytes([data[0], data[1]]);
    let company_name = if company_id == NTT_DOCOMO {
        "NTT docomo"
    } else {
        "Unknown"
    };
    let version = data[2] >> 4;
    let vendor_id = (u16::from_be_bytes([data[2], data[3]]) >> 4).to_le_bytes()[0];
    let individual_number =
        (u32::from_be_bytes([data[3], data[4], data[5], data[6]]) >> 8) & 0x000F_FFFF;
    let beacons = data[BEACON_OFFSET..]
        .chunks_exact(2)
        .map(|pair| BeaconData::decode(u16::from_be_bytes([pair[0], pair[1]])))
        .collect();

    Some(VendorData {
        company_id,
        company_name,
        version,
        vendor_id,
        individual_number,
        beacons,
    })
}

/// Rough distance estimate in metres from TX power and RSSI.
#[must_use]
pub fn estimate_distance(tx_power: i16, rssi: i16) -> f64 {
    10_f64.powf(f64::from(i32::from(tx_power) - i32::from(rssi)) / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_decode_header_fields() {
        let data = [0xE2, 0x02, 0x1A, 0xBC, 0xDE, 0xF0, 0x12, 0x00];
        let vendor = decode_vendor_data(&data).unwrap();
        assert_eq!(vendor.company_id, 0x02E2);
        assert_eq!(vendor.company_name, "NTT docomo");
        assert_eq!(vendor.version, 0x1);
        assert_eq!(vendor.vendor_id, 0xAB);
        assert_eq!(vendor.individual_number, 0xC_DEF0);
    }

    #[test]
    fn should_name_unknown_company() {
        let data = [0x4C, 0x00, 0, 0, 0, 0, 0, 0];
        assert_eq!(decode_vendor_data(&data).unwrap().company_name, "Unknown");
    }

    #[test]
    fn should_reject_short_manufacturer_data() {
        assert_eq!(decode_vendor_data(&[0xE2, 0x02, 0, 0, 0, 0, 0]), None);
    }

    #[test]
    fn should_decode_beacon_records() {
        let data = [
            0xE2, 0x02, 0x00, 0x00, 0x00, 0x00, //
            0x15, 0xBC, // temperature 23.5
            0x50, 0x02, // button SingleClick
            0x98, 0x00, // illuminance 2050
            0xF0, 0x05, // vendor bits
        ];
        let vendor = decode_vendor_data(&data).unwrap();
        assert_eq!(vendor.beacons.len(), 4);
        match &vendor.beacons[0] {
            BeaconData::Temperature { temperature } => {
                assert!((temperature - 23.5).abs() < 1e-9);
            }
            other => panic!("unexpected beacon {other:?}"),
        }
        assert_eq!(
            vendor.beacons[1],
            BeaconData::Button {
                button_id: 2,
                button_name: "SingleClick"
            }
        );
        assert_eq!(vendor.beacons[2], BeaconData::Illuminance { illuminance: 2050 });
        assert_eq!(
            vendor.beacons[3],
            BeaconData::Vendor {
                bin: "000000000101".into()
            }
        );
        assert_eq!(vendor.beacons[3].service_id(), 15);
    }

    #[test]
    fn should_ignore_trailing_odd_byte() {
        let data = [0xE2, 0x02, 0, 0, 0, 0, 0x00, 0x00, 0x42];
        assert_eq!(decode_vendor_data(&data).unwrap().beacons, vec![BeaconData::General]);
    }

    #[test]
    fn should_keep_unassigned_service_ids() {
        let data = [0xE2, 0x02, 0, 0, 0, 0, 0xA1, 0x23];
        let beacon = &decode_vendor_data(&data).unwrap().beacons[0];
        assert_eq!(
            beacon,
            &BeaconData::Unknown {
                service_id: 10,
                payload: 0x123
            }
        );
        assert_eq!(beacon.name(), "");
    }

    #[test]
    fn should_estimate_one_metre_at_equal_power() {
        assert!((estimate_distance(-59, -59) - 1.0).abs() < 1e-12);
        assert!((estimate_distance(0, -20) - 10.0).abs() < 1e-9);
    }
}
