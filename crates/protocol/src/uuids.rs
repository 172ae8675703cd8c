//! GATT and advertisement UUIDs of the Linking profile.

use uuid::Uuid;

/// Vendor primary service carrying the request/indication characteristics.
pub const PRIMARY_SERVICE: Uuid = Uuid::from_u128(0xb3b3_6901_50d3_4044_808d_5083_5b13_a6cd);

/// Characteristic requests are written to (write with response).
pub const WRITE_CHARACTERISTIC: Uuid = Uuid::from_u128(0xb3b3_9101_50d3_4044_808d_5083_5b13_a6cd);

/// Characteristic the device indicates responses and notifications on.
pub const INDICATE_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0xb3b3_9102_50d3_4044_808d_5083_5b13_a6cd);

/// Standard Generic Access service.
pub const GENERIC_ACCESS_SERVICE: Uuid = bluetooth_uuid(0x1800);

/// Standard Device Name characteristic.
pub const DEVICE_NAME_CHARACTERISTIC: Uuid = bluetooth_uuid(0x2a00);

/// 16-bit service UUID advertised by Linking devices.
pub const ADVERTISED_SERVICE: Uuid = bluetooth_uuid(0xfe4e);

/// Service UUIDs a scan is filtered on.
pub const DISCOVERY_SERVICES: [Uuid; 2] = [PRIMARY_SERVICE, ADVERTISED_SERVICE];

const BLUETOOTH_BASE: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// Expand a 16-bit assigned number onto the Bluetooth base UUID.
#[must_use]
pub const fn bluetooth_uuid(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE | ((short as u128) << 96))
}
