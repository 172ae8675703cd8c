//! What a connected device can do, and typed handles to do it.
//!
//! The table is built once per connection from the [`DeviceInfo`] gathered
//! during the handshake. Handles borrow the connection and turn capability
//! operations into protocol requests:
//!
//! ```ignore
//! let led = device.led()?;
//! led.turn_on(Choice::Name("Red"), Choice::Default, Some(3)).await?;
//! device.sensor(SensorType::Temperature)?.start().await?;
//! ```

use std::collections::BTreeSet;

use linking_protocol::request::{SensorType, SettingRequest, SettingSelection};
use linking_protocol::uuids::DEVICE_NAME_CHARACTERISTIC;
use linking_protocol::{Fields, Parameter, Request};
use serde::Serialize;

use crate::connection::DeviceConnection;
use crate::device_info::DeviceInfo;
use crate::error::DeviceError;
use crate::ports::BlePeripheral;

/// Local name prefixes of boards that have a button but do not report it.
const BUTTON_NAME_PREFIXES: [&str; 2] = ["Linking Board01", "BLEAD-LK-TSH"];

const DEFAULT_LED_COLOR: u8 = 1;
const DEFAULT_PATTERN: u8 = 2;
const DEFAULT_DURATION: u8 = 5;

const MAX_DEVICE_NAME_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    DeviceName,
    Led,
    Vibration,
    Button,
    Gyroscope,
    Accelerometer,
    Orientation,
    Battery,
    Temperature,
    Humidity,
    Pressure,
    OpenClose,
    Human,
    Move,
    Illuminance,
}

impl Capability {
    pub const ALL: [Self; 15] = [
        Self::DeviceName,
        Self::Led,
        Self::Vibration,
        Self::Button,
        Self::Gyroscope,
        Self::Accelerometer,
        Self::Orientation,
        Self::Battery,
        Self::Temperature,
        Self::Humidity,
        Self::Pressure,
        Self::OpenClose,
        Self::Human,
        Self::Move,
        Self::Illuminance,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DeviceName => "deviceName",
            Self::Led => "led",
            Self::Vibration => "vibration",
            Self::Button => "button",
            Self::Gyroscope => "gyroscope",
            Self::Accelerometer => "accelerometer",
            Self::Orientation => "orientation",
            Self::Battery => "battery",
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Pressure => "pressure",
            Self::OpenClose => "openclose",
            Self::Human => "human",
            Self::Move => "move",
            Self::Illuminance => "illuminance",
        }
    }

    /// Sensor backing this capability, if it is one.
    #[must_use]
    pub const fn sensor(self) -> Option<SensorType> {
        match self {
            Self::Gyroscope => Some(SensorType::Gyroscope),
            Self::Accelerometer => Some(SensorType::Accelerometer),
            Self::Orientation => Some(SensorType::Orientation),
            Self::Battery => Some(SensorType::Battery),
            Self::Temperature => Some(SensorType::Temperature),
            Self::Humidity => Some(SensorType::Humidity),
            Self::Pressure => Some(SensorType::Pressure),
            Self::OpenClose => Some(SensorType::OpenClose),
            Self::Human => Some(SensorType::HumanDetection),
            Self::Move => Some(SensorType::Move),
            Self::Illuminance => Some(SensorType::Illuminance),
            Self::DeviceName | Self::Led | Self::Vibration | Self::Button => None,
        }
    }

    #[must_use]
    pub const fn for_sensor(sensor: SensorType) -> Self {
        match sensor {
            SensorType::Gyroscope => Self::Gyroscope,
            SensorType::Accelerometer => Self::Accelerometer,
            SensorType::Orientation => Self::Orientation,
            SensorType::Battery => Self::Battery,
            SensorType::Temperature => Self::Temperature,
            SensorType::Humidity => Self::Humidity,
            SensorType::Pressure => Self::Pressure,
            SensorType::OpenClose => Self::OpenClose,
            SensorType::HumanDetection => Self::Human,
            SensorType::Move => Self::Move,
            SensorType::Illuminance => Self::Illuminance,
        }
    }

    /// Sensors reported through the `ExSensorType` bitmap rather than
    /// `DeviceCapability`.
    const fn is_ex_sensor(self) -> bool {
        matches!(
            self,
            Self::OpenClose | Self::Human | Self::Move | Self::Illuminance
        )
    }
}

/// Capabilities of one connected device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    present: BTreeSet<Capability>,
    led_colors: Vec<String>,
    led_patterns: Vec<String>,
    vibration_patterns: Vec<String>,
}

impl Capabilities {
    /// Derive the table from the handshake results, the advertised local
    /// name and whether the GAP device name characteristic was found.
    #[must_use]
    pub fn build(info: &DeviceInfo, local_name: &str, has_device_name: bool) -> Self {
        let mut table = Self::default();
        if has_device_name {
            table.present.insert(Capability::DeviceName);
        }
        if info.exsensors.contains_key("Button")
            || BUTTON_NAME_PREFIXES
                .iter()
                .any(|prefix| local_name.starts_with(prefix))
        {
            table.present.insert(Capability::Button);
        }
        if let Some(led) = info.settings.get("LED")
            && !led.colors.is_empty()
            && !led.patterns.is_empty()
        {
            table.present.insert(Capability::Led);
            table.led_colors.clone_from(&led.colors);
            table.led_patterns.clone_from(&led.patterns);
        }
        if let Some(vibration) = info.settings.get("Vibration")
            && !vibration.patterns.is_empty()
        {
            table.present.insert(Capability::Vibration);
            table.vibration_patterns.clone_from(&vibration.patterns);
        }
        for capability in Capability::ALL {
            let Some(sensor) = capability.sensor() else {
                continue;
            };
            let reported = if capability.is_ex_sensor() {
                &info.exsensors
            } else {
                &info.capabilities
            };
            if reported.contains_key(sensor.name()) {
                table.present.insert(capability);
            }
        }
        table
    }

    #[must_use]
    pub fn contains(&self, capability: Capability) -> bool {
        self.present.contains(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.present.iter().copied()
    }

    #[must_use]
    pub fn led_colors(&self) -> &[String] {
        &self.led_colors
    }

    #[must_use]
    pub fn led_patterns(&self) -> &[String] {
        &self.led_patterns
    }

    #[must_use]
    pub fn vibration_patterns(&self) -> &[String] {
        &self.vibration_patterns
    }
}

/// Pick an entry of a device-reported name list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Choice<'a> {
    /// Use the default for the setting.
    #[default]
    Default,
    /// 1-based position in the list.
    Number(u8),
    Name(&'a str),
}

impl Choice<'_> {
    /// Resolve to a 1-based number, falling back to `default` for anything
    /// the device did not list.
    fn resolve(self, names: &[String], default: u8) -> u8 {
        match self {
            Self::Default => default,
            Self::Number(number) => {
                if number >= 1 && usize::from(number) <= names.len() {
                    number
                } else {
                    default
                }
            }
            Self::Name(name) => names
                .iter()
                .position(|candidate| candidate == name)
                .and_then(|index| u8::try_from(index + 1).ok())
                .unwrap_or(default),
        }
    }
}

impl From<u8> for Choice<'_> {
    fn from(number: u8) -> Self {
        Self::Number(number)
    }
}

impl<'a> From<&'a str> for Choice<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

fn duration_or_default(duration: Option<u8>) -> u8 {
    duration.filter(|seconds| *seconds != 0).unwrap_or(DEFAULT_DURATION)
}

/// Fields a sensor notification or `GET_SENSOR_INFO_RESP` carries for one
/// sensor: `x`/`y`/`z` for motion sensors, the decoded `OriginalData`
/// otherwise.
pub(crate) fn sensor_fields(sensor: SensorType, parameters: &[Parameter]) -> Fields {
    let mut fields = Fields::new();
    for parameter in parameters {
        if sensor.is_motion() {
            for (axis, key) in [("x", "xValue"), ("y", "yValue"), ("z", "zValue")] {
                if let Some(value) = parameter.get(key) {
                    fields.insert(axis, value.clone());
                }
            }
        } else if parameter.name == "OriginalData" {
            fields.extend(parameter.fields.iter().map(|(k, v)| (*k, v.clone())));
        }
    }
    fields
}

impl<P: BlePeripheral> DeviceConnection<P> {
    fn require(&self, capability: Capability) -> Result<Capabilities, DeviceError> {
        let capabilities = self.capabilities().ok_or(DeviceError::NotConnected)?;
        if capabilities.contains(capability) {
            Ok(capabilities)
        } else {
            Err(DeviceError::CapabilityUnavailable(capability.name()))
        }
    }

    /// # Errors
    ///
    /// Returns [`DeviceError::NotConnected`] before the handshake completed,
    /// or [`DeviceError::CapabilityUnavailable`].
    pub fn device_name(&self) -> Result<DeviceName<'_, P>, DeviceError> {
        self.require(Capability::DeviceName)?;
        Ok(DeviceName { connection: self })
    }

    /// # Errors
    ///
    /// Same as [`device_name`](Self::device_name).
    pub fn led(&self) -> Result<Led<'_, P>, DeviceError> {
        let capabilities = self.require(Capability::Led)?;
        Ok(Led {
            connection: self,
            colors: capabilities.led_colors,
            patterns: capabilities.led_patterns,
        })
    }

    /// # Errors
    ///
    /// Same as [`device_name`](Self::device_name).
    pub fn vibration(&self) -> Result<Vibration<'_, P>, DeviceError> {
        let capabilities = self.require(Capability::Vibration)?;
        Ok(Vibration {
            connection: self,
            patterns: capabilities.vibration_patterns,
        })
    }

    /// # Errors
    ///
    /// Same as [`device_name`](Self::device_name).
    pub fn sensor(&self, sensor: SensorType) -> Result<Sensor<'_, P>, DeviceError> {
        self.require(Capability::for_sensor(sensor))?;
        Ok(Sensor {
            connection: self,
            sensor,
        })
    }
}

/// GAP device name (`2a00`).
pub struct DeviceName<'a, P> {
    connection: &'a DeviceConnection<P>,
}

impl<P: BlePeripheral> DeviceName<'_, P> {
    /// # Errors
    ///
    /// Returns [`DeviceError::Transport`] when the read fails.
    pub async fn get(&self) -> Result<String, DeviceError> {
        let raw = self
            .connection
            .read_characteristic(DEVICE_NAME_CHARACTERISTIC)
            .await?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// # Errors
    ///
    /// Returns [`DeviceError::InvalidDeviceName`] unless `name` is 1 to 32
    /// bytes of UTF-8, or [`DeviceError::Transport`] when the write fails.
    pub async fn set(&self, name: &str) -> Result<(), DeviceError> {
        if name.is_empty() {
            return Err(DeviceError::InvalidDeviceName("name is required"));
        }
        if name.len() > MAX_DEVICE_NAME_LEN {
            return Err(DeviceError::InvalidDeviceName(
                "length must be in the range 1 to 32 bytes",
            ));
        }
        self.connection
            .write_characteristic(DEVICE_NAME_CHARACTERISTIC, name.as_bytes())
            .await
    }
}

async fn stop_demonstration<P: BlePeripheral>(
    connection: &DeviceConnection<P>,
) -> Result<Fields, DeviceError> {
    let request = Request::SelectSettingInformation {
        request: SettingRequest::StopDemonstration,
        data: Vec::new(),
    };
    Ok(connection.write(&request).await?.data)
}

pub struct Led<'a, P> {
    connection: &'a DeviceConnection<P>,
    colors: Vec<String>,
    patterns: Vec<String>,
}

impl<P: BlePeripheral> Led<'_, P> {
    #[must_use]
    pub fn colors(&self) -> &[String] {
        &self.colors
    }

    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Light the LED. Unknown colors or patterns fall back to color 1 and
    /// pattern 2; a missing or zero duration becomes 5 seconds.
    ///
    /// # Errors
    ///
    /// Any error of [`DeviceConnection::write`].
    pub async fn turn_on(
        &self,
        color: Choice<'_>,
        pattern: Choice<'_>,
        duration: Option<u8>,
    ) -> Result<Fields, DeviceError> {
        let selection = SettingSelection::Led {
            color: color.resolve(&self.colors, DEFAULT_LED_COLOR),
            pattern: pattern.resolve(&self.patterns, DEFAULT_PATTERN),
            duration: duration_or_default(duration),
        };
        let request = Request::SelectSettingInformation {
            request: SettingRequest::StartDemonstration,
            data: vec![selection],
        };
        Ok(self.connection.write(&request).await?.data)
    }

    /// # Errors
    ///
    /// Any error of [`DeviceConnection::write`].
    pub async fn turn_off(&self) -> Result<Fields, DeviceError> {
        stop_demonstration(self.connection).await
    }
}

pub struct Vibration<'a, P> {
    connection: &'a DeviceConnection<P>,
    patterns: Vec<String>,
}

impl<P: BlePeripheral> Vibration<'_, P> {
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Start vibrating. Unknown patterns fall back to pattern 2; a missing
    /// or zero duration becomes 5 seconds.
    ///
    /// # Errors
    ///
    /// Any error of [`DeviceConnection::write`].
    pub async fn turn_on(
        &self,
        pattern: Choice<'_>,
        duration: Option<u8>,
    ) -> Result<Fields, DeviceError> {
        let selection = SettingSelection::Vibration {
            pattern: pattern.resolve(&self.patterns, DEFAULT_PATTERN),
            duration: duration_or_default(duration),
        };
        let request = Request::SelectSettingInformation {
            request: SettingRequest::StartDemonstration,
            data: vec![selection],
        };
        Ok(self.connection.write(&request).await?.data)
    }

    /// # Errors
    ///
    /// Any error of [`DeviceConnection::write`].
    pub async fn turn_off(&self) -> Result<Fields, DeviceError> {
        stop_demonstration(self.connection).await
    }
}

pub struct Sensor<'a, P> {
    connection: &'a DeviceConnection<P>,
    sensor: SensorType,
}

impl<P: BlePeripheral> Sensor<'_, P> {
    #[must_use]
    pub fn sensor_type(&self) -> SensorType {
        self.sensor
    }

    /// Enable notifications; readings arrive as
    /// [`DeviceEvent::Sensor`](crate::connection::DeviceEvent::Sensor).
    ///
    /// # Errors
    ///
    /// Any error of [`DeviceConnection::write`].
    pub async fn start(&self) -> Result<Fields, DeviceError> {
        let request = Request::set_notify_sensor(self.sensor, true);
        Ok(self.connection.write(&request).await?.data)
    }

    /// # Errors
    ///
    /// Any error of [`DeviceConnection::write`].
    pub async fn stop(&self) -> Result<Fields, DeviceError> {
        let request = Request::set_notify_sensor(self.sensor, false);
        Ok(self.connection.write(&request).await?.data)
    }

    /// Read the current value once. Motion sensors are reshaped to
    /// `{x, y, z}`.
    ///
    /// # Errors
    ///
    /// Any error of [`DeviceConnection::write`].
    pub async fn get(&self) -> Result<Fields, DeviceError> {
        let request = Request::GetSensorInfo {
            sensor_type: self.sensor,
        };
        let response = self.connection.write(&request).await?;
        if self.sensor.is_motion() {
            Ok(sensor_fields(self.sensor, &response.message.parameters))
        } else {
            Ok(response.data)
        }
    }
}
