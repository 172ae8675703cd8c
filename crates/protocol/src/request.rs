//! Outbound requests and the vocabulary they are built from.

use crate::service::ServiceId;

/// Sensor kinds addressed by the sensor information service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SensorType {
    Gyroscope,
    Accelerometer,
    Orientation,
    Battery,
    Temperature,
    Humidity,
    Pressure,
    OpenClose,
    HumanDetection,
    Move,
    Illuminance,
}

impl SensorType {
    pub const ALL: [Self; 11] = [
        Self::Gyroscope,
        Self::Accelerometer,
        Self::Orientation,
        Self::Battery,
        Self::Temperature,
        Self::Humidity,
        Self::Pressure,
        Self::OpenClose,
        Self::HumanDetection,
        Self::Move,
        Self::Illuminance,
    ];

    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Label used on the wire by the property service bitmaps.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gyroscope => "Gyroscope",
            Self::Accelerometer => "Accelerometer",
            Self::Orientation => "Orientation",
            Self::Battery => "Battery",
            Self::Temperature => "Temperature",
            Self::Humidity => "Humidity",
            Self::Pressure => "Atmospheric pressure",
            Self::OpenClose => "Opening and closing",
            Self::HumanDetection => "Human detection",
            Self::Move => "Move",
            Self::Illuminance => "Illuminance",
        }
    }

    /// Motion sensors report x/y/z values and accept thresholds.
    #[must_use]
    pub const fn is_motion(self) -> bool {
        matches!(self, Self::Gyroscope | Self::Accelerometer | Self::Orientation)
    }
}

/// Notification categories of the notification service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotifyCategory {
    NotNotify,
    All,
    PhoneIncomingCall,
    PhoneInCall,
    PhoneIdle,
    Mail,
    Schedule,
    General,
    Etc,
}

impl NotifyCategory {
    pub const ALL: [Self; 9] = [
        Self::NotNotify,
        Self::All,
        Self::PhoneIncomingCall,
        Self::PhoneInCall,
        Self::PhoneIdle,
        Self::Mail,
        Self::Schedule,
        Self::General,
        Self::Etc,
    ];

    #[must_use]
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }

    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NotNotify => "NotNotify",
            Self::All => "All",
            Self::PhoneIncomingCall => "PhoneIncomingCall",
            Self::PhoneInCall => "PhoneInCall",
            Self::PhoneIdle => "PhoneIdle",
            Self::Mail => "Mail",
            Self::Schedule => "Schedule",
            Self::General => "General",
            Self::Etc => "Etc",
        }
    }

    /// Two-byte little-endian bitmap with only this category set.
    #[must_use]
    pub const fn bitmap(self) -> [u8; 2] {
        (1_u16 << self.id()).to_le_bytes()
    }
}

/// Which name list `GET_SETTING_NAME` asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingNameType {
    LedColor,
    LedPattern,
    VibrationPattern,
    BeepPattern,
}

impl SettingNameType {
    pub const ALL: [Self; 4] = [
        Self::LedColor,
        Self::LedPattern,
        Self::VibrationPattern,
        Self::BeepPattern,
    ];

    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::LedColor => "LEDColorName",
            Self::LedPattern => "LEDPatternName",
            Self::VibrationPattern => "VibrationPatternName",
            Self::BeepPattern => "BeepPatternName",
        }
    }
}

/// Action carried by `SELECT_SETTING_INFORMATION`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingRequest {
    CurrentSetting,
    StartDemonstration,
    StopDemonstration,
    Setting,
}

impl SettingRequest {
    pub const ALL: [Self; 4] = [
        Self::CurrentSetting,
        Self::StartDemonstration,
        Self::StopDemonstration,
        Self::Setting,
    ];

    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CurrentSetting => "CURRENT_SETTING",
            Self::StartDemonstration => "START_DEMONSTRATION",
            Self::StopDemonstration => "STOP_DEMONSTRATION",
            Self::Setting => "SETTING",
        }
    }

    /// Whether the request is meaningless without setting records.
    #[must_use]
    pub const fn requires_data(self) -> bool {
        matches!(self, Self::StartDemonstration | Self::Setting)
    }
}

/// One record of a `SELECT_SETTING_INFORMATION` request.
///
/// Numbers are 1-based indexes into the name lists the device reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingSelection {
    Led { color: u8, pattern: u8, duration: u8 },
    Vibration { pattern: u8, duration: u8 },
    Beep { pattern: u8, duration: u8 },
}

/// Threshold values accepted by motion sensors.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Thresholds {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub z: Option<f32>,
}

/// A message the client can write to a device.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    GetDeviceInformation,
    ConfirmNotifyCategory,
    NotifyInformation {
        category: NotifyCategory,
        unique_id: u16,
    },
    GetPdNotifyDetailDataResp {
        result_code: u8,
        unique_id: u16,
    },
    StartPdApplicationResp {
        result_code: u8,
    },
    GetSensorInfo {
        sensor_type: SensorType,
    },
    SetNotifySensorInfo {
        sensor_type: SensorType,
        enabled: bool,
        /// Ignored for non-motion sensors.
        thresholds: Thresholds,
        original_data: Option<Vec<u8>>,
    },
    GetAppVersion {
        app_name: String,
    },
    ConfirmInstallApp {
        app_name: String,
        file_version: u32,
        file_size: u32,
    },
    GetSettingInformation,
    GetSettingName {
        kind: SettingNameType,
    },
    SelectSettingInformation {
        request: SettingRequest,
        data: Vec<SettingSelection>,
    },
}

impl Request {
    /// Turn sensor notifications on or off without thresholds.
    #[must_use]
    pub fn set_notify_sensor(sensor_type: SensorType, enabled: bool) -> Self {
        Self::SetNotifySensorInfo {
            sensor_type,
            enabled,
            thresholds: Thresholds::default(),
            original_data: None,
        }
    }

    #[must_use]
    pub const fn message_name(&self) -> &'static str {
        match self {
            Self::GetDeviceInformation => "GET_DEVICE_INFORMATION",
            Self::ConfirmNotifyCategory => "CONFIRM_NOTIFY_CATEGORY",
            Self::NotifyInformation { .. } => "NOTIFY_INFORMATION",
            Self::GetPdNotifyDetailDataResp { .. } => "GET_PD_NOTIFY_DETAIL_DATA_RESP",
            Self::StartPdApplicationResp { .. } => "START_PD_APPLICATION_RESP",
            Self::GetSensorInfo { .. } => "GET_SENSOR_INFO",
            Self::SetNotifySensorInfo { .. } => "SET_NOTIFY_SENSOR_INFO",
            Self::GetAppVersion { .. } => "GET_APP_VERSION",
            Self::ConfirmInstallApp { .. } => "CONFIRM_INSTALL_APP",
            Self::GetSettingInformation => "GET_SETTING_INFORMATION",
            Self::GetSettingName { .. } => "GET_SETTING_NAME",
            Self::SelectSettingInformation { .. } => "SELECT_SETTING_INFORMATION",
        }
    }

    /// Name of the message the device answers with, if any.
    #[must_use]
    pub fn response_name(&self) -> Option<String> {
        self.expects_response()
            .then(|| format!("{}_RESP", self.message_name()))
    }

    /// Replies to device-initiated exchanges and pushed information get no
    /// `_RESP` back.
    #[must_use]
    pub const fn expects_response(&self) -> bool {
        !matches!(
            self,
            Self::NotifyInformation { .. }
                | Self::GetPdNotifyDetailDataResp { .. }
                | Self::StartPdApplicationResp { .. }
        )
    }

    /// Service the request is addressed to.
    #[must_use]
    pub const fn service_id(&self) -> ServiceId {
        match self {
            Self::GetDeviceInformation => ServiceId::Property,
            Self::ConfirmNotifyCategory
            | Self::NotifyInformation { .. }
            | Self::GetPdNotifyDetailDataResp { .. }
            | Self::StartPdApplicationResp { .. } => ServiceId::Notification,
            Self::GetSensorInfo { .. } | Self::SetNotifySensorInfo { .. } => ServiceId::Sensor,
            Self::GetAppVersion { .. }
            | Self::ConfirmInstallApp { .. }
            | Self::GetSettingInformation
            | Self::GetSettingName { .. }
            | Self::SelectSettingInformation { .. } => ServiceId::Setting,
        }
    }
}
