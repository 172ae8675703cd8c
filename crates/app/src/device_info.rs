//! What a device reported about itself during the handshake.

use std::collections::BTreeMap;

use linking_protocol::request::SettingNameType;
use linking_protocol::service::ServiceId;
use linking_protocol::{Entry, Fields, Value};
use serde::Serialize;

/// Name to ID map built from a bitmap parameter.
pub type NameMap = BTreeMap<&'static str, u8>;

/// One setting record (`LED`, `Vibration`, `Beep`) plus the names fetched
/// for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub id: u8,
    pub color_max: Option<u8>,
    pub color_number: Option<u8>,
    pub pattern_max: u8,
    pub pattern_number: u8,
    pub duration: u8,
    pub colors: Vec<String>,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub id: String,
    pub uid: String,
    pub services: NameMap,
    pub capabilities: NameMap,
    pub exsensors: NameMap,
    pub notify_categories: NameMap,
    pub settings: BTreeMap<&'static str, Setting>,
}

fn name_map(fields: &Fields, key: &str) -> NameMap {
    fields
        .get(key)
        .and_then(Value::as_entries)
        .unwrap_or_default()
        .iter()
        .map(|Entry { id, name }| (*name, *id))
        .collect()
}

fn text(fields: &Fields, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

impl DeviceInfo {
    /// Start from a `GET_DEVICE_INFORMATION_RESP`.
    #[must_use]
    pub fn from_device_information(fields: &Fields) -> Self {
        Self {
            id: text(fields, "deviceId"),
            uid: text(fields, "deviceUid"),
            services: name_map(fields, "serviceList"),
            capabilities: name_map(fields, "deviceCapability"),
            exsensors: name_map(fields, "exSensorType"),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn has_service(&self, service: ServiceId) -> bool {
        self.services.contains_key(service.name())
    }

    /// Record a `CONFIRM_NOTIFY_CATEGORY_RESP`.
    pub fn apply_notify_categories(&mut self, fields: &Fields) {
        self.notify_categories = name_map(fields, "notifyCategory");
    }

    /// Record a `GET_SETTING_INFORMATION_RESP`.
    pub fn apply_setting_information(&mut self, fields: &Fields) {
        let records = fields
            .get("settingInformationData")
            .and_then(Value::as_settings)
            .unwrap_or_default();
        self.settings = records
            .iter()
            .map(|record| {
                let setting = Setting {
                    id: record.id,
                    color_max: record.color_max,
                    color_number: record.color_number,
                    pattern_max: record.pattern_max,
                    pattern_number: record.pattern_number,
                    duration: record.duration,
                    colors: Vec::new(),
                    patterns: Vec::new(),
                };
                (record.name, setting)
            })
            .collect();
    }

    /// Name lists worth asking for: those whose maximum is non-zero.
    #[must_use]
    pub fn setting_names_to_fetch(&self) -> Vec<SettingNameType> {
        SettingNameType::ALL
            .into_iter()
            .filter(|kind| {
                let (setting, colors) = setting_of(*kind);
                self.settings.get(setting).is_some_and(|setting| {
                    if colors {
                        setting.color_max.unwrap_or(0) != 0
                    } else {
                        setting.pattern_max != 0
                    }
                })
            })
            .collect()
    }

    /// Record a `GET_SETTING_NAME_RESP` for `kind`.
    pub fn apply_setting_names(&mut self, kind: SettingNameType, fields: &Fields) {
        let (setting, colors) = setting_of(kind);
        let Some(setting) = self.settings.get_mut(setting) else {
            return;
        };
        let names = fields
            .get("settingNameData")
            .and_then(Value::as_text_list)
            .unwrap_or_default()
            .to_vec();
        if colors {
            setting.colors = names;
        } else {
            setting.patterns = names;
        }
    }
}

/// Setting record a name list belongs to, and whether it lists colors.
fn setting_of(kind: SettingNameType) -> (&'static str, bool) {
    match kind {
        SettingNameType::LedColor => ("LED", true),
        SettingNameType::LedPattern => ("LED", false),
        SettingNameType::VibrationPattern => ("Vibration", false),
        SettingNameType::BeepPattern => ("Beep", false),
    }
}
