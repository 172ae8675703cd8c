//! Decoded parameter values.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

/// Named fields decoded from one or more parameters.
pub type Fields = BTreeMap<&'static str, Value>;

/// A single decoded field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDateTime),
    TextList(Vec<String>),
    Entries(Vec<Entry>),
    Settings(Vec<SettingInformation>),
}

impl Value {
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text_list(&self) -> Option<&[String]> {
        match self {
            Self::TextList(list) => Some(list),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_entries(&self) -> Option<&[Entry]> {
        match self {
            Self::Entries(list) => Some(list),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_settings(&self) -> Option<&[SettingInformation]> {
        match self {
            Self::Settings(list) => Some(list),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// One named bit of a bitmap parameter (service list, capabilities, …).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub id: u8,
    pub name: &'static str,
}

impl Entry {
    #[must_use]
    pub const fn new(id: u8, name: &'static str) -> Self {
        Self { id, name }
    }
}

/// One record of the `SettingInformationData` parameter.
///
/// LED records carry color fields; vibration and beep records leave them
/// empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingInformation {
    pub id: u8,
    pub name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_max: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_number: Option<u8>,
    pub pattern_max: u8,
    pub pattern_number: u8,
    pub duration: u8,
}

/// A decoded TLV parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    /// Parameter ID as found on the wire.
    pub id: u8,
    /// Parameter name, empty for IDs the service does not define.
    pub name: &'static str,
    /// Decoded fields, empty for unknown IDs.
    pub fields: Fields,
}

impl Parameter {
    #[must_use]
    pub fn new(id: u8, name: &'static str) -> Self {
        Self {
            id,
            name,
            fields: Fields::new(),
        }
    }

    /// A parameter the service does not know how to decode.
    #[must_use]
    pub fn unknown(id: u8) -> Self {
        Self::new(id, "")
    }

    /// Builder-style field insertion.
    #[must_use]
    pub fn with(mut self, key: &'static str, value: impl Into<Value>) -> Self {
        self.fields.insert(key, value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Merge the fields of all `parameters` into one flat map.
///
/// Later parameters win on key collisions.
#[must_use]
pub fn merge(parameters: &[Parameter]) -> Fields {
    parameters
        .iter()
        .flat_map(|parameter| parameter.fields.iter())
        .map(|(key, value)| (*key, value.clone()))
        .collect()
}
