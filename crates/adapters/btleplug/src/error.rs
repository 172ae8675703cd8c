//! btleplug adapter error types.

use linking_app::ports::AdapterError;

/// Errors specific to the btleplug adapter.
#[derive(Debug, thiserror::Error)]
pub enum BtleplugError {
    /// No BLE adapter found on the host.
    #[error("no BLE adapter available")]
    NotAvailable,

    /// No adapter matched the configured name.
    #[error("no BLE adapter matching {0:?}")]
    AdapterNotFound(String),

    /// The radio did not report powered-on in time.
    #[error("BLE adapter is not powered on (state: {0})")]
    NotPoweredOn(String),

    /// A characteristic was not found after service discovery.
    #[error("characteristic {uuid} not found")]
    CharacteristicNotFound { uuid: uuid::Uuid },

    /// The BLE stack failed.
    #[error("BLE stack error")]
    Stack(#[from] btleplug::Error),
}

impl BtleplugError {
    /// Convert into the port error, keeping the variants the application
    /// reacts to.
    #[must_use]
    pub fn into_port(self) -> AdapterError {
        match self {
            Self::NotAvailable => AdapterError::NotAvailable,
            Self::NotPoweredOn(state) => AdapterError::NotPoweredOn(state),
            Self::CharacteristicNotFound { uuid } => AdapterError::CharacteristicNotFound { uuid },
            other => AdapterError::Transport(Box::new(other)),
        }
    }
}

impl From<BtleplugError> for AdapterError {
    fn from(err: BtleplugError) -> Self {
        err.into_port()
    }
}

/// Shorthand for btleplug calls inside port implementations.
pub(crate) fn stack(err: btleplug::Error) -> AdapterError {
    BtleplugError::Stack(err).into_port()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_not_available_error() {
        assert_eq!(
            BtleplugError::NotAvailable.to_string(),
            "no BLE adapter available"
        );
    }

    #[test]
    fn should_display_adapter_not_found_error() {
        let err = BtleplugError::AdapterNotFound("hci1".into());
        assert_eq!(err.to_string(), "no BLE adapter matching \"hci1\"");
    }

    #[test]
    fn should_display_stack_error() {
        let err = BtleplugError::Stack(btleplug::Error::DeviceNotFound);
        assert_eq!(err.to_string(), "BLE stack error");
    }

    #[test]
    fn should_convert_not_available_to_port_error() {
        let err: AdapterError = BtleplugError::NotAvailable.into();
        assert!(matches!(err, AdapterError::NotAvailable));
    }

    #[test]
    fn should_keep_power_state_in_port_error() {
        let err: AdapterError = BtleplugError::NotPoweredOn("PoweredOff".into()).into();
        assert!(matches!(err, AdapterError::NotPoweredOn(state) if state == "PoweredOff"));
    }

    #[test]
    fn should_keep_missing_characteristic_in_port_error() {
        let uuid = uuid::Uuid::from_u128(0xb3b3_9101_50d3_4044_808d_5083_5b13_a6cd);
        let err: AdapterError = BtleplugError::CharacteristicNotFound { uuid }.into();
        assert!(matches!(err, AdapterError::CharacteristicNotFound { uuid: found } if found == uuid));
    }

    #[test]
    fn should_wrap_stack_error_as_transport() {
        let err = stack(btleplug::Error::DeviceNotFound);
        assert!(matches!(err, AdapterError::Transport(_)));
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "BLE stack error");
    }
}
