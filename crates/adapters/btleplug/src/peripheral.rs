//! [`BlePeripheral`] over a btleplug peripheral.

use std::collections::BTreeSet;

use btleplug::api::{
    Central, CentralEvent, Characteristic, Peripheral as _, Service, ValueNotification, WriteType,
};
use btleplug::platform::{Adapter, Peripheral};
use linking_app::ports::{AdapterError, BlePeripheral, BoxStream, GattService, PeripheralEvent};
use linking_protocol::uuids::INDICATE_CHARACTERISTIC;
use tokio_stream::StreamExt as _;
use uuid::Uuid;

use crate::error::{BtleplugError, stack};

/// A discovered peripheral plus the central that reports its link state.
#[derive(Clone)]
pub struct BtleplugPeripheral {
    central: Adapter,
    peripheral: Peripheral,
}

impl BtleplugPeripheral {
    pub(crate) fn new(central: Adapter, peripheral: Peripheral) -> Self {
        Self {
            central,
            peripheral,
        }
    }

    /// Look up a characteristic discovered by `discover_services`.
    fn find_characteristic(&self, uuid: Uuid) -> Result<Characteristic, BtleplugError> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(BtleplugError::CharacteristicNotFound { uuid })
    }
}

impl std::fmt::Debug for BtleplugPeripheral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtleplugPeripheral")
            .field("id", &self.peripheral.id())
            .field("address", &self.peripheral.address())
            .finish_non_exhaustive()
    }
}

fn gatt_services(services: BTreeSet<Service>) -> Vec<GattService> {
    services
        .into_iter()
        .filter(|service| service.primary)
        .map(|service| GattService {
            uuid: service.uuid,
            characteristics: service.characteristics.iter().map(|c| c.uuid).collect(),
        })
        .collect()
}

fn indication(notification: ValueNotification) -> Option<PeripheralEvent> {
    (notification.uuid == INDICATE_CHARACTERISTIC)
        .then_some(PeripheralEvent::Indication(notification.value))
}

impl BlePeripheral for BtleplugPeripheral {
    fn id(&self) -> String {
        self.peripheral.id().to_string()
    }

    fn address(&self) -> String {
        self.peripheral.address().to_string()
    }

    async fn connect(&self) -> Result<(), AdapterError> {
        self.peripheral.connect().await.map_err(stack)
    }

    async fn disconnect(&self) -> Result<(), AdapterError> {
        self.peripheral.disconnect().await.map_err(stack)
    }

    async fn discover_services(&self) -> Result<Vec<GattService>, AdapterError> {
        self.peripheral.discover_services().await.map_err(stack)?;
        let services = gatt_services(self.peripheral.services());
        tracing::debug!(
            address = %self.peripheral.address(),
            count = services.len(),
            "GATT services discovered"
        );
        Ok(services)
    }

    async fn subscribe(&self, characteristic: Uuid) -> Result<(), AdapterError> {
        let characteristic = self.find_characteristic(characteristic)?;
        self.peripheral.subscribe(&characteristic).await.map_err(stack)
    }

    async fn unsubscribe(&self, characteristic: Uuid) -> Result<(), AdapterError> {
        let characteristic = self.find_characteristic(characteristic)?;
        self.peripheral
            .unsubscribe(&characteristic)
            .await
            .map_err(stack)
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<(), AdapterError> {
        let characteristic = self.find_characteristic(characteristic)?;
        self.peripheral
            .write(&characteristic, data, WriteType::WithResponse)
            .await
            .map_err(stack)
    }

    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>, AdapterError> {
        let characteristic = self.find_characteristic(characteristic)?;
        self.peripheral.read(&characteristic).await.map_err(stack)
    }

    async fn events(&self) -> Result<BoxStream<PeripheralEvent>, AdapterError> {
        let notifications = self
            .peripheral
            .notifications()
            .await
            .map_err(stack)?
            .filter_map(indication);
        let own_id = self.peripheral.id();
        let disconnects = self
            .central
            .events()
            .await
            .map_err(stack)?
            .filter_map(move |event| match event {
                CentralEvent::DeviceDisconnected(id) if id == own_id => {
                    Some(PeripheralEvent::Disconnected)
                }
                _ => None,
            });
        Ok(Box::pin(notifications.merge(disconnects)))
    }
}
