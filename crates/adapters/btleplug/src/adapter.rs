//! [`BleAdapter`] over a btleplug central.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use btleplug::api::{
    Central, CentralEvent, CentralState, Manager as _, Peripheral as _, PeripheralProperties,
    ScanFilter,
};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use linking_app::ports::{AdapterError, AdvertisementData, BleAdapter, BoxStream};
use linking_protocol::advertisement::NTT_DOCOMO;
use tokio::sync::mpsc;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::config::BtleplugConfig;
use crate::error::{BtleplugError, stack};
use crate::peripheral::BtleplugPeripheral;

const DISCOVERY_CAPACITY: usize = 64;

/// One host radio.
#[derive(Clone)]
pub struct BtleplugAdapter {
    central: Adapter,
    power_on_timeout: Duration,
    /// Whether `DeviceUpdated` events are reported, set by `start_scan`.
    allow_duplicates: Arc<AtomicBool>,
}

impl BtleplugAdapter {
    /// Open the radio selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`BtleplugError::NotAvailable`] when the host has no adapter,
    /// [`BtleplugError::AdapterNotFound`] when none matches the configured
    /// name, or [`BtleplugError::Stack`] when btleplug fails.
    pub async fn new(config: &BtleplugConfig) -> Result<Self, BtleplugError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let central = match config.adapter.as_deref() {
            None => adapters.into_iter().next().ok_or(BtleplugError::NotAvailable)?,
            Some(wanted) => {
                let mut found = None;
                for adapter in adapters {
                    if adapter.adapter_info().await?.contains(wanted) {
                        found = Some(adapter);
                        break;
                    }
                }
                found.ok_or_else(|| BtleplugError::AdapterNotFound(wanted.to_owned()))?
            }
        };
        tracing::debug!(info = ?central.adapter_info().await.ok(), "BLE adapter selected");
        Ok(Self {
            central,
            power_on_timeout: config.power_on_timeout(),
            allow_duplicates: Arc::new(AtomicBool::new(false)),
        })
    }

    async fn wait_for_state(&self) -> Result<(), BtleplugError> {
        let mut events = self.central.events().await?;
        let state = self.central.adapter_state().await?;
        if state == CentralState::PoweredOn {
            return Ok(());
        }
        tracing::info!(?state, "waiting for the BLE adapter to power on");
        let powered_on = async {
            while let Some(event) = events.next().await {
                if let CentralEvent::StateUpdate(CentralState::PoweredOn) = event {
                    return true;
                }
            }
            false
        };
        match tokio::time::timeout(self.power_on_timeout, powered_on).await {
            Ok(true) => Ok(()),
            Ok(false) | Err(_) => Err(BtleplugError::NotPoweredOn(format!("{state:?}"))),
        }
    }

    async fn advertisement(
        &self,
        id: &PeripheralId,
    ) -> Option<(BtleplugPeripheral, AdvertisementData)> {
        let peripheral = match self.central.peripheral(id).await {
            Ok(peripheral) => peripheral,
            Err(err) => {
                tracing::debug!(%err, "discovered peripheral vanished");
                return None;
            }
        };
        let properties = match peripheral.properties().await {
            Ok(Some(properties)) => properties,
            Ok(None) => return None,
            Err(err) => {
                tracing::debug!(%err, "failed to read peripheral properties");
                return None;
            }
        };
        let data = advertisement_data(id.to_string(), properties);
        tracing::trace!(
            address = %data.address,
            name = ?data.local_name,
            rssi = ?data.rssi,
            "advertisement received"
        );
        Some((BtleplugPeripheral::new(self.central.clone(), peripheral), data))
    }
}

/// Manufacturer data with its company ID put back in front, preferring the
/// Linking vendor's entry.
fn manufacturer_data(entries: &HashMap<u16, Vec<u8>>) -> Option<Vec<u8>> {
    let (company, data) = entries
        .get_key_value(&NTT_DOCOMO)
        .or_else(|| entries.iter().min_by_key(|(company, _)| **company))?;
    let mut out = Vec::with_capacity(data.len() + 2);
    out.extend_from_slice(&company.to_le_bytes());
    out.extend_from_slice(data);
    Some(out)
}

fn advertisement_data(id: String, properties: PeripheralProperties) -> AdvertisementData {
    AdvertisementData {
        id,
        address: properties.address.to_string(),
        manufacturer_data: manufacturer_data(&properties.manufacturer_data),
        local_name: properties.local_name,
        service_uuids: properties.services,
        tx_power: properties.tx_power_level,
        rssi: properties.rssi,
    }
}

impl BleAdapter for BtleplugAdapter {
    type Peripheral = BtleplugPeripheral;

    async fn wait_powered_on(&self) -> Result<(), AdapterError> {
        self.wait_for_state().await.map_err(BtleplugError::into_port)
    }

    async fn start_scan(
        &self,
        services: &[Uuid],
        allow_duplicates: bool,
    ) -> Result<(), AdapterError> {
        self.allow_duplicates.store(allow_duplicates, Ordering::SeqCst);
        self.central
            .start_scan(ScanFilter {
                services: services.to_vec(),
            })
            .await
            .map_err(stack)
    }

    async fn stop_scan(&self) -> Result<(), AdapterError> {
        self.central.stop_scan().await.map_err(stack)
    }

    async fn discoveries(
        &self,
    ) -> Result<BoxStream<(BtleplugPeripheral, AdvertisementData)>, AdapterError> {
        let mut events = self.central.events().await.map_err(stack)?;
        let (sender, receiver) = mpsc::channel(DISCOVERY_CAPACITY);
        let adapter = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) => id,
                    CentralEvent::DeviceUpdated(id)
                        if adapter.allow_duplicates.load(Ordering::SeqCst) =>
                    {
                        id
                    }
                    _ => continue,
                };
                let Some(discovery) = adapter.advertisement(&id).await else {
                    continue;
                };
                if sender.send(discovery).await.is_err() {
                    break;
                }
            }
        });
        Ok(Box::pin(ReceiverStream::new(receiver)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_prefix_manufacturer_data_with_company_id() {
        let entries = HashMap::from([(NTT_DOCOMO, vec![0x1A, 0xBC, 0xDE, 0xF0, 0x12, 0x00])]);
        assert_eq!(
            manufacturer_data(&entries),
            Some(vec![0xE2, 0x02, 0x1A, 0xBC, 0xDE, 0xF0, 0x12, 0x00])
        );
    }

    #[test]
    fn should_prefer_linking_vendor_entry() {
        let entries = HashMap::from([(0x004C, vec![0x01]), (NTT_DOCOMO, vec![0x02])]);
        assert_eq!(manufacturer_data(&entries), Some(vec![0xE2, 0x02, 0x02]));
    }

    #[test]
    fn should_fall_back_to_lowest_company_id() {
        let entries = HashMap::from([(0x0075, vec![0x01]), (0x004C, vec![0x02])]);
        assert_eq!(manufacturer_data(&entries), Some(vec![0x4C, 0x00, 0x02]));
        assert_eq!(manufacturer_data(&HashMap::new()), None);
    }

    #[test]
    fn should_convert_peripheral_properties() {
        let properties = PeripheralProperties {
            local_name: Some("Linking Tukeru".into()),
            tx_power_level: Some(-60),
            rssi: Some(-72),
            manufacturer_data: HashMap::from([(NTT_DOCOMO, vec![0x1A])]),
            ..PeripheralProperties::default()
        };
        let data = advertisement_data("hci0/dev_AA".into(), properties);
        assert_eq!(data.id, "hci0/dev_AA");
        assert_eq!(data.address, "00:00:00:00:00:00");
        assert_eq!(data.local_name.as_deref(), Some("Linking Tukeru"));
        assert_eq!(data.tx_power, Some(-60));
        assert_eq!(data.manufacturer_data, Some(vec![0xE2, 0x02, 0x1A]));
    }
}
