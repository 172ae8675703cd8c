//! BLE ports: the transport a Linking device is reached through.
//!
//! The application only needs a small slice of a BLE stack: power state,
//! scanning with a service filter, GATT discovery, one indicate
//! subscription and plain characteristic reads/writes. Adapter crates
//! (e.g. `linking-adapter-btleplug`) implement these traits on top of a real stack;
//! tests implement them in memory.

use std::future::Future;
use std::pin::Pin;

use tokio_stream::Stream;
use uuid::Uuid;

/// Boxed stream handed out by the ports.
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// Errors reported by a BLE adapter or peripheral.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// No BLE adapter found on the host.
    #[error("no BLE adapter available")]
    NotAvailable,

    /// The adapter exists but is not powered on.
    #[error("BLE adapter is not powered on (state: {0})")]
    NotPoweredOn(String),

    /// A characteristic the operation needs is missing.
    #[error("characteristic {uuid} not found")]
    CharacteristicNotFound { uuid: Uuid },

    /// The underlying BLE stack failed.
    #[error("BLE transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A primary service and the characteristics it exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub characteristics: Vec<Uuid>,
}

impl GattService {
    #[must_use]
    pub fn has_characteristic(&self, uuid: Uuid) -> bool {
        self.characteristics.contains(&uuid)
    }
}

/// Something that happened on a connected peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeripheralEvent {
    /// Value pushed on the subscribed indicate characteristic.
    Indication(Vec<u8>),
    /// The link went down.
    Disconnected,
}

/// Advertisement fields of a discovered peripheral.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvertisementData {
    /// Platform identifier of the peripheral.
    pub id: String,
    /// Bluetooth address, used to de-duplicate discoveries.
    pub address: String,
    pub local_name: Option<String>,
    pub service_uuids: Vec<Uuid>,
    pub tx_power: Option<i16>,
    /// Manufacturer data, company ID (LE) included.
    pub manufacturer_data: Option<Vec<u8>>,
    pub rssi: Option<i16>,
}

/// A remote device the application talks GATT to.
///
/// Each [`DeviceConnection`](crate::connection::DeviceConnection) owns
/// exactly one peripheral handle.
pub trait BlePeripheral: Send + Sync + 'static {
    fn id(&self) -> String;

    fn address(&self) -> String;

    fn connect(&self) -> impl Future<Output = Result<(), AdapterError>> + Send;

    fn disconnect(&self) -> impl Future<Output = Result<(), AdapterError>> + Send;

    /// Discover primary services and their characteristics.
    fn discover_services(
        &self,
    ) -> impl Future<Output = Result<Vec<GattService>, AdapterError>> + Send;

    /// Enable indications on `characteristic`.
    fn subscribe(&self, characteristic: Uuid)
    -> impl Future<Output = Result<(), AdapterError>> + Send;

    fn unsubscribe(
        &self,
        characteristic: Uuid,
    ) -> impl Future<Output = Result<(), AdapterError>> + Send;

    /// Write `data` to `characteristic`, waiting for the write response.
    fn write(
        &self,
        characteristic: Uuid,
        data: &[u8],
    ) -> impl Future<Output = Result<(), AdapterError>> + Send;

    fn read(&self, characteristic: Uuid)
    -> impl Future<Output = Result<Vec<u8>, AdapterError>> + Send;

    /// Stream of indications and link loss for this peripheral.
    ///
    /// Must be called before [`subscribe`](Self::subscribe) so that no
    /// indication is missed.
    fn events(
        &self,
    ) -> impl Future<Output = Result<BoxStream<PeripheralEvent>, AdapterError>> + Send;
}

/// The host side BLE radio.
pub trait BleAdapter: Clone + Send + Sync + 'static {
    type Peripheral: BlePeripheral;

    /// Resolve once the radio is powered on.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::NotPoweredOn`] when the radio reports any
    /// other state.
    fn wait_powered_on(&self) -> impl Future<Output = Result<(), AdapterError>> + Send;

    /// Start scanning for peripherals advertising one of `services`.
    fn start_scan(
        &self,
        services: &[Uuid],
        allow_duplicates: bool,
    ) -> impl Future<Output = Result<(), AdapterError>> + Send;

    fn stop_scan(&self) -> impl Future<Output = Result<(), AdapterError>> + Send;

    /// Stream of advertisements received while scanning.
    fn discoveries(
        &self,
    ) -> impl Future<
        Output = Result<BoxStream<(Self::Peripheral, AdvertisementData)>, AdapterError>,
    > + Send;
}
