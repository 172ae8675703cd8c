//! Finding Linking devices.
//!
//! Two modes share the radio and exclude each other:
//!
//! - [`Discovery::discover`] scans for a bounded time and hands back one
//!   [`DeviceConnection`] per device, ready to connect.
//! - [`Discovery::start_scan`] runs until [`Discovery::stop_scan`] and
//!   streams decoded [`Advertisement`]s, beacon data included.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use linking_protocol::advertisement::{self, VendorData};
use linking_protocol::uuids::DISCOVERY_SERVICES;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::StreamExt as _;
use uuid::Uuid;

use crate::config::{ConnectionConfig, DiscoveryConfig, MIN_DISCOVERY_MS};
use crate::connection::{DeviceConnection, lock};
use crate::error::DiscoveryError;
use crate::ports::{AdapterError, AdvertisementData, BleAdapter, BoxStream};

const ADVERTISEMENT_CAPACITY: usize = 64;

fn has_prefix(value: &str, prefix: Option<&str>) -> bool {
    prefix.is_none_or(|prefix| value.starts_with(prefix))
}

/// Parameters of one [`Discovery::discover`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverOptions {
    pub duration: Duration,
    /// Prefix the local name must start with.
    pub name_filter: Option<String>,
    /// Prefix the peripheral identifier must start with.
    pub id_filter: Option<String>,
    /// Return as soon as one device qualifies.
    pub quick: bool,
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        DiscoveryConfig::default().options()
    }
}

impl DiscoverOptions {
    /// Devices without a local name or an identifier never qualify.
    #[must_use]
    pub fn accepts(&self, data: &AdvertisementData) -> bool {
        let Some(local_name) = data.local_name.as_deref().filter(|name| !name.is_empty()) else {
            return false;
        };
        !data.id.is_empty()
            && has_prefix(local_name, self.name_filter.as_deref())
            && has_prefix(&data.id, self.id_filter.as_deref())
    }
}

/// Filter of a continuous scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanFilter {
    pub name_filter: Option<String>,
    pub id_filter: Option<String>,
}

impl ScanFilter {
    #[must_use]
    pub fn accepts(&self, data: &AdvertisementData) -> bool {
        let Some(local_name) = data.local_name.as_deref().filter(|name| !name.is_empty()) else {
            return false;
        };
        has_prefix(local_name, self.name_filter.as_deref())
            && has_prefix(&data.id, self.id_filter.as_deref())
    }
}

/// A decoded Linking advertisement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Advertisement {
    pub id: String,
    pub address: String,
    pub local_name: Option<String>,
    pub service_uuids: Vec<Uuid>,
    pub tx_power: Option<i16>,
    pub rssi: Option<i16>,
    /// Estimated distance in metres, when both TX power and RSSI are known.
    pub distance: Option<f64>,
    #[serde(flatten)]
    pub vendor: VendorData,
}

impl Advertisement {
    /// Decode `data`; `None` without usable manufacturer data.
    #[must_use]
    pub fn parse(data: &AdvertisementData) -> Option<Self> {
        let vendor = advertisement::decode_vendor_data(data.manufacturer_data.as_deref()?)?;
        let distance = data
            .tx_power
            .zip(data.rssi)
            .map(|(tx_power, rssi)| advertisement::estimate_distance(tx_power, rssi));
        Some(Self {
            id: data.id.clone(),
            address: data.address.clone(),
            local_name: data.local_name.clone(),
            service_uuids: data.service_uuids.clone(),
            tx_power: data.tx_power,
            rssi: data.rssi,
            distance,
            vendor,
        })
    }
}

/// Entry point of the library: owns the adapter and hands out device
/// connections.
pub struct Discovery<A: BleAdapter> {
    adapter: A,
    connection: ConnectionConfig,
    rescan_interval: Duration,
    initialized: AtomicBool,
    scanning: AtomicBool,
    scan_task: Mutex<Option<JoinHandle<()>>>,
}

impl<A: BleAdapter> Discovery<A> {
    #[must_use]
    pub fn new(adapter: A, connection: ConnectionConfig, discovery: &DiscoveryConfig) -> Self {
        Self {
            adapter,
            connection,
            rescan_interval: discovery.rescan_interval(),
            initialized: AtomicBool::new(false),
            scanning: AtomicBool::new(false),
            scan_task: Mutex::new(None),
        }
    }

    /// Wait for the radio.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Adapter`] when the adapter is not powered on.
    pub async fn init(&self) -> Result<(), DiscoveryError> {
        self.adapter.wait_powered_on().await?;
        self.initialized.store(true, Ordering::SeqCst);
        tracing::info!("BLE adapter ready");
        Ok(())
    }

    fn claim(&self) -> Result<(), DiscoveryError> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(DiscoveryError::NotInitialized);
        }
        self.scanning
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| DiscoveryError::ScanInProgress)
    }

    fn release(&self) {
        self.scanning.store(false, Ordering::SeqCst);
    }

    /// Scan for `options.duration` (at least one second) and return the
    /// devices that qualified, or the first one in quick mode. Each device is
    /// also offered to `observer` as soon as it is found; it is dropped for
    /// the observer when its channel is full.
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::NotInitialized`], [`DiscoveryError::ScanInProgress`]
    /// or [`DiscoveryError::Adapter`] when the scan cannot be started.
    pub async fn discover(
        &self,
        options: &DiscoverOptions,
        observer: Option<mpsc::Sender<DeviceConnection<A::Peripheral>>>,
    ) -> Result<Vec<DeviceConnection<A::Peripheral>>, DiscoveryError> {
        self.claim()?;
        let result = self.collect(options, observer.as_ref()).await;
        if let Err(err) = self.adapter.stop_scan().await {
            tracing::warn!(%err, "failed to stop the scan");
        }
        self.release();
        let devices = result?;
        tracing::info!(count = devices.len(), "discovery finished");
        Ok(devices)
    }

    async fn collect(
        &self,
        options: &DiscoverOptions,
        observer: Option<&mpsc::Sender<DeviceConnection<A::Peripheral>>>,
    ) -> Result<Vec<DeviceConnection<A::Peripheral>>, AdapterError> {
        let mut discoveries = self.adapter.discoveries().await?;
        self.adapter.start_scan(&DISCOVERY_SERVICES, false).await?;

        let duration = options.duration.max(Duration::from_millis(MIN_DISCOVERY_MS));
        let deadline = Instant::now() + duration;
        // A zero interval disables re-scanning.
        let mut rescan_at =
            (!self.rescan_interval.is_zero()).then(|| Instant::now() + self.rescan_interval);
        let mut seen = HashSet::new();
        let mut devices = Vec::new();

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            if let Some(at) = rescan_at
                && now >= at
            {
                self.rescan().await;
                rescan_at = Some(now + self.rescan_interval);
            }
            let wake = rescan_at.map_or(deadline, |at| at.min(deadline));
            let (peripheral, data) = match tokio::time::timeout_at(wake, discoveries.next()).await
            {
                Ok(Some(discovery)) => discovery,
                Ok(None) => break,
                Err(_) => continue,
            };
            if !options.accepts(&data) {
                tracing::debug!(address = %data.address, name = ?data.local_name, "filtered out");
                continue;
            }
            if !seen.insert(data.address.clone()) {
                continue;
            }
            tracing::info!(address = %data.address, name = ?data.local_name, "device found");
            let device = DeviceConnection::new(peripheral, data, self.connection.clone());
            if let Some(observer) = observer {
                match observer.try_send(device.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(address = %device.address(), "discovery observer is full");
                    }
                    Err(TrySendError::Closed(_)) => tracing::debug!("discovery observer dropped"),
                }
            }
            devices.push(device);
            if options.quick {
                break;
            }
        }
        Ok(devices)
    }

    /// Some stacks stop reporting after a while; restart the scan.
    async fn rescan(&self) {
        tracing::trace!("restarting scan");
        if let Err(err) = self.adapter.stop_scan().await {
            tracing::warn!(%err, "failed to stop the scan");
        }
        if let Err(err) = self.adapter.start_scan(&DISCOVERY_SERVICES, false).await {
            tracing::warn!(%err, "failed to restart the scan");
        }
    }

    /// Scan continuously, reporting every advertisement received (repeats
    /// included) until [`stop_scan`](Self::stop_scan).
    ///
    /// # Errors
    ///
    /// Same as [`discover`](Self::discover).
    pub async fn start_scan(
        &self,
        filter: ScanFilter,
    ) -> Result<mpsc::Receiver<Advertisement>, DiscoveryError> {
        self.claim()?;
        let mut discoveries = match self.open_scan().await {
            Ok(discoveries) => discoveries,
            Err(err) => {
                self.release();
                return Err(err.into());
            }
        };

        let (sender, receiver) = mpsc::channel(ADVERTISEMENT_CAPACITY);
        let task = tokio::spawn(async move {
            while let Some((_, data)) = discoveries.next().await {
                if !filter.accepts(&data) {
                    continue;
                }
                let Some(advertisement) = Advertisement::parse(&data) else {
                    tracing::trace!(address = %data.address, "no vendor data");
                    continue;
                };
                if sender.send(advertisement).await.is_err() {
                    break;
                }
            }
        });
        *lock(&self.scan_task) = Some(task);
        tracing::info!("continuous scan started");
        Ok(receiver)
    }

    async fn open_scan(
        &self,
    ) -> Result<BoxStream<(A::Peripheral, AdvertisementData)>, AdapterError> {
        let discoveries = self.adapter.discoveries().await?;
        self.adapter.start_scan(&DISCOVERY_SERVICES, true).await?;
        Ok(discoveries)
    }

    /// Stop a scan started with [`start_scan`](Self::start_scan). Does
    /// nothing when none runs.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Adapter`] when the radio fails to stop;
    /// the scan is released anyway.
    pub async fn stop_scan(&self) -> Result<(), DiscoveryError> {
        let task = lock(&self.scan_task).take();
        let Some(task) = task else {
            return Ok(());
        };
        task.abort();
        let result = self.adapter.stop_scan().await;
        self.release();
        tracing::info!("continuous scan stopped");
        result.map_err(DiscoveryError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{self, MockAdapter};

    fn manufacturer_data() -> Vec<u8> {
        vec![0xE2, 0x02, 0x1A, 0xBC, 0xDE, 0xF0, 0x12, 0x00]
    }

    async fn ready(adapter: &MockAdapter) -> Discovery<MockAdapter> {
        let discovery = Discovery::new(
            adapter.clone(),
            ConnectionConfig::default(),
            &DiscoveryConfig::default(),
        );
        discovery.init().await.unwrap();
        discovery
    }

    fn options(duration_ms: u64) -> DiscoverOptions {
        DiscoverOptions {
            duration: Duration::from_millis(duration_ms),
            ..DiscoverOptions::default()
        }
    }

    #[tokio::test]
    async fn should_require_init() {
        let discovery = Discovery::new(
            MockAdapter::new(),
            ConnectionConfig::default(),
            &DiscoveryConfig::default(),
        );
        assert!(matches!(
            discovery.discover(&options(1000), None).await,
            Err(DiscoveryError::NotInitialized)
        ));
        assert!(matches!(
            discovery.start_scan(ScanFilter::default()).await,
            Err(DiscoveryError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn should_fail_init_when_powered_off() {
        let discovery = Discovery::new(
            MockAdapter::powered_off(),
            ConnectionConfig::default(),
            &DiscoveryConfig::default(),
        );
        assert!(matches!(
            discovery.init().await,
            Err(DiscoveryError::Adapter(AdapterError::NotPoweredOn(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn should_deduplicate_by_address() {
        let adapter = MockAdapter::new();
        let discovery = ready(&adapter).await;
        adapter.advertise(mock::advertisement("AA:01", "aa01", Some("Linking Tukeru")));
        adapter.advertise(mock::advertisement("AA:01", "aa01", Some("Linking Tukeru")));
        adapter.advertise(mock::advertisement("AA:02", "aa02", Some("Linking Sizuku")));
        adapter.advertise(mock::advertisement("AA:03", "aa03", None));

        let devices = discovery.discover(&options(1000), None).await.unwrap();

        let addresses: Vec<_> = devices.iter().map(DeviceConnection::address).collect();
        assert_eq!(addresses, ["AA:01", "AA:02"]);
        assert_eq!(devices[1].local_name(), "Linking Sizuku");
        assert_eq!(adapter.scans(), [false]);
        assert_eq!(adapter.stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_apply_prefix_filters() {
        let adapter = MockAdapter::new();
        let discovery = ready(&adapter).await;
        adapter.advertise(mock::advertisement("AA:01", "aa01", Some("Linking Tukeru")));
        adapter.advertise(mock::advertisement("AA:02", "bb02", Some("Linking Sizuku")));
        adapter.advertise(mock::advertisement("AA:03", "aa03", Some("Other Linking")));
        adapter.advertise(mock::advertisement("AA:04", "", Some("Linking Board01")));

        let options = DiscoverOptions {
            name_filter: Some("Linking".into()),
            id_filter: Some("aa".into()),
            ..options(1000)
        };
        let devices = discovery.discover(&options, None).await.unwrap();

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id(), "aa01");
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_at_first_device_in_quick_mode() {
        let adapter = MockAdapter::new();
        let discovery = ready(&adapter).await;
        adapter.advertise(mock::advertisement("AA:01", "aa01", Some("Linking Tukeru")));
        adapter.advertise(mock::advertisement("AA:02", "aa02", Some("Linking Sizuku")));

        let started = Instant::now();
        let options = DiscoverOptions {
            quick: true,
            ..options(5000)
        };
        let devices = discovery.discover(&options, None).await.unwrap();

        assert_eq!(devices.len(), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn should_forward_devices_to_observer() {
        let adapter = MockAdapter::new();
        let discovery = ready(&adapter).await;
        adapter.advertise(mock::advertisement("AA:01", "aa01", Some("Linking Tukeru")));
        let (sender, mut receiver) = mpsc::channel(4);

        discovery.discover(&options(1000), Some(sender)).await.unwrap();

        let device = receiver.recv().await.unwrap();
        assert_eq!(device.address(), "AA:01");
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn should_scan_for_at_least_one_second() {
        let adapter = MockAdapter::new();
        let discovery = ready(&adapter).await;

        let started = Instant::now();
        let devices = discovery.discover(&options(200), None).await.unwrap();

        assert!(devices.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(MIN_DISCOVERY_MS));
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_wait_for_a_full_observer() {
        let adapter = MockAdapter::new();
        let discovery = ready(&adapter).await;
        adapter.advertise(mock::advertisement("AA:01", "aa01", Some("Linking Tukeru")));
        adapter.advertise(mock::advertisement("AA:02", "aa02", Some("Linking Sizuku")));
        let (sender, mut receiver) = mpsc::channel(1);

        let started = Instant::now();
        let devices = tokio::time::timeout(
            Duration::from_secs(60),
            discovery.discover(&options(1000), Some(sender)),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(devices.len(), 2);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(receiver.recv().await.unwrap().address(), "AA:01");
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn should_restart_scan_periodically() {
        let adapter = MockAdapter::new();
        let discovery = ready(&adapter).await;

        let devices = discovery.discover(&options(7000), None).await.unwrap();

        assert!(devices.is_empty());
        // Initial scan plus restarts at 3 s and 6 s.
        assert_eq!(adapter.scans(), [false, false, false]);
        assert_eq!(adapter.stops(), 3);
    }

    #[tokio::test]
    async fn should_stream_parsed_advertisements() {
        let adapter = MockAdapter::new();
        let discovery = ready(&adapter).await;
        // No manufacturer data: not reported.
        adapter.advertise(mock::advertisement("AA:01", "aa01", Some("Linking Tukeru")));
        let mut with_vendor = mock::advertisement("AA:02", "aa02", Some("Linking Sizuku"));
        with_vendor.manufacturer_data = Some(manufacturer_data());
        with_vendor.rssi = Some(-60);
        adapter.advertise(with_vendor);

        let mut advertisements = discovery.start_scan(ScanFilter::default()).await.unwrap();

        let advertisement = advertisements.recv().await.unwrap();
        assert_eq!(advertisement.address, "AA:02");
        assert_eq!(advertisement.vendor.company_name, "NTT docomo");
        assert_eq!(advertisement.distance, Some(1.0));
        assert_eq!(adapter.scans(), [true]);

        discovery.stop_scan().await.unwrap();
        discovery.stop_scan().await.unwrap();
        assert_eq!(adapter.stops(), 1);
    }

    #[tokio::test]
    async fn should_reject_overlapping_scans() {
        let adapter = MockAdapter::new();
        let discovery = ready(&adapter).await;

        let _advertisements = discovery.start_scan(ScanFilter::default()).await.unwrap();
        assert!(matches!(
            discovery.discover(&options(1000), None).await,
            Err(DiscoveryError::ScanInProgress)
        ));
        assert!(matches!(
            discovery.start_scan(ScanFilter::default()).await,
            Err(DiscoveryError::ScanInProgress)
        ));

        discovery.stop_scan().await.unwrap();
        tokio::time::pause();
        assert!(discovery.discover(&options(1000), None).await.is_ok());
    }

    #[test]
    fn should_parse_advertisement_fields() {
        let data = AdvertisementData {
            id: "aa01".into(),
            address: "AA:01".into(),
            local_name: Some("Linking Tukeru".into()),
            tx_power: Some(-60),
            rssi: Some(-40),
            manufacturer_data: Some(manufacturer_data()),
            ..AdvertisementData::default()
        };
        let advertisement = Advertisement::parse(&data).unwrap();
        assert_eq!(advertisement.vendor.company_id, 0x02E2);
        assert_eq!(advertisement.vendor.individual_number, 0xC_DEF0);
        assert!((advertisement.distance.unwrap() - 0.1).abs() < 1e-9);

        let json = serde_json::to_value(&advertisement).unwrap();
        assert_eq!(json["companyName"], "NTT docomo");
        assert_eq!(json["localName"], "Linking Tukeru");
    }

    #[test]
    fn should_skip_advertisement_without_vendor_data() {
        let data = AdvertisementData {
            manufacturer_data: Some(vec![0xE2, 0x02]),
            ..AdvertisementData::default()
        };
        assert_eq!(Advertisement::parse(&data), None);
        assert_eq!(Advertisement::parse(&AdvertisementData::default()), None);
    }
}
