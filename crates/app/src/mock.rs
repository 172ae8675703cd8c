//! In-memory BLE stack speaking enough of the Linking protocol for tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use linking_protocol::multiplexer::{self, ParsedMessage};
use linking_protocol::tlv::{PACKET_HEADER_LEN, PacketWriter, read_blocks};
use linking_protocol::uuids::{
    DEVICE_NAME_CHARACTERISTIC, GENERIC_ACCESS_SERVICE, INDICATE_CHARACTERISTIC, PRIMARY_SERVICE,
    WRITE_CHARACTERISTIC,
};
use linking_protocol::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use crate::ports::{
    AdapterError, AdvertisementData, BleAdapter, BlePeripheral, BoxStream, GattService,
    PeripheralEvent,
};

/// Largest indication the mock sends; longer packets are fragmented.
const FRAGMENT_LEN: usize = 19;

/// Build a complete packet from `(parameter id, value)` pairs.
pub fn response(service_id: u8, message_id: u16, parameters: &[(u8, Vec<u8>)]) -> Vec<u8> {
    parameters
        .iter()
        .fold(
            PacketWriter::new(service_id, message_id),
            |writer, (id, value)| writer.parameter(*id, value.clone()),
        )
        .finish()
        .unwrap()
}

fn names(list: &[&str]) -> Vec<u8> {
    list.iter()
        .flat_map(|name| {
            std::iter::once(u8::try_from(name.len()).unwrap()).chain(name.bytes())
        })
        .collect()
}

fn sensor_code(message: &ParsedMessage) -> u8 {
    message
        .fields()
        .get("sensorTypeCode")
        .and_then(Value::as_int)
        .and_then(|code| u8::try_from(code).ok())
        .unwrap()
}

/// Answers of a Linking board with an LED, a vibrator, a button, a
/// temperature sensor and an accelerometer.
fn linking_responder(service_list: u8, message: &ParsedMessage) -> Vec<Vec<u8>> {
    let ok = (0x00, vec![0x00]);
    let packet = match (message.service_id, message.message_name) {
        (0, "GET_DEVICE_INFORMATION") => response(
            0,
            0x01,
            &[
                ok,
                (0x02, vec![service_list]),
                (0x03, vec![0x01, 0x02]),
                (0x04, vec![0xAB, 0xCD, 0xEF]),
                (0x05, vec![0b0010_0100]),
                (0x07, vec![0b0000_1000]),
            ],
        ),
        (1, "CONFIRM_NOTIFY_CATEGORY") => {
            response(1, 0x01, &[ok, (0x03, vec![0b1010_0000, 0x00])])
        }
        (4, "GET_SETTING_INFORMATION") => response(
            4,
            0x05,
            &[
                ok,
                (0x08, vec![0x00, 2, 1, 2, 1, 5, 0x01, 2, 1, 5]),
            ],
        ),
        (4, "GET_SETTING_NAME") => {
            let kind = message
                .fields()
                .get("settingNameTypeCode")
                .and_then(Value::as_int)
                .unwrap();
            let list = match kind {
                0 => names(&["Red", "Green"]),
                1 => names(&["Blink", "Steady"]),
                2 => names(&["Short", "Long"]),
                _ => Vec::new(),
            };
            response(4, 0x07, &[ok, (0x09, list)])
        }
        (4, "SELECT_SETTING_INFORMATION") => response(4, 0x09, &[ok]),
        (3, "SET_NOTIFY_SENSOR_INFO") => response(3, 0x03, &[ok]),
        (3, "GET_SENSOR_INFO") => {
            let code = sensor_code(message);
            let mut parameters = vec![ok, (0x02, vec![code])];
            if code <= 2 {
                parameters.extend([
                    (0x04, 0.5_f32.to_le_bytes().to_vec()),
                    (0x05, (-1.0_f32).to_le_bytes().to_vec()),
                    (0x06, 9.75_f32.to_le_bytes().to_vec()),
                ]);
            } else {
                // 23.5 degrees.
                parameters.push((0x0A, 0b0_1011_0111_100_u16.to_le_bytes().to_vec()));
            }
            response(3, 0x01, &parameters)
        }
        _ => return Vec::new(),
    };
    vec![packet]
}

/// Split a packet into indications, each led by a header byte; only the
/// last one has the final bit.
fn fragments(packet: &[u8]) -> Vec<Vec<u8>> {
    let (&header, body) = packet.split_first().unwrap();
    let chunks: Vec<&[u8]> = body.chunks(FRAGMENT_LEN - 1).collect();
    let last = chunks.len().saturating_sub(1);
    chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| {
            let header = if index == last { header } else { header & !0x01 };
            std::iter::once(header).chain(chunk.iter().copied()).collect()
        })
        .collect()
}

struct MockState {
    id: String,
    address: String,
    services: Vec<GattService>,
    service_list: Mutex<u8>,
    muted: Mutex<HashSet<&'static str>>,
    events: Mutex<Option<mpsc::UnboundedSender<PeripheralEvent>>>,
    writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
    failing_connects: AtomicU32,
    connect_calls: AtomicU32,
    disconnect_calls: AtomicU32,
    unsubscribed: AtomicBool,
    device_name: Mutex<Vec<u8>>,
}

#[derive(Clone)]
pub struct MockPeripheral {
    state: Arc<MockState>,
}

impl MockPeripheral {
    pub fn new(address: &str, services: Vec<GattService>) -> Self {
        Self {
            state: Arc::new(MockState {
                id: address.replace(':', "").to_lowercase(),
                address: address.to_owned(),
                services,
                service_list: Mutex::new(0x1F),
                muted: Mutex::new(HashSet::new()),
                events: Mutex::new(None),
                writes: Mutex::new(Vec::new()),
                failing_connects: AtomicU32::new(0),
                connect_calls: AtomicU32::new(0),
                disconnect_calls: AtomicU32::new(0),
                unsubscribed: AtomicBool::new(false),
                device_name: Mutex::new(b"Linking".to_vec()),
            }),
        }
    }

    /// A device exposing the Linking service and the GAP device name.
    pub fn linking(address: &str) -> Self {
        Self::new(
            address,
            vec![
                GattService {
                    uuid: GENERIC_ACCESS_SERVICE,
                    characteristics: vec![DEVICE_NAME_CHARACTERISTIC],
                },
                GattService {
                    uuid: PRIMARY_SERVICE,
                    characteristics: vec![WRITE_CHARACTERISTIC, INDICATE_CHARACTERISTIC],
                },
            ],
        )
    }

    pub fn with_service_list(self, bits: u8) -> Self {
        *self.state.service_list.lock().unwrap() = bits;
        self
    }

    pub fn failing_connects(self, count: u32) -> Self {
        self.state.failing_connects.store(count, Ordering::SeqCst);
        self
    }

    pub fn advertisement(&self, local_name: &str) -> AdvertisementData {
        AdvertisementData {
            id: self.state.id.clone(),
            address: self.state.address.clone(),
            local_name: Some(local_name.to_owned()),
            service_uuids: vec![PRIMARY_SERVICE],
            rssi: Some(-60),
            ..AdvertisementData::default()
        }
    }

    /// Stop answering `message`.
    pub fn mute(&self, message: &'static str) {
        self.state.muted.lock().unwrap().insert(message);
    }

    pub fn push_fragment(&self, fragment: Vec<u8>) {
        self.emit(PeripheralEvent::Indication(fragment));
    }

    /// Send a complete packet as one or more indications.
    pub fn push_packet(&self, packet: &[u8]) {
        for fragment in fragments(packet) {
            self.push_fragment(fragment);
        }
    }

    /// Simulate the device going out of range.
    pub fn drop_link(&self) {
        self.emit(PeripheralEvent::Disconnected);
    }

    fn emit(&self, event: PeripheralEvent) {
        if let Some(sender) = self.state.events.lock().unwrap().as_ref() {
            let _ = sender.send(event);
        }
    }

    /// Linking messages written so far, decoded.
    pub fn written_requests(&self) -> Vec<ParsedMessage> {
        self.state
            .writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(uuid, _)| *uuid == WRITE_CHARACTERISTIC)
            .filter_map(|(_, packet)| multiplexer::try_parse_response(packet).ok())
            .collect()
    }

    pub fn written_messages(&self) -> Vec<&'static str> {
        self.written_requests()
            .iter()
            .map(|message| message.message_name)
            .collect()
    }

    /// Raw records of the last `SELECT_SETTING_INFORMATION` carrying some.
    pub fn last_selection(&self) -> Option<Vec<u8>> {
        let writes = self.state.writes.lock().unwrap();
        writes
            .iter()
            .rev()
            .filter(|(uuid, packet)| {
                *uuid == WRITE_CHARACTERISTIC && packet[1] == 0x04 && packet[2] == 0x08
            })
            .find_map(|(_, packet)| {
                read_blocks(packet[4], &packet[PACKET_HEADER_LEN..])
                    .unwrap()
                    .into_iter()
                    .find(|block| block.id == 0x08)
                    .map(|block| block.value.to_vec())
            })
    }

    pub fn connect_calls(&self) -> u32 {
        self.state.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> u32 {
        self.state.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn unsubscribed(&self) -> bool {
        self.state.unsubscribed.load(Ordering::SeqCst)
    }

    pub fn device_name(&self) -> Vec<u8> {
        self.state.device_name.lock().unwrap().clone()
    }

    fn respond(&self, packet: &[u8]) {
        let Ok(message) = multiplexer::try_parse_response(packet) else {
            return;
        };
        if self.state.muted.lock().unwrap().contains(message.message_name) {
            return;
        }
        let service_list = *self.state.service_list.lock().unwrap();
        for packet in linking_responder(service_list, &message) {
            self.push_packet(&packet);
        }
    }
}

impl BlePeripheral for MockPeripheral {
    fn id(&self) -> String {
        self.state.id.clone()
    }

    fn address(&self) -> String {
        self.state.address.clone()
    }

    async fn connect(&self) -> Result<(), AdapterError> {
        self.state.connect_calls.fetch_add(1, Ordering::SeqCst);
        let failing = &self.state.failing_connects;
        if failing.load(Ordering::SeqCst) > 0 {
            failing.fetch_sub(1, Ordering::SeqCst);
            return Err(AdapterError::Transport("connection refused".into()));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AdapterError> {
        self.state.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.state.events.lock().unwrap().take();
        Ok(())
    }

    async fn discover_services(&self) -> Result<Vec<GattService>, AdapterError> {
        Ok(self.state.services.clone())
    }

    async fn subscribe(&self, _characteristic: Uuid) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn unsubscribe(&self, _characteristic: Uuid) -> Result<(), AdapterError> {
        self.state.unsubscribed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<(), AdapterError> {
        self.state
            .writes
            .lock()
            .unwrap()
            .push((characteristic, data.to_vec()));
        if characteristic == DEVICE_NAME_CHARACTERISTIC {
            *self.state.device_name.lock().unwrap() = data.to_vec();
        } else if characteristic == WRITE_CHARACTERISTIC {
            self.respond(data);
        }
        Ok(())
    }

    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>, AdapterError> {
        if characteristic == DEVICE_NAME_CHARACTERISTIC {
            Ok(self.device_name())
        } else {
            Err(AdapterError::CharacteristicNotFound {
                uuid: characteristic,
            })
        }
    }

    async fn events(&self) -> Result<BoxStream<PeripheralEvent>, AdapterError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        *self.state.events.lock().unwrap() = Some(sender);
        Ok(Box::pin(UnboundedReceiverStream::new(receiver)))
    }
}

struct AdapterState {
    powered: AtomicBool,
    discoveries: Mutex<Option<mpsc::UnboundedSender<(MockPeripheral, AdvertisementData)>>>,
    backlog: Mutex<Vec<(MockPeripheral, AdvertisementData)>>,
    scans: Mutex<Vec<bool>>,
    stops: AtomicU32,
}

/// Radio whose discoveries are injected with [`MockAdapter::advertise`].
#[derive(Clone)]
pub struct MockAdapter {
    state: Arc<AdapterState>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AdapterState {
                powered: AtomicBool::new(true),
                discoveries: Mutex::new(None),
                backlog: Mutex::new(Vec::new()),
                scans: Mutex::new(Vec::new()),
                stops: AtomicU32::new(0),
            }),
        }
    }

    pub fn powered_off() -> Self {
        let adapter = Self::new();
        adapter.state.powered.store(false, Ordering::SeqCst);
        adapter
    }

    /// Report a device as seen by the radio. Advertisements sent before
    /// anyone listens are delivered to the next `discoveries()` stream.
    pub fn advertise(&self, advertisement: AdvertisementData) {
        let discovery = (MockPeripheral::linking(&advertisement.address), advertisement);
        match self.state.discoveries.lock().unwrap().as_ref() {
            Some(sender) => {
                let _ = sender.send(discovery);
            }
            None => self.state.backlog.lock().unwrap().push(discovery),
        }
    }

    /// `allow_duplicates` of every `start_scan` call.
    pub fn scans(&self) -> Vec<bool> {
        self.state.scans.lock().unwrap().clone()
    }

    pub fn stops(&self) -> u32 {
        self.state.stops.load(Ordering::SeqCst)
    }
}

pub fn advertisement(address: &str, id: &str, local_name: Option<&str>) -> AdvertisementData {
    AdvertisementData {
        id: id.to_owned(),
        address: address.to_owned(),
        local_name: local_name.map(str::to_owned),
        service_uuids: vec![PRIMARY_SERVICE],
        tx_power: Some(-60),
        rssi: Some(-70),
        manufacturer_data: None,
    }
}

impl BleAdapter for MockAdapter {
    type Peripheral = MockPeripheral;

    async fn wait_powered_on(&self) -> Result<(), AdapterError> {
        if self.state.powered.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AdapterError::NotPoweredOn("PoweredOff".into()))
        }
    }

    async fn start_scan(
        &self,
        _services: &[Uuid],
        allow_duplicates: bool,
    ) -> Result<(), AdapterError> {
        self.state.scans.lock().unwrap().push(allow_duplicates);
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), AdapterError> {
        self.state.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn discoveries(
        &self,
    ) -> Result<BoxStream<(MockPeripheral, AdvertisementData)>, AdapterError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        for discovery in self.state.backlog.lock().unwrap().drain(..) {
            let _ = sender.send(discovery);
        }
        *self.state.discoveries.lock().unwrap() = Some(sender);
        Ok(Box::pin(UnboundedReceiverStream::new(receiver)))
    }
}
