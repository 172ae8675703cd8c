//! One Linking device: connect with retries, run the handshake, correlate
//! requests with responses and dispatch notifications.
//!
//! ## Lifecycle
//!
//! ```text
//! Disconnected → Connecting → DiscoveringServices → Subscribing
//!              → Handshaking → Connected → Disconnecting → Disconnected
//! ```
//!
//! A reader task is spawned when the indicate characteristic is subscribed.
//! It re-assembles fragments, decodes packets and either completes the
//! pending request (`*_RESP`) or publishes a [`DeviceEvent`]. Only one
//! request is in flight at a time; concurrent [`DeviceConnection::write`]
//! calls queue up in FIFO order.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use linking_protocol::multiplexer::{self, ParsedMessage};
use linking_protocol::reassembler::Reassembler;
use linking_protocol::request::{SensorType, SettingNameType};
use linking_protocol::service::{ServiceId, operation, sensor};
use linking_protocol::uuids::{
    DEVICE_NAME_CHARACTERISTIC, GENERIC_ACCESS_SERVICE, INDICATE_CHARACTERISTIC, PRIMARY_SERVICE,
    WRITE_CHARACTERISTIC,
};
use linking_protocol::{Fields, Request, Value};
use serde::Serialize;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt as _;
use uuid::Uuid;

use crate::capability::{Capabilities, Capability, sensor_fields};
use crate::config::ConnectionConfig;
use crate::device_info::DeviceInfo;
use crate::error::DeviceError;
use crate::event_bus::EventBus;
use crate::ports::{AdapterError, AdvertisementData, BlePeripheral, BoxStream, PeripheralEvent};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    DiscoveringServices,
    Subscribing,
    Handshaking,
    Connected,
    Disconnecting,
}

/// Steps reported while connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStep {
    Connecting,
    DiscoveringServices,
    Subscribing,
    GetDeviceInformation,
    ConfirmNotifyCategory,
    GetSettingInformation,
    GetSettingName(SettingNameType),
    Ready,
}

impl ConnectStep {
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Connecting => "Connecting to the device",
            Self::DiscoveringServices => "Discovering services and characteristics",
            Self::Subscribing => "Subscribing to indications",
            Self::GetDeviceInformation => "Getting the device information",
            Self::ConfirmNotifyCategory => "Confirming the notification categories",
            Self::GetSettingInformation => "Getting the setting information",
            Self::GetSettingName(SettingNameType::LedColor) => "Getting the LED color names",
            Self::GetSettingName(SettingNameType::LedPattern) => "Getting the LED pattern names",
            Self::GetSettingName(SettingNameType::VibrationPattern) => {
                "Getting the vibration pattern names"
            }
            Self::GetSettingName(SettingNameType::BeepPattern) => "Getting the beep pattern names",
            Self::Ready => "The device is ready",
        }
    }
}

/// Everything a connection reports to its subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Progress {
        step: ConnectStep,
        description: &'static str,
    },
    Connected,
    Disconnected {
        was_clean: bool,
    },
    /// Any packet that is not a response.
    Notification(ParsedMessage),
    Button {
        button_id: u8,
        button_name: String,
    },
    /// Reading of one sensor the device was asked to report.
    Sensor {
        capability: Capability,
        fields: Fields,
    },
}

/// A response matched to its request.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub message: ParsedMessage,
    /// Fields of all parameters merged into one map.
    pub data: Fields,
}

struct Pending {
    expected: String,
    reply: oneshot::Sender<ParsedMessage>,
}

struct Session {
    info: DeviceInfo,
    capabilities: Capabilities,
}

struct Inner<P> {
    peripheral: P,
    advertisement: AdvertisementData,
    config: ConnectionConfig,
    state: watch::Sender<ConnectionState>,
    events: EventBus,
    pending: Mutex<Option<Pending>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    session: Mutex<Option<Session>>,
    /// Serializes request/response exchanges.
    requests: tokio::sync::Mutex<()>,
    /// Serializes connect and disconnect.
    lifecycle: tokio::sync::Mutex<()>,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to one Linking device. Cheap to clone; clones share the link.
pub struct DeviceConnection<P> {
    inner: Arc<Inner<P>>,
}

impl<P> Clone for DeviceConnection<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: BlePeripheral> fmt::Debug for DeviceConnection<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConnection")
            .field("address", &self.address())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<P: BlePeripheral> DeviceConnection<P> {
    #[must_use]
    pub fn new(peripheral: P, advertisement: AdvertisementData, config: ConnectionConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                peripheral,
                advertisement,
                config,
                state,
                events: EventBus::new(EVENT_CAPACITY),
                pending: Mutex::new(None),
                reader: Mutex::new(None),
                session: Mutex::new(None),
                requests: tokio::sync::Mutex::new(()),
                lifecycle: tokio::sync::Mutex::new(()),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> String {
        self.inner.peripheral.id()
    }

    #[must_use]
    pub fn address(&self) -> String {
        self.inner.peripheral.address()
    }

    /// Advertisement the device was discovered with.
    #[must_use]
    pub fn advertisement(&self) -> &AdvertisementData {
        &self.inner.advertisement
    }

    #[must_use]
    pub fn local_name(&self) -> &str {
        self.inner
            .advertisement
            .local_name
            .as_deref()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Follow state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Receive events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.inner.events.subscribe()
    }

    /// What the device reported during the handshake, once connected.
    #[must_use]
    pub fn info(&self) -> Option<DeviceInfo> {
        lock(&self.inner.session)
            .as_ref()
            .map(|session| session.info.clone())
    }

    #[must_use]
    pub fn capabilities(&self) -> Option<Capabilities> {
        lock(&self.inner.session)
            .as_ref()
            .map(|session| session.capabilities.clone())
    }

    /// Open the link and run the handshake.
    ///
    /// Failed attempts are torn down and retried after
    /// [`ConnectionConfig::retry_delay`], up to
    /// [`ConnectionConfig::connect_attempts`] times.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::AlreadyConnected`] unless the device is
    /// disconnected, or [`DeviceError::ConnectFailed`] carrying the error of
    /// the last attempt.
    pub async fn connect(&self) -> Result<(), DeviceError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        if self.state() != ConnectionState::Disconnected {
            return Err(DeviceError::AlreadyConnected);
        }
        let attempts = self.inner.config.connect_attempts.max(1);
        let mut attempt = 1;
        loop {
            tracing::info!(address = %self.address(), attempt, "connecting");
            let err = match self.establish().await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };
            tracing::warn!(%err, address = %self.address(), attempt, "connect attempt failed");
            if let Err(err) = self.teardown().await {
                tracing::warn!(%err, address = %self.address(), "failed to close the link");
            }
            if attempt >= attempts {
                return Err(DeviceError::ConnectFailed {
                    attempts,
                    source: Box::new(err),
                });
            }
            attempt += 1;
            tokio::time::sleep(self.inner.config.retry_delay()).await;
        }
    }

    fn enter(&self, state: ConnectionState, step: ConnectStep) {
        self.inner.state.send_replace(state);
        self.progress(step);
    }

    fn progress(&self, step: ConnectStep) {
        tracing::debug!(address = %self.address(), step = step.description(), "connect progress");
        self.inner.events.publish(DeviceEvent::Progress {
            step,
            description: step.description(),
        });
    }

    async fn establish(&self) -> Result<(), DeviceError> {
        let inner = &self.inner;

        self.enter(ConnectionState::Connecting, ConnectStep::Connecting);
        inner
            .peripheral
            .connect()
            .await
            .map_err(DeviceError::transport("connecting"))?;

        self.enter(
            ConnectionState::DiscoveringServices,
            ConnectStep::DiscoveringServices,
        );
        let services = inner
            .peripheral
            .discover_services()
            .await
            .map_err(DeviceError::transport("discovering services"))?;
        let primary = services
            .iter()
            .find(|service| service.uuid == PRIMARY_SERVICE)
            .ok_or(DeviceError::ServiceNotFound)?;
        for uuid in [WRITE_CHARACTERISTIC, INDICATE_CHARACTERISTIC] {
            if !primary.has_characteristic(uuid) {
                return Err(DeviceError::CharacteristicNotFound { uuid });
            }
        }
        let has_device_name = services.iter().any(|service| {
            service.uuid == GENERIC_ACCESS_SERVICE
                && service.has_characteristic(DEVICE_NAME_CHARACTERISTIC)
        });

        self.enter(ConnectionState::Subscribing, ConnectStep::Subscribing);
        let events = inner
            .peripheral
            .events()
            .await
            .map_err(DeviceError::transport("subscribing"))?;
        let reader = tokio::spawn(read_indications(
            Arc::downgrade(inner),
            events,
            inner.config.max_packet_len,
        ));
        *lock(&inner.reader) = Some(reader);
        inner
            .peripheral
            .subscribe(INDICATE_CHARACTERISTIC)
            .await
            .map_err(DeviceError::transport("subscribing"))?;

        inner.state.send_replace(ConnectionState::Handshaking);
        let info = self.handshake().await?;
        let capabilities = Capabilities::build(&info, self.local_name(), has_device_name);
        *lock(&inner.session) = Some(Session { info, capabilities });

        self.enter(ConnectionState::Connected, ConnectStep::Ready);
        inner.events.publish(DeviceEvent::Connected);
        tracing::info!(address = %self.address(), "device connected");
        Ok(())
    }

    async fn handshake(&self) -> Result<DeviceInfo, DeviceError> {
        self.progress(ConnectStep::GetDeviceInformation);
        let response = self.write(&Request::GetDeviceInformation).await?;
        let mut info = DeviceInfo::from_device_information(&response.data);

        if info.has_service(ServiceId::Notification) {
            self.progress(ConnectStep::ConfirmNotifyCategory);
            let response = self.write(&Request::ConfirmNotifyCategory).await?;
            info.apply_notify_categories(&response.data);
        }

        if info.has_service(ServiceId::Setting) {
            self.progress(ConnectStep::GetSettingInformation);
            let response = self.write(&Request::GetSettingInformation).await?;
            info.apply_setting_information(&response.data);

            for kind in info.setting_names_to_fetch() {
                self.progress(ConnectStep::GetSettingName(kind));
                let response = self.write(&Request::GetSettingName { kind }).await?;
                info.apply_setting_names(kind, &response.data);
            }
        }
        Ok(info)
    }

    /// Close the link. Does nothing unless connected.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Transport`] when the peripheral fails to
    /// disconnect; the connection is considered closed anyway.
    pub async fn disconnect(&self) -> Result<(), DeviceError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        let connected = self.inner.state.send_if_modified(|state| {
            if *state == ConnectionState::Connected {
                *state = ConnectionState::Disconnecting;
                true
            } else {
                false
            }
        });
        if !connected {
            return Ok(());
        }
        let result = self.teardown().await;
        self.inner
            .events
            .publish(DeviceEvent::Disconnected { was_clean: true });
        tracing::info!(address = %self.address(), "device disconnected");
        result.map_err(DeviceError::transport("disconnecting"))
    }

    /// Drop the per-link state and close the link.
    async fn teardown(&self) -> Result<(), AdapterError> {
        let inner = &self.inner;
        lock(&inner.pending).take();
        lock(&inner.session).take();
        let reader = lock(&inner.reader).take();
        if let Some(reader) = reader {
            reader.abort();
            if let Err(err) = inner.peripheral.unsubscribe(INDICATE_CHARACTERISTIC).await {
                tracing::warn!(%err, address = %self.address(), "failed to unsubscribe");
            }
        }
        let result = inner.peripheral.disconnect().await;
        inner.state.send_replace(ConnectionState::Disconnected);
        result
    }

    /// Send `request` and wait for its `_RESP`.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::NotConnected`] outside the handshake and the
    ///   connected state
    /// - [`DeviceError::NoResponse`] for messages the device never answers
    /// - [`DeviceError::InvalidParameters`] when the request cannot be encoded
    /// - [`DeviceError::Timeout`] when no response arrives in time
    /// - [`DeviceError::UnknownResponse`] when the response carries nothing
    pub async fn write(&self, request: &Request) -> Result<Response, DeviceError> {
        let message = request.message_name();
        let Some(expected) = request.response_name() else {
            return Err(DeviceError::NoResponse(message));
        };
        let packet = multiplexer::create_request(request)?;

        let _turn = self.inner.requests.lock().await;
        if !matches!(
            self.state(),
            ConnectionState::Handshaking | ConnectionState::Connected
        ) {
            return Err(DeviceError::NotConnected);
        }

        let (reply, response) = oneshot::channel();
        *lock(&self.inner.pending) = Some(Pending { expected, reply });
        if let Err(source) = self
            .inner
            .peripheral
            .write(WRITE_CHARACTERISTIC, &packet)
            .await
        {
            lock(&self.inner.pending).take();
            return Err(DeviceError::Transport {
                stage: "writing a request",
                source,
            });
        }
        tracing::debug!(address = %self.address(), message, "request sent");

        let timeout = self.inner.config.response_timeout();
        match tokio::time::timeout(timeout, response).await {
            Ok(Ok(message)) => {
                let data = message.fields();
                if data.is_empty() {
                    return Err(DeviceError::UnknownResponse(message.message_name));
                }
                Ok(Response { message, data })
            }
            Ok(Err(_)) => Err(DeviceError::Disconnected),
            Err(_) => {
                lock(&self.inner.pending).take();
                Err(DeviceError::Timeout { message, timeout })
            }
        }
    }

    /// Write a message that gets no response, such as
    /// `NOTIFY_INFORMATION` or the replies to device-initiated exchanges.
    ///
    /// # Errors
    ///
    /// [`DeviceError::NotConnected`], [`DeviceError::InvalidParameters`] or
    /// [`DeviceError::Transport`].
    pub async fn send(&self, request: &Request) -> Result<(), DeviceError> {
        self.require_connected()?;
        let packet = multiplexer::create_request(request)?;
        self.inner
            .peripheral
            .write(WRITE_CHARACTERISTIC, &packet)
            .await
            .map_err(DeviceError::transport("sending a message"))?;
        tracing::debug!(address = %self.address(), message = request.message_name(), "message sent");
        Ok(())
    }

    fn require_connected(&self) -> Result<(), DeviceError> {
        if self.state() == ConnectionState::Connected {
            Ok(())
        } else {
            Err(DeviceError::NotConnected)
        }
    }

    pub(crate) async fn read_characteristic(&self, uuid: Uuid) -> Result<Vec<u8>, DeviceError> {
        self.require_connected()?;
        self.inner
            .peripheral
            .read(uuid)
            .await
            .map_err(DeviceError::transport("reading a characteristic"))
    }

    pub(crate) async fn write_characteristic(
        &self,
        uuid: Uuid,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        self.require_connected()?;
        self.inner
            .peripheral
            .write(uuid, data)
            .await
            .map_err(DeviceError::transport("writing a characteristic"))
    }
}

impl<P: BlePeripheral> Inner<P> {
    fn has(&self, capability: Capability) -> bool {
        lock(&self.session)
            .as_ref()
            .is_some_and(|session| session.capabilities.contains(capability))
    }

    /// Handle one re-assembled packet.
    fn dispatch(&self, packet: &[u8]) {
        let Some(message) = multiplexer::parse_response(packet) else {
            return;
        };
        if message.is_response() {
            self.resolve(message);
            return;
        }
        let derived = if message.service_id == ServiceId::Operation.as_u8()
            && message.message_id == operation::NOTIFY_PD_OPERATION
        {
            self.button_event(&message)
        } else if message.service_id == ServiceId::Sensor.as_u8()
            && message.message_id == sensor::NOTIFY_PD_SENSOR_INFO
        {
            self.sensor_event(&message)
        } else {
            None
        };
        self.events.publish(DeviceEvent::Notification(message));
        if let Some(event) = derived {
            self.events.publish(event);
        }
    }

    fn resolve(&self, message: ParsedMessage) {
        let pending =
            lock(&self.pending).take_if(|pending| pending.expected == message.message_name);
        match pending {
            Some(pending) => {
                // The receiver is gone when the request timed out meanwhile.
                let _ = pending.reply.send(message);
            }
            None => tracing::debug!(message = message.message_name, "ignoring unexpected response"),
        }
    }

    fn button_event(&self, message: &ParsedMessage) -> Option<DeviceEvent> {
        if !self.has(Capability::Button) {
            return None;
        }
        let parameter = message.parameter(operation::BUTTON_ID)?;
        let button_id = parameter
            .get("buttonId")
            .and_then(Value::as_int)
            .and_then(|id| u8::try_from(id).ok())?;
        let button_name = parameter
            .get("buttonName")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        Some(DeviceEvent::Button {
            button_id,
            button_name,
        })
    }

    fn sensor_event(&self, message: &ParsedMessage) -> Option<DeviceEvent> {
        let sensor = message
            .parameter(sensor::SENSOR_TYPE)?
            .get("sensorTypeCode")
            .and_then(Value::as_int)
            .and_then(|code| u8::try_from(code).ok())
            .and_then(SensorType::from_code)?;
        let capability = Capability::for_sensor(sensor);
        if !self.has(capability) {
            return None;
        }
        Some(DeviceEvent::Sensor {
            capability,
            fields: sensor_fields(sensor, &message.parameters),
        })
    }

    /// The peripheral reported the link down.
    fn link_lost(&self) {
        lock(&self.pending).take();
        let was_connected = self.state.send_if_modified(|state| {
            if *state == ConnectionState::Connected {
                *state = ConnectionState::Disconnected;
                true
            } else {
                false
            }
        });
        if !was_connected {
            return;
        }
        lock(&self.session).take();
        // Called from the reader task itself: detach instead of aborting.
        drop(lock(&self.reader).take());
        tracing::info!(address = %self.peripheral.address(), "link lost");
        self.events
            .publish(DeviceEvent::Disconnected { was_clean: false });
    }
}

async fn read_indications<P: BlePeripheral>(
    inner: Weak<Inner<P>>,
    mut events: BoxStream<PeripheralEvent>,
    max_packet_len: usize,
) {
    let mut reassembler = Reassembler::new(max_packet_len);
    while let Some(event) = events.next().await {
        let Some(shared) = inner.upgrade() else {
            break;
        };
        match event {
            PeripheralEvent::Indication(fragment) => {
                tracing::trace!(len = fragment.len(), "indication received");
                match reassembler.push(&fragment) {
                    Ok(Some(packet)) => shared.dispatch(&packet),
                    Ok(None) => {}
                    Err(err) => tracing::debug!(%err, "dropping fragment"),
                }
            }
            PeripheralEvent::Disconnected => {
                shared.link_lost();
                break;
            }
        }
    }
}
