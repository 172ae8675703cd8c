//! In-process event bus backed by a tokio broadcast channel.

use tokio::sync::broadcast;

use crate::connection::DeviceEvent;

/// Fan-out of [`DeviceEvent`]s to every subscriber of one connection.
///
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped).
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<DeviceEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events on this bus.
    ///
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: DeviceEvent) {
        // Only fails when nobody listens.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_deliver_event_to_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DeviceEvent::Connected);

        assert_eq!(rx.recv().await.unwrap(), DeviceEvent::Connected);
    }

    #[tokio::test]
    async fn should_deliver_event_to_multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(DeviceEvent::Disconnected { was_clean: true });

        let expected = DeviceEvent::Disconnected { was_clean: true };
        assert_eq!(rx1.recv().await.unwrap(), expected);
        assert_eq!(rx2.recv().await.unwrap(), expected);
    }

    #[test]
    fn should_succeed_when_no_subscribers() {
        let bus = EventBus::new(16);
        bus.publish(DeviceEvent::Connected);
    }

    #[tokio::test]
    async fn should_not_deliver_events_published_before_subscription() {
        let bus = EventBus::new(16);
        bus.publish(DeviceEvent::Connected);

        let mut rx = bus.subscribe();
        bus.publish(DeviceEvent::Disconnected { was_clean: false });

        assert_eq!(
            rx.recv().await.unwrap(),
            DeviceEvent::Disconnected { was_clean: false }
        );
    }
}
