use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Typed topics published by the presence core.
///
/// `NetworkChanged`, `ChannelChanged` and `PresenceChanged` mirror the
/// published (debounced) connection state, never the raw signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    NetworkChanged(bool),
    ChannelChanged(bool),
    PresenceChanged { is_online: bool },
    SignedIn { user_id: String },
    SignedOut { user_id: String },
    Shutdown,
    #[serde(other)]
    Unknown,
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: Event) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(Event::PresenceChanged { is_online: true });

        let event = rx.recv().await.unwrap();
        assert_eq!(event, Event::PresenceChanged { is_online: true });
    }

    #[tokio::test]
    async fn multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(Event::Shutdown);

        assert!(matches!(rx1.recv().await.unwrap(), Event::Shutdown));
        assert!(matches!(rx2.recv().await.unwrap(), Event::Shutdown));
    }

    #[tokio::test]
    async fn topics_arrive_in_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(Event::NetworkChanged(true));
        bus.publish(Event::ChannelChanged(true));
        bus.publish(Event::SignedIn {
            user_id: "alice".into(),
        });

        assert_eq!(rx.recv().await.unwrap(), Event::NetworkChanged(true));
        assert_eq!(rx.recv().await.unwrap(), Event::ChannelChanged(true));
        assert!(matches!(
            rx.recv().await.unwrap(),
            Event::SignedIn { ref user_id } if user_id == "alice"
        ));
    }

    #[test]
    fn publish_returns_zero_with_no_subscribers() {
        let bus = EventBus::new(16);
        assert_eq!(bus.publish(Event::Shutdown), 0);
    }

    #[tokio::test]
    async fn publish_returns_subscriber_count() {
        let bus = EventBus::new(16);
        let _rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();

        assert_eq!(bus.publish(Event::ChannelChanged(false)), 2);
    }

    #[test]
    fn unknown_event_deserializes() {
        let json = r#"{"type":"SomeNewEventWeNeverHeardOf","data":null}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert!(matches!(event, Event::Unknown));
    }

    #[test]
    fn presence_event_serializes_with_tag() {
        let json = serde_json::to_string(&Event::PresenceChanged { is_online: false }).unwrap();
        assert_eq!(json, r#"{"type":"PresenceChanged","data":{"is_online":false}}"#);
    }
}
