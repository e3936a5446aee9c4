use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::BookingEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for booking domain events, one channel per consultant.
/// External notification collaborators (email/webhook dispatch) subscribe
/// here; the write path only ever fires and forgets.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<BookingEvent>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to events for a consultant. Creates the channel if needed.
    pub fn subscribe(&self, consultant_id: Ulid) -> broadcast::Receiver<BookingEvent> {
        let sender = self
            .channels
            .entry(consultant_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send an event. No-op if nobody is listening.
    pub fn send(&self, consultant_id: Ulid, event: &BookingEvent) {
        if let Some(sender) = self.channels.get(&consultant_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Remove a channel (e.g. when a consultant is retired).
    pub fn remove(&self, consultant_id: &Ulid) {
        self.channels.remove(consultant_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let cid = Ulid::new();
        let mut rx = hub.subscribe(cid);

        let event = BookingEvent::BookingConfirmed {
            id: Ulid::new(),
            consultant_id: cid,
        };
        hub.send(cid, &event);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        let cid = Ulid::new();
        // No subscriber — should not panic
        hub.send(
            cid,
            &BookingEvent::BookingConfirmed {
                id: Ulid::new(),
                consultant_id: cid,
            },
        );
    }

    #[tokio::test]
    async fn removed_channel_drops_subscribers() {
        let hub = NotifyHub::new();
        let cid = Ulid::new();
        let mut rx = hub.subscribe(cid);
        hub.remove(&cid);
        hub.send(
            cid,
            &BookingEvent::BookingConfirmed {
                id: Ulid::new(),
                consultant_id: cid,
            },
        );
        assert!(matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Closed)));
    }
}
