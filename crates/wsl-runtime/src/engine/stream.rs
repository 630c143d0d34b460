use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Line(String),
    Prompt,
    RoomChange,
}

#[derive(Debug, Default)]
struct StreamInner {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, Sender<StreamEvent>)>>,
}

/// Live feed of decoded game output shared by every script on a client.
///
/// Each subscription gets its own unbounded queue, so events published
/// between `subscribe` and the first blocking receive are buffered.
#[derive(Debug, Clone, Default)]
pub struct GameStream {
    inner: Arc<StreamInner>,
}

impl GameStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = unbounded();
        self.inner.subscribers.lock().push((id, sender));
        Subscription {
            id,
            receiver,
            stream: Arc::downgrade(&self.inner),
        }
    }

    pub fn push_line(&self, text: impl Into<String>) {
        self.publish(StreamEvent::Line(text.into()));
    }

    pub fn push_prompt(&self) {
        self.publish(StreamEvent::Prompt);
    }

    pub fn push_room_change(&self) {
        self.publish(StreamEvent::RoomChange);
    }

    pub fn publish(&self, event: StreamEvent) {
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|(_, sender)| sender.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }
}

#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: Receiver<StreamEvent>,
    stream: Weak<StreamInner>,
}

impl Subscription {
    pub fn receiver(&self) -> &Receiver<StreamEvent> {
        &self.receiver
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.stream.upgrade() {
            inner.subscribers.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_receive_events_in_publish_order() {
        let stream = GameStream::new();
        let subscription = stream.subscribe();
        stream.push_line("one");
        stream.push_prompt();
        stream.push_line("two");

        let received = subscription.receiver().try_iter().collect::<Vec<_>>();
        assert_eq!(
            received,
            vec![
                StreamEvent::Line("one".to_string()),
                StreamEvent::Prompt,
                StreamEvent::Line("two".to_string()),
            ]
        );
    }

    #[test]
    fn dropping_a_subscription_unsubscribes() {
        let stream = GameStream::new();
        let first = stream.subscribe();
        let second = stream.subscribe();
        assert_eq!(stream.subscriber_count(), 2);
        drop(first);
        assert_eq!(stream.subscriber_count(), 1);
        stream.push_room_change();
        assert_eq!(
            second.receiver().try_recv().expect("event should be delivered"),
            StreamEvent::RoomChange
        );
    }

    #[test]
    fn events_before_subscribe_are_not_replayed() {
        let stream = GameStream::new();
        stream.push_line("early");
        let subscription = stream.subscribe();
        assert!(subscription.receiver().try_recv().is_err());
    }
}
