//! Change notification fan-out.

use crate::model::item::{ItemId, SceneItem};
use std::cell::{Cell, RefCell};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};

/// One store mutation as seen by subscribers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeEvent {
    /// Items created or updated, in their post-mutation state.
    pub changed: Vec<SceneItem>,
    /// Ids of items that were deleted.
    pub removed: Vec<ItemId>,
}

impl ChangeEvent {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }
}

/// Queue of pending notifications for one subscriber.
///
/// Events are delivered in mutation order and consumed one at a time, so a
/// subscriber never observes a notification while it is still mutating the
/// store in reaction to an earlier one.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Pops the oldest pending event.
    pub fn try_next(&self) -> Option<ChangeEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

/// Publisher half shared by store implementations.
#[derive(Debug, Default)]
pub struct ChangeFeed {
    subscribers: RefCell<Vec<(u64, Sender<ChangeEvent>)>>,
    next_id: Cell<u64>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let (sender, receiver) = channel();
        self.subscribers.borrow_mut().push((id, sender));
        Subscription { id, receiver }
    }

    /// Delivers `event` to every live subscription and prunes dropped ones.
    pub fn publish(&self, event: ChangeEvent) {
        if event.is_empty() {
            return;
        }
        self.subscribers
            .borrow_mut()
            .retain(|(_, sender)| sender.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeEvent, ChangeFeed};
    use uuid::Uuid;

    #[test]
    fn delivers_in_order_and_prunes_dropped_subscribers() {
        let feed = ChangeFeed::new();
        let kept = feed.subscribe();
        let dropped = feed.subscribe();
        assert_ne!(kept.id(), dropped.id());
        drop(dropped);

        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        feed.publish(ChangeEvent {
            changed: vec![],
            removed: vec![first],
        });
        feed.publish(ChangeEvent {
            changed: vec![],
            removed: vec![second],
        });

        assert_eq!(feed.subscriber_count(), 1);
        assert_eq!(kept.try_next().unwrap().removed, vec![first]);
        assert_eq!(kept.try_next().unwrap().removed, vec![second]);
        assert!(kept.try_next().is_none());
    }

    #[test]
    fn empty_events_are_not_published() {
        let feed = ChangeFeed::new();
        let subscription = feed.subscribe();
        feed.publish(ChangeEvent::default());
        assert!(subscription.try_next().is_none());
    }
}
