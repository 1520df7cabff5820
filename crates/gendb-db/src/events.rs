//! Change notification.
//!
//! Observers subscribe with a filter and receive [`DbEvent`]s on a tokio
//! broadcast channel. Events for a transaction are published when it
//! commits, and after each undo or redo. Batch transactions publish
//! nothing.

use std::sync::RwLock;

use gendb_types::{Handle, ObjectType};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Add,
    Update,
    Delete,
}

/// Objects of one type that changed together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbEvent {
    pub object_type: ObjectType,
    pub change: ChangeKind,
    pub handles: Vec<Handle>,
}

/// Selects which events a subscriber receives. Unset fields match everything.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    pub object_types: Option<Vec<ObjectType>>,
    pub changes: Option<Vec<ChangeKind>>,
}

impl EventFilter {
    /// Match every change to one object type.
    pub fn object_type(object_type: ObjectType) -> Self {
        Self {
            object_types: Some(vec![object_type]),
            ..Default::default()
        }
    }

    /// Returns `true` if `event` passes this filter.
    pub fn matches(&self, event: &DbEvent) -> bool {
        if let Some(ref types) = self.object_types {
            if !types.contains(&event.object_type) {
                return false;
            }
        }
        if let Some(ref changes) = self.changes {
            if !changes.contains(&event.change) {
                return false;
            }
        }
        true
    }
}

/// Receiving end of a subscription.
pub type EventStream = broadcast::Receiver<DbEvent>;

struct Subscriber {
    filter: EventFilter,
    sender: broadcast::Sender<DbEvent>,
}

/// Fan-out of events to filtered subscribers.
pub(crate) struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
    capacity: usize,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn subscribe(&self, filter: EventFilter) -> EventStream {
        let (tx, rx) = broadcast::channel(self.capacity);
        self.subscribers
            .write()
            .expect("event bus lock poisoned")
            .push(Subscriber { filter, sender: tx });
        rx
    }

    /// Deliver events in order. Subscribers whose receivers are gone are dropped.
    pub(crate) fn publish(&self, events: Vec<DbEvent>) {
        if events.is_empty() {
            return;
        }
        let mut subs = self.subscribers.write().expect("event bus lock poisoned");
        subs.retain(|sub| sub.sender.receiver_count() > 0);
        for event in &events {
            for sub in subs.iter().filter(|s| s.filter.matches(event)) {
                let _ = sub.sender.send(event.clone());
            }
        }
        debug!(events = events.len(), subscribers = subs.len(), "published events");
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.read().expect("event bus lock poisoned").len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(ty: ObjectType, change: ChangeKind) -> DbEvent {
        DbEvent {
            object_type: ty,
            change,
            handles: vec![Handle::from("h")],
        }
    }

    #[test]
    fn filter_by_type_and_change() {
        let bus = EventBus::new(8);
        let mut people = bus.subscribe(EventFilter::object_type(ObjectType::Person));
        let mut deletes = bus.subscribe(EventFilter {
            changes: Some(vec![ChangeKind::Delete]),
            ..Default::default()
        });
        bus.publish(vec![
            event(ObjectType::Person, ChangeKind::Add),
            event(ObjectType::Note, ChangeKind::Delete),
        ]);
        assert_eq!(people.try_recv().unwrap().change, ChangeKind::Add);
        assert!(people.try_recv().is_err());
        assert_eq!(deletes.try_recv().unwrap().object_type, ObjectType::Note);
        assert!(deletes.try_recv().is_err());
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let bus = EventBus::new(8);
        let rx = bus.subscribe(EventFilter::default());
        assert_eq!(bus.subscriber_count(), 1);
        drop(rx);
        bus.publish(vec![event(ObjectType::Tag, ChangeKind::Add)]);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
