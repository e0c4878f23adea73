// ─── Cache Events ───
// Copy-on-write listener lists and the events fired through them.
//
// Listeners are called synchronously on the mutating thread after the change
// has been committed. The slot array is replaced, never edited, so a list
// being iterated is never modified underneath the iteration.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use super::resource::CachedResource;
use super::CacheEntry;
use crate::core::reference::Reference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

enum Slot<E> {
    Callback(ListenerId, Callback<E>),
    Channel(ListenerId, UnboundedSender<E>),
}

impl<E> Slot<E> {
    fn id(&self) -> ListenerId {
        match self {
            Slot::Callback(id, _) | Slot::Channel(id, _) => *id,
        }
    }
}

impl<E> Clone for Slot<E> {
    fn clone(&self) -> Self {
        match self {
            Slot::Callback(id, f) => Slot::Callback(*id, Arc::clone(f)),
            Slot::Channel(id, tx) => Slot::Channel(*id, tx.clone()),
        }
    }
}

pub struct ListenerList<E> {
    slots: RwLock<Arc<[Slot<E>]>>,
    next_id: AtomicU64,
}

impl<E: Clone + Send + 'static> ListenerList<E> {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Arc::from(Vec::<Slot<E>>::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a callback. It runs on whichever thread commits the change.
    pub fn add_listener(&self, listener: impl Fn(&E) + Send + Sync + 'static) -> ListenerId {
        let id = self.next_id();
        self.push(Slot::Callback(id, Arc::new(listener)));
        id
    }

    /// Register a channel. Dropping the receiver unregisters it on the next fire.
    pub fn subscribe(&self) -> UnboundedReceiver<E> {
        let (tx, rx) = unbounded_channel();
        let id = self.next_id();
        self.push(Slot::Channel(id, tx));
        rx
    }

    /// Returns false if `id` was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut slots = self.slots.write();
        if !slots.iter().any(|slot| slot.id() == id) {
            return false;
        }

        let kept: Vec<Slot<E>> = slots.iter().filter(|s| s.id() != id).cloned().collect();
        *slots = Arc::from(kept);
        true
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every listener registered at the time of the call.
    pub fn fire(&self, event: &E) {
        let snapshot = Arc::clone(&*self.slots.read());
        let mut closed = Vec::new();

        for slot in snapshot.iter() {
            match slot {
                Slot::Callback(_, listener) => listener(event),
                Slot::Channel(id, tx) => {
                    if tx.send(event.clone()).is_err() {
                        closed.push(*id);
                    }
                }
            }
        }

        for id in closed {
            self.remove_listener(id);
        }
    }

    fn next_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn push(&self, slot: Slot<E>) {
        let mut slots = self.slots.write();
        let mut next: Vec<Slot<E>> = slots.to_vec();
        next.push(slot);
        *slots = Arc::from(next);
    }
}

impl<E: Clone + Send + 'static> Default for ListenerList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for ListenerList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerList")
            .field("listeners", &self.slots.read().len())
            .finish()
    }
}

// ── Cache-level events ─────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEventKind {
    EntryAdded,
    EntryRemoved,
    EntryUpdated,
}

#[derive(Clone)]
pub struct CacheEvent {
    pub kind: CacheEventKind,
    pub entry: Arc<dyn CacheEntry>,
}

impl fmt::Debug for CacheEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEvent")
            .field("kind", &self.kind)
            .field("entry", &self.entry.key())
            .finish()
    }
}

// ── Entry-level events ─────────────────────────────────

#[derive(Clone)]
pub enum EntryEvent {
    ResourceAdded(Arc<CachedResource>),
    /// Fired before a transfer starts so observers can poll its statistics.
    UpdateStarted(Arc<CachedResource>),
    ResourceUpdated(Arc<CachedResource>),
    ResourceRemoved(Reference),
    MetaChanged { key: String, value: Option<String> },
}

impl fmt::Debug for EntryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryEvent::ResourceAdded(r) => write!(f, "ResourceAdded({})", r.reference()),
            EntryEvent::UpdateStarted(r) => write!(f, "UpdateStarted({})", r.reference()),
            EntryEvent::ResourceUpdated(r) => write!(f, "ResourceUpdated({})", r.reference()),
            EntryEvent::ResourceRemoved(r) => write!(f, "ResourceRemoved({r})"),
            EntryEvent::MetaChanged { key, value } => write!(f, "MetaChanged({key}={value:?})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn callbacks_receive_every_event() {
        let list = ListenerList::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));

        let sink = Arc::clone(&total);
        list.add_listener(move |n| {
            sink.fetch_add(*n as usize, Ordering::SeqCst);
        });

        list.fire(&2);
        list.fire(&3);
        assert_eq!(total.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn removed_listener_is_not_called() {
        let list = ListenerList::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let sink = Arc::clone(&calls);
        let id = list.add_listener(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        assert!(list.remove_listener(id));
        assert!(!list.remove_listener(id));
        list.fire(&1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(list.is_empty());
    }

    #[test]
    fn listener_may_unregister_itself_while_firing() {
        let list = Arc::new(ListenerList::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let own_id = Arc::new(parking_lot::Mutex::new(None));

        let (weak, sink, slot) = (Arc::downgrade(&list), Arc::clone(&calls), Arc::clone(&own_id));
        let id = list.add_listener(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
            if let (Some(list), Some(id)) = (weak.upgrade(), *slot.lock()) {
                list.remove_listener(id);
            }
        });
        *own_id.lock() = Some(id);

        list.fire(&1);
        list.fire(&1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn channels_receive_and_are_pruned_when_dropped() {
        let list = ListenerList::<u32>::new();
        let mut rx = list.subscribe();
        let dropped = list.subscribe();
        drop(dropped);

        list.fire(&7);
        assert_eq!(rx.try_recv().unwrap(), 7);
        assert_eq!(list.len(), 1);
    }
}
