use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex},
};

use crate::transport::wire::{RecordTag, ServerRecord};

pub type PacketCallback = Arc<dyn Fn(&ServerRecord) + Send + Sync>;
pub type ConnectCallback = Arc<dyn Fn() + Send + Sync>;
pub type DisconnectCallback = Arc<dyn Fn(&DisconnectInfo) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectInfo {
    pub was_connected: bool,
    pub code: u16,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ListenerCategory {
    Packet(RecordTag),
    Connect,
    Disconnect,
    Error,
}

#[derive(Clone)]
enum Listener {
    Packet(PacketCallback),
    Connect(ConnectCallback),
    Disconnect(DisconnectCallback),
    Error(ErrorCallback),
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    listeners: BTreeMap<ListenerId, (ListenerCategory, Listener)>,
    by_category: BTreeMap<ListenerCategory, BTreeSet<ListenerId>>,
}

impl RegistryState {
    fn insert(&mut self, category: ListenerCategory, listener: Listener) -> ListenerId {
        self.next_id = self.next_id.saturating_add(1);
        let id = ListenerId(self.next_id);
        self.listeners.insert(id, (category, listener));
        self.by_category.entry(category).or_default().insert(id);
        id
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        let Some((category, _)) = self.listeners.remove(&id) else {
            return false;
        };
        if let Some(ids) = self.by_category.get_mut(&category) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_category.remove(&category);
            }
        }
        true
    }

    /// Ids are issued monotonically, so set order is registration order.
    fn snapshot(&self, category: ListenerCategory) -> Vec<Listener> {
        self.by_category
            .get(&category)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.listeners.get(id).map(|(_, listener)| listener.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Listener tables owned by one transport instance.
#[derive(Default)]
pub struct DispatchRegistry {
    state: Mutex<RegistryState>,
}

impl DispatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_packet(
        &self,
        tag: RecordTag,
        callback: impl Fn(&ServerRecord) + Send + Sync + 'static,
    ) -> ListenerId {
        self.state
            .lock()
            .expect("lock poisoned")
            .insert(ListenerCategory::Packet(tag), Listener::Packet(Arc::new(callback)))
    }

    pub fn register_connect(&self, callback: impl Fn() + Send + Sync + 'static) -> ListenerId {
        self.state
            .lock()
            .expect("lock poisoned")
            .insert(ListenerCategory::Connect, Listener::Connect(Arc::new(callback)))
    }

    pub fn register_disconnect(
        &self,
        callback: impl Fn(&DisconnectInfo) + Send + Sync + 'static,
    ) -> ListenerId {
        self.state.lock().expect("lock poisoned").insert(
            ListenerCategory::Disconnect,
            Listener::Disconnect(Arc::new(callback)),
        )
    }

    pub fn register_error(&self, callback: impl Fn(&str) + Send + Sync + 'static) -> ListenerId {
        self.state
            .lock()
            .expect("lock poisoned")
            .insert(ListenerCategory::Error, Listener::Error(Arc::new(callback)))
    }

    /// Removes one listener. A category hint that does not match the
    /// registration is logged and ignored; the id alone is authoritative.
    pub fn unregister(&self, id: ListenerId, hint: Option<ListenerCategory>) -> bool {
        let mut state = self.state.lock().expect("lock poisoned");
        if let Some(hint) = hint
            && state
                .listeners
                .get(&id)
                .is_some_and(|(category, _)| *category != hint)
        {
            tracing::debug!(
                target: "dispatch",
                listener_id = id.value(),
                hint = ?hint,
                "unregister_hint_mismatch"
            );
        }
        state.remove(id)
    }

    pub fn unregister_all(&self, ids: impl IntoIterator<Item = ListenerId>) -> usize {
        let mut state = self.state.lock().expect("lock poisoned");
        ids.into_iter().filter(|id| state.remove(*id)).count()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.listeners.clear();
        state.by_category.clear();
    }

    pub fn listener_count(&self, category: ListenerCategory) -> usize {
        self.state
            .lock()
            .expect("lock poisoned")
            .by_category
            .get(&category)
            .map(BTreeSet::len)
            .unwrap_or(0)
    }

    pub fn dispatch_packet(&self, record: &ServerRecord) -> usize {
        let listeners = self.snapshot(ListenerCategory::Packet(record.tag()));
        for listener in &listeners {
            if let Listener::Packet(callback) = listener {
                callback(record);
            }
        }
        listeners.len()
    }

    pub fn dispatch_connect(&self) {
        for listener in self.snapshot(ListenerCategory::Connect) {
            if let Listener::Connect(callback) = listener {
                callback();
            }
        }
    }

    pub fn dispatch_disconnect(&self, info: &DisconnectInfo) {
        for listener in self.snapshot(ListenerCategory::Disconnect) {
            if let Listener::Disconnect(callback) = listener {
                callback(info);
            }
        }
    }

    pub fn dispatch_error(&self, reason: &str) {
        for listener in self.snapshot(ListenerCategory::Error) {
            if let Listener::Error(callback) = listener {
                callback(reason);
            }
        }
    }

    fn snapshot(&self, category: ListenerCategory) -> Vec<Listener> {
        self.state.lock().expect("lock poisoned").snapshot(category)
    }
}
