use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::Serialize;

use crate::models::EntityKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Edited,
    Removed,
    Toggled { active: bool },
    Reloaded { count: usize },
}

/// Delivered to listeners after a mutation or reload has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub kind: EntityKind,
    pub id: Option<String>,
    pub change: ChangeKind,
}

impl ChangeEvent {
    pub fn record(kind: EntityKind, id: &str, change: ChangeKind) -> Self {
        Self {
            kind,
            id: Some(id.to_string()),
            change,
        }
    }

    pub fn reloaded(kind: EntityKind, count: usize) -> Self {
        Self {
            kind,
            id: None,
            change: ChangeKind::Reloaded { count },
        }
    }
}

type Listener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    entries: BTreeMap<u64, Listener>,
}

/// Observer table owned by one controller.
#[derive(Clone, Default)]
pub struct Listeners {
    table: Arc<Mutex<ListenerTable>>,
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners").field("len", &self.len()).finish()
    }
}

impl Listeners {
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let id = table.next_id;
        table.next_id += 1;
        table.entries.insert(id, Arc::new(listener));

        Subscription {
            id,
            table: Arc::downgrade(&self.table),
        }
    }

    /// Calls every listener outside the lock, so a listener may subscribe or unsubscribe.
    pub fn emit(&self, event: &ChangeEvent) {
        let snapshot: Vec<Listener> = {
            let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.entries.values().cloned().collect()
        };

        for listener in snapshot {
            listener(event);
        }
    }

    pub fn clear(&self) {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clear();
    }

    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle to a registered listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    table: Weak<Mutex<ListenerTable>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Keeps the listener registered for as long as the controller lives.
    pub fn detach(mut self) {
        self.table = Weak::new();
    }

    fn remove(&self) {
        if let Some(table) = self.table.upgrade() {
            table
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entries
                .remove(&self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}
