use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::events::{ChangeEvent, Subscription};
use crate::workspace::Workspace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: ChangeEvent,
}

/// Bounded log of recent changes across every panel.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    capacity: usize,
    entries: Arc<Mutex<VecDeque<ActivityEntry>>>,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    pub fn record(&self, event: &ChangeEvent) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(ActivityEntry {
            at: Utc::now(),
            event: event.clone(),
        });
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<ActivityEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn attach(&self, workspace: &Workspace) -> Vec<Subscription> {
        let log = self.clone();
        workspace.subscribe_all(Arc::new(move |event: &ChangeEvent| log.record(event)))
    }
}
