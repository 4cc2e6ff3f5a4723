use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::source::EntitySource;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Connectivity {
    #[default]
    Unknown,
    Online {
        checked_at: DateTime<Utc>,
    },
    Offline {
        checked_at: DateTime<Utc>,
        reason: String,
    },
}

impl Connectivity {
    pub fn is_online(&self) -> bool {
        matches!(self, Connectivity::Online { .. })
    }
}

/// Pings the source on a fixed period until stopped or dropped.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    status: watch::Receiver<Connectivity>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectivityMonitor {
    pub fn spawn(source: Arc<dyn EntitySource>, interval: Duration) -> Self {
        let (sender, status) = watch::channel(Connectivity::Unknown);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let next = match source.ping().await {
                    Ok(()) => {
                        debug!(source = source.name(), "Source reachable");
                        Connectivity::Online {
                            checked_at: Utc::now(),
                        }
                    }
                    Err(err) => {
                        warn!(source = source.name(), error = %err, "Source unreachable");
                        Connectivity::Offline {
                            checked_at: Utc::now(),
                            reason: err.to_string(),
                        }
                    }
                };

                if sender.send(next).is_err() {
                    break;
                }
            }
        });

        info!(interval_secs = interval.as_secs(), "Started connectivity monitor");
        Self {
            status,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn status(&self) -> Connectivity {
        self.status.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Connectivity> {
        self.status.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Cancels the polling task and waits for it to wind down.
    pub async fn stop(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(task) = task {
            task.abort();
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    warn!(error = %err, "Connectivity monitor ended abnormally");
                }
            }
            info!("Stopped connectivity monitor");
        }
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        if let Some(task) = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}
