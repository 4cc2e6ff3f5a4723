use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::activity::ActivityLog;
use crate::connectivity::ConnectivityMonitor;
use crate::env::Settings;
use crate::error::AppError;
use crate::events::Subscription;
use crate::source::{EntitySource, LoadBatch, open};
use crate::workspace::{LoadReport, Workspace};

/// Everything the HTTP layer shares between requests.
pub struct AppState {
    pub workspace: RwLock<Workspace>,
    pub source: Arc<dyn EntitySource>,
    pub activity: ActivityLog,
    pub monitor: ConnectivityMonitor,
    pub settings: Settings,
    _subscriptions: Vec<Subscription>,
}

impl AppState {
    #[instrument(skip(settings))]
    pub async fn bootstrap(settings: Settings) -> Result<Self, AppError> {
        let source = open(&settings).await?;
        Ok(Self::with_source(settings, source).await)
    }

    /// Builds the state around a source and performs the initial load.
    /// A failed initial load leaves the affected panels empty and `Failed`.
    pub async fn with_source(settings: Settings, source: Arc<dyn EntitySource>) -> Self {
        let mut workspace = Workspace::new(source.as_ref());
        let activity = ActivityLog::new(settings.activity_capacity);
        let subscriptions = activity.attach(&workspace);

        let report = workspace.load(source.as_ref(), settings.load_timeout).await;
        if !report.is_complete() {
            warn!(failed = ?report.failed, "Initial load was incomplete");
        }

        let monitor = ConnectivityMonitor::spawn(Arc::clone(&source), settings.poll_interval);
        info!(source = source.name(), "Application state ready");

        Self {
            workspace: RwLock::new(workspace),
            source,
            activity,
            monitor,
            settings,
            _subscriptions: subscriptions,
        }
    }

    /// Reloads every panel. The workspace lock is not held while fetching, so
    /// changes committed meanwhile are replaced by the fetched lists; each
    /// panel logs how many it overwrote.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> LoadReport {
        let tickets = self.workspace.write().await.begin_load();
        let batch = LoadBatch::fetch(self.source.as_ref(), self.settings.load_timeout).await;
        self.workspace.write().await.finish_load(tickets, batch)
    }

    pub async fn shutdown(&self) {
        self.monitor.stop().await;
        self.workspace.write().await.teardown();
        info!("Application state shut down");
    }
}
