pub mod fixture;
pub mod normalize;
pub mod sqlite;

pub use fixture::*;
pub use normalize::*;
pub use sqlite::*;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::env::{DataSource, Settings};
use crate::error::{AppError, LoadError};
use crate::models::EntityKind;

/// A named collection as the backend serves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Curricula,
    Subjects,
    Milestones,
    Goals,
    Users,
    Institutions,
    Relations,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Curricula,
        Collection::Subjects,
        Collection::Milestones,
        Collection::Goals,
        Collection::Users,
        Collection::Institutions,
        Collection::Relations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Curricula => "curricula",
            Collection::Subjects => "subjects",
            Collection::Milestones => "milestones",
            Collection::Goals => "goals",
            Collection::Users => "users",
            Collection::Institutions => "institutions",
            Collection::Relations => "relations",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|collection| collection.as_str() == name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<EntityKind> for Collection {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Curriculum => Collection::Curricula,
            EntityKind::Subject => Collection::Subjects,
            EntityKind::Milestone => Collection::Milestones,
            EntityKind::Goal => Collection::Goals,
            EntityKind::User => Collection::Users,
            EntityKind::Institution => Collection::Institutions,
        }
    }
}

/// Operations the backend supports for one entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub hard_delete: bool,
    pub status_update: bool,
}

impl Capabilities {
    pub const FULL: Capabilities = Capabilities {
        hard_delete: true,
        status_update: true,
    };

    pub fn with_hard_delete(self, hard_delete: bool) -> Self {
        Self {
            hard_delete,
            ..self
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            hard_delete: false,
            status_update: true,
        }
    }
}

#[rocket::async_trait]
pub trait EntitySource: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self, kind: EntityKind) -> Capabilities;

    /// Raw records of one collection. An empty collection is not an error.
    async fn fetch(&self, collection: Collection) -> Result<Vec<Value>, LoadError>;

    async fn ping(&self) -> Result<(), LoadError>;
}

pub async fn fetch_with_timeout(
    source: &dyn EntitySource,
    collection: Collection,
    timeout: Duration,
) -> Result<Vec<Value>, LoadError> {
    match tokio::time::timeout(timeout, source.fetch(collection)).await {
        Ok(result) => result,
        Err(_) => Err(LoadError::Timeout(timeout)),
    }
}

/// Raw results of fetching every collection once.
#[derive(Debug, Default)]
pub struct LoadBatch {
    results: BTreeMap<Collection, Result<Vec<Value>, LoadError>>,
}

impl LoadBatch {
    #[instrument(skip(source), fields(source = source.name()))]
    pub async fn fetch(source: &dyn EntitySource, timeout: Duration) -> Self {
        let mut results = BTreeMap::new();
        for collection in Collection::ALL {
            let result = fetch_with_timeout(source, collection, timeout).await;
            match &result {
                Ok(records) => info!(%collection, count = records.len(), "Fetched collection"),
                Err(err) => warn!(%collection, error = %err, "Failed to fetch collection"),
            }
            results.insert(collection, result);
        }
        Self { results }
    }

    pub fn insert(&mut self, collection: Collection, result: Result<Vec<Value>, LoadError>) {
        self.results.insert(collection, result);
    }

    /// Takes one collection's result. A collection that was never fetched is empty.
    pub fn take(&mut self, collection: Collection) -> Result<Vec<Value>, LoadError> {
        self.results.remove(&collection).unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[instrument(skip(settings))]
pub async fn open(settings: &Settings) -> Result<Arc<dyn EntitySource>, AppError> {
    let hard_delete = settings.allow_hard_delete;
    let source: Arc<dyn EntitySource> = match &settings.data_source {
        DataSource::Sqlite(url) => {
            info!(url = %url, "Opening SQLite source");
            Arc::new(SqliteSource::connect(url, hard_delete).await?)
        }
        DataSource::FixtureFile(path) => {
            info!(path = %path.display(), "Opening fixture file source");
            Arc::new(FixtureSource::from_file(path, hard_delete)?)
        }
        DataSource::Builtin => {
            info!("Using built-in fixture data");
            Arc::new(FixtureSource::builtin(hard_delete))
        }
    };
    Ok(source)
}
