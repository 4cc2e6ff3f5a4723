pub mod curriculum;
pub mod goal;
pub mod institution;
pub mod milestone;
pub mod relation;
pub mod subject;
pub mod user;
pub(crate) mod wire;

pub use curriculum::*;
pub use goal::*;
pub use institution::*;
pub use milestone::*;
pub use relation::*;
pub use subject::*;
pub use user::*;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Curriculum,
    Subject,
    Milestone,
    Goal,
    User,
    Institution,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Curriculum,
        EntityKind::Subject,
        EntityKind::Milestone,
        EntityKind::Goal,
        EntityKind::User,
        EntityKind::Institution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Curriculum => "curriculum",
            EntityKind::Subject => "subject",
            EntityKind::Milestone => "milestone",
            EntityKind::Goal => "goal",
            EntityKind::User => "user",
            EntityKind::Institution => "institution",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact-match filter dimensions an entity kind may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Curriculum,
    Subject,
    Term,
    School,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    pub id: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecordMeta {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Refreshes `updated_at` without ever moving it backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

impl Default for RecordMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// Business identity of a record, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey(Vec<String>);

impl NaturalKey {
    pub fn new(parts: &[&str]) -> Self {
        Self(parts.iter().map(|part| part.trim().to_lowercase()).collect())
    }
}

/// Name resolution across panels. Dangling ids resolve to [`UNKNOWN_NAME`].
pub trait Directory {
    fn name_of(&self, kind: EntityKind, id: &str) -> Option<&str>;

    fn curriculum_of_subject(&self, subject_id: &str) -> Option<&str>;

    fn resolve_name(&self, kind: EntityKind, id: &str) -> &str {
        self.name_of(kind, id).unwrap_or(UNKNOWN_NAME)
    }
}

pub trait Entity: Clone + fmt::Debug + Serialize + Send + Sync + 'static {
    type Form: Validate + Clone + Send + Sync;

    const KIND: EntityKind;
    const DUPLICATE_MESSAGE: &'static str;
    const DIMENSIONS: &'static [Dimension] = &[];

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    fn create(meta: RecordMeta, form: Self::Form) -> Self;

    /// Overwrites every domain field from the form.
    fn apply(&mut self, form: Self::Form);

    fn natural_key(&self) -> NaturalKey;

    fn form_key(form: &Self::Form) -> NaturalKey;

    fn display_name(&self) -> &str;

    /// Free-text fields searched by the panel filter.
    fn text_fields(&self) -> Vec<&str>;

    /// Display names of related records, keyed by the JSON field they are served under.
    fn related_names(&self, _directory: &dyn Directory) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn dimension<'a>(
        &'a self,
        _dimension: Dimension,
        _directory: &'a dyn Directory,
    ) -> Option<&'a str> {
        None
    }

    fn from_wire(value: serde_json::Value) -> anyhow::Result<Self>;

    fn id(&self) -> &str {
        &self.meta().id
    }

    fn is_active(&self) -> bool {
        self.meta().is_active
    }
}

pub(crate) fn trimmed(value: String) -> String {
    value.trim().to_string()
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.map(trimmed).filter(|v| !v.is_empty())
}
