use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::non_blank;
use super::wire::{flexible_id, parse_timestamp};

/// Links one subject to one curriculum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub id: String,
    pub subject_id: String,
    pub curriculum_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRelation {
    #[serde(default, deserialize_with = "flexible_id", alias = "_id")]
    id: Option<String>,
    #[serde(default, deserialize_with = "flexible_id", alias = "subject_id", alias = "subject")]
    subject_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "flexible_id",
        alias = "curriculum_id",
        alias = "curriculum"
    )]
    curriculum_id: Option<String>,
    #[serde(default, alias = "created_at")]
    created_at: Option<String>,
}

impl Relation {
    pub fn new(subject_id: &str, curriculum_id: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            subject_id: subject_id.trim().to_string(),
            curriculum_id: curriculum_id.trim().to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn from_wire(value: serde_json::Value) -> anyhow::Result<Self> {
        let wire: WireRelation = serde_json::from_value(value)?;
        let subject_id = non_blank(wire.subject_id)
            .ok_or_else(|| anyhow::anyhow!("relation is missing subjectId"))?;
        let curriculum_id = non_blank(wire.curriculum_id)
            .ok_or_else(|| anyhow::anyhow!("relation is missing curriculumId"))?;
        let created_at = match wire.created_at.as_deref() {
            Some(raw) => parse_timestamp(raw)?,
            None => Utc::now(),
        };

        Ok(Self {
            id: non_blank(wire.id).unwrap_or_else(|| Uuid::new_v4().to_string()),
            subject_id,
            curriculum_id,
            created_at,
        })
    }

    pub fn links(&self, subject_id: &str, curriculum_id: &str) -> bool {
        self.subject_id == subject_id && self.curriculum_id == curriculum_id
    }
}
