use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use uuid::Uuid;

use super::RecordMeta;

/// Metadata as backends send it: ids may be numbers, activity may be a flag or a status string.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireMeta {
    #[serde(default, deserialize_with = "flexible_id", alias = "_id")]
    pub id: Option<String>,
    #[serde(default, alias = "active", alias = "is_active")]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<String>,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<String>,
}

impl WireMeta {
    pub fn into_meta(self) -> anyhow::Result<RecordMeta> {
        let now = Utc::now();
        let created_at = match self.created_at.as_deref() {
            Some(raw) => parse_timestamp(raw)?,
            None => now,
        };
        let updated_at = match self.updated_at.as_deref() {
            Some(raw) => parse_timestamp(raw)?,
            None => created_at,
        };

        let is_active = match (self.is_active, self.status.as_deref()) {
            (Some(flag), _) => flag,
            (None, Some(status)) => parse_status(status)?,
            (None, None) => true,
        };

        Ok(RecordMeta {
            id: self
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            is_active,
            created_at,
            updated_at: updated_at.max(created_at),
        })
    }
}

fn parse_status(status: &str) -> anyhow::Result<bool> {
    match status.trim().to_ascii_lowercase().as_str() {
        "active" | "enabled" => Ok(true),
        "inactive" | "disabled" | "archived" | "suspended" => Ok(false),
        other => Err(anyhow!("unknown status '{}'", other)),
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
        .with_context(|| format!("invalid timestamp '{}'", raw))
}

/// Accepts string or numeric ids.
pub(crate) fn flexible_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) => Ok(Some(id)),
        Some(Value::Number(id)) => Ok(Some(id.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a string or numeric id, got {}",
            other
        ))),
    }
}

pub(crate) fn flexible_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    values
        .into_iter()
        .filter_map(|value| match value {
            Value::Null => None,
            Value::String(id) => Some(Ok(id)),
            Value::Number(id) => Some(Ok(id.to_string())),
            other => Some(Err(serde::de::Error::custom(format!(
                "expected a string or numeric id, got {}",
                other
            )))),
        })
        .collect()
}

pub(crate) fn string_or_empty(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}
