use chrono::NaiveDateTime;
use rocket::async_trait;
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{FromRow, Pool, Sqlite};
use tracing::{debug, info, instrument};

use super::{Capabilities, Collection, EntitySource};
use crate::database::apply_schema;
use crate::error::LoadError;
use crate::models::EntityKind;

#[derive(FromRow, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DbCurriculum {
    pub id: Option<String>,
    pub name: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(FromRow, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DbSubject {
    pub id: Option<String>,
    pub subject_name: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub curriculum_id: Option<String>,
    pub is_active: Option<bool>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(FromRow, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DbMilestone {
    pub id: Option<String>,
    pub curriculum_id: Option<String>,
    pub subject_id: Option<String>,
    pub term: Option<String>,
    pub milestone: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(FromRow, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DbGoal {
    pub id: Option<String>,
    pub curriculum_id: Option<String>,
    pub subject_id: Option<String>,
    pub term: Option<String>,
    pub goal_text: Option<String>,
    pub is_active: Option<bool>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(FromRow, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DbUser {
    pub id: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub school_id: Option<String>,
    pub last_login: Option<NaiveDateTime>,
    pub status: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(FromRow, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DbInstitution {
    pub id: Option<String>,
    pub name: Option<String>,
    pub code: Option<String>,
    pub location: Option<String>,
    pub contact_email: Option<String>,
    pub is_active: Option<bool>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(FromRow, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DbRelation {
    pub id: Option<String>,
    pub subject_id: Option<String>,
    pub curriculum_id: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

/// Reads the backend tables through an sqlx pool and re-emits rows as wire JSON.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    pool: Pool<Sqlite>,
    capabilities: Capabilities,
}

impl SqliteSource {
    #[instrument]
    pub async fn connect(url: &str, hard_delete: bool) -> Result<Self, LoadError> {
        let pool = SqlitePoolOptions::new().connect(url).await?;
        apply_schema(&pool).await?;
        info!("Connected to SQLite source");
        Ok(Self::from_pool(pool, hard_delete))
    }

    pub fn from_pool(pool: Pool<Sqlite>, hard_delete: bool) -> Self {
        Self {
            pool,
            capabilities: Capabilities::default().with_hard_delete(hard_delete),
        }
    }

    async fn fetch_rows<T>(
        &self,
        collection: Collection,
        sql: &str,
    ) -> Result<Vec<Value>, LoadError>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Serialize + Send + Unpin,
    {
        let rows: Vec<T> = sqlx::query_as::<_, T>(sql).fetch_all(&self.pool).await?;
        debug!(%collection, count = rows.len(), "Fetched rows");

        rows.iter()
            .map(|row| {
                serde_json::to_value(row).map_err(|err| LoadError::Parse {
                    collection,
                    message: err.to_string(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl EntitySource for SqliteSource {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn capabilities(&self, _kind: EntityKind) -> Capabilities {
        self.capabilities
    }

    #[instrument(skip(self))]
    async fn fetch(&self, collection: Collection) -> Result<Vec<Value>, LoadError> {
        match collection {
            Collection::Curricula => {
                self.fetch_rows::<DbCurriculum>(
                    collection,
                    "SELECT id, name, code, description, is_active, created_at, updated_at
                     FROM curricula ORDER BY created_at, id",
                )
                .await
            }
            Collection::Subjects => {
                self.fetch_rows::<DbSubject>(
                    collection,
                    "SELECT id, subject_name, code, description, curriculum_id, is_active,
                            created_at, updated_at
                     FROM subjects ORDER BY created_at, id",
                )
                .await
            }
            Collection::Milestones => {
                self.fetch_rows::<DbMilestone>(
                    collection,
                    "SELECT id, curriculum_id, subject_id, term, milestone, description,
                            is_active, created_at, updated_at
                     FROM milestones ORDER BY created_at, id",
                )
                .await
            }
            Collection::Goals => {
                self.fetch_rows::<DbGoal>(
                    collection,
                    "SELECT id, curriculum_id, subject_id, term, goal_text, is_active,
                            created_at, updated_at
                     FROM goals ORDER BY created_at, id",
                )
                .await
            }
            Collection::Users => {
                self.fetch_rows::<DbUser>(
                    collection,
                    "SELECT id, full_name, email, phone, role, school_id, last_login, status,
                            created_at, updated_at
                     FROM users ORDER BY created_at, id",
                )
                .await
            }
            Collection::Institutions => {
                self.fetch_rows::<DbInstitution>(
                    collection,
                    "SELECT id, name, code, location, contact_email, is_active, created_at,
                            updated_at
                     FROM institutions ORDER BY created_at, id",
                )
                .await
            }
            Collection::Relations => {
                self.fetch_rows::<DbRelation>(
                    collection,
                    "SELECT id, subject_id, curriculum_id, created_at
                     FROM subject_curricula ORDER BY created_at, id",
                )
                .await
            }
        }
    }

    async fn ping(&self) -> Result<(), LoadError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
