#[cfg(test)]
pub mod test_utils {
    use std::sync::{Arc, Once};
    use std::time::Duration;

    use rocket::local::asynchronous::Client;
    use serde_json::{Value, json};
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};

    use crate::database::apply_schema;
    use crate::env::{Settings, load_test_environment};
    use crate::error::{AppError, LoadError};
    use crate::init_rocket;
    use crate::models::{Directory, EntityKind};
    use crate::source::{Capabilities, Collection, EntitySource, FixtureSource, SqliteSource};
    use crate::state::AppState;
    use crate::workspace::Workspace;

    static INIT: Once = Once::new();

    pub fn init_test_tracing() {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter("debug")
                .with_test_writer()
                .try_init();
        });
    }

    /// Resolves nothing, so every related name is unknown.
    pub struct NoDirectory;

    impl Directory for NoDirectory {
        fn name_of(&self, _kind: EntityKind, _id: &str) -> Option<&str> {
            None
        }

        fn curriculum_of_subject(&self, _subject_id: &str) -> Option<&str> {
            None
        }
    }

    pub fn standard_document() -> Value {
        json!({
            "curricula": [
                { "id": "1", "name": "Competency Based Curriculum", "code": "CBC",
                  "description": "National curriculum" },
                { "id": "2", "curriculumName": "8-4-4 System", "code": "844",
                  "status": "inactive" },
                { "id": "3", "name": "IGCSE", "code": "IGC" }
            ],
            "subjects": [
                { "id": "s1", "name": "Mathematics", "code": "MAT", "curriculumId": "1" },
                { "id": "s2", "subjectName": "English", "code": "ENG", "curriculumIds": ["1"] },
                { "id": "s3", "name": "Kiswahili", "code": "KIS", "curriculumId": 2,
                  "isActive": false }
            ],
            "milestones": [
                { "id": "m1", "curriculumId": "1", "subjectId": "s1", "term": "Term 1",
                  "milestone": "Counts to 1000" },
                { "id": "m2", "curriculumId": "1", "subjectId": "s2", "term": "Term 2",
                  "title": "Reads a passage aloud" }
            ],
            "goals": [
                { "id": "g1", "curriculumId": "1", "subjectId": "s1", "term": "Term 1",
                  "goal": "Master multiplication tables" },
                { "id": "g2", "curriculumId": "1", "subjectId": "s2", "term": "Term 1",
                  "goalText": "Write a structured paragraph" },
                { "id": "g3", "curriculumId": "2", "subjectId": "s3", "term": "Term 3",
                  "goal": "Compose a letter", "active": false }
            ],
            "users": [
                { "id": "u1", "name": "Amina Otieno", "email": "amina@greenfield.ac.ke",
                  "phone": "+254 712 345 678", "role": "super_admin", "schoolId": "i1",
                  "lastLogin": "2024-05-02T07:45:00Z" },
                { "id": "u2", "fullName": "Brian Kamau", "email": "brian@hillside.ac.ke",
                  "role": "Institution Admin", "school": "i2" },
                { "id": "u3", "name": "Grace Wanjiru", "email": "grace@greenfield.ac.ke",
                  "role": "teacher", "schoolId": "i9", "status": "inactive" }
            ],
            "institutions": [
                { "id": "i1", "name": "Greenfield Academy", "code": "GFA", "location": "Nairobi",
                  "contactEmail": "office@greenfield.ac.ke" },
                { "id": "i2", "schoolName": "Hillside School", "code": "HSS", "location": "Nakuru" }
            ],
            "relations": []
        })
    }

    pub fn standard_source(hard_delete: bool) -> FixtureSource {
        FixtureSource::from_json("standard", standard_document(), hard_delete)
            .expect("standard document is valid")
    }

    pub async fn standard_workspace(hard_delete: bool) -> Workspace {
        init_test_tracing();
        let source = standard_source(hard_delete);
        let mut workspace = Workspace::new(&source);
        let report = workspace.load(&source, Duration::from_secs(5)).await;
        assert!(report.is_complete(), "standard load failed: {:?}", report);
        workspace
    }

    pub fn test_settings() -> Settings {
        Settings {
            poll_interval: Duration::from_secs(3600),
            load_timeout: Duration::from_secs(5),
            ..Settings::default()
        }
    }

    pub async fn setup_test_client(source: Arc<dyn EntitySource>) -> Client {
        init_test_tracing();
        if let Err(err) = load_test_environment() {
            tracing::warn!("Failed to load test environment: {}", err);
        }
        let state = AppState::with_source(test_settings(), source).await;
        Client::tracked(init_rocket(state))
            .await
            .expect("valid rocket instance")
    }

    pub async fn standard_client(hard_delete: bool) -> Client {
        setup_test_client(Arc::new(standard_source(hard_delete))).await
    }

    /// A source whose backend is always down.
    pub struct FailingSource;

    #[rocket::async_trait]
    impl EntitySource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        fn capabilities(&self, _kind: EntityKind) -> Capabilities {
            Capabilities::default()
        }

        async fn fetch(&self, collection: Collection) -> Result<Vec<Value>, LoadError> {
            Err(LoadError::Unavailable(format!("{} is down", collection)))
        }

        async fn ping(&self) -> Result<(), LoadError> {
            Err(LoadError::Unavailable("backend is down".to_string()))
        }
    }

    /// Delegates to another source after a fixed delay.
    pub struct SlowSource<S> {
        pub inner: S,
        pub delay: Duration,
    }

    #[rocket::async_trait]
    impl<S: EntitySource> EntitySource for SlowSource<S> {
        fn name(&self) -> &str {
            "slow"
        }

        fn capabilities(&self, kind: EntityKind) -> Capabilities {
            self.inner.capabilities(kind)
        }

        async fn fetch(&self, collection: Collection) -> Result<Vec<Value>, LoadError> {
            tokio::time::sleep(self.delay).await;
            self.inner.fetch(collection).await
        }

        async fn ping(&self) -> Result<(), LoadError> {
            self.inner.ping().await
        }
    }

    #[derive(Default)]
    pub struct TestDbBuilder {
        statements: Vec<String>,
    }

    fn quote(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn quote_opt(value: Option<&str>) -> String {
        value.map(quote).unwrap_or_else(|| "NULL".to_string())
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn curriculum(mut self, id: &str, name: &str, code: &str) -> Self {
            self.statements.push(format!(
                "INSERT INTO curricula (id, name, code, description) VALUES ({}, {}, {}, '')",
                quote(id),
                quote(name),
                quote(code)
            ));
            self
        }

        pub fn subject(mut self, id: &str, name: &str, curriculum_id: Option<&str>) -> Self {
            self.statements.push(format!(
                "INSERT INTO subjects (id, subject_name, code, curriculum_id)
                 VALUES ({}, {}, '', {})",
                quote(id),
                quote(name),
                quote_opt(curriculum_id)
            ));
            self
        }

        pub fn relation(mut self, id: &str, subject_id: &str, curriculum_id: &str) -> Self {
            self.statements.push(format!(
                "INSERT INTO subject_curricula (id, subject_id, curriculum_id) VALUES ({}, {}, {})",
                quote(id),
                quote(subject_id),
                quote(curriculum_id)
            ));
            self
        }

        pub fn goal(
            mut self,
            id: &str,
            curriculum_id: &str,
            subject_id: &str,
            term: &str,
            text: &str,
        ) -> Self {
            self.statements.push(format!(
                "INSERT INTO goals (id, curriculum_id, subject_id, term, goal_text)
                 VALUES ({}, {}, {}, {}, {})",
                quote(id),
                quote(curriculum_id),
                quote(subject_id),
                quote(term),
                quote(text)
            ));
            self
        }

        pub fn institution(mut self, id: &str, name: &str) -> Self {
            self.statements.push(format!(
                "INSERT INTO institutions (id, name, code, location) VALUES ({}, {}, '', '')",
                quote(id),
                quote(name)
            ));
            self
        }

        pub fn user(
            mut self,
            id: &str,
            full_name: &str,
            email: &str,
            role: &str,
            school_id: Option<&str>,
            status: &str,
        ) -> Self {
            self.statements.push(format!(
                "INSERT INTO users (id, full_name, email, role, school_id, status)
                 VALUES ({}, {}, {}, {}, {}, {})",
                quote(id),
                quote(full_name),
                quote(email),
                quote(role),
                quote_opt(school_id),
                quote(status)
            ));
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            init_test_tracing();

            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await
                .map_err(LoadError::from)?;
            apply_schema(&pool).await?;

            for statement in &self.statements {
                sqlx::query(statement)
                    .execute(&pool)
                    .await
                    .map_err(LoadError::from)?;
            }

            Ok(TestDb { pool })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
    }

    impl TestDb {
        pub fn source(&self, hard_delete: bool) -> SqliteSource {
            SqliteSource::from_pool(self.pool.clone(), hard_delete)
        }
    }
}
