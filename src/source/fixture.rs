use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Value, json};
use tracing::{error, info, instrument};

use super::{Capabilities, Collection, EntitySource};
use crate::error::LoadError;
use crate::models::EntityKind;

/// Serves collections from a static JSON document.
#[derive(Debug, Clone)]
pub struct FixtureSource {
    name: String,
    collections: BTreeMap<Collection, Vec<Value>>,
    capabilities: Capabilities,
}

impl FixtureSource {
    pub fn builtin(hard_delete: bool) -> Self {
        Self::from_json("builtin", builtin_document(), hard_delete).unwrap_or_else(|err| {
            error!(error = %err, "Built-in fixture document is malformed");
            Self {
                name: "builtin".to_string(),
                collections: BTreeMap::new(),
                capabilities: Capabilities::default().with_hard_delete(hard_delete),
            }
        })
    }

    #[instrument]
    pub fn from_file(path: &Path, hard_delete: bool) -> Result<Self, LoadError> {
        let raw = std::fs::read_to_string(path)?;
        let document: Value = serde_json::from_str(&raw)
            .map_err(|err| LoadError::InvalidDocument(err.to_string()))?;
        let source = Self::from_json(&path.display().to_string(), document, hard_delete)?;
        info!(collections = source.collections.len(), "Loaded fixture file");
        Ok(source)
    }

    /// Builds a source from a document keyed by collection name. Missing
    /// collections are served as empty; unknown keys are rejected.
    pub fn from_json(name: &str, document: Value, hard_delete: bool) -> Result<Self, LoadError> {
        let Value::Object(entries) = document else {
            return Err(LoadError::InvalidDocument(
                "expected an object keyed by collection name".to_string(),
            ));
        };

        let mut collections = BTreeMap::new();
        for (key, value) in entries {
            let collection = Collection::from_name(&key).ok_or_else(|| {
                LoadError::InvalidDocument(format!("unknown collection '{}'", key))
            })?;
            let Value::Array(records) = value else {
                return Err(LoadError::InvalidDocument(format!(
                    "collection '{}' must be an array",
                    key
                )));
            };
            collections.insert(collection, records);
        }

        Ok(Self {
            name: name.to_string(),
            collections,
            capabilities: Capabilities::default().with_hard_delete(hard_delete),
        })
    }
}

#[rocket::async_trait]
impl EntitySource for FixtureSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self, _kind: EntityKind) -> Capabilities {
        self.capabilities
    }

    async fn fetch(&self, collection: Collection) -> Result<Vec<Value>, LoadError> {
        Ok(self.collections.get(&collection).cloned().unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), LoadError> {
        Ok(())
    }
}

fn builtin_document() -> Value {
    json!({
        "curricula": [
            {
                "id": 1,
                "name": "Competency Based Curriculum",
                "code": "CBC",
                "description": "Learner-centred national curriculum",
                "isActive": true,
                "createdAt": "2024-01-08T08:00:00Z",
                "updatedAt": "2024-01-08T08:00:00Z"
            },
            {
                "id": 2,
                "curriculumName": "8-4-4 System",
                "code": "844",
                "description": "Legacy examination-based curriculum",
                "status": "inactive",
                "createdAt": "2023-03-14 09:30:00",
                "updatedAt": "2024-02-01 10:00:00"
            }
        ],
        "subjects": [
            {
                "id": 1,
                "name": "Mathematics",
                "code": "MAT",
                "description": "Numbers, algebra and geometry",
                "curriculumId": 1
            },
            {
                "id": 2,
                "subjectName": "English",
                "code": "ENG",
                "description": "Reading, writing and oral skills",
                "curriculumIds": ["1"]
            },
            {
                "id": 3,
                "name": "Agriculture",
                "code": "AGR",
                "description": "Crop and animal husbandry",
                "active": false
            }
        ],
        "milestones": [
            {
                "id": 1,
                "curriculumId": 1,
                "subjectId": 1,
                "term": "Term 1",
                "milestone": "Counts and orders numbers up to 1000",
                "description": "Place value and comparison"
            },
            {
                "id": 2,
                "curriculumId": 1,
                "subjectId": 2,
                "term": "Term 2",
                "title": "Reads a short passage aloud",
                "description": "Fluency and pronunciation"
            }
        ],
        "goals": [
            {
                "id": 1,
                "curriculumId": 1,
                "subjectId": 1,
                "term": "Term 1",
                "goal": "Master multiplication tables up to 12"
            },
            {
                "id": 2,
                "curriculumId": 1,
                "subjectId": 2,
                "term": "Term 1",
                "goalText": "Write a structured paragraph"
            }
        ],
        "users": [
            {
                "id": 1,
                "name": "Amina Otieno",
                "email": "amina@greenfield.ac.ke",
                "phone": "+254 712 345 678",
                "role": "super_admin",
                "schoolId": 1,
                "lastLogin": "2024-05-02T07:45:00Z"
            },
            {
                "id": 2,
                "fullName": "Brian Kamau",
                "email": "brian@hillside.ac.ke",
                "role": "Institution Admin",
                "school": "2"
            },
            {
                "id": 3,
                "name": "Grace Wanjiru",
                "email": "grace@greenfield.ac.ke",
                "role": "teacher",
                "schoolId": 1,
                "status": "inactive"
            }
        ],
        "institutions": [
            {
                "id": 1,
                "name": "Greenfield Academy",
                "code": "GFA",
                "location": "Nairobi",
                "contactEmail": "office@greenfield.ac.ke"
            },
            {
                "id": 2,
                "schoolName": "Hillside School",
                "code": "HSS",
                "location": "Nakuru"
            }
        ],
        "relations": [
            {
                "id": 1,
                "subjectId": 1,
                "curriculumId": 1,
                "createdAt": "2024-01-08T08:05:00Z"
            }
        ]
    })
}
