use serde::{Deserialize, Serialize};
use validator::Validate;

use super::wire::{WireMeta, flexible_id, string_or_empty};
use super::{Dimension, Directory, Entity, EntityKind, NaturalKey, RecordMeta, trimmed};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub curriculum_id: String,
    pub subject_id: String,
    pub term: String,
    pub milestone: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct MilestoneForm {
    #[validate(custom(function = "crate::validation::required"))]
    pub curriculum_id: String,
    #[validate(custom(function = "crate::validation::required"))]
    pub subject_id: String,
    #[validate(custom(function = "crate::validation::required"))]
    pub term: String,
    #[validate(custom(function = "crate::validation::required"))]
    pub milestone: String,
    pub description: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMilestone {
    #[serde(flatten)]
    meta: WireMeta,
    #[serde(default, deserialize_with = "flexible_id", alias = "curriculum_id")]
    curriculum_id: Option<String>,
    #[serde(default, deserialize_with = "flexible_id", alias = "subject_id")]
    subject_id: Option<String>,
    #[serde(default)]
    term: Option<String>,
    #[serde(default, alias = "title", alias = "milestoneText")]
    milestone: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl Entity for Milestone {
    type Form = MilestoneForm;

    const KIND: EntityKind = EntityKind::Milestone;
    const DUPLICATE_MESSAGE: &'static str =
        "A milestone already exists for this curriculum, subject and term";
    const DIMENSIONS: &'static [Dimension] =
        &[Dimension::Curriculum, Dimension::Subject, Dimension::Term];

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn create(meta: RecordMeta, form: MilestoneForm) -> Self {
        let mut milestone = Self {
            meta,
            curriculum_id: String::new(),
            subject_id: String::new(),
            term: String::new(),
            milestone: String::new(),
            description: String::new(),
        };
        milestone.apply(form);
        milestone
    }

    fn apply(&mut self, form: MilestoneForm) {
        self.curriculum_id = trimmed(form.curriculum_id);
        self.subject_id = trimmed(form.subject_id);
        self.term = trimmed(form.term);
        self.milestone = trimmed(form.milestone);
        self.description = trimmed(form.description);
    }

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(&[
            self.curriculum_id.as_str(),
            self.subject_id.as_str(),
            self.term.as_str(),
        ])
    }

    fn form_key(form: &MilestoneForm) -> NaturalKey {
        NaturalKey::new(&[
            form.curriculum_id.as_str(),
            form.subject_id.as_str(),
            form.term.as_str(),
        ])
    }

    fn display_name(&self) -> &str {
        &self.milestone
    }

    fn text_fields(&self) -> Vec<&str> {
        vec![
            self.milestone.as_str(),
            self.description.as_str(),
            self.term.as_str(),
        ]
    }

    fn related_names(&self, directory: &dyn Directory) -> Vec<(&'static str, String)> {
        vec![
            (
                "curriculumName",
                directory
                    .resolve_name(EntityKind::Curriculum, &self.curriculum_id)
                    .to_string(),
            ),
            (
                "subjectName",
                directory
                    .resolve_name(EntityKind::Subject, &self.subject_id)
                    .to_string(),
            ),
        ]
    }

    fn dimension<'a>(
        &'a self,
        dimension: Dimension,
        _directory: &'a dyn Directory,
    ) -> Option<&'a str> {
        match dimension {
            Dimension::Curriculum => Some(self.curriculum_id.as_str()),
            Dimension::Subject => Some(self.subject_id.as_str()),
            Dimension::Term => Some(self.term.as_str()),
            Dimension::School => None,
        }
    }

    fn from_wire(value: serde_json::Value) -> anyhow::Result<Self> {
        let wire: WireMilestone = serde_json::from_value(value)?;
        Ok(Self {
            meta: wire.meta.into_meta()?,
            curriculum_id: string_or_empty(wire.curriculum_id),
            subject_id: string_or_empty(wire.subject_id),
            term: string_or_empty(wire.term),
            milestone: string_or_empty(wire.milestone),
            description: string_or_empty(wire.description),
        })
    }
}
