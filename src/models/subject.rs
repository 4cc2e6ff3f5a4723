use serde::{Deserialize, Serialize};
use validator::Validate;

use super::wire::{WireMeta, flexible_id, flexible_ids, string_or_empty};
use super::{
    Dimension, Directory, Entity, EntityKind, NaturalKey, RecordMeta, non_blank, trimmed,
};

/// A subject belongs to at most one curriculum. The link itself lives in the
/// relation store, not on the record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct SubjectForm {
    #[validate(custom(function = "crate::validation::required"))]
    pub name: String,
    pub code: String,
    pub description: String,
    pub curriculum_id: Option<String>,
}

impl SubjectForm {
    pub fn curriculum(&self) -> Option<&str> {
        self.curriculum_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSubject {
    #[serde(flatten)]
    meta: WireMeta,
    #[serde(default, alias = "subjectName", alias = "subject_name")]
    name: Option<String>,
    #[serde(default, alias = "subjectCode")]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, deserialize_with = "flexible_id", alias = "curriculum_id")]
    curriculum_id: Option<String>,
    // Older payloads carry the link as an array; only the first entry is honoured.
    #[serde(default, deserialize_with = "flexible_ids")]
    curriculum_ids: Vec<String>,
}

impl Subject {
    /// Parses a subject together with the curriculum it is linked to, if any.
    pub fn from_wire_with_link(
        value: serde_json::Value,
    ) -> anyhow::Result<(Self, Option<String>)> {
        let wire: WireSubject = serde_json::from_value(value)?;
        let link = non_blank(wire.curriculum_id)
            .or_else(|| wire.curriculum_ids.into_iter().find_map(|id| non_blank(Some(id))));

        let subject = Self {
            meta: wire.meta.into_meta()?,
            name: string_or_empty(wire.name),
            code: string_or_empty(wire.code),
            description: string_or_empty(wire.description),
        };
        Ok((subject, link))
    }
}

impl Entity for Subject {
    type Form = SubjectForm;

    const KIND: EntityKind = EntityKind::Subject;
    const DUPLICATE_MESSAGE: &'static str = "A subject with this name already exists";
    const DIMENSIONS: &'static [Dimension] = &[Dimension::Curriculum];

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn create(meta: RecordMeta, form: SubjectForm) -> Self {
        let mut subject = Self {
            meta,
            name: String::new(),
            code: String::new(),
            description: String::new(),
        };
        subject.apply(form);
        subject
    }

    fn apply(&mut self, form: SubjectForm) {
        self.name = trimmed(form.name);
        self.code = trimmed(form.code);
        self.description = trimmed(form.description);
    }

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(&[self.name.as_str()])
    }

    fn form_key(form: &SubjectForm) -> NaturalKey {
        NaturalKey::new(&[form.name.as_str()])
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn text_fields(&self) -> Vec<&str> {
        vec![self.name.as_str(), self.code.as_str(), self.description.as_str()]
    }

    fn related_names(&self, directory: &dyn Directory) -> Vec<(&'static str, String)> {
        directory
            .curriculum_of_subject(&self.meta.id)
            .map(|curriculum_id| {
                vec![(
                    "curriculumName",
                    directory
                        .resolve_name(EntityKind::Curriculum, curriculum_id)
                        .to_string(),
                )]
            })
            .unwrap_or_default()
    }

    fn dimension<'a>(
        &'a self,
        dimension: Dimension,
        directory: &'a dyn Directory,
    ) -> Option<&'a str> {
        match dimension {
            Dimension::Curriculum => directory.curriculum_of_subject(&self.meta.id),
            _ => None,
        }
    }

    fn from_wire(value: serde_json::Value) -> anyhow::Result<Self> {
        Self::from_wire_with_link(value).map(|(subject, _)| subject)
    }
}
