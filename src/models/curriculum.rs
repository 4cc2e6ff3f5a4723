use serde::{Deserialize, Serialize};
use validator::Validate;

use super::wire::{WireMeta, string_or_empty};
use super::{Entity, EntityKind, NaturalKey, RecordMeta, trimmed};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Curriculum {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct CurriculumForm {
    #[validate(custom(function = "crate::validation::required"))]
    pub name: String,
    #[validate(custom(function = "crate::validation::required"))]
    pub code: String,
    pub description: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCurriculum {
    #[serde(flatten)]
    meta: WireMeta,
    #[serde(default, alias = "curriculumName", alias = "title")]
    name: Option<String>,
    #[serde(default, alias = "curriculumCode")]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl Entity for Curriculum {
    type Form = CurriculumForm;

    const KIND: EntityKind = EntityKind::Curriculum;
    const DUPLICATE_MESSAGE: &'static str = "A curriculum with this code already exists";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn create(meta: RecordMeta, form: CurriculumForm) -> Self {
        let mut curriculum = Self {
            meta,
            name: String::new(),
            code: String::new(),
            description: String::new(),
        };
        curriculum.apply(form);
        curriculum
    }

    fn apply(&mut self, form: CurriculumForm) {
        self.name = trimmed(form.name);
        self.code = trimmed(form.code);
        self.description = trimmed(form.description);
    }

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(&[self.code.as_str()])
    }

    fn form_key(form: &CurriculumForm) -> NaturalKey {
        NaturalKey::new(&[form.code.as_str()])
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn text_fields(&self) -> Vec<&str> {
        vec![self.name.as_str(), self.code.as_str(), self.description.as_str()]
    }

    fn from_wire(value: serde_json::Value) -> anyhow::Result<Self> {
        let wire: WireCurriculum = serde_json::from_value(value)?;
        Ok(Self {
            meta: wire.meta.into_meta()?,
            name: string_or_empty(wire.name),
            code: string_or_empty(wire.code),
            description: string_or_empty(wire.description),
        })
    }
}
