use serde::{Deserialize, Serialize};
use validator::Validate;

use super::wire::{WireMeta, string_or_empty};
use super::{Entity, EntityKind, NaturalKey, RecordMeta, non_blank, trimmed};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Institution {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    pub code: String,
    pub location: String,
    pub contact_email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct InstitutionForm {
    #[validate(custom(function = "crate::validation::required"))]
    pub name: String,
    pub code: String,
    pub location: String,
    #[validate(custom(function = "crate::validation::optional_email"))]
    pub contact_email: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInstitution {
    #[serde(flatten)]
    meta: WireMeta,
    #[serde(default, alias = "schoolName", alias = "institutionName")]
    name: Option<String>,
    #[serde(default, alias = "schoolCode")]
    code: Option<String>,
    #[serde(default, alias = "address", alias = "county")]
    location: Option<String>,
    #[serde(default, alias = "email", alias = "contact_email")]
    contact_email: Option<String>,
}

impl Entity for Institution {
    type Form = InstitutionForm;

    const KIND: EntityKind = EntityKind::Institution;
    const DUPLICATE_MESSAGE: &'static str = "An institution with this name already exists";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn create(meta: RecordMeta, form: InstitutionForm) -> Self {
        let mut institution = Self {
            meta,
            name: String::new(),
            code: String::new(),
            location: String::new(),
            contact_email: None,
        };
        institution.apply(form);
        institution
    }

    fn apply(&mut self, form: InstitutionForm) {
        self.name = trimmed(form.name);
        self.code = trimmed(form.code);
        self.location = trimmed(form.location);
        self.contact_email = non_blank(form.contact_email);
    }

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(&[self.name.as_str()])
    }

    fn form_key(form: &InstitutionForm) -> NaturalKey {
        NaturalKey::new(&[form.name.as_str()])
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn text_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str(), self.code.as_str(), self.location.as_str()];
        if let Some(email) = &self.contact_email {
            fields.push(email.as_str());
        }
        fields
    }

    fn from_wire(value: serde_json::Value) -> anyhow::Result<Self> {
        let wire: WireInstitution = serde_json::from_value(value)?;
        Ok(Self {
            meta: wire.meta.into_meta()?,
            name: string_or_empty(wire.name),
            code: string_or_empty(wire.code),
            location: string_or_empty(wire.location),
            contact_email: non_blank(wire.contact_email),
        })
    }
}
