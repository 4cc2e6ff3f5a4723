use anyhow::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use validator::Validate;

use super::wire::{WireMeta, flexible_id, parse_timestamp, string_or_empty};
use super::{
    Dimension, Directory, Entity, EntityKind, NaturalKey, RecordMeta, non_blank, trimmed,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    InstitutionAdmin,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::InstitutionAdmin => "institution_admin",
            Role::Teacher => "teacher",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "Super Admin",
            Role::InstitutionAdmin => "Institution Admin",
            Role::Teacher => "Teacher",
        }
    }

    /// Accepts `super_admin`, `Super Admin`, `super-admin` and similar spellings.
    pub fn from_str(s: &str) -> Result<Self, Error> {
        let folded: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();

        match folded.as_str() {
            "superadmin" => Ok(Role::SuperAdmin),
            "institutionadmin" | "schooladmin" => Ok(Role::InstitutionAdmin),
            "teacher" => Ok(Role::Teacher),
            _ => Err(Error::msg(format!("Unknown role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Role::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub school_id: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct UserForm {
    #[validate(custom(function = "crate::validation::required"))]
    pub name: String,
    #[validate(custom(function = "crate::validation::required_email"))]
    pub email: String,
    #[validate(custom(function = "crate::validation::optional_phone"))]
    pub phone: Option<String>,
    #[validate(required(message = "is required"))]
    pub role: Option<Role>,
    pub school_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUser {
    #[serde(flatten)]
    meta: WireMeta,
    #[serde(default, alias = "fullName", alias = "full_name")]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, alias = "phoneNumber")]
    phone: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(
        default,
        deserialize_with = "flexible_id",
        alias = "school",
        alias = "school_id",
        alias = "institutionId"
    )]
    school_id: Option<String>,
    #[serde(default, alias = "last_login")]
    last_login: Option<String>,
}

impl Entity for User {
    type Form = UserForm;

    const KIND: EntityKind = EntityKind::User;
    const DUPLICATE_MESSAGE: &'static str = "A user with this email already exists";
    const DIMENSIONS: &'static [Dimension] = &[Dimension::School];

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn create(meta: RecordMeta, form: UserForm) -> Self {
        let mut user = Self {
            meta,
            name: String::new(),
            email: String::new(),
            phone: None,
            role: Role::Teacher,
            school_id: None,
            last_login: None,
        };
        user.apply(form);
        user
    }

    fn apply(&mut self, form: UserForm) {
        self.name = trimmed(form.name);
        self.email = trimmed(form.email);
        self.phone = non_blank(form.phone);
        if let Some(role) = form.role {
            self.role = role;
        }
        self.school_id = non_blank(form.school_id);
    }

    fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(&[self.email.as_str()])
    }

    fn form_key(form: &UserForm) -> NaturalKey {
        NaturalKey::new(&[form.email.as_str()])
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn text_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str(), self.email.as_str(), self.role.label()];
        if let Some(phone) = &self.phone {
            fields.push(phone.as_str());
        }
        fields
    }

    fn related_names(&self, directory: &dyn Directory) -> Vec<(&'static str, String)> {
        match &self.school_id {
            Some(school_id) => vec![(
                "schoolName",
                directory
                    .resolve_name(EntityKind::Institution, school_id)
                    .to_string(),
            )],
            None => Vec::new(),
        }
    }

    fn dimension<'a>(
        &'a self,
        dimension: Dimension,
        _directory: &'a dyn Directory,
    ) -> Option<&'a str> {
        match dimension {
            Dimension::School => self.school_id.as_deref(),
            _ => None,
        }
    }

    fn from_wire(value: serde_json::Value) -> anyhow::Result<Self> {
        let wire: WireUser = serde_json::from_value(value)?;
        let role = match non_blank(wire.role) {
            Some(raw) => Role::from_str(&raw)?,
            None => Role::Teacher,
        };
        let last_login = match non_blank(wire.last_login) {
            Some(raw) => Some(parse_timestamp(&raw)?),
            None => None,
        };

        Ok(Self {
            meta: wire.meta.into_meta()?,
            name: string_or_empty(wire.name),
            email: string_or_empty(wire.email),
            phone: non_blank(wire.phone),
            role,
            school_id: non_blank(wire.school_id),
            last_login,
        })
    }
}
