//! Field mapping from source documents to target payloads.
//!
//! [`map_user`] is pure: no I/O, no retries, same input gives the same
//! output. Enum-valued fields are normalized towards a canonical set; an
//! unmatched value becomes the field's fallback member and the trimmed
//! original is preserved in a sibling `custom*` field.

use crate::error::MappingError;
use crate::record::{RawRecord, SourceRecord};
use serde::{Deserialize, Serialize};

/// Source fields that may carry the unique key, in priority order. `id` is
/// not one of them: exports use it for the document id.
const KEY_FIELDS: &[&str] = &["uid", "userId", "authUid"];

/// An enum with a fixed canonical member set and a fallback member.
pub trait CanonicalEnum: Sized + Copy + 'static {
    const ALL: &'static [Self];
    const FALLBACK: Self;

    fn as_str(&self) -> &'static str;

    /// Case-insensitive match after trimming.
    fn parse(raw: &str) -> Option<Self> {
        let needle = raw.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|member| member.as_str().eq_ignore_ascii_case(needle))
    }
}

/// Role of a person in the school.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Teacher,
    Student,
    Parent,
    Staff,
}

impl CanonicalEnum for Role {
    const ALL: &'static [Self] = &[
        Role::Admin,
        Role::Teacher,
        Role::Student,
        Role::Parent,
        Role::Staff,
    ];
    const FALLBACK: Self = Role::Student;

    fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Teacher => "Teacher",
            Role::Student => "Student",
            Role::Parent => "Parent",
            Role::Staff => "Staff",
        }
    }
}

/// How a student attends classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LearningMode {
    Online,
    #[serde(rename = "In-Person")]
    InPerson,
    Hybrid,
    Other,
}

impl CanonicalEnum for LearningMode {
    const ALL: &'static [Self] = &[
        LearningMode::Online,
        LearningMode::InPerson,
        LearningMode::Hybrid,
        LearningMode::Other,
    ];
    const FALLBACK: Self = LearningMode::Other;

    fn as_str(&self) -> &'static str {
        match self {
            LearningMode::Online => "Online",
            LearningMode::InPerson => "In-Person",
            LearningMode::Hybrid => "Hybrid",
            LearningMode::Other => "Other",
        }
    }
}

/// Normalize a raw enum value.
///
/// Returns `(member, custom)`. `custom` is `Some` only when the value did not
/// match and the fallback member was used. Absent or blank input maps to
/// `(None, None)`.
pub fn canonicalize<E: CanonicalEnum>(raw: Option<&str>) -> (Option<E>, Option<String>) {
    let trimmed = match raw.map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => return (None, None),
    };
    match E::parse(trimmed) {
        Some(member) => (Some(member), None),
        None => (Some(E::FALLBACK), Some(trimmed.to_string())),
    }
}

/// Normalized user ready for creation on the target.
///
/// `None` fields were never set by the mapper and are not transmitted, so
/// the target's own defaults apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPayload {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub school_id: String,
    pub is_active: bool,
    pub password_changed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_mode: Option<LearningMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_learning_mode: Option<String>,
}

/// Extract the unique key of a source document, if it has one.
pub fn unique_key(record: &SourceRecord) -> Option<String> {
    record.fields.first_non_blank(KEY_FIELDS)
}

/// Map a source document to a target payload.
pub fn map_user(record: &SourceRecord) -> Result<UserPayload, MappingError> {
    let fields = &record.fields;
    let uid = unique_key(record).ok_or_else(|| MappingError::MissingKey {
        document_id: record.id.clone(),
    })?;

    let first_name = text(fields, "firstName");
    let last_name = text(fields, "lastName");
    let display_name = fields
        .non_blank("displayName")
        .unwrap_or_else(|| format!("{} {}", first_name, last_name).trim().to_string());

    let (role, custom_role) = canonicalize::<Role>(fields.string("role").as_deref());
    let (learning_mode, custom_learning_mode) =
        canonicalize::<LearningMode>(fields.string("learningMode").as_deref());

    Ok(UserPayload {
        uid,
        email: text(fields, "email"),
        display_name,
        first_name,
        last_name,
        phone_number: text(fields, "phoneNumber"),
        school_id: text(fields, "schoolId"),
        is_active: fields.boolean("isActive").unwrap_or(true),
        password_changed: fields.boolean("passwordChanged").unwrap_or(false),
        role,
        custom_role,
        learning_mode,
        custom_learning_mode,
    })
}

fn text(fields: &RawRecord, key: &str) -> String {
    fields
        .string(key)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}
