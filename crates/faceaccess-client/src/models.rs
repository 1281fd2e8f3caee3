//! Records exchanged with the backend outside the access check itself.

use chrono::{DateTime, NaiveDateTime};
use faceaccess_core::types::{deserialize_confidence, deserialize_lenient_level};
use faceaccess_core::AuthorizationLevel;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default, deserialize_with = "deserialize_lenient_level")]
    pub access_level: Option<AuthorizationLevel>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: NaiveDateTime,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Response of `GET /users/email/{email}`. Only the level is relied on.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserAccess {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_level")]
    pub access_level: Option<AuthorizationLevel>,
}

/// Fields for `POST /users/register`; the face image travels alongside.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub access_level: AuthorizationLevel,
}

/// Partial update for `PUT /users/{id}`. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_level: Option<AuthorizationLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.access_level.is_none() && self.is_active.is_none()
    }
}

/// Classification of a document; the backend uses Portuguese names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentLevel {
    Public,
    Restricted,
    Confidential,
}

impl DocumentLevel {
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "LIVRE" | "PUBLIC" => Some(Self::Public),
            "RESTRITO" | "RESTRICTED" => Some(Self::Restricted),
            "CONFIDENCIAL" | "CONFIDENTIAL" => Some(Self::Confidential),
            _ => None,
        }
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Public => "LIVRE",
            Self::Restricted => "RESTRITO",
            Self::Confidential => "CONFIDENCIAL",
        }
    }
}

impl fmt::Display for DocumentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Public => "PUBLIC",
            Self::Restricted => "RESTRICTED",
            Self::Confidential => "CONFIDENTIAL",
        })
    }
}

impl FromStr for DocumentLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire(&s.trim().to_ascii_uppercase())
            .ok_or_else(|| format!("unknown document level: {s}"))
    }
}

impl Serialize for DocumentLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for DocumentLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_wire(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown document level: {raw}")))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub filename: String,
    #[serde(default)]
    pub description: Option<String>,
    pub document_level: DocumentLevel,
    #[serde(default)]
    pub file_path: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub uploaded_at: NaiveDateTime,
    pub uploaded_by: i64,
}

/// Documents visible to one user, as filtered by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DocumentAccess {
    pub documents: Vec<Document>,
    #[serde(default, deserialize_with = "deserialize_lenient_level")]
    pub user_access_level: Option<AuthorizationLevel>,
    #[serde(default)]
    pub total_available: u64,
}

/// Metadata for `POST /documents/upload`; the file travels alongside.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentUpload {
    pub title: String,
    pub description: String,
    pub document_level: DocumentLevel,
    pub uploader_email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LevelInfo {
    pub value: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LevelCatalog {
    pub document_levels: Vec<LevelInfo>,
    pub access_levels: Vec<LevelInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    FacialRecognition,
    DocumentAccess,
    DocumentDownload,
    Lockout,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccessLog {
    pub id: i64,
    #[serde(default)]
    pub user_name: Option<String>,
    pub access_granted: bool,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: NaiveDateTime,
    #[serde(default, deserialize_with = "deserialize_confidence")]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub access_type: Option<AccessType>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Stats {
    pub total_authorized_users: u64,
    pub total_access_attempts: u64,
    pub granted_attempts: u64,
    pub denied_attempts: u64,
    pub success_rate: f64,
    #[serde(default)]
    pub current_lockouts: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Accept both naive ISO timestamps (`2024-05-01T10:00:00.123456`) and
/// RFC 3339 ones with an offset, normalized to UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_timestamps() {
        let naive = parse_timestamp("2024-05-01T10:00:00.123456").unwrap();
        assert_eq!(naive.to_string(), "2024-05-01 10:00:00.123456");
        let offset = parse_timestamp("2024-05-01T12:00:00+02:00").unwrap();
        assert_eq!(offset.to_string(), "2024-05-01 10:00:00");
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_user_with_unknown_level_still_decodes() {
        let user: User = serde_json::from_value(json!({
            "id": 7,
            "name": "Ana",
            "email": "ana@example.org",
            "access_level": "SUPERVISOR",
            "created_at": "2024-05-01T10:00:00"
        }))
        .unwrap();
        assert_eq!(user.access_level, None);
        assert!(user.is_active);
    }

    #[test]
    fn test_document_levels() {
        assert_eq!("restrito".parse::<DocumentLevel>(), Ok(DocumentLevel::Restricted));
        assert_eq!("confidential".parse::<DocumentLevel>(), Ok(DocumentLevel::Confidential));
        assert_eq!(serde_json::to_value(DocumentLevel::Public).unwrap(), json!("LIVRE"));
        assert!("secret".parse::<DocumentLevel>().is_err());
    }

    #[test]
    fn test_access_log_with_string_confidence_and_unknown_type() {
        let log: AccessLog = serde_json::from_value(json!({
            "id": 1,
            "user_name": null,
            "access_granted": false,
            "timestamp": "2024-05-01T10:00:00",
            "confidence_score": "87.5%",
            "access_type": "badge_swipe"
        }))
        .unwrap();
        assert_eq!(log.confidence_score, Some(87.5));
        assert_eq!(log.access_type, Some(AccessType::Other));
    }

    #[test]
    fn test_user_update_serializes_only_set_fields() {
        let update = UserUpdate {
            access_level: Some(AuthorizationLevel::Intermediate),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"access_level": "INTERMEDIARIO"})
        );
        assert!(UserUpdate::default().is_empty());
    }
}
