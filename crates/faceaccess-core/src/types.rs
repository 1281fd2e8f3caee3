use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Lock duration assumed when the backend does not say how long a lockout lasts.
pub const DEFAULT_LOCK_SECONDS: u64 = 60;

/// Authorization level attached to an enrolled identity.
///
/// The backend speaks Portuguese on the wire (`BASICO`, `INTERMEDIARIO`,
/// `TOTAL`); the English names are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AuthorizationLevel {
    Basic,
    Intermediate,
    Full,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown authorization level: {0}")]
pub struct UnknownLevel(pub String);

impl AuthorizationLevel {
    pub const ALL: [AuthorizationLevel; 3] = [Self::Basic, Self::Intermediate, Self::Full];

    /// Parse an exact wire value. Anything unrecognized yields `None`.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "BASICO" | "BASIC" => Some(Self::Basic),
            "INTERMEDIARIO" | "INTERMEDIATE" => Some(Self::Intermediate),
            "TOTAL" | "FULL" => Some(Self::Full),
            _ => None,
        }
    }

    /// Value sent to the backend in forms and JSON bodies.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Basic => "BASICO",
            Self::Intermediate => "INTERMEDIARIO",
            Self::Full => "TOTAL",
        }
    }
}

impl fmt::Display for AuthorizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Basic => "BASIC",
            Self::Intermediate => "INTERMEDIATE",
            Self::Full => "FULL",
        })
    }
}

/// Case-insensitive parse for user input (CLI flags, config).
impl FromStr for AuthorizationLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire(&s.trim().to_ascii_uppercase()).ok_or_else(|| UnknownLevel(s.to_string()))
    }
}

impl Serialize for AuthorizationLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for AuthorizationLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_wire(&raw).ok_or_else(|| serde::de::Error::custom(UnknownLevel(raw)))
    }
}

/// Deserialize an optional level, mapping unknown or empty values to `None`
/// instead of failing the surrounding record.
pub fn deserialize_lenient_level<'de, D>(deserializer: D) -> Result<Option<AuthorizationLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(AuthorizationLevel::from_wire))
}

/// Outcome of one recognition attempt, as reported by `POST /access/check`.
///
/// Produced once per attempt and never mutated afterwards. A lockout is an
/// ordinary value here (`locked == true`), not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessAttemptResult {
    #[serde(rename = "access_granted", default)]
    pub granted: bool,
    #[serde(rename = "user_email", default, skip_serializing_if = "Option::is_none")]
    pub subject_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Recognition confidence in percent. The backend sends either a number
    /// or a string such as `"92.3%"`.
    #[serde(
        default,
        deserialize_with = "deserialize_confidence",
        skip_serializing_if = "Option::is_none"
    )]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub message: String,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_level",
        skip_serializing_if = "Option::is_none"
    )]
    pub access_level: Option<AuthorizationLevel>,
    #[serde(default, deserialize_with = "deserialize_truthy")]
    pub locked: bool,
    #[serde(
        rename = "lock_remaining_seconds",
        default,
        deserialize_with = "deserialize_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub lock_remaining_seconds: Option<u64>,
}

/// Remaining lockout, extracted from a locked result for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lockout {
    pub remaining: Duration,
    pub message: String,
}

impl AccessAttemptResult {
    /// A denied, locked result with the given message and cooldown.
    pub fn locked_out(message: impl Into<String>, remaining_secs: u64) -> Self {
        Self {
            granted: false,
            subject_email: None,
            user_name: None,
            confidence_score: None,
            message: message.into(),
            access_level: None,
            locked: true,
            lock_remaining_seconds: Some(remaining_secs),
        }
    }

    /// Email of the recognized identity, if the attempt was granted and
    /// the backend named a non-empty subject.
    pub fn recognized_email(&self) -> Option<&str> {
        if !self.granted {
            return None;
        }
        self.subject_email.as_deref().filter(|email| !email.is_empty())
    }

    pub fn lockout(&self) -> Option<Lockout> {
        if !self.locked {
            return None;
        }
        let secs = self.lock_remaining_seconds.unwrap_or(DEFAULT_LOCK_SECONDS);
        Some(Lockout {
            remaining: Duration::from_secs(secs),
            message: self.message.clone(),
        })
    }
}

/// JavaScript-style truthiness of a JSON value; the backend's flags are not
/// always strict booleans.
pub fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0 && !v.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Non-negative number of seconds, rounded up. Negatives and non-numbers
/// yield `None`.
pub fn seconds_from_value(value: &serde_json::Value) -> Option<u64> {
    if let Some(secs) = value.as_u64() {
        return Some(secs);
    }
    value
        .as_f64()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.ceil() as u64)
}

/// Parse a confidence score from `92.3`, `"92.3"`, or `"92.3%"`.
pub fn parse_confidence(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
}

pub fn deserialize_confidence<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(parse_confidence))
}

fn deserialize_truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().is_some_and(is_truthy))
}

fn deserialize_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(seconds_from_value))
}
