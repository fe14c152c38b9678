//! Authentication artifacts shared by the browser and API channels.
//!
//! The web client keeps the signed-in user in local storage under
//! [`STORAGE_KEY`] as a JSON [`StoredUser`]. The API issues the same JWT in
//! its login response. Tokens are compared by subject ([`TokenClaims`]) and
//! are never verified here; signature checks belong to the backend.

use crate::result::{ProbeError, ProbeResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Local-storage key holding the signed-in user
pub const STORAGE_KEY: &str = "user";

/// The `user` record the web client keeps in local storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredUser {
    /// JWT sent as `Authorization: Token <jwt>`
    pub token: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Login email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Profile bio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Avatar URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl StoredUser {
    /// A record carrying only a token, as written by token-state fixtures
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            username: None,
            email: None,
            bio: None,
            image: None,
        }
    }

    /// Serialize to the local-storage value
    pub fn to_storage_value(&self) -> ProbeResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a local-storage value
    pub fn from_storage_value(value: &str) -> ProbeResult<Self> {
        Ok(serde_json::from_str(value)?)
    }
}

/// Unverified JWT payload claims
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct TokenClaims {
    /// Subject (user id)
    #[serde(default, deserialize_with = "string_or_number")]
    pub sub: Option<String>,
    /// Expiry, seconds since the epoch
    #[serde(default)]
    pub exp: Option<i64>,
    /// Issued-at, seconds since the epoch
    #[serde(default)]
    pub iat: Option<i64>,
}

impl TokenClaims {
    /// Decode the payload segment of a compact JWT without verifying it
    pub fn decode(token: &str) -> ProbeResult<Self> {
        let mut parts = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ProbeError::InvalidToken {
                message: "expected three dot-separated segments".to_string(),
            });
        };
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| ProbeError::InvalidToken {
                message: format!("payload is not base64url: {e}"),
            })?;
        serde_json::from_slice(&bytes).map_err(|e| ProbeError::InvalidToken {
            message: format!("payload is not a JSON object: {e}"),
        })
    }

    /// Expiry as a timestamp
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|s| Utc.timestamp_opt(s, 0).single())
    }

    /// Whether the token is expired at `now`; tokens without `exp` never are
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }
}

/// Subject of a token, or `None` if it cannot be decoded
#[must_use]
pub fn subject_of(token: &str) -> Option<String> {
    TokenClaims::decode(token).ok().and_then(|c| c.sub)
}

/// Whether two tokens identify the same subject.
///
/// Identical strings always match; otherwise both must decode to the same
/// non-empty `sub`.
#[must_use]
pub fn same_subject(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (subject_of(a), subject_of(b)) {
        (Some(x), Some(y)) => !x.is_empty() && x == y,
        _ => false,
    }
}

/// Canned bad tokens for negative authentication tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenFixture {
    /// Three segments, none of them meaningful
    Invalid,
    /// Well-formed header and payload with a forged signature
    Tampered,
    /// Well-formed token whose `exp` is in the past
    Expired,
    /// Not a JWT at all
    Malformed,
    /// Empty string
    Empty,
}

impl TokenFixture {
    /// All fixtures, in declaration order
    pub const ALL: [Self; 5] = [
        Self::Invalid,
        Self::Tampered,
        Self::Expired,
        Self::Malformed,
        Self::Empty,
    ];

    /// The token string
    #[must_use]
    pub fn token(self) -> String {
        match self {
            Self::Invalid => "invalid.jwt.token".to_string(),
            Self::Tampered => format!(
                "{}.{}.tampered_signature",
                encode_segment(r#"{"alg":"HS256","typ":"JWT"}"#),
                encode_segment(r#"{"sub":"1234567890","name":"John Doe","iat":1516239022}"#)
            ),
            Self::Expired => format!(
                "{}.{}.invalid",
                encode_segment(r#"{"alg":"HS512"}"#),
                encode_segment(r#"{"sub":"1234567890","exp":1516239022}"#)
            ),
            Self::Malformed => "not-a-jwt%%".to_string(),
            Self::Empty => String::new(),
        }
    }

    /// Short label for logs and report entries
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Tampered => "tampered",
            Self::Expired => "expired",
            Self::Malformed => "malformed",
            Self::Empty => "empty",
        }
    }
}

fn encode_segment(json: &str) -> String {
    URL_SAFE_NO_PAD.encode(json.as_bytes())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
