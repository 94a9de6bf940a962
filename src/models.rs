//! Core data models.
//!
//! A PDF is addressed everywhere by its [`DocumentId`], the SHA-256 of its
//! bytes computed once at upload. Robustification outcomes are kept as
//! [`RobustEntry`] values collected into a [`RobustMapping`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Content hash identifying an uploaded PDF (lowercase hex SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

/// A string that is not a 64-digit hex content hash.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid document id {0:?}: expected 64 hex digits")]
pub struct InvalidDocumentId(pub String);

impl DocumentId {
    /// Hash raw PDF bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DocumentId {
    type Err = InvalidDocumentId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(InvalidDocumentId(s.to_string()))
        }
    }
}

impl TryFrom<String> for DocumentId {
    type Error = InvalidDocumentId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata recorded for an uploaded PDF.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredDocument {
    pub id: DocumentId,
    /// File name supplied by the uploader, if any.
    pub original_name: Option<String>,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Why a single robustification call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobustFailure {
    /// Connection error, timeout, or truncated body.
    Transport,
    /// Body was not JSON.
    NonJson { status: u16 },
    /// JSON that matches neither the success nor the friendly-error shape.
    Unrecognized { status: u16 },
    /// The service explained the failure itself.
    Friendly { message: String, status: u16 },
}

impl RobustFailure {
    /// Human-readable error recorded for `uri`.
    pub fn describe(&self, uri: &str) -> String {
        match self {
            RobustFailure::Transport => format!("transport failure for {}", uri),
            RobustFailure::NonJson { status } => {
                format!("non-JSON response (HTTP {}) for {}", status, uri)
            }
            RobustFailure::Unrecognized { status } => {
                format!("unrecognized response (HTTP {}) for {}", status, uri)
            }
            RobustFailure::Friendly { message, status } => {
                format!("{} (HTTP {})", message, status)
            }
        }
    }
}

/// Outcome of robustifying one URI; one stream line and one mapping value.
///
/// Serialized as `{"ok":true,"uri":..,"originalHref":..,"archivedHref":..}`
/// or `{"ok":false,"uri":..,"error":..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobustEntry {
    pub ok: bool,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RobustEntry {
    pub fn archived(
        uri: impl Into<String>,
        original_href: impl Into<String>,
        archived_href: impl Into<String>,
    ) -> Self {
        Self {
            ok: true,
            uri: uri.into(),
            original_href: Some(original_href.into()),
            archived_href: Some(archived_href.into()),
            error: None,
        }
    }

    pub fn failed(uri: impl Into<String>, failure: &RobustFailure) -> Self {
        let uri = uri.into();
        let error = failure.describe(&uri);
        Self {
            ok: false,
            uri,
            original_href: None,
            archived_href: None,
            error: Some(error),
        }
    }

    /// One NDJSON line, newline included.
    pub fn to_line(&self) -> String {
        // Serializing a struct of strings and a bool cannot fail.
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }
}

/// Persisted URI → outcome map for one document.
pub type RobustMapping = BTreeMap<String, RobustEntry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_is_content_hash() {
        let a = DocumentId::from_bytes(b"%PDF-1.4 one");
        let b = DocumentId::from_bytes(b"%PDF-1.4 one");
        let c = DocumentId::from_bytes(b"%PDF-1.4 two");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_document_id_parse() {
        let id = DocumentId::from_bytes(b"x");
        let parsed: DocumentId = id.as_str().to_uppercase().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("../../etc/passwd".parse::<DocumentId>().is_err());
        assert!("abc".parse::<DocumentId>().is_err());
    }

    #[test]
    fn test_entry_success_shape() {
        let entry = RobustEntry::archived(
            "https://example.com",
            "<a href=\"https://example.com\">x</a>",
            "<a href=\"https://web.archive.org/x\">x</a>",
        );
        let json: serde_json::Value = serde_json::from_str(entry.to_line().trim()).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["uri"], "https://example.com");
        assert!(json["originalHref"].is_string());
        assert!(json["archivedHref"].is_string());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_entry_failure_messages() {
        let uri = "https://example.com/x";
        assert_eq!(
            RobustEntry::failed(uri, &RobustFailure::Transport).error.unwrap(),
            "transport failure for https://example.com/x"
        );
        assert_eq!(
            RobustEntry::failed(uri, &RobustFailure::NonJson { status: 502 })
                .error
                .unwrap(),
            "non-JSON response (HTTP 502) for https://example.com/x"
        );
        assert_eq!(
            RobustEntry::failed(uri, &RobustFailure::Unrecognized { status: 200 })
                .error
                .unwrap(),
            "unrecognized response (HTTP 200) for https://example.com/x"
        );
        let friendly = RobustEntry::failed(
            uri,
            &RobustFailure::Friendly {
                message: "URI is not archivable".to_string(),
                status: 400,
            },
        );
        assert!(!friendly.ok);
        assert_eq!(friendly.error.unwrap(), "URI is not archivable (HTTP 400)");
    }

    #[test]
    fn test_line_is_newline_terminated() {
        let line = RobustEntry::failed("https://a.com", &RobustFailure::Transport).to_line();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }
}
