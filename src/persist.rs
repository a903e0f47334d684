//! Persistence codec for per-mod configuration documents
//!
//! One JSON document per mod, fully rewritten on every save. Documents are
//! self-describing: a semver string, a save timestamp, an integrity checksum,
//! and the map of explicitly-set values.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::checksum::Checksum;
use crate::error::Result;

/// File extension for persisted documents
pub const DOCUMENT_EXTENSION: &str = "json";

/// On-disk form of one store's values plus its schema version tag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Version of the schema that produced this document
    pub schema_version: String,
    /// When the document was written
    pub saved_at: DateTime<Utc>,
    /// Integrity checksum over the value map; absent in older documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<Checksum>,
    /// Explicitly-set values, keyed by key name
    pub values: BTreeMap<String, serde_json::Value>,
}

impl Document {
    pub fn new(version: &Version, values: BTreeMap<String, serde_json::Value>) -> Self {
        let checksum = Some(values_checksum(&values));
        Self {
            schema_version: version.to_string(),
            saved_at: Utc::now(),
            checksum,
            values,
        }
    }

    /// Parse the tagged schema version
    pub fn version(&self) -> Result<Version> {
        Ok(Version::parse(&self.schema_version)?)
    }

    /// Verify the integrity checksum; documents without one pass
    pub fn verify(&self) -> bool {
        match &self.checksum {
            Some(checksum) => checksum.verify_json(&json_of_values(&self.values)),
            None => true,
        }
    }
}

fn json_of_values(values: &BTreeMap<String, serde_json::Value>) -> serde_json::Value {
    serde_json::Value::Object(
        values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    )
}

fn values_checksum(values: &BTreeMap<String, serde_json::Value>) -> Checksum {
    Checksum::from_json(&json_of_values(values))
}

/// Deterministic document path for a mod under the configuration root
pub fn document_path(root: &Path, mod_id: &str) -> PathBuf {
    root.join(format!("{}.{}", sanitize_mod_id(mod_id), DOCUMENT_EXTENSION))
}

// Mod ids come from mod metadata and may contain path-hostile characters.
fn sanitize_mod_id(mod_id: &str) -> String {
    mod_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Result of attempting to read a persisted document
#[derive(Debug)]
pub enum LoadOutcome {
    /// No document exists; nothing to reconcile
    Absent,
    /// A document exists but cannot be used; the reason is logged by the
    /// caller, distinct from the absent case
    Corrupt(String),
    Loaded(Document),
}

/// Read a document, distinguishing absent from corrupt
pub fn read_document(path: &Path) -> LoadOutcome {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return LoadOutcome::Absent,
        Err(e) => return LoadOutcome::Corrupt(format!("unreadable: {}", e)),
    };

    let document: Document = match serde_json::from_str(&content) {
        Ok(document) => document,
        Err(e) => return LoadOutcome::Corrupt(format!("malformed JSON: {}", e)),
    };

    if !document.verify() {
        return LoadOutcome::Corrupt("checksum mismatch".to_string());
    }

    LoadOutcome::Loaded(document)
}

/// Write a document, creating the configuration root if needed
pub fn write_document(path: &Path, document: &Document, pretty: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = if pretty {
        serde_json::to_string_pretty(document)?
    } else {
        serde_json::to_string(document)?
    };
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_document() -> Document {
        let mut values = BTreeMap::new();
        values.insert("count".to_string(), serde_json::json!(5));
        values.insert("name".to_string(), serde_json::json!("alpha"));
        Document::new(&Version::new(1, 0, 0), values)
    }

    #[test]
    fn test_document_round_trip() {
        let dir = tempdir().unwrap();
        let path = document_path(dir.path(), "example-mod");

        let document = sample_document();
        write_document(&path, &document, true).unwrap();

        match read_document(&path) {
            LoadOutcome::Loaded(loaded) => {
                assert_eq!(loaded.schema_version, "1.0.0");
                assert_eq!(loaded.values, document.values);
            }
            other => panic!("expected Loaded, got {:?}", other),
        }
    }

    #[test]
    fn test_absent_document() {
        let dir = tempdir().unwrap();
        let path = document_path(dir.path(), "missing");
        assert!(matches!(read_document(&path), LoadOutcome::Absent));
    }

    #[test]
    fn test_malformed_document_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = document_path(dir.path(), "broken");
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(read_document(&path), LoadOutcome::Corrupt(_)));
    }

    #[test]
    fn test_checksum_mismatch_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = document_path(dir.path(), "tampered");

        let mut document = sample_document();
        write_document(&path, &document, false).unwrap();

        // Tamper with a value but keep the original checksum
        document.values.insert("count".to_string(), serde_json::json!(99));
        let tampered = serde_json::to_string(&document).unwrap();
        fs::write(&path, tampered).unwrap();

        assert!(matches!(read_document(&path), LoadOutcome::Corrupt(reason) if reason.contains("checksum")));
    }

    #[test]
    fn test_document_without_checksum_tolerated() {
        let dir = tempdir().unwrap();
        let path = document_path(dir.path(), "legacy");
        let raw = serde_json::json!({
            "schema_version": "1.0.0",
            "saved_at": "2024-01-01T00:00:00Z",
            "values": { "count": 3 }
        });
        fs::write(&path, raw.to_string()).unwrap();
        assert!(matches!(read_document(&path), LoadOutcome::Loaded(_)));
    }

    #[test]
    fn test_mod_id_sanitized_in_path() {
        let path = document_path(Path::new("/cfg"), "weird/../mod id");
        assert_eq!(
            path,
            PathBuf::from("/cfg/weird_.._mod_id.json")
        );
    }
}
