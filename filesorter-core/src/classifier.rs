//! Extension to category mapping.
//!
//! Categories come from a flat JSON table (`{"pdf": "DOCUMENTS", ...}`).
//! Lookup is fail-open: an unknown extension, or a table that couldn't be
//! read, falls back to the extension itself in upper case.

use crate::error::{Result, SorterError};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Category for files that have no extension at all.
pub const UNKNOWN_CATEGORY: &str = "UNKNOWN";

/// Maps file extensions to destination categories.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    /// Lower-case extension (no dot) -> upper-case category.
    table: HashMap<String, String>,
}

impl Classifier {
    /// Builds a classifier from an in-memory table.
    ///
    /// Keys are normalized to lower case without a leading dot and
    /// categories to upper case.
    pub fn from_table<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let table = entries
            .into_iter()
            .map(|(k, v)| {
                (
                    k.as_ref().trim().trim_start_matches('.').to_lowercase(),
                    v.as_ref().trim().to_uppercase(),
                )
            })
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .collect();
        Self { table }
    }

    /// Reads the table from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path).map_err(|e| SorterError::io(path, e))?;
        let table: HashMap<String, String> =
            serde_json::from_str(&source).map_err(|e| SorterError::ConfigParse {
                path: path.to_path_buf(),
                source: e,
            })?;
        debug!("Loaded {} category mappings from {}", table.len(), path.display());
        Ok(Self::from_table(table))
    }

    /// Like `load`, but an unreadable table gives an empty classifier.
    ///
    /// Every file then lands in its upper-cased extension's category.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(classifier) => classifier,
            Err(e) => {
                warn!("Category table unavailable, using extensions as categories: {}", e);
                Self::default()
            }
        }
    }

    /// Returns the category for an extension. Never fails.
    pub fn classify(&self, extension: Option<&str>) -> String {
        let ext = match extension.map(|e| e.trim_start_matches('.')) {
            Some(e) if !e.is_empty() => e,
            _ => return UNKNOWN_CATEGORY.to_string(),
        };

        match self.table.get(&ext.to_lowercase()) {
            Some(category) => category.clone(),
            None => ext.to_uppercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_known_extension() {
        let c = Classifier::from_table([("pdf", "DOCUMENTS"), ("jpg", "images")]);
        assert_eq!(c.classify(Some("pdf")), "DOCUMENTS");
        assert_eq!(c.classify(Some("PDF")), "DOCUMENTS");
        assert_eq!(c.classify(Some("jpg")), "IMAGES");
        // Same answer every time.
        assert_eq!(c.classify(Some("pdf")), c.classify(Some("pdf")));
    }

    #[test]
    fn test_unknown_extension_falls_back_to_upper() {
        let c = Classifier::from_table([("pdf", "DOCUMENTS")]);
        assert_eq!(c.classify(Some("xyz")), "XYZ");
        assert_eq!(c.classify(Some("Heic")), "HEIC");
    }

    #[test]
    fn test_missing_extension() {
        let c = Classifier::default();
        assert_eq!(c.classify(None), UNKNOWN_CATEGORY);
        assert_eq!(c.classify(Some("")), UNKNOWN_CATEGORY);
    }

    #[test]
    fn test_load_from_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data_types.json");
        fs::write(&path, r#"{ "pdf": "DOCUMENTS", ".MP3": "Audio" }"#).unwrap();

        let c = Classifier::load(&path).unwrap();
        assert_eq!(c.classify(Some("pdf")), "DOCUMENTS");
        assert_eq!(c.classify(Some("mp3")), "AUDIO");
    }

    #[test]
    fn test_unreadable_table_is_fail_open() {
        let dir = tempdir().unwrap();
        let missing = Classifier::load_or_empty(&dir.path().join("missing.json"));
        assert_eq!(missing.classify(Some("pdf")), "PDF");

        let broken_path = dir.path().join("broken.json");
        fs::write(&broken_path, "not json").unwrap();
        let broken = Classifier::load_or_empty(&broken_path);
        assert_eq!(broken.classify(Some("png")), "PNG");
    }
}
