// src/storage/local.rs

//! Local filesystem output sink.
//!
//! Each record becomes one pretty-printed JSON file under
//! `{root}/{lang}/{YYYYMM}/{Title} ({Author}).json`. Writes go to a temp file
//! first and are renamed into place so readers never see a partial record.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::Result;
use crate::models::DocumentRecord;
use crate::storage::RecordSink;

/// Longest file stem kept, in graphemes.
const MAX_STEM_GRAPHEMES: usize = 150;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Target path for a record.
    pub fn record_path(&self, record: &DocumentRecord) -> PathBuf {
        let stem = sanitize_file_stem(&format!("{} ({})", record.title, record.author));
        self.root_dir
            .join(record.language.code())
            .join(record.session.period())
            .join(format!("{stem}.json"))
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordSink for LocalStorage {
    async fn write_record(&self, record: &DocumentRecord) -> Result<PathBuf> {
        let path = self.record_path(record);
        let bytes = serde_json::to_vec_pretty(record)?;
        self.write_bytes(&path, &bytes).await?;
        log::debug!("Wrote {}", path.display());
        Ok(path)
    }
}

/// Strip characters that are unsafe in file names and cap the length
/// without splitting a grapheme cluster.
pub fn sanitize_file_stem(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.graphemes(true).take(MAX_STEM_GRAPHEMES).collect();
    let trimmed = truncated.trim().trim_end_matches('.').trim();

    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Language, Session};
    use chrono::Utc;
    use tempfile::TempDir;

    fn sample_record(title: &str) -> DocumentRecord {
        DocumentRecord {
            url: "https://www.churchofjesuschrist.org/study/general-conference/1985/04/faith?lang=spa"
                .to_string(),
            language: Language::Spa,
            session: Session {
                year: 1985,
                month: 4,
            },
            title: title.to_string(),
            author: "Juan Pérez".to_string(),
            calling: "Obispo Presidente".to_string(),
            body: "<p>Cuerpo</p>".to_string(),
            footnotes: vec!["[note1] Alma 32:21.".to_string()],
            footnote_count: 1,
            extracted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_write_record_layout() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let path = storage.write_record(&sample_record("La fe")).await.unwrap();
        assert_eq!(
            path,
            tmp.path().join("spa").join("198504").join("La fe (Juan Pérez).json")
        );

        let loaded: DocumentRecord =
            serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(loaded.title, "La fe");
        assert_eq!(loaded.footnote_count, 1);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_rewrite_overwrites() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let first = storage.write_record(&sample_record("Faith")).await.unwrap();
        let second = storage.write_record(&sample_record("Faith")).await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sanitize_strips_unsafe_chars() {
        assert_eq!(sanitize_file_stem("What? A/B: \"C\""), "What AB C");
        assert_eq!(sanitize_file_stem("  ...  "), "untitled");
    }

    #[test]
    fn test_sanitize_truncates_on_grapheme_boundary() {
        let long = "é".repeat(400);
        let stem = sanitize_file_stem(&long);
        assert_eq!(stem.graphemes(true).count(), MAX_STEM_GRAPHEMES);
    }
}
