use crate::error::{Error, Result};
use crate::types::ResearchRecord;
use jwalk::WalkDir;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const RESULT_SUFFIX: &str = ".research.json";

/// Research results on disk at `<root>/data/<jurisdiction>/<category>/<stem>.research.json`
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
    category: String,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>, category: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            category: category.into(),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn result_path(&self, jurisdiction: &str, file_stem: &str) -> PathBuf {
        self.data_dir()
            .join(jurisdiction)
            .join(&self.category)
            .join(format!("{}{}", file_stem, RESULT_SUFFIX))
    }

    /// Write a record, replacing any previous result for the same subject
    pub fn save(&self, record: &ResearchRecord, jurisdiction: &str, file_stem: &str) -> Result<PathBuf> {
        let path = self.result_path(jurisdiction, file_stem);
        write_pretty_json(&path, record)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<ResearchRecord> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Every stored result file in this store's category, sorted by path so
    /// consolidation is deterministic
    pub fn list_results(&self) -> Vec<PathBuf> {
        let data_dir = self.data_dir();
        if !data_dir.exists() {
            return Vec::new();
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&data_dir) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry in research store");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if self.is_result_file(&path, &data_dir) {
                files.push(path);
            }
        }

        files.sort();
        files
    }

    /// `<jurisdiction>/<category>/<stem>.research.json` relative to the data root
    fn is_result_file(&self, path: &Path, data_dir: &Path) -> bool {
        let Some(relative) = pathdiff::diff_paths(path, data_dir) else {
            return false;
        };
        let parts: Vec<_> = relative.components().map(|c| c.as_os_str()).collect();
        match parts.as_slice() {
            [_jurisdiction, category, file] => {
                *category == self.category.as_str()
                    && file.to_str().is_some_and(|name| name.ends_with(RESULT_SUFFIX))
            }
            _ => false,
        }
    }
}

/// Indented UTF-8 JSON, creating parent directories as needed
pub fn write_pretty_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let persist = |source| Error::Persist {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(persist)?;
    }
    fs::write(path, json).map_err(persist)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_follow_the_path_convention() {
        let store = ResultStore::new("/srv/research", "legislature");
        assert_eq!(
            store.result_path("il", "Jane-Doe-1234"),
            PathBuf::from("/srv/research/data/il/legislature/Jane-Doe-1234.research.json")
        );
    }

    #[test]
    fn saved_records_are_indented_and_listed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path(), "legislature");
        let record = ResearchRecord {
            subject_id: "ocd-person/1".to_string(),
            display_name: "José Núñez".to_string(),
            jurisdiction: Some("nm".to_string()),
            ..ResearchRecord::default()
        };

        let path = store.save(&record, "nm", "Jose-Nunez").unwrap();
        fs::write(path.with_file_name("notes.json"), "{}").unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"legislator_id\": \"ocd-person/1\""));
        assert!(text.contains("José Núñez"));

        assert_eq!(store.list_results(), vec![path.clone()]);
        assert_eq!(ResultStore::load(&path).unwrap(), record);
    }

    #[test]
    fn listing_is_limited_to_the_store_category() {
        let dir = tempfile::tempdir().unwrap();
        let legislature = ResultStore::new(dir.path(), "legislature");
        let executive = ResultStore::new(dir.path(), "executive");

        let kept = legislature
            .save(&ResearchRecord::default(), "wa", "Alice-Ng")
            .unwrap();
        executive
            .save(&ResearchRecord::default(), "wa", "Governor")
            .unwrap();
        write_pretty_json(&dir.path().join("data/wa/stray.research.json"), "{}").unwrap();

        assert_eq!(legislature.list_results(), vec![kept]);
        assert_eq!(executive.list_results().len(), 1);
    }

    #[test]
    fn unwritable_destination_is_a_persist_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("data");
        fs::write(&blocker, "not a directory").unwrap();

        let store = ResultStore::new(dir.path(), "legislature");
        let err = store
            .save(&ResearchRecord::default(), "il", "x")
            .unwrap_err();
        assert!(matches!(err, Error::Persist { .. }));
    }
}
