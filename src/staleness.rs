use crate::store::ResultStore;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Decides whether a subject's stored result is missing or old enough to redo
#[derive(Debug, Clone)]
pub struct StalenessFilter {
    store: ResultStore,
    retention: Duration,
    force_refresh: bool,
}

impl StalenessFilter {
    pub fn new(store: ResultStore, retention: Duration, force_refresh: bool) -> Self {
        Self {
            store,
            retention,
            force_refresh,
        }
    }

    /// True when no result exists for `(jurisdiction, file_stem)`, when a
    /// refresh is forced, or when the result is older than the retention window
    pub fn needs_research(&self, jurisdiction: &str, file_stem: &str) -> bool {
        self.needs_research_at(jurisdiction, file_stem, SystemTime::now())
    }

    pub fn needs_research_at(&self, jurisdiction: &str, file_stem: &str, now: SystemTime) -> bool {
        let path = self.store.result_path(jurisdiction, file_stem);
        if !path.exists() || self.force_refresh {
            return true;
        }
        self.is_expired(&path, now)
    }

    /// Unreadable modification times count as expired
    fn is_expired(&self, path: &Path, now: SystemTime) -> bool {
        let modified = match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => return true,
        };

        match now.duration_since(modified) {
            Ok(age) => age > self.retention,
            // Modified in the future
            Err(_) => false,
        }
    }
}
