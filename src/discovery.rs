use crate::config::Config;
use crate::error::{Error, Result};
use crate::record::PersonRecord;
use crate::staleness::StalenessFilter;
use crate::store::ResultStore;
use crate::types::Subject;
use chrono::{DateTime, Utc};
use jwalk::WalkDir;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A person file found under `data/<jurisdiction>/<category>/`
#[derive(Debug, Clone, PartialEq)]
pub struct PersonFile {
    pub path: PathBuf,
    pub jurisdiction: String,
    pub file_stem: String,
}

/// Finds subjects whose research is missing or stale
pub struct Discovery {
    config: Config,
    staleness: StalenessFilter,
}

impl Discovery {
    pub fn new(config: Config) -> Self {
        let store = ResultStore::new(&config.output_dir, &config.category);
        let staleness = StalenessFilter::new(store, config.retention, config.force_refresh);
        Self { config, staleness }
    }

    /// Subjects needing research, shuffled and capped at `max_subjects`
    pub fn discover(&self) -> Result<Vec<Subject>> {
        let mut subjects = self.candidates(Utc::now())?;
        let found = subjects.len();

        subjects.shuffle(&mut rand::rng());
        subjects.truncate(self.config.max_subjects);

        info!(found, selected = subjects.len(), "discovery complete");
        Ok(subjects)
    }

    /// Every subject that has a current role and needs research, in path order
    pub fn candidates(&self, now: DateTime<Utc>) -> Result<Vec<Subject>> {
        let files = self.find_person_files()?;
        info!(files = files.len(), "found person records");

        let mut subjects = Vec::new();
        for file in files {
            let person = match PersonRecord::load(&file.path) {
                Ok(person) => person,
                Err(e) => {
                    warn!(path = %file.path.display(), error = %e, "skipping unreadable person record");
                    continue;
                }
            };

            let subject = match person.to_subject(&file.jurisdiction, &file.file_stem, &file.path, now) {
                Some(subject) => subject,
                None => {
                    debug!(path = %file.path.display(), "no current legislative role");
                    continue;
                }
            };

            if self
                .staleness
                .needs_research(&subject.jurisdiction, &subject.file_stem)
            {
                subjects.push(subject);
            } else {
                debug!(subject = %subject.name, "research is current");
            }
        }

        Ok(subjects)
    }

    /// Person files under the data root, restricted to the configured
    /// jurisdiction when one is set
    pub fn find_person_files(&self) -> Result<Vec<PersonFile>> {
        let data_dir = self.config.people_dir.join("data");
        if !data_dir.is_dir() {
            return Err(Error::Path(format!(
                "Person data directory does not exist: {}",
                data_dir.display()
            )));
        }

        let search_dir = match &self.config.locale {
            Some(locale) => data_dir.join(locale),
            None => data_dir.clone(),
        };
        if !search_dir.exists() {
            warn!(path = %search_dir.display(), "jurisdiction directory does not exist");
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&search_dir) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry under person data");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if let Some(file) = self.person_file(&path, &data_dir) {
                files.push(file);
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    /// Accept only `<jurisdiction>/<category>/<stem>.yml` relative to the data root
    fn person_file(&self, path: &Path, data_dir: &Path) -> Option<PersonFile> {
        if path.extension().and_then(|e| e.to_str()) != Some("yml") {
            return None;
        }

        let relative = pathdiff::diff_paths(path, data_dir)?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?;

        match parts.as_slice() {
            [jurisdiction, category, _file] if *category == self.config.category => Some(PersonFile {
                path: path.to_path_buf(),
                jurisdiction: jurisdiction.to_string(),
                file_stem: path.file_stem()?.to_str()?.to_string(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use std::fs;

    const SITTING: &str = "id: ocd-person/1\nname: Sitting Member\nroles:\n  - type: lower\n    district: '4'\n";
    const RETIRED: &str = "id: ocd-person/2\nname: Retired Member\nroles:\n  - type: upper\n    end_date: '2001-01-01'\n";

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn people_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "people/data/il/legislature/Sitting-Member.yml", SITTING);
        write(dir.path(), "people/data/il/legislature/Retired-Member.yml", RETIRED);
        write(dir.path(), "people/data/il/legislature/Broken.yml", "roles: [unclosed");
        write(dir.path(), "people/data/il/executive/Governor.yml", SITTING);
        write(dir.path(), "people/data/ca/legislature/Other-Member.yml", SITTING);
        write(dir.path(), "people/data/ca/legislature/README.md", "notes");
        dir
    }

    fn discovery(dir: &Path, locale: &str, max: usize) -> Discovery {
        let config = ConfigBuilder::new(dir.join("people"))
            .output_dir(dir.join("research"))
            .locale(locale)
            .max_subjects(max)
            .build()
            .unwrap();
        Discovery::new(config)
    }

    #[test]
    fn only_category_yaml_files_are_considered() {
        let dir = people_tree();
        let files = discovery(dir.path(), "", 100).find_person_files().unwrap();
        let stems: Vec<&str> = files.iter().map(|f| f.file_stem.as_str()).collect();
        assert_eq!(stems, vec!["Other-Member", "Broken", "Retired-Member", "Sitting-Member"]);
        assert_eq!(files[0].jurisdiction, "ca");
    }

    #[test]
    fn retired_broken_and_fresh_records_are_skipped() {
        let dir = people_tree();
        write(
            dir.path(),
            "research/data/ca/legislature/Other-Member.research.json",
            "{}",
        );

        let subjects = discovery(dir.path(), "", 100).candidates(Utc::now()).unwrap();
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].name, "Sitting Member");
        assert_eq!(subjects[0].jurisdiction, "il");
    }

    #[test]
    fn locale_filter_and_limit_apply() {
        let dir = people_tree();
        assert_eq!(discovery(dir.path(), "ca", 100).discover().unwrap().len(), 1);
        assert_eq!(discovery(dir.path(), "", 1).discover().unwrap().len(), 1);
        assert!(discovery(dir.path(), "zz", 100).discover().unwrap().is_empty());
    }

    #[test]
    fn all_retired_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "people/data/il/legislature/Retired-Member.yml", RETIRED);
        assert!(discovery(dir.path(), "", 100).discover().unwrap().is_empty());
    }

    #[test]
    fn missing_data_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("people")).unwrap();
        assert!(discovery(dir.path(), "", 100).discover().is_err());
    }
}
