use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_CATEGORY: &str = "legislature";
pub const DEFAULT_MAX_SUBJECTS: usize = 100;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_MAX_TOKENS: u32 = 3000;
pub const DEFAULT_RETENTION_DAYS: u64 = 365;

/// Configuration for a research run.
///
/// Built once at process start and handed to discovery, research and
/// consolidation. Nothing below the binary reads the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the person-record checkout (`data/<jurisdiction>/<category>/*.yml`)
    pub people_dir: PathBuf,
    /// Root of the research store (`data/<jurisdiction>/<category>/*.research.json`)
    pub output_dir: PathBuf,
    pub category: String,
    /// Restrict discovery to one jurisdiction; `None` means all
    pub locale: Option<String>,
    pub max_subjects: usize,
    pub force_refresh: bool,
    /// Results older than this are researched again
    pub retention: Duration,
    /// Additional attempts after the first when no JSON could be extracted
    pub max_retries: u32,
    pub model: String,
    pub max_tokens: u32,
    pub web_search: bool,
    pub run_id: String,
    pub api_key: Option<String>,
}

impl Config {
    /// Create a new default configuration
    pub fn new(people_dir: impl Into<PathBuf>) -> Self {
        Self {
            people_dir: people_dir.into(),
            output_dir: PathBuf::from("."),
            category: DEFAULT_CATEGORY.to_string(),
            locale: None,
            max_subjects: DEFAULT_MAX_SUBJECTS,
            force_refresh: false,
            retention: Duration::from_secs(DEFAULT_RETENTION_DAYS * 24 * 60 * 60),
            max_retries: DEFAULT_MAX_RETRIES,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            web_search: false,
            run_id: "unknown".to_string(),
            api_key: None,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.people_dir.exists() {
            return Err(Error::Config(format!(
                "People directory does not exist: {}",
                self.people_dir.display()
            )));
        }

        if !self.people_dir.is_dir() {
            return Err(Error::Config(format!(
                "People directory is not a directory: {}",
                self.people_dir.display()
            )));
        }

        if self.category.trim().is_empty() {
            return Err(Error::Config("Category must not be empty".to_string()));
        }

        Ok(())
    }

    /// The API credential, or a configuration error naming the variable to set
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("ANTHROPIC_API_KEY is not set".to_string()))
    }

    /// Total number of service calls allowed per subject
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Builder for creating configurations
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default settings
    pub fn new(people_dir: impl Into<PathBuf>) -> Self {
        Self {
            config: Config::new(people_dir),
        }
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.config.category = category.into();
        self
    }

    /// Set the jurisdiction filter; blank strings clear it
    pub fn locale(mut self, locale: impl AsRef<str>) -> Self {
        let trimmed = locale.as_ref().trim().to_lowercase();
        self.config.locale = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        };
        self
    }

    pub fn max_subjects(mut self, max: usize) -> Self {
        self.config.max_subjects = max;
        self
    }

    pub fn force_refresh(mut self, force: bool) -> Self {
        self.config.force_refresh = force;
        self
    }

    pub fn retention(mut self, retention: Duration) -> Self {
        self.config.retention = retention;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    pub fn web_search(mut self, enabled: bool) -> Self {
        self.config.web_search = enabled;
        self
    }

    /// Set the run identifier; blank strings keep "unknown"
    pub fn run_id(mut self, run_id: impl AsRef<str>) -> Self {
        let trimmed = run_id.as_ref().trim();
        if !trimmed.is_empty() {
            self.config.run_id = trimmed.to_string();
        }
        self
    }

    pub fn api_key(mut self, key: Option<String>) -> Self {
        self.config.api_key = key;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("openstates-people")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_locale_means_all_jurisdictions() {
        let builder = ConfigBuilder::new(".").locale("  ");
        assert_eq!(builder.config.locale, None);

        let builder = ConfigBuilder::new(".").locale(" IL ");
        assert_eq!(builder.config.locale.as_deref(), Some("il"));
    }

    #[test]
    fn build_rejects_missing_people_dir() {
        let err = ConfigBuilder::new("/definitely/not/here").build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn require_api_key_rejects_blank() {
        let config = Config {
            api_key: Some("   ".to_string()),
            ..Config::default()
        };
        assert!(config.require_api_key().is_err());

        let config = Config {
            api_key: Some("sk-test".to_string()),
            ..Config::default()
        };
        assert_eq!(config.require_api_key().unwrap(), "sk-test");
    }

    #[test]
    fn defaults_allow_three_attempts() {
        let config = Config::default();
        assert_eq!(config.max_attempts(), 3);
        assert_eq!(config.retention, Duration::from_secs(365 * 86_400));
        assert_eq!(config.run_id, "unknown");
    }
}
