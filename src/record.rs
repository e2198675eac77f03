//! OpenStates person records.
//!
//! A person file lists party memberships and roles; only the first legislative
//! role that has not ended makes the person a research subject.

use crate::error::Result;
use crate::types::{lenient, Chamber, Subject};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Party membership entry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartyEntry {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
}

/// Role entry (`type`, `jurisdiction`, `district`, `end_date`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleEntry {
    #[serde(rename = "type", default, deserialize_with = "lenient::string")]
    pub role_type: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub jurisdiction: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub district: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub end_date: Option<String>,
}

impl RoleEntry {
    pub fn chamber(&self) -> Option<Chamber> {
        Chamber::from_role_type(&self.role_type)
    }

    /// A role is current when it has no end date, ends after `now`, or its
    /// end date cannot be parsed
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        let end = match self.end_date.as_deref().map(str::trim) {
            Some(end) if !end.is_empty() => end,
            _ => return true,
        };

        if let Ok(date) = NaiveDate::parse_from_str(end, "%Y-%m-%d") {
            return date > now.date_naive();
        }
        if let Ok(datetime) = DateTime::parse_from_rfc3339(end) {
            return datetime.with_timezone(&Utc) > now;
        }
        true
    }
}

/// A person YAML file as published by OpenStates
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub party: Vec<PartyEntry>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub roles: Vec<RoleEntry>,
}

impl PersonRecord {
    /// Load and parse a person YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "Unknown"
        } else {
            &self.name
        }
    }

    /// Name of the first listed party, "Unknown" when absent
    pub fn party_name(&self) -> &str {
        self.party
            .first()
            .map(|p| p.name.as_str())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("Unknown")
    }

    /// First legislative role that is still current
    pub fn current_role(&self, now: DateTime<Utc>) -> Option<&RoleEntry> {
        self.roles
            .iter()
            .find(|role| role.chamber().is_some() && role.is_current(now))
    }

    /// Build a research subject, or `None` when the person holds no current
    /// legislative role
    pub fn to_subject(
        &self,
        jurisdiction: impl Into<String>,
        file_stem: impl Into<String>,
        source_path: impl Into<PathBuf>,
        now: DateTime<Utc>,
    ) -> Option<Subject> {
        let role = self.current_role(now)?;
        let chamber = role.chamber()?;

        Some(Subject {
            id: self.id.clone(),
            name: self.display_name().to_string(),
            party: self.party_name().to_string(),
            jurisdiction: jurisdiction.into(),
            chamber,
            district: role.district.clone(),
            file_stem: file_stem.into(),
            source_path: source_path.into(),
        })
    }
}

/// Short jurisdiction code from an OCD jurisdiction identifier.
///
/// `ocd-jurisdiction/country:us/state:il/government` gives `il`;
/// `ocd-jurisdiction/country:us/government` gives `us`.
pub fn jurisdiction_code(ocd_id: &str) -> Option<String> {
    static SUBDIVISION: OnceLock<Regex> = OnceLock::new();
    static COUNTRY: OnceLock<Regex> = OnceLock::new();

    let subdivision = SUBDIVISION.get_or_init(|| {
        Regex::new(r"/(?:state|territory|district):([a-z]{2})(?:/|$)").expect("subdivision pattern is valid")
    });
    if let Some(caps) = subdivision.captures(ocd_id) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }

    let country = COUNTRY
        .get_or_init(|| Regex::new(r"/country:([a-z]{2})/government$").expect("country pattern is valid"));
    country
        .captures(ocd_id)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    const CURRENT: &str = r#"
id: ocd-person/1234
name: Jane Doe
party:
  - name: Democratic
roles:
  - type: mayor
    jurisdiction: ocd-jurisdiction/country:us/state:il/place:chicago/government
  - type: lower
    district: 12
    jurisdiction: ocd-jurisdiction/country:us/state:il/government
    end_date: 2021-01-13
  - type: upper
    district: "7"
    jurisdiction: ocd-jurisdiction/country:us/state:il/government
"#;

    #[test]
    fn first_unexpired_legislative_role_wins() {
        let person = PersonRecord::parse(CURRENT).unwrap();
        let subject = person
            .to_subject("il", "Jane-Doe-1234", "data/il/legislature/Jane-Doe-1234.yml", now())
            .unwrap();

        assert_eq!(subject.chamber, Chamber::Upper);
        assert_eq!(subject.district, "7");
        assert_eq!(subject.party, "Democratic");
        assert_eq!(subject.jurisdiction, "il");
        assert_eq!(subject.file_stem, "Jane-Doe-1234");
    }

    #[test]
    fn retired_and_non_legislative_people_are_excluded() {
        let retired = PersonRecord::parse(
            r#"
id: ocd-person/1
name: Old Timer
roles:
  - type: upper
    end_date: "2019-01-01"
  - type: lower
    end_date: "2025-06-01"
"#,
        )
        .unwrap();
        assert!(retired.to_subject("il", "x", "x.yml", now()).is_none());

        let governor = PersonRecord::parse(
            r#"
id: ocd-person/2
name: Exec Person
roles:
  - type: governor
"#,
        )
        .unwrap();
        assert!(governor.to_subject("il", "y", "y.yml", now()).is_none());
    }

    #[test]
    fn future_and_unparseable_end_dates_are_current() {
        let future = RoleEntry {
            role_type: "lower".to_string(),
            end_date: Some("2025-06-02".to_string()),
            ..RoleEntry::default()
        };
        assert!(future.is_current(now()));

        let timestamp = RoleEntry {
            end_date: Some("2025-06-01T11:00:00Z".to_string()),
            ..future.clone()
        };
        assert!(!timestamp.is_current(now()));

        let garbage = RoleEntry {
            end_date: Some("sometime".to_string()),
            ..future
        };
        assert!(garbage.is_current(now()));
    }

    #[test]
    fn missing_party_and_name_default_to_unknown() {
        let person = PersonRecord::parse("roles:\n  - type: legislature\n").unwrap();
        let subject = person.to_subject("ne", "s", "s.yml", now()).unwrap();
        assert_eq!(subject.party, "Unknown");
        assert_eq!(subject.name, "Unknown");
        assert_eq!(subject.district, "");
    }

    #[test]
    fn jurisdiction_codes_from_ocd_ids() {
        assert_eq!(
            jurisdiction_code("ocd-jurisdiction/country:us/state:il/government").as_deref(),
            Some("il")
        );
        assert_eq!(
            jurisdiction_code("ocd-jurisdiction/country:us/district:dc/government").as_deref(),
            Some("dc")
        );
        assert_eq!(
            jurisdiction_code("ocd-jurisdiction/country:us/government").as_deref(),
            Some("us")
        );
        assert_eq!(jurisdiction_code("nonsense"), None);
    }
}
