use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Legislative chamber of a current role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chamber {
    Upper,
    Lower,
    Legislature,
}

impl Chamber {
    /// Map an OpenStates role type; non-legislative roles yield `None`
    pub fn from_role_type(role_type: &str) -> Option<Self> {
        match role_type {
            "upper" => Some(Chamber::Upper),
            "lower" => Some(Chamber::Lower),
            "legislature" => Some(Chamber::Legislature),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Chamber::Upper => "upper",
            Chamber::Lower => "lower",
            Chamber::Legislature => "legislature",
        }
    }
}

impl fmt::Display for Chamber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A legislator selected for research
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub party: String,
    /// Storage key, e.g. `il` or `us`
    #[serde(rename = "state")]
    pub jurisdiction: String,
    pub chamber: Chamber,
    pub district: String,
    /// File stem of the person record; keys the stored result
    #[serde(rename = "filename")]
    pub file_stem: String,
    #[serde(rename = "yaml_path")]
    pub source_path: PathBuf,
}

/// A policy position found for a legislator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub category: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub source: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyDonor {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub amount: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub industry: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub cycle: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndustryTotal {
    #[serde(default, deserialize_with = "lenient::string")]
    pub industry: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub total_amount: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub percentage: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// PAC, advocacy group or other single-issue contributor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdeologicalDonor {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub amount: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub ideology: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub issue_focus: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub cycle: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndividualDonor {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub amount: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub occupation: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Campaign finance findings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Donors {
    #[serde(default, deserialize_with = "lenient::seq")]
    pub top_companies: Vec<CompanyDonor>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub top_industries: Vec<IndustryTotal>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub ideological_donors: Vec<IdeologicalDonor>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub individual_donors: Vec<IndividualDonor>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub data_source: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub source_url: String,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub scraped_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Donors {
    /// Empty donor block attached to failed research
    pub fn failed(source_url: impl Into<String>) -> Self {
        Self {
            data_source: "Error occurred".to_string(),
            source_url: source_url.into(),
            ..Self::default()
        }
    }
}

/// Token counters reported by the research service.
///
/// Counts may be any non-negative JSON number; fractional values are
/// rounded. Anything else (including the literal `"unknown"`) lands in
/// `Other` and contributes no cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenUsage {
    Counted {
        #[serde(default, deserialize_with = "lenient::token_count")]
        input_tokens: u64,
        #[serde(default, deserialize_with = "lenient::token_count")]
        output_tokens: u64,
    },
    Other(Value),
}

impl TokenUsage {
    pub fn unknown() -> Self {
        TokenUsage::Other(Value::String("unknown".to_string()))
    }

    pub fn counts(&self) -> Option<(u64, u64)> {
        match self {
            TokenUsage::Counted {
                input_tokens,
                output_tokens,
            } => Some((*input_tokens, *output_tokens)),
            TokenUsage::Other(_) => None,
        }
    }
}

/// Bookkeeping attached by the pipeline to every stored record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    #[serde(default, deserialize_with = "lenient::string")]
    pub processed_date: String,
    #[serde(rename = "github_action_run", default, deserialize_with = "lenient::string")]
    pub run_id: String,
    #[serde(
        rename = "tokens_used",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub token_usage: Option<TokenUsage>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub model: String,
    #[serde(rename = "error", default, deserialize_with = "lenient::or_default")]
    pub error_flag: bool,
    #[serde(
        default,
        deserialize_with = "lenient::or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub attempts: Option<u32>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub research_type: Option<String>,
}

/// Structured result of researching one subject.
///
/// Either the body (issues, donors, sources) came from the model and `error`
/// is `None`, or `error` is set and the body is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchRecord {
    #[serde(rename = "legislator_id", default, deserialize_with = "lenient::string")]
    pub subject_id: String,
    #[serde(rename = "name", default, deserialize_with = "lenient::string")]
    pub display_name: String,
    #[serde(
        rename = "state",
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub jurisdiction: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub last_updated: String,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub issues: Vec<Issue>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub donors: Donors,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub sources: Vec<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub processing_metadata: Option<ProcessingMetadata>,
    /// Anything else the model returned, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResearchRecord {
    /// Error record: identity and error message, empty body
    pub fn failed(
        subject: &Subject,
        message: impl Into<String>,
        timestamp: impl Into<String>,
        metadata: ProcessingMetadata,
    ) -> Self {
        Self {
            subject_id: subject.id.clone(),
            display_name: subject.name.clone(),
            jurisdiction: Some(subject.jurisdiction.clone()),
            last_updated: timestamp.into(),
            issues: Vec::new(),
            donors: Donors::failed(""),
            sources: Vec::new(),
            error: Some(message.into()),
            processing_metadata: Some(metadata),
            extra: Map::new(),
        }
    }

    /// A record counts as errored when it carries a non-empty error message
    pub fn is_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }

    /// Headline donor tally: companies plus ideological donors
    pub fn donor_count(&self) -> usize {
        self.donors.top_companies.len() + self.donors.ideological_donors.len()
    }

    pub fn token_usage(&self) -> Option<(u64, u64)> {
        self.processing_metadata
            .as_ref()
            .and_then(|m| m.token_usage.as_ref())
            .and_then(TokenUsage::counts)
    }
}

/// Per-jurisdiction tallies in a summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JurisdictionStats {
    pub processed: usize,
    pub issues: usize,
    pub donors: usize,
    pub errors: usize,
}

/// One line of the summary's legislator listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegislatorSummary {
    pub name: String,
    pub state: String,
    pub issues_count: usize,
    pub donors_count: usize,
    pub has_error: bool,
    pub last_updated: String,
    pub cost: f64,
}

/// Aggregate over every stored research record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub run_date: String,
    pub total_processed: usize,
    pub successful: usize,
    pub errors: usize,
    pub total_issues: usize,
    pub total_donors: usize,
    pub estimated_cost_usd: f64,
    pub by_state: BTreeMap<String, JurisdictionStats>,
    pub legislators: Vec<LegislatorSummary>,
}

/// Tolerant field readers for records written by a model or by older tooling
pub(crate) mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Strings pass through, null becomes empty, other scalars are stringified
    pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }

    /// Non-arrays read as empty; elements that do not fit `T` are dropped
    pub fn seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        })
    }

    /// Any non-negative finite number; strings and other shapes are rejected
    pub fn token_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        if let Some(count) = value.as_u64() {
            return Ok(count);
        }
        match value.as_f64() {
            Some(count) if count.is_finite() && count >= 0.0 => Ok(count.round() as u64),
            _ => Err(serde::de::Error::custom(format!("not a token count: {}", value))),
        }
    }

    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_sparse_model_output() {
        let record: ResearchRecord = serde_json::from_value(json!({
            "name": "Jane Doe",
            "issues": [{"title": "Water", "priority": 1}, "not an object"],
            "donors": {"top_companies": [{"name": "Acme", "amount": 5000}]}
        }))
        .unwrap();

        assert_eq!(record.display_name, "Jane Doe");
        assert_eq!(record.jurisdiction, None);
        assert_eq!(record.issues.len(), 1);
        assert_eq!(record.issues[0].extra.get("priority"), Some(&json!(1)));
        assert_eq!(record.donors.top_companies[0].amount, "5000");
        assert!(record.donors.ideological_donors.is_empty());
        assert!(!record.is_error());
    }

    #[test]
    fn mistyped_sections_read_as_empty() {
        let record: ResearchRecord = serde_json::from_value(json!({
            "issues": "none found",
            "donors": ["unexpected"],
            "sources": null,
            "processing_metadata": "garbage"
        }))
        .unwrap();

        assert!(record.issues.is_empty());
        assert_eq!(record.donors, Donors::default());
        assert!(record.sources.is_empty());
        assert_eq!(record.processing_metadata, None);
    }

    #[test]
    fn token_usage_accepts_counts_or_unknown() {
        let counted: TokenUsage =
            serde_json::from_value(json!({"input_tokens": 10, "output_tokens": 20})).unwrap();
        assert_eq!(counted.counts(), Some((10, 20)));

        let unknown: TokenUsage = serde_json::from_value(json!("unknown")).unwrap();
        assert_eq!(unknown.counts(), None);
        assert_eq!(serde_json::to_value(TokenUsage::unknown()).unwrap(), json!("unknown"));

        let partial: TokenUsage =
            serde_json::from_value(json!({"input_tokens": "unknown", "output_tokens": 3}))
                .unwrap();
        assert_eq!(partial.counts(), None);

        let float: TokenUsage =
            serde_json::from_value(json!({"input_tokens": 1_000_000.0, "output_tokens": 2.6}))
                .unwrap();
        assert_eq!(float.counts(), Some((1_000_000, 3)));

        let negative: TokenUsage =
            serde_json::from_value(json!({"input_tokens": -5, "output_tokens": 3})).unwrap();
        assert_eq!(negative.counts(), None);
    }

    #[test]
    fn empty_error_string_is_not_an_error() {
        let record = ResearchRecord {
            error: Some(String::new()),
            ..ResearchRecord::default()
        };
        assert!(!record.is_error());
    }

    #[test]
    fn donor_count_ignores_individuals_and_industries() {
        let record = ResearchRecord {
            donors: Donors {
                top_companies: vec![CompanyDonor::default(); 2],
                ideological_donors: vec![IdeologicalDonor::default()],
                individual_donors: vec![IndividualDonor::default(); 5],
                top_industries: vec![IndustryTotal::default(); 4],
                ..Donors::default()
            },
            ..ResearchRecord::default()
        };
        assert_eq!(record.donor_count(), 3);
    }
}
