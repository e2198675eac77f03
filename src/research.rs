//! Retry controller turning model output into a `ResearchRecord`.

use crate::client::ResearchClient;
use crate::config::Config;
use crate::extract::extract_json_object;
use crate::prompt::{build_prompt, PromptStyle};
use crate::types::{ProcessingMetadata, ResearchRecord, Subject, TokenUsage};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

pub const NO_JSON_ERROR: &str = "No valid JSON found in response after all retries";

/// Keys owned by the pipeline; model-supplied values are discarded
const RESERVED_KEYS: [&str; 2] = ["error", "processing_metadata"];

/// Current time as an RFC 3339 UTC timestamp
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Researches one subject at a time against a `ResearchClient`
pub struct Researcher<C> {
    client: C,
    style: PromptStyle,
    max_attempts: u32,
    run_id: String,
}

impl<C: ResearchClient> Researcher<C> {
    pub fn new(client: C, config: &Config) -> Self {
        let style = if config.web_search {
            PromptStyle::WebSearch
        } else {
            PromptStyle::Knowledge
        };

        Self {
            client,
            style,
            max_attempts: config.max_attempts(),
            run_id: config.run_id.clone(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Research `subject`. Never fails: service errors and unusable output
    /// come back as records with `error` set.
    ///
    /// A failed service call ends the research immediately. A response with
    /// no JSON object is retried until `max_attempts` calls have been made.
    pub async fn research(&self, subject: &Subject) -> ResearchRecord {
        let max_attempts = self.max_attempts;

        for attempt in 0..max_attempts {
            let prompt = build_prompt(subject, self.style, &now_timestamp(), attempt);

            let completion = match self.client.complete(&prompt).await {
                Ok(completion) => completion,
                Err(e) => {
                    error!(subject = %subject.name, attempt = attempt + 1, error = %e, "research request failed");
                    return self.failure(subject, e.to_string(), attempt + 1);
                }
            };

            let record = extract_json_object(&completion.text).and_then(|extracted| {
                debug!(subject = %subject.name, strategy = ?extracted.strategy, "extracted JSON object");
                self.decorate(subject, extracted.object, completion.usage.clone(), attempt + 1)
            });

            if let Some(record) = record {
                info!(
                    subject = %subject.name,
                    issues = record.issues.len(),
                    donors = record.donor_count(),
                    attempts = attempt + 1,
                    "research complete"
                );
                return record;
            }

            debug!(
                subject = %subject.name,
                response = %truncate(&completion.text, 500),
                "no JSON object in response"
            );
            if attempt + 1 < max_attempts {
                warn!(
                    subject = %subject.name,
                    next_attempt = attempt + 2,
                    max_attempts,
                    "retrying research"
                );
            }
        }

        error!(subject = %subject.name, attempts = max_attempts, "{}", NO_JSON_ERROR);
        self.failure(subject, NO_JSON_ERROR, max_attempts)
    }

    fn metadata(&self, token_usage: Option<TokenUsage>, error_flag: bool, attempts: u32) -> ProcessingMetadata {
        ProcessingMetadata {
            processed_date: now_timestamp(),
            run_id: self.run_id.clone(),
            token_usage,
            model: self.client.model().to_string(),
            error_flag,
            attempts: Some(attempts),
            research_type: Some(self.style.research_type().to_string()),
        }
    }

    fn failure(&self, subject: &Subject, message: impl Into<String>, attempts: u32) -> ResearchRecord {
        ResearchRecord::failed(
            subject,
            message,
            now_timestamp(),
            self.metadata(None, true, attempts),
        )
    }

    /// Attach processing metadata to a parsed object, filling identity
    /// fields the model left out
    fn decorate(
        &self,
        subject: &Subject,
        mut object: Map<String, Value>,
        usage: Option<TokenUsage>,
        attempts: u32,
    ) -> Option<ResearchRecord> {
        for key in RESERVED_KEYS {
            object.remove(key);
        }

        let identity = [
            ("legislator_id", subject.id.clone()),
            ("name", subject.name.clone()),
            ("state", subject.jurisdiction.clone()),
            ("last_updated", now_timestamp()),
        ];
        for (key, value) in identity {
            if object.get(key).map_or(true, Value::is_null) {
                object.insert(key.to_string(), Value::String(value));
            }
        }

        let mut record: ResearchRecord = serde_json::from_value(Value::Object(object)).ok()?;
        record.processing_metadata = Some(self.metadata(
            Some(usage.unwrap_or_else(TokenUsage::unknown)),
            false,
            attempts,
        ));
        Some(record)
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
