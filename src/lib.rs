//! Periodic research on sitting legislators.
//!
//! This library discovers legislator records that lack recent research,
//! asks a generative text service for structured findings (policy issues
//! and campaign donors), persists the results as JSON, and aggregates
//! summary statistics across everything stored.

pub mod aggregate;
pub mod client;
pub mod config;
pub mod discovery;
pub mod donors;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod prompt;
pub mod record;
pub mod research;
pub mod staleness;
pub mod store;
pub mod types;

pub use aggregate::{estimate_cost, load_records, render_report, summarize};
pub use client::{AnthropicClient, Completion, ResearchClient};
pub use config::{Config, ConfigBuilder};
pub use discovery::Discovery;
pub use donors::DonorScraper;
pub use error::{Error, Result};
pub use extract::{extract_json_object, ExtractionStrategy};
pub use pipeline::{Outcome, ResearchPipeline};
pub use record::PersonRecord;
pub use research::Researcher;
pub use staleness::StalenessFilter;
pub use store::ResultStore;
pub use types::{Donors, ResearchRecord, Subject, SummaryRecord, TokenUsage};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::client::{AnthropicClient, ResearchClient};
    pub use crate::config::{Config, ConfigBuilder};
    pub use crate::error::{Error, Result};
    pub use crate::pipeline::{Outcome, ResearchPipeline};
    pub use crate::research::Researcher;
    pub use crate::store::ResultStore;
    pub use crate::types::{ResearchRecord, Subject, SummaryRecord};
    pub use futures::StreamExt;
}
