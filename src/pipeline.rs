use crate::client::ResearchClient;
use crate::config::Config;
use crate::discovery::Discovery;
use crate::error::{Error, Result};
use crate::research::Researcher;
use crate::store::ResultStore;
use crate::types::{ResearchRecord, Subject};
use async_stream::stream;
use futures::Stream;
use serde::Serialize;
use std::path::PathBuf;

/// What happened to one subject in a batch run
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub subject: Subject,
    pub path: PathBuf,
    pub issues: usize,
    pub donors: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Outcome {
    fn new(subject: Subject, path: PathBuf, record: &ResearchRecord) -> Self {
        Self {
            subject,
            path,
            issues: record.issues.len(),
            donors: record.donor_count(),
            error: record.error.clone(),
        }
    }
}

/// Sequential batch run: discover, research, persist
pub struct ResearchPipeline<C> {
    config: Config,
    researcher: Researcher<C>,
    store: ResultStore,
}

impl<C: ResearchClient> ResearchPipeline<C> {
    pub fn new(config: Config, client: C) -> Self {
        let researcher = Researcher::new(client, &config);
        let store = ResultStore::new(&config.output_dir, &config.category);
        Self {
            config,
            researcher,
            store,
        }
    }

    pub fn researcher(&self) -> &Researcher<C> {
        &self.researcher
    }

    /// Discover subjects and research them one after another.
    ///
    /// Per-subject research failures are stored as error records and yielded
    /// as ordinary outcomes. Discovery and persistence errors are yielded once
    /// and end the stream.
    pub fn process(&self) -> impl Stream<Item = Result<Outcome>> + '_ {
        let discovery = Discovery::new(self.config.clone());
        Box::pin(stream! {
            // jwalk and YAML parsing are synchronous
            let subjects = match tokio::task::spawn_blocking(move || discovery.discover()).await {
                Ok(Ok(subjects)) => subjects,
                Ok(Err(e)) => {
                    yield Err(e);
                    return;
                }
                Err(e) => {
                    yield Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        format!("Task join error: {}", e)
                    )));
                    return;
                }
            };

            for subject in subjects {
                match self.research_subject(subject).await {
                    Ok(outcome) => yield Ok(outcome),
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        })
    }

    /// Research one subject and replace its stored result
    pub async fn research_subject(&self, subject: Subject) -> Result<Outcome> {
        let record = self.researcher.research(&subject).await;
        let path = self
            .store
            .save(&record, &subject.jurisdiction, &subject.file_stem)?;
        Ok(Outcome::new(subject, path, &record))
    }
}
