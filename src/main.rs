use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use legislator_research::aggregate;
use legislator_research::config::{
    DEFAULT_CATEGORY, DEFAULT_MAX_RETRIES, DEFAULT_MAX_SUBJECTS, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
    DEFAULT_RETENTION_DAYS,
};
use legislator_research::discovery::Discovery;
use legislator_research::donors::{DonorScraper, DEFAULT_DELAY};
use legislator_research::prelude::*;
use legislator_research::record::{jurisdiction_code, PersonRecord};
use legislator_research::research::now_timestamp;
use legislator_research::store::write_pretty_json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Research sitting legislators with a generative text service
#[derive(Parser, Debug)]
#[command(name = "legislator-research")]
#[command(about = "Discover, research and summarize legislators")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List legislators whose research is missing or stale
    Discover {
        #[command(flatten)]
        discovery: DiscoveryArgs,

        /// Where to write the selected legislators
        #[arg(long, default_value = "legislators_to_process.json")]
        output: PathBuf,
    },

    /// Discover legislators, then research and store each one
    Research {
        #[command(flatten)]
        discovery: DiscoveryArgs,

        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Research a single person record and write the result to OUTPUT
    ResearchFile {
        /// Person record (YAML)
        yaml: PathBuf,

        /// Result file to write
        output: PathBuf,

        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Summarize every stored research result
    Consolidate {
        #[command(flatten)]
        store: StoreArgs,

        /// Summary file to write (overwritten)
        #[arg(long, default_value = "research_summary.json")]
        output: PathBuf,
    },

    /// Scrape campaign-finance contributors for one legislator
    Donors {
        /// Legislator name, e.g. "Katie Britt"
        name: String,

        /// State, used for logging only
        state: String,

        /// Seconds to wait before each page request
        #[arg(long = "delay-secs", default_value_t = DEFAULT_DELAY.as_secs())]
        delay_secs: u64,
    },
}

#[derive(clap::Args, Debug)]
struct StoreArgs {
    /// Root of the research store
    #[arg(long = "output-dir", env = "RESEARCH_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Record category directory under each jurisdiction
    #[arg(long, default_value = DEFAULT_CATEGORY)]
    category: String,
}

#[derive(clap::Args, Debug)]
struct DiscoveryArgs {
    /// Root of the person-record checkout
    #[arg(long = "people-dir", env = "PEOPLE_DIR", default_value = "openstates-people")]
    people_dir: PathBuf,

    #[command(flatten)]
    store: StoreArgs,

    /// Only this jurisdiction (e.g. il); empty means all
    #[arg(long, env = "LOCALE", default_value = "")]
    locale: String,

    /// Maximum number of legislators per run
    #[arg(long = "max-people", env = "MAX_PEOPLE", default_value_t = DEFAULT_MAX_SUBJECTS)]
    max_people: usize,

    /// Research everyone regardless of result age
    #[arg(long, env = "FORCE_UPDATE")]
    force: bool,

    /// Results older than this many days are researched again
    #[arg(long = "retention-days", default_value_t = DEFAULT_RETENTION_DAYS)]
    retention_days: u64,
}

#[derive(clap::Args, Debug)]
struct ServiceArgs {
    /// Service credential
    #[arg(long = "api-key", env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "RESEARCH_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    #[arg(long = "max-tokens", default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,

    /// Attach the web search tool to each request
    #[arg(long = "web-search", env = "WEB_SEARCH")]
    web_search: bool,

    /// Extra attempts when a response holds no JSON object
    #[arg(long = "max-retries", env = "MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// Identifier recorded in processing metadata
    #[arg(long = "run-id", env = "GITHUB_RUN_ID", default_value = "")]
    run_id: String,
}

impl DiscoveryArgs {
    fn builder(&self) -> ConfigBuilder {
        ConfigBuilder::new(&self.people_dir)
            .output_dir(&self.store.output_dir)
            .category(&self.store.category)
            .locale(&self.locale)
            .max_subjects(self.max_people)
            .force_refresh(self.force)
            .retention(Duration::from_secs(self.retention_days * 24 * 60 * 60))
    }
}

impl ServiceArgs {
    fn apply(&self, builder: ConfigBuilder) -> ConfigBuilder {
        builder
            .api_key(self.api_key.clone())
            .model(&self.model)
            .max_tokens(self.max_tokens)
            .web_search(self.web_search)
            .max_retries(self.max_retries)
            .run_id(&self.run_id)
    }
}

fn print_available_commands() {
    println!("Available commands:");
    println!("  discover       List legislators whose research is missing or stale");
    println!("  research       Discover legislators, then research and store each one");
    println!("  research-file  Research a single person record");
    println!("  consolidate    Summarize every stored research result");
    println!("  donors         Scrape campaign-finance contributors for one legislator");
}

fn client_for(config: &Config) -> anyhow::Result<AnthropicClient> {
    let api_key = config.require_api_key()?;
    Ok(AnthropicClient::new(
        api_key,
        &config.model,
        config.max_tokens,
        config.web_search,
    )?)
}

fn print_outcome(outcome: &Outcome) {
    match &outcome.error {
        None => println!(
            "✓ {} ({}): {} issues, {} donors -> {}",
            outcome.subject.name,
            outcome.subject.jurisdiction,
            outcome.issues,
            outcome.donors,
            outcome.path.display()
        ),
        Some(error) => println!(
            "✗ {} ({}): {}",
            outcome.subject.name, outcome.subject.jurisdiction, error
        ),
    }
}

async fn run_discover_command(discovery: DiscoveryArgs, output: PathBuf) -> anyhow::Result<()> {
    let config = discovery.builder().build()?;
    let discovery = Discovery::new(config);

    let subjects = tokio::task::spawn_blocking(move || discovery.discover()).await??;
    write_pretty_json(&output, &subjects)?;

    info!(count = subjects.len(), path = %output.display(), "wrote legislators to process");
    Ok(())
}

async fn run_research_command(discovery: DiscoveryArgs, service: ServiceArgs) -> anyhow::Result<()> {
    let config = service.apply(discovery.builder()).build()?;
    let client = client_for(&config)?;
    let pipeline = ResearchPipeline::new(config, client);

    let mut stream = pipeline.process();
    let (mut succeeded, mut failed) = (0usize, 0usize);

    while let Some(result) = stream.next().await {
        let outcome = result?;
        if outcome.error.is_some() {
            failed += 1;
        } else {
            succeeded += 1;
        }
        print_outcome(&outcome);
    }

    info!(succeeded, failed, "research run complete");
    Ok(())
}

async fn run_research_file_command(yaml: &Path, output: &Path, service: ServiceArgs) -> anyhow::Result<()> {
    let config = service.apply(ConfigBuilder::new(".")).build()?;
    let person = PersonRecord::load(yaml)?;

    let now = Utc::now();
    let role = person
        .current_role(now)
        .with_context(|| format!("{} holds no current legislative role", person.display_name()))?;
    let jurisdiction = jurisdiction_code(&role.jurisdiction).unwrap_or_else(|| "Unknown".to_string());
    let file_stem = yaml
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();

    let subject = person
        .to_subject(jurisdiction, file_stem, yaml, now)
        .with_context(|| format!("{} holds no current legislative role", person.display_name()))?;

    let client = client_for(&config)?;
    let researcher = Researcher::new(client, &config);
    let record = researcher.research(&subject).await;
    write_pretty_json(output, &record)?;

    print_outcome(&Outcome {
        issues: record.issues.len(),
        donors: record.donor_count(),
        error: record.error.clone(),
        path: output.to_path_buf(),
        subject,
    });
    Ok(())
}

fn run_consolidate_command(store: StoreArgs, output: &Path) -> anyhow::Result<()> {
    let store = ResultStore::new(store.output_dir, store.category);
    let records = aggregate::load_records(&store);
    let summary = aggregate::summarize(&records, now_timestamp());

    write_pretty_json(output, &summary)?;
    info!(path = %output.display(), "wrote research summary");

    print!("{}", aggregate::render_report(&summary));
    Ok(())
}

async fn run_donors_command(name: &str, state: &str, delay_secs: u64) -> anyhow::Result<()> {
    let scraper = DonorScraper::new(Duration::from_secs(delay_secs))?;
    let donors = scraper.research_donors(name, state).await;

    let output = PathBuf::from(format!(
        "donor_research_{}.json",
        name.replace(' ', "_").to_lowercase()
    ));
    write_pretty_json(&output, &donors)?;

    println!(
        "{}: {} companies from {} -> {}",
        name,
        donors.top_companies.len(),
        donors.source_url,
        output.display()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Some(Command::Discover { discovery, output }) => run_discover_command(discovery, output).await,
        Some(Command::Research { discovery, service }) => run_research_command(discovery, service).await,
        Some(Command::ResearchFile {
            yaml,
            output,
            service,
        }) => run_research_file_command(&yaml, &output, service).await,
        Some(Command::Consolidate { store, output }) => run_consolidate_command(store, &output),
        Some(Command::Donors {
            name,
            state,
            delay_secs,
        }) => run_donors_command(&name, &state, delay_secs).await,
        None => {
            print_available_commands();
            Ok(())
        }
    }
}
