//! Summary statistics over every stored research record.

use crate::store::ResultStore;
use crate::types::{JurisdictionStats, LegislatorSummary, ResearchRecord, SummaryRecord};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::{info, warn};

/// Currency units per million input tokens
pub const INPUT_PRICE_PER_MILLION: f64 = 3.0;
/// Currency units per million output tokens
pub const OUTPUT_PRICE_PER_MILLION: f64 = 15.0;

const UNKNOWN: &str = "Unknown";

/// Estimated service cost of one record; zero when token counts are missing
/// or not numeric
pub fn estimate_cost(record: &ResearchRecord) -> f64 {
    match record.token_usage() {
        Some((input, output)) => {
            (input as f64 / 1_000_000.0) * INPUT_PRICE_PER_MILLION
                + (output as f64 / 1_000_000.0) * OUTPUT_PRICE_PER_MILLION
        }
        None => 0.0,
    }
}

/// Load every stored record, skipping files that cannot be read or parsed
pub fn load_records(store: &ResultStore) -> Vec<ResearchRecord> {
    let files = store.list_results();
    info!(files = files.len(), "found research files");

    files
        .iter()
        .filter_map(|path| match ResultStore::load(path) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable research file");
                None
            }
        })
        .collect()
}

/// Summarize `records`. The output depends only on the records and `run_date`.
pub fn summarize(records: &[ResearchRecord], run_date: impl Into<String>) -> SummaryRecord {
    let mut by_state: BTreeMap<String, JurisdictionStats> = BTreeMap::new();
    let mut legislators = Vec::with_capacity(records.len());
    let mut total_cost = 0.0;

    for record in records {
        let state = record
            .jurisdiction
            .clone()
            .unwrap_or_else(|| UNKNOWN.to_string());
        let issues = record.issues.len();
        let donors = record.donor_count();
        let has_error = record.is_error();
        let cost = estimate_cost(record);

        let stats = by_state.entry(state.clone()).or_default();
        stats.processed += 1;
        stats.issues += issues;
        stats.donors += donors;
        if has_error {
            stats.errors += 1;
        }
        total_cost += cost;

        let name = if record.display_name.is_empty() {
            UNKNOWN.to_string()
        } else {
            record.display_name.clone()
        };

        legislators.push(LegislatorSummary {
            name,
            state,
            issues_count: issues,
            donors_count: donors,
            has_error,
            last_updated: record.last_updated.clone(),
            cost,
        });
    }

    legislators.sort_by(|a, b| (&a.state, &a.name).cmp(&(&b.state, &b.name)));

    let errors = legislators.iter().filter(|l| l.has_error).count();
    SummaryRecord {
        run_date: run_date.into(),
        total_processed: legislators.len(),
        successful: legislators.len() - errors,
        errors,
        total_issues: legislators.iter().map(|l| l.issues_count).sum(),
        total_donors: legislators.iter().map(|l| l.donors_count).sum(),
        estimated_cost_usd: (total_cost * 100.0).round() / 100.0,
        by_state,
        legislators,
    }
}

/// Console report for a summary
pub fn render_report(summary: &SummaryRecord) -> String {
    let rule = "=".repeat(50);
    let mut out = String::new();

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "LEGISLATOR RESEARCH SUMMARY");
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Processed: {} legislators", summary.total_processed);
    let _ = writeln!(out, "Successful: {}", summary.successful);
    let _ = writeln!(out, "Errors: {}", summary.errors);
    let _ = writeln!(out, "Total Issues Found: {}", summary.total_issues);
    let _ = writeln!(out, "Total Donors Found: {}", summary.total_donors);
    let _ = writeln!(out, "Estimated Cost: ${:.2}", summary.estimated_cost_usd);
    let _ = writeln!(out, "\nBy State:");
    for (state, stats) in &summary.by_state {
        let _ = writeln!(
            out,
            "  {}: {} processed, {} issues, {} donors",
            state.to_uppercase(),
            stats.processed,
            stats.issues,
            stats.donors
        );
    }
    let _ = writeln!(out, "{}", rule);

    out
}
