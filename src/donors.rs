//! Contributor tables scraped from OpenSecrets member pages.
//!
//! Requests are spaced by a fixed delay; there is no adaptive backoff.

use crate::error::Result;
use crate::research::now_timestamp;
use crate::types::{CompanyDonor, Donors};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

pub const OPENSECRETS_BASE: &str = "https://www.opensecrets.org";
pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);
const DEFAULT_CYCLE: &str = "2024";

pub struct DonorScraper {
    http: reqwest::Client,
    base_url: String,
    delay: Duration,
}

impl DonorScraper {
    pub fn new(delay: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(
                "Mozilla/5.0 (compatible; legislator-research/",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: OPENSECRETS_BASE.to_string(),
            delay,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Contributor page URLs derived from the legislator's name
    pub fn profile_url_candidates(&self, name: &str) -> Vec<String> {
        let lower = name.trim().to_lowercase();
        ["-", "", "_"]
            .iter()
            .map(|sep| {
                format!(
                    "{}/members-of-congress/{}/contributors",
                    self.base_url,
                    lower.replace(' ', sep)
                )
            })
            .collect()
    }

    /// Donor data for one legislator; failures come back as an error block
    pub async fn research_donors(&self, name: &str, state: &str) -> Donors {
        info!(name, state, "researching donors");

        let url = match self.find_profile_url(name).await {
            Some(url) => url,
            None => {
                let fallback = self.profile_url_candidates(name).remove(0);
                warn!(url = %fallback, "no profile page found, using fallback");
                fallback
            }
        };

        self.scrape(&url).await
    }

    /// Probe the candidate URLs, then fall back to the site search
    pub async fn find_profile_url(&self, name: &str) -> Option<String> {
        for candidate in self.profile_url_candidates(name) {
            let found = self
                .http
                .head(&candidate)
                .timeout(Duration::from_secs(10))
                .send()
                .await
                .map(|resp| resp.status() == reqwest::StatusCode::OK)
                .unwrap_or(false);
            if found {
                info!(url = %candidate, "found profile page");
                return Some(candidate);
            }
        }

        tokio::time::sleep(self.delay).await;
        let search = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[("q", name)])
            .send()
            .await
            .ok()?
            .text()
            .await
            .ok()?;

        let href = first_contributors_link(&search)?;
        let url = if href.starts_with("http") {
            href
        } else {
            format!("{}{}", self.base_url, href)
        };
        info!(url = %url, "found profile page via search");
        Some(url)
    }

    /// Fetch one contributor page after the fixed delay
    pub async fn scrape(&self, url: &str) -> Donors {
        info!(url, "scraping");
        tokio::time::sleep(self.delay).await;

        match self.fetch(url).await {
            Ok(html) => {
                let donors = parse_contributor_tables(&html, url, &now_timestamp());
                info!(companies = donors.top_companies.len(), "parsed contributor tables");
                donors
            }
            Err(e) => {
                warn!(url, error = %e, "donor scrape failed");
                Donors {
                    error: Some(e.to_string()),
                    scraped_date: Some(now_timestamp()),
                    ..Donors::failed(url)
                }
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

fn first_contributors_link(html: &str) -> Option<String> {
    static LINK: OnceLock<Regex> = OnceLock::new();
    let link = LINK.get_or_init(|| {
        Regex::new(r#"href="([^"]*/members-of-congress/[^"]*/contributors[^"]*)""#)
            .expect("contributors link pattern is valid")
    });
    link.captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| html_escape::decode_html_entities(m.as_str()).into_owned())
}

fn table_patterns() -> &'static (Regex, Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r"(?is)<table\b.*?</table>").expect("table pattern is valid"),
            Regex::new(r"(?is)<tr\b.*?</tr>").expect("row pattern is valid"),
            Regex::new(r"(?is)<td\b[^>]*>(.*?)</td>").expect("cell pattern is valid"),
        )
    })
}

/// Rows with at least three data cells in any table become company donors
/// (name, amount, industry). The first row of each table is skipped and
/// header cells never count.
pub fn parse_contributor_tables(html: &str, source_url: &str, scraped_date: &str) -> Donors {
    let mut donors = Donors {
        data_source: "OpenSecrets".to_string(),
        source_url: source_url.to_string(),
        scraped_date: Some(scraped_date.to_string()),
        ..Donors::default()
    };

    let (table, row, cell) = table_patterns();

    for table_match in table.find_iter(html) {
        for row_match in row.find_iter(table_match.as_str()).skip(1) {
            let cells: Vec<String> = cell
                .captures_iter(row_match.as_str())
                .filter_map(|caps| caps.get(1))
                .map(|m| cell_text(m.as_str()))
                .collect();

            if cells.len() < 3 || cells[0].is_empty() || cells[1].is_empty() {
                continue;
            }

            let industry = if cells[2].is_empty() {
                "Unknown".to_string()
            } else {
                cells[2].clone()
            };

            donors.top_companies.push(CompanyDonor {
                name: cells[0].clone(),
                amount: cells[1].clone(),
                industry,
                cycle: DEFAULT_CYCLE.to_string(),
                ..CompanyDonor::default()
            });
        }
    }

    donors
}

/// Visible text of a table cell: tags removed, entities decoded, whitespace collapsed
fn cell_text(inner_html: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern is valid"));
    let without_tags = tag.replace_all(inner_html, " ");
    html_escape::decode_html_entities(&without_tags)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
<table class="DataTable">
  <thead><tr><th>Contributor</th><th>Total</th><th>Industry</th></tr></thead>
  <tbody>
    <tr><td><a href="/orgs/acme">Acme &amp; Sons</a></td><td>$12,500</td><td>Manufacturing</td></tr>
    <tr><td>Blue Cross</td><td>$9,000</td><td></td></tr>
    <tr><td>Lonely cell</td><td>$1</td></tr>
    <tr><td></td><td>$5</td><td>Empty name</td></tr>
  </tbody>
</table>
<table><tr><th>Only a header</th></tr></table>
</body></html>"#;

    #[test]
    fn rows_with_three_cells_become_company_donors() {
        let donors = parse_contributor_tables(PAGE, "https://example.org/p", "2025-01-01T00:00:00Z");

        assert_eq!(donors.data_source, "OpenSecrets");
        assert_eq!(donors.source_url, "https://example.org/p");
        assert_eq!(donors.top_companies.len(), 2);

        let acme = &donors.top_companies[0];
        assert_eq!(acme.name, "Acme & Sons");
        assert_eq!(acme.amount, "$12,500");
        assert_eq!(acme.industry, "Manufacturing");
        assert_eq!(acme.cycle, "2024");

        assert_eq!(donors.top_companies[1].industry, "Unknown");
    }

    #[test]
    fn header_rows_never_become_donors() {
        let page = r#"
<table>
  <thead>
    <tr><th colspan="3">Top Contributors, 2023-2024</th></tr>
    <tr><th>Contributor</th><th>Total</th><th>Industry</th></tr>
  </thead>
  <tbody>
    <tr><td>Acme</td><td>$4,000</td><td>Mining</td></tr>
  </tbody>
</table>"#;

        let donors = parse_contributor_tables(page, "https://example.org/p", "2025-01-01T00:00:00Z");
        let names: Vec<&str> = donors.top_companies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Acme"]);
    }

    #[test]
    fn candidate_urls_vary_the_separator() {
        let scraper = DonorScraper::new(Duration::ZERO)
            .unwrap()
            .with_base_url("https://example.org/");
        assert_eq!(
            scraper.profile_url_candidates("Katie Britt"),
            vec![
                "https://example.org/members-of-congress/katie-britt/contributors",
                "https://example.org/members-of-congress/katiebritt/contributors",
                "https://example.org/members-of-congress/katie_britt/contributors",
            ]
        );
    }

    #[test]
    fn search_results_link_to_contributors_page() {
        let html = r#"<a href="/members-of-congress/katie-britt/summary">x</a>
                      <a href="/members-of-congress/katie-britt/contributors?cid=N1&amp;cycle=2024">y</a>"#;
        assert_eq!(
            first_contributors_link(html).as_deref(),
            Some("/members-of-congress/katie-britt/contributors?cid=N1&cycle=2024")
        );
    }
}
