//! Research prompt rendering. Pure string templating, no I/O.

use crate::types::Subject;

/// Which kind of request the prompt accompanies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStyle {
    /// Model answers from its own knowledge
    Knowledge,
    /// Model has the web search tool attached
    WebSearch,
}

impl PromptStyle {
    pub fn research_type(&self) -> &'static str {
        match self {
            PromptStyle::Knowledge => "knowledge",
            PromptStyle::WebSearch => "web_search",
        }
    }
}

/// Render the request for `subject`.
///
/// `attempt` is zero-based; every attempt after the first carries an extra
/// demand for bare JSON.
pub fn build_prompt(subject: &Subject, style: PromptStyle, timestamp: &str, attempt: u32) -> String {
    let mut prompt = match style {
        PromptStyle::Knowledge => knowledge_intro(subject),
        PromptStyle::WebSearch => web_search_intro(subject),
    };

    prompt.push_str("\n\nOutput ONLY valid JSON in this exact structure:\n");
    prompt.push_str(&output_schema(subject, timestamp));
    prompt.push_str(
        "\n\nIMPORTANT: Output ONLY valid JSON. Do not include any explanatory text, markdown \
         formatting, or code blocks. The response should be a single JSON object that can be \
         parsed directly.",
    );

    if attempt > 0 {
        prompt.push_str(&format!(
            "\n\nRETRY ATTEMPT {}: Please ensure you output ONLY valid JSON without any markdown \
             formatting, code blocks, or explanatory text.",
            attempt + 1
        ));
    }

    prompt
}

fn describe(subject: &Subject) -> String {
    let mut line = format!(
        "{}, a {} {} legislator from {}",
        subject.name, subject.party, subject.chamber, subject.jurisdiction
    );
    if !subject.district.is_empty() {
        line.push_str(&format!(" district {}", subject.district));
    }
    line
}

fn knowledge_intro(subject: &Subject) -> String {
    format!(
        "Research {}.\n\n\
         Based on your knowledge, provide information about their campaign issues and donor \
         information.\n\n\
         For donors, include both corporate AND ideological/single-issue donors (PACs, advocacy \
         groups, etc.).",
        describe(subject)
    )
}

fn web_search_intro(subject: &Subject) -> String {
    format!(
        "Research {}.\n\n\
         You have access to web search tools. Use them to find accurate information about:\n\n\
         1. POLICY ISSUES: campaign positions, voting record and policy stances across major \
         areas.\n\
         2. DONOR INFORMATION: search OpenSecrets.org, FEC.gov and state campaign finance \
         databases for top corporate donors with amounts, industry breakdowns with percentages, \
         PAC and ideological donors, and individual donors for recent election cycles.\n\n\
         Prefer specific dollar amounts and names from official sources over estimates, and \
         include the source URL for the donor data.",
        describe(subject)
    )
}

fn output_schema(subject: &Subject, timestamp: &str) -> String {
    let skeleton = serde_json::json!({
        "legislator_id": subject.id,
        "name": subject.name,
        "state": subject.jurisdiction,
        "last_updated": timestamp,
        "issues": [{
            "title": "Issue Title",
            "description": "Their specific stance or position",
            "category": "Policy category (healthcare, education, etc.)",
            "source": "URL or source of information"
        }],
        "donors": {
            "top_companies": [{
                "name": "Company/Organization Name",
                "amount": "Dollar amount or range if available",
                "industry": "Industry classification",
                "cycle": "Election cycle (e.g., 2024, 2022)"
            }],
            "top_industries": [{
                "industry": "Industry Name",
                "total_amount": "Total contributions if available",
                "percentage": "Percentage of total if available"
            }],
            "ideological_donors": [{
                "name": "PAC/Advocacy group name",
                "amount": "Dollar amount or range if available",
                "ideology": "Conservative/Liberal/Single-issue description",
                "issue_focus": "Specific issue they advocate for",
                "cycle": "Election cycle"
            }],
            "individual_donors": [{
                "name": "Individual donor name",
                "amount": "Amount if available",
                "occupation": "Occupation if available"
            }],
            "data_source": "Source of donor information (OpenSecrets, FEC, state records, etc.)",
            "source_url": "URL to donor database or records"
        },
        "sources": ["List of primary sources used for this research"]
    });

    serde_json::to_string_pretty(&skeleton).unwrap_or_else(|_| skeleton.to_string())
}
