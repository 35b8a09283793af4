//! AI-generated journal summaries, related-journal suggestions and APC lookups.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{instrument, warn};

use crate::catalog::{Catalog, Journal, MAX_MINOR_CATEGORIES};

pub mod client;

pub use client::GenAiClient;

/// Related journals kept from a summary response.
pub const MAX_RELATED: usize = 5;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid AI endpoint: {0}")]
    Endpoint(String),
    #[error("rate limited by the AI service: {0}")]
    RateLimited(String),
    #[error("AI service error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected AI response: {0}")]
    Response(String),
    #[error("AI response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Output language of generated text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl Locale {
    pub fn language(&self) -> &'static str {
        match self {
            Locale::En => "English",
            Locale::Zh => "Simplified Chinese",
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "en-us" | "english" => Ok(Locale::En),
            "zh" | "zh-cn" | "chinese" => Ok(Locale::Zh),
            other => Err(format!("unsupported locale '{}'", other)),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Locale::En => "en",
            Locale::Zh => "zh",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedJournal {
    #[serde(rename = "journalName")]
    pub name: String,
    #[serde(default)]
    pub issn: String,
}

/// Article processing charge as reported by the AI service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApcInfo {
    /// e.g. `$2500`, or `Not found`.
    pub apc: String,
    #[serde(default)]
    pub apc_url: String,
}

impl ApcInfo {
    pub fn is_found(&self) -> bool {
        let apc = self.apc.trim();
        !apc.is_empty() && !apc.eq_ignore_ascii_case("not found")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalSummary {
    pub text: String,
    pub related: Vec<RelatedJournal>,
    pub apc: Option<ApcInfo>,
}

#[async_trait]
pub trait SummaryService: Send + Sync {
    /// Summary text plus related-journal suggestions; `apc` is left empty.
    async fn summarize(&self, journal: &Journal, locale: Locale) -> Result<JournalSummary, SummaryError>;

    async fn find_apc(&self, journal: &Journal) -> Result<ApcInfo, SummaryError>;
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

pub fn build_summary_prompt(journal: &Journal, locale: Locale) -> String {
    let mut prompt = String::from(
        "You are an expert at summarizing journal information.\n\n\
         Based on the provided journal information, create a concise summary highlighting \
         key metrics such as impact factor, category rankings, and authority level. \
         Focus on the journal's significance and importance in its field. \
         Also suggest up to 5 related journals in the same field.\n\n",
    );

    let fields = [
        ("Journal Name", journal.name.clone()),
        ("Year", journal.year.to_string()),
        ("ISSN/EISSN", journal.issn.clone()),
        ("Review", yes_no(journal.review).to_string()),
        ("OA Journal Index (OAJ)", yes_no(journal.oaj).to_string()),
        ("Open Access", yes_no(journal.open_access).to_string()),
        ("Web of Science", journal.web_of_science.clone()),
        ("Impact Factor", journal.impact_factor.display()),
        ("Annotation", journal.annotation.clone()),
        ("Major Category", journal.major_category.clone()),
        (
            "Major Category Partition",
            journal.major_category_partition.clone(),
        ),
        ("Top", yes_no(journal.top).to_string()),
        (
            "Authority Journal",
            journal.authority.label().unwrap_or_default().to_string(),
        ),
    ];
    for (label, value) in fields {
        prompt.push_str(&format!("{}: {}\n", label, value));
    }
    for i in 0..MAX_MINOR_CATEGORIES {
        let minor = journal.minor_categories.get(i);
        prompt.push_str(&format!(
            "Minor Category {n}: {}\nMinor Category {n} Partition: {}\n",
            minor.map(|c| c.name.as_str()).unwrap_or_default(),
            minor.map(|c| c.partition.as_str()).unwrap_or_default(),
            n = i + 1,
        ));
    }
    prompt.push_str(&format!(
        "\nWrite the summary in {}. Respond with JSON of the form \
         {{\"summary\": string, \"relatedJournals\": [{{\"journalName\": string, \"issn\": string}}]}}.\n",
        locale.language()
    ));
    prompt
}

pub fn build_apc_prompt(journal: &Journal) -> String {
    format!(
        "You are an expert academic research assistant.\n\
         Find the Article Processing Charge (APC) for a \"Regular Paper\" or \"Research Article\" \
         in the journal below.\n\n\
         Journal Name: {name}\n\n\
         1. Based on your knowledge, find the most recent APC for the journal.\n\
         2. The APC should be in USD, for example \"$3000\".\n\
         3. If you cannot find the APC with high confidence, set \"apc\" to \"Not found\".\n\
         4. Always put a Google search URL for \"{name} article processing charge\" in \"apcUrl\".\n\n\
         Respond with JSON of the form {{\"apc\": string, \"apcUrl\": string}}.\n",
        name = journal.name
    )
}

/// Run the summary and, for open-access journals, the APC lookup concurrently.
/// A failed APC lookup leaves `apc` empty; a failed summary is returned as is.
#[instrument(skip_all, fields(journal = %journal.name, %locale))]
pub async fn summarize_with_apc(
    service: &dyn SummaryService,
    journal: &Journal,
    locale: Locale,
) -> Result<JournalSummary, SummaryError> {
    let apc = async {
        if !journal.open_access {
            return None;
        }
        match service.find_apc(journal).await {
            Ok(info) => Some(info),
            Err(err) => {
                warn!(%err, "APC lookup failed");
                None
            }
        }
    };
    let (summary, apc) = futures::join!(service.summarize(journal, locale), apc);
    let mut summary = summary?;
    summary.related.truncate(MAX_RELATED);
    summary.apc = apc;
    Ok(summary)
}

/// Pair each suggestion with the catalog record it names, by ISSN first, then name.
pub fn resolve_related<'a>(
    catalog: &'a Catalog,
    related: &[RelatedJournal],
) -> Vec<(RelatedJournal, Option<&'a Journal>)> {
    related
        .iter()
        .map(|r| {
            let hit = r
                .issn
                .split('/')
                .find_map(|code| catalog.by_issn(code))
                .or_else(|| catalog.by_name(&r.name));
            (r.clone(), hit)
        })
        .collect()
}
