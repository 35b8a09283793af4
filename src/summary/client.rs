use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{
    build_apc_prompt, build_summary_prompt, ApcInfo, JournalSummary, Locale, RelatedJournal,
    SummaryError, SummaryService, MAX_RELATED,
};
use crate::catalog::Journal;
use crate::config;

/// Client for the `generateContent` endpoint of the generative-language API.
#[derive(Clone)]
pub struct GenAiClient {
    http: Client,
    base_url: Url,
    api_key: String,
    model: String,
}

impl fmt::Debug for GenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenAiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryPayload {
    summary: String,
    #[serde(default)]
    related_journals: Vec<RelatedJournal>,
}

/// Text of the first candidate, with any markdown code fence stripped.
pub fn candidate_text(body: &str) -> Result<String, SummaryError> {
    let parsed: GenerateResponse = serde_json::from_str(body)?;
    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .ok_or_else(|| SummaryError::Response("no candidates in response".into()))?;
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|t| t.strip_suffix("```"))
        .unwrap_or(trimmed);
    Ok(unfenced.trim().to_string())
}

pub fn parse_summary(body: &str) -> Result<JournalSummary, SummaryError> {
    let payload: SummaryPayload = serde_json::from_str(&candidate_text(body)?)?;
    let mut related = payload.related_journals;
    related.truncate(MAX_RELATED);
    Ok(JournalSummary {
        text: payload.summary,
        related,
        apc: None,
    })
}

pub fn parse_apc(body: &str) -> Result<ApcInfo, SummaryError> {
    Ok(serde_json::from_str(&candidate_text(body)?)?)
}

impl GenAiClient {
    pub fn from_config(ai: &config::Ai, api_key: String) -> Result<Self, SummaryError> {
        let base_url = Url::parse(&ai.base_url).map_err(|e| SummaryError::Endpoint(e.to_string()))?;
        Self::with_base_url(
            api_key,
            ai.model.clone(),
            base_url,
            Duration::from_secs(ai.timeout_seconds),
        )
    }

    pub fn with_base_url(
        api_key: String,
        model: String,
        base_url: Url,
        timeout: Duration,
    ) -> Result<Self, SummaryError> {
        let http = Client::builder()
            .user_agent(concat!("journal-shelf/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url,
            api_key,
            model,
        })
    }

    pub fn build_request(&self, prompt: &str) -> Result<reqwest::Request, SummaryError> {
        let endpoint = self
            .base_url
            .join(&format!("v1beta/models/{}:generateContent", self.model))
            .map_err(|e| SummaryError::Endpoint(e.to_string()))?;
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "responseMimeType": "application/json" }
        });
        Ok(self
            .http
            .post(endpoint)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .build()?)
    }

    async fn generate(&self, prompt: &str) -> Result<String, SummaryError> {
        let request = self.build_request(prompt)?;
        debug!(url = %request.url(), "calling AI service");
        let res = self.http.execute(request).await?;

        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            warn!("rate limited by AI service");
            return Err(SummaryError::RateLimited(body));
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "AI service error");
            return Err(SummaryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(res.text().await?)
    }
}

#[async_trait]
impl SummaryService for GenAiClient {
    #[instrument(skip_all, fields(journal = %journal.name))]
    async fn summarize(&self, journal: &Journal, locale: Locale) -> Result<JournalSummary, SummaryError> {
        let body = self.generate(&build_summary_prompt(journal, locale)).await?;
        parse_summary(&body)
    }

    #[instrument(skip_all, fields(journal = %journal.name))]
    async fn find_apc(&self, journal: &Journal) -> Result<ApcInfo, SummaryError> {
        let body = self.generate(&build_apc_prompt(journal)).await?;
        parse_apc(&body)
    }
}
