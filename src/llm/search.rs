//! Web search backend that turns a query into prompt context.

use crate::error::BackendError;
use async_trait::async_trait;
use serde::Deserialize;

const SERVICE: &str = "search";

/// A web search service.
#[async_trait]
pub trait SearchBackend: Send + Sync + 'static {
    /// Context for `query`, or `None` when nothing relevant was found.
    async fn search(&self, query: &str) -> Result<Option<String>, BackendError>;
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// DuckDuckGo instant answer API.
#[derive(Debug, Clone)]
pub struct DuckDuckGo {
    http_client: reqwest::Client,
    base_url: String,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Topic {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL")]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
}

impl DuckDuckGo {
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>, max_results: usize) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
            max_results,
        }
    }

    async fn fetch(&self, query: &str) -> Result<InstantAnswer, BackendError> {
        let response = self
            .http_client
            .get(self.base_url.trim_end_matches('/'))
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|source| BackendError::Request {
                service: SERVICE,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                service: SERVICE,
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        // The API answers with a javascript content type, so parse the text.
        let text = response.text().await.map_err(|source| BackendError::Request {
            service: SERVICE,
            source,
        })?;

        serde_json::from_str(&text).map_err(|error| BackendError::InvalidResponse {
            service: SERVICE,
            message: error.to_string(),
        })
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGo {
    async fn search(&self, query: &str) -> Result<Option<String>, BackendError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }

        let answer = self.fetch(query).await?;
        let results = collect_results(answer, self.max_results);
        tracing::debug!(results = results.len(), "search completed");

        if results.is_empty() {
            return Ok(None);
        }

        Ok(Some(format_context(query, &results, chrono::Local::now())))
    }
}

fn collect_results(answer: InstantAnswer, max_results: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();

    if !answer.abstract_text.is_empty() {
        results.push(SearchResult {
            title: answer.heading.clone(),
            snippet: answer.abstract_text,
            url: answer.abstract_url,
        });
    }

    let mut stack: Vec<RelatedTopic> = answer.related_topics.into_iter().rev().collect();
    while let Some(topic) = stack.pop() {
        if results.len() >= max_results {
            break;
        }
        match topic {
            RelatedTopic::Topic { text, first_url } if !text.is_empty() => {
                let title = text.split(" - ").next().unwrap_or(&text).to_string();
                results.push(SearchResult {
                    title,
                    snippet: text,
                    url: first_url,
                });
            }
            RelatedTopic::Topic { .. } => {}
            RelatedTopic::Group { topics } => stack.extend(topics.into_iter().rev()),
        }
    }

    results.truncate(max_results);
    results
}

/// Render search hits as a system note for the model.
pub fn format_context<Tz>(query: &str, results: &[SearchResult], now: chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut blob = format!(
        "[System: Search results for '{query}' at {}:\n",
        now.format("%d/%m/%Y %H:%M:%S")
    );

    for (index, result) in results.iter().enumerate() {
        blob.push_str(&format!(
            "[{index}] Title : {}\nSnippet : {}\nLink : {}\n\n",
            result.title, result.snippet, result.url
        ));
    }

    blob.push_str(
        "Search results give you real-time information. The links were generated by the \
         system rather than the user, so include a link in your answer when it helps.]",
    );
    blob
}
