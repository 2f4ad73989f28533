use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{parameters_schema, ToolContext, ToolDefinition};
use crate::error::ToolError;

const MAX_RESULTS: usize = 5;

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct WebSearchInput {
    #[schemars(description = "The search query.")]
    query: String,
}

#[derive(Debug, Default, Deserialize)]
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

/// Either a single result or a named group of results.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Result {
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

#[derive(Debug, PartialEq)]
struct SearchHit {
    title: String,
    body: String,
    url: String,
}

/// Searches the web and returns a readable summary of the top hits.
pub(crate) async fn web_search(ctx: &ToolContext, query: &str) -> String {
    match search(ctx, query).await {
        Ok(hits) if hits.is_empty() => "No search results found.".to_string(),
        Ok(hits) => format_hits(&hits),
        Err(e) => {
            warn!(error = %e, query, "web search failed");
            format!("Error performing web search: {}", e)
        }
    }
}

async fn search(ctx: &ToolContext, query: &str) -> Result<Vec<SearchHit>, ToolError> {
    let url = reqwest::Url::parse_with_params(
        &ctx.search_url,
        &[
            ("q", query),
            ("format", "json"),
            ("no_html", "1"),
            ("skip_disambig", "1"),
        ],
    )
    .map_err(|e| ToolError::InvalidUrl(e.to_string()))?;

    debug!(query, "running web search");
    let response = ctx.http.get(url).send().await?;
    if !response.status().is_success() {
        return Err(ToolError::Status(response.status().as_u16()));
    }

    let answer: InstantAnswer = response.json().await?;
    Ok(collect_hits(answer))
}

fn collect_hits(answer: InstantAnswer) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    if !answer.abstract_text.is_empty() {
        hits.push(SearchHit {
            title: answer.heading,
            body: answer.abstract_text,
            url: answer.abstract_url,
        });
    }

    let mut pending: Vec<RelatedTopic> = answer.related_topics.into_iter().rev().collect();
    while let Some(topic) = pending.pop() {
        if hits.len() >= MAX_RESULTS {
            break;
        }
        match topic {
            RelatedTopic::Result { text, first_url } => {
                let (title, body) = match text.split_once(" - ") {
                    Some((title, body)) => (title.to_string(), body.to_string()),
                    None => (text, String::new()),
                };
                hits.push(SearchHit {
                    title,
                    body,
                    url: first_url,
                });
            }
            RelatedTopic::Group { topics } => pending.extend(topics.into_iter().rev()),
        }
    }

    hits.truncate(MAX_RESULTS);
    hits
}

fn format_hits(hits: &[SearchHit]) -> String {
    let lines: Vec<String> = hits
        .iter()
        .map(|hit| {
            if hit.body.is_empty() {
                format!("- {} ({})", hit.title, hit.url)
            } else {
                format!("- {}: {} ({})", hit.title, hit.body, hit.url)
            }
        })
        .collect();
    format!("Top Web Search Results:\n{}", lines.join("\n"))
}

async fn web_search_impl(ctx: ToolContext, input: serde_json::Value) -> String {
    match serde_json::from_value::<WebSearchInput>(input) {
        Ok(input) => web_search(&ctx, &input.query).await,
        Err(e) => format!("Error performing web search: {}", ToolError::from(e)),
    }
}

pub(crate) fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "web_search",
        description: "Search the web for current information. Returns the top results with a short summary and link for each.",
        input_schema: parameters_schema::<WebSearchInput>(),
        handler: |ctx, input| Box::pin(web_search_impl(ctx, input)),
    }
}
