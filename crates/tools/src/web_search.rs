//! Web search tool.
//!
//! With an endpoint configured, queries a SearXNG-compatible JSON API
//! (`GET {endpoint}?q=...&format=json`). Without one it returns
//! deterministic placeholder results that say so, which keeps the agent
//! loop usable offline.

use async_trait::async_trait;
use codecouncil_core::error::ToolError;
use codecouncil_core::tool::{Tool, ToolResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_RESULTS: u64 = 3;
const MAX_RESULTS: u64 = 10;
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

pub struct WebSearchTool {
    endpoint: Option<String>,
    client: reqwest::Client,
}

impl WebSearchTool {
    /// Placeholder results only; never touches the network.
    pub fn offline() -> Self {
        Self {
            endpoint: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client for web search");
                reqwest::Client::new()
            });
        Self {
            endpoint: Some(endpoint.into()),
            client,
        }
    }

    async fn search_remote(
        &self,
        endpoint: &str,
        query: &str,
        count: usize,
    ) -> Result<Vec<SearchResult>, ToolError> {
        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: "web_search".into(),
            reason,
        };

        let response = self
            .client
            .get(endpoint)
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(|e| failed(format!("search request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(failed(format!(
                "search endpoint returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let body: SearxResponse = response
            .json()
            .await
            .map_err(|e| failed(format!("unreadable search response: {e}")))?;

        Ok(body
            .results
            .into_iter()
            .take(count)
            .map(|r| SearchResult {
                title: r.title,
                url: r.url,
                snippet: r.content.unwrap_or_default(),
            })
            .collect())
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for information. Returns a list of relevant results with titles, URLs, and snippets."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to execute."
                },
                "num_results": {
                    "type": "integer",
                    "description": "Number of results to return (default 3)",
                    "default": DEFAULT_RESULTS
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let count = arguments["num_results"]
            .as_u64()
            .unwrap_or(DEFAULT_RESULTS)
            .clamp(1, MAX_RESULTS) as usize;

        let (results, offline) = match &self.endpoint {
            Some(endpoint) => {
                debug!(query, endpoint = %endpoint, "Running web search");
                (self.search_remote(endpoint, query, count).await?, false)
            }
            None => (placeholder_results(query, count), true),
        };

        let output = render(query, &results, offline);
        let data = serde_json::json!({ "offline": offline, "results": results });
        Ok(ToolResult::ok(output).with_data(data))
    }
}

#[derive(Debug, Clone, Serialize)]
struct SearchResult {
    title: String,
    url: String,
    snippet: String,
}

#[derive(Debug, Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxResult>,
}

#[derive(Debug, Deserialize)]
struct SearxResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    content: Option<String>,
}

fn placeholder_results(query: &str, count: usize) -> Vec<SearchResult> {
    (1..=count)
        .map(|i| SearchResult {
            title: format!("Result {i} for: {query}"),
            url: format!("https://example.com/search?q={}&p={i}", query.replace(' ', "+")),
            snippet: format!("Placeholder information about {query}."),
        })
        .collect()
}

fn render(query: &str, results: &[SearchResult], offline: bool) -> String {
    let mut out = format!("Search results for \"{query}\":\n");
    if results.is_empty() {
        out.push_str("No results found.\n");
    }
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!("{}. {} ({})\n   {}\n", i + 1, r.title, r.url, r.snippet));
    }
    if offline {
        out.push_str("(Note: offline placeholder results; configure tools.search_endpoint for live search)");
    }
    out.trim_end().to_string()
}
