//! Company news lookup backed by the Tavily search API.

use super::{required_str, Tool, ToolError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Number of search results returned to the model.
const MAX_RESULTS: usize = 5;

/// Get recent news articles and summaries for a company.
pub struct CompanyNewsTool {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: String,
    max_results: usize,
    search_depth: &'static str,
    include_answer: bool,
    include_raw_content: bool,
    include_images: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    url: String,
    #[serde(default)]
    content: String,
}

/// A single news result as handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsItem {
    pub url: String,
    pub content: String,
}

impl CompanyNewsTool {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    pub async fn search(&self, company_name: &str) -> Result<Vec<NewsItem>, ToolError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ToolError::MissingApiKey("TAVILY_API_KEY"))?;

        let request = SearchRequest {
            api_key,
            query: format!("latest news about {}", company_name),
            max_results: MAX_RESULTS,
            search_depth: "advanced",
            include_answer: false,
            include_raw_content: false,
            include_images: false,
        };

        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Upstream {
                service: "Tavily",
                status,
                body,
            });
        }

        let search: SearchResponse = response.json().await?;
        debug!("Tavily returned {} results", search.results.len());

        Ok(search
            .results
            .into_iter()
            .take(MAX_RESULTS)
            .map(|hit| NewsItem {
                url: hit.url,
                content: hit.content,
            })
            .collect())
    }
}

#[async_trait]
impl Tool for CompanyNewsTool {
    fn name(&self) -> &str {
        "get_recent_company_news"
    }

    fn description(&self) -> &str {
        "Get recent news articles and summaries for a given company name using the Tavily search engine."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "company_name": {
                    "type": "string",
                    "description": "Company name, e.g. NVIDIA"
                }
            },
            "required": ["company_name"]
        })
    }

    async fn call(&self, args: &Value) -> Result<Value, ToolError> {
        let company_name = required_str(args, "company_name")?;
        info!(
            "--- [Tool Call] Executing get_recent_company_news for: {} ---",
            company_name
        );

        let items = self.search(company_name).await?;
        Ok(json!(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::spawn_mock;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};

    async fn search(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        if body["api_key"] != "test-key" {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"detail": {"error": "Unauthorized"}})),
            );
        }
        let results: Vec<Value> = (0..7)
            .map(|i| {
                json!({
                    "title": format!("Story {}", i),
                    "url": format!("http://example.com/{}", i),
                    "content": body["query"],
                    "score": 0.9
                })
            })
            .collect();
        (StatusCode::OK, Json(json!({"results": results})))
    }

    async fn base_url() -> String {
        spawn_mock(Router::new().route("/search", post(search))).await
    }

    #[tokio::test]
    async fn test_returns_url_and_content() {
        let tool = CompanyNewsTool::new(
            reqwest::Client::new(),
            base_url().await,
            Some("test-key".to_string()),
        );

        let result = tool.call(&json!({"company_name": "Apple"})).await.unwrap();
        let items = result.as_array().unwrap();

        assert_eq!(items.len(), MAX_RESULTS);
        assert_eq!(items[0]["url"], "http://example.com/0");
        assert_eq!(items[0]["content"], "latest news about Apple");
        assert!(items[0].get("title").is_none());
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let tool = CompanyNewsTool::new(reqwest::Client::new(), base_url().await, None);
        let err = tool
            .call(&json!({"company_name": "Apple"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::MissingApiKey("TAVILY_API_KEY")));
    }

    #[tokio::test]
    async fn test_rejected_key_is_upstream_error() {
        let tool = CompanyNewsTool::new(
            reqwest::Client::new(),
            base_url().await,
            Some("wrong".to_string()),
        );
        let err = tool
            .call(&json!({"company_name": "Apple"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Upstream { status: 401, .. }));
    }
}
