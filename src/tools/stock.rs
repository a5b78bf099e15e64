//! Stock price lookup backed by the Yahoo Finance chart endpoint.

use super::{required_str, Tool, ToolError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Get the current stock price for a given stock symbol.
pub struct StockPriceTool {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: QuoteMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteMeta {
    regular_market_price: Option<f64>,
    current_price: Option<f64>,
}

impl StockPriceTool {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Fetch the price, `None` when Yahoo has no quote for the symbol.
    async fn fetch_price(&self, symbol: &str) -> Result<Option<f64>, ToolError> {
        // The symbol is model-provided; push it as one escaped path segment
        // so characters like `#`, `?` or `/` cannot reshape the request.
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ToolError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ToolError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);

        let response = self
            .client
            .get(url)
            .query(&[("interval", "1d"), ("range", "1d")])
            .send()
            .await?;

        // Unknown symbols come back as 404 with a chart error body.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Upstream {
                service: "Yahoo Finance",
                status,
                body,
            });
        }

        let chart: ChartResponse = response.json().await?;
        let price = chart
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .and_then(|r| r.meta.regular_market_price.or(r.meta.current_price));

        debug!("Yahoo price for {}: {:?}", symbol, price);
        Ok(price)
    }
}

#[async_trait]
impl Tool for StockPriceTool {
    fn name(&self) -> &str {
        "get_stock_price"
    }

    fn description(&self) -> &str {
        "Get the current stock price for a given stock symbol using Yahoo Finance."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "symbol": {
                    "type": "string",
                    "description": "Ticker symbol, e.g. NVDA"
                }
            },
            "required": ["symbol"]
        })
    }

    async fn call(&self, args: &Value) -> Result<Value, ToolError> {
        let symbol = required_str(args, "symbol")?.trim();
        info!("--- [Tool Call] Executing get_stock_price for symbol: {} ---", symbol);

        match self.fetch_price(&symbol.to_uppercase()).await? {
            Some(price) => Ok(json!(price)),
            None => Ok(json!(format!("Could not find price for symbol {}", symbol))),
        }
    }
}
