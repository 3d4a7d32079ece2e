//! WebSearchTool：调用 OpenAI Responses API 的 web_search_preview 内置工具
//!
//! 文本优先取 `output_text`，缺失时拼接 output[].content[].text；raw 中附带 query 与抓取时间。

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::RuntimeAuth;
use crate::core::ToolError;
use crate::tools::http::{bearer_headers, post_json};
use crate::tools::{ToolResult, WebSearchTool};

pub struct OpenAiWebSearchTool {
    client: Client,
    auth: RuntimeAuth,
}

impl OpenAiWebSearchTool {
    pub fn new(auth: RuntimeAuth) -> Self {
        Self {
            client: Client::new(),
            auth,
        }
    }
}

/// 从 Responses API 结果中提取文本
pub(crate) fn extract_output_text(response: &Value) -> Option<String> {
    if let Some(text) = response.get("output_text").and_then(Value::as_str) {
        if !text.is_empty() {
            return Some(text.to_string());
        }
    }
    let parts: Vec<&str> = response
        .get("output")
        .and_then(Value::as_array)?
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter_map(|c| c.get("text").and_then(Value::as_str))
        .collect();
    (!parts.is_empty()).then(|| parts.join("\n"))
}

#[async_trait]
impl WebSearchTool for OpenAiWebSearchTool {
    async fn search(&self, input: &str) -> Result<ToolResult, ToolError> {
        self.auth
            .ensure_complete()
            .map_err(ToolError::NotConfigured)?;

        let model = &self.auth.model_name;
        let started = Instant::now();
        tracing::debug!(model = %model, provider = %self.auth.provider, "WebSearchTool.search:start");

        let body = json!({
            "model": model,
            "tools": [{ "type": "web_search_preview" }],
            "input": input,
        });
        let url = format!("{}/responses", self.auth.base_url);
        let response = post_json(
            &self.client,
            &url,
            bearer_headers(&self.auth.api_key)?,
            &body,
            "webSearch",
        )
        .await
        .map_err(|e| {
            tracing::error!(model = %model, error = %e, "WebSearchTool.search:error");
            e
        })?;

        tracing::debug!(
            model = %model,
            duration_ms = started.elapsed().as_millis() as u64,
            "WebSearchTool.search:success"
        );

        let text = extract_output_text(&response).unwrap_or_default();
        Ok(ToolResult::text(
            text.clone(),
            json!({
                "query": input,
                "output_text": text,
                "response": response,
                "fetched_at": chrono::Utc::now().to_rfc3339(),
            }),
        ))
    }
}
