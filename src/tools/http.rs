//! OpenAI 兼容端点的 JSON POST（web search / 图片生成使用；chat 走 async_openai）

use std::time::Instant;

use reqwest::header::HeaderMap;
use reqwest::Client;
use serde_json::Value;

use crate::core::ToolError;

/// POST JSON 并解析 JSON 响应；非 2xx 时带上状态码与响应体
pub(crate) async fn post_json(
    client: &Client,
    url: &str,
    headers: HeaderMap,
    body: &Value,
    label: &str,
) -> Result<Value, ToolError> {
    let started = Instant::now();
    tracing::debug!(label, url, "POST");

    let res = client
        .post(url)
        .headers(headers)
        .json(body)
        .send()
        .await
        .map_err(|e| {
            tracing::error!(label, url, error = %e, "request failed");
            ToolError::from(e)
        })?;

    let status = res.status();
    let duration_ms = started.elapsed().as_millis() as u64;
    if !status.is_success() {
        let text = res.text().await.unwrap_or_default();
        tracing::error!(label, status = status.as_u16(), body = %text, duration_ms, "request rejected");
        return Err(ToolError::Api {
            status: status.as_u16(),
            body: text,
        });
    }

    tracing::debug!(label, status = status.as_u16(), duration_ms, "request ok");
    res.json::<Value>()
        .await
        .map_err(|e| ToolError::InvalidResponse(e.to_string()))
}

/// `Authorization: Bearer <key>`
pub(crate) fn bearer_headers(api_key: &str) -> Result<HeaderMap, ToolError> {
    let mut headers = HeaderMap::new();
    let value = format!("Bearer {api_key}")
        .parse()
        .map_err(|_| ToolError::NotConfigured("API key contains invalid header characters".into()))?;
    headers.insert(reqwest::header::AUTHORIZATION, value);
    Ok(headers)
}
