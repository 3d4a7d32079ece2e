//! 意图路由
//!
//! 有图片时直接走 image_understand（不调用模型）；否则请求路由模型输出 JSON 意图列表。
//! 坏 JSON 与未知意图就地降级为 `[chat]`；网络/API 失败向上抛出。

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use super::plan::parse_intents;
use super::{Intent, Plan};
use crate::core::AgentError;
use crate::llm::{CompletionRequest, LlmClient};
use crate::memory::Message;
use crate::prompts::ROUTER_PROMPT;

/// 路由结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteResult {
    pub intents: Vec<Intent>,
    /// 模型返回（解析后）的原始载荷
    pub raw: Value,
    /// 路由模型名；`heuristic` / `manual` 表示未调用模型
    pub model: String,
    /// 耗时（毫秒）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl RouteResult {
    /// 带图片请求的短路结果
    pub fn heuristic_image() -> Self {
        Self {
            intents: vec![Intent::ImageUnderstand],
            raw: json!({ "intents": "image_understand" }),
            model: "heuristic".to_string(),
            duration: None,
        }
    }

    /// 调用方显式指定意图时合成的结果
    pub fn manual(plan: &Plan) -> Self {
        Self {
            intents: plan.to_vec(),
            raw: json!({ "intents": plan, "mode": "manual" }),
            model: "manual".to_string(),
            duration: Some(0),
        }
    }
}

/// 解析失败时退化为空对象；先尝试整体解析，再尝试截取首个 `{` 到最后一个 `}`
pub(crate) fn safe_json_parse(text: &str) -> Value {
    let trimmed = text.trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return v;
    }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(v) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                return v;
            }
        }
    }
    Value::Object(Map::new())
}

/// 从 `{intents: [...]}` 或 `{intent: "..."}` 提取意图；白名单过滤，空则 `[chat]`
pub fn intents_from_payload(payload: &Value) -> Vec<Intent> {
    let names: Vec<&str> = match payload.get("intents") {
        Some(Value::Array(items)) if !items.is_empty() => {
            items.iter().filter_map(Value::as_str).collect()
        }
        Some(Value::String(s)) => vec![s.as_str()],
        _ => payload
            .get("intent")
            .and_then(Value::as_str)
            .into_iter()
            .collect(),
    };
    let intents = parse_intents(names);
    if intents.is_empty() {
        vec![Intent::Chat]
    } else {
        intents
    }
}

/// 路由器：持有路由模型客户端与 system prompt
pub struct Router {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl Router {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            system_prompt: ROUTER_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub async fn route(
        &self,
        input: &str,
        has_image: bool,
        cancel: &CancellationToken,
    ) -> Result<RouteResult, AgentError> {
        if has_image {
            return Ok(RouteResult::heuristic_image());
        }

        let model = self.llm.model().to_string();
        let started = Instant::now();
        tracing::debug!(model = %model, provider = self.llm.provider(), "Router.route:start");

        let request = CompletionRequest::new(vec![
            Message::system(self.system_prompt.clone()),
            Message::user(input),
        ])
        .with_temperature(0.0)
        .json();

        let completion = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(model = %model, "Router.route:cancelled");
                return Err(AgentError::Cancelled { context: None });
            }
            r = self.llm.complete(request) => r,
        };

        let text = completion.map_err(|e| {
            tracing::error!(model = %model, error = %e, "Router.route:error");
            AgentError::Routing(e)
        })?;

        let duration = started.elapsed().as_millis() as u64;
        tracing::debug!(model = %model, duration_ms = duration, "Router.route:success");

        let raw = safe_json_parse(if text.trim().is_empty() { "{}" } else { &text });
        let intents = intents_from_payload(&raw);
        Ok(RouteResult {
            intents,
            raw,
            model,
            duration: Some(duration),
        })
    }
}
