//! Agent 门面
//!
//! 单一入口 `Agent::handle`：解析图片输入，驱动 Router → Executor（调用方显式指定意图时跳过路由），
//! 再把执行上下文整理成面向 UI 的 AgentOutput（路由摘要、计划描述、逐步输出、答案、图片）。

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{AppConfig, ModelRole};
use crate::core::AgentError;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};
use crate::memory::HistoryMessage;
use crate::pipeline::events::send_event;
use crate::pipeline::plan::step_id;
use crate::pipeline::{
    collect_images, extract_inline_images, normalize, parse_image_input, pick_final_answer,
    ExecutionRequest, Executor, Intent, PlanStep, ProgressEvent, ProgressSender, RawImage,
    RouteResult, Router, ToolRunOutput,
};
use crate::prompts::{load_prompt, REASONING_PROMPT, ROUTER_PROMPT};
use crate::tools::{
    LlmChatTool, LlmReasoningTool, OpenAiImageTool, OpenAiWebSearchTool, Toolbox,
};

/// 单次请求
#[derive(Debug, Clone, Default)]
pub struct AgentRequest {
    pub text: String,
    pub image: Option<RawImage>,
    /// 非空时跳过路由，直接按此执行
    pub intents: Option<Vec<Intent>>,
    pub history: Vec<HistoryMessage>,
    pub progress: Option<ProgressSender>,
    pub cancel: CancellationToken,
}

impl AgentRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_image(mut self, image: impl Into<RawImage>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_intents(mut self, intents: Vec<Intent>) -> Self {
        self.intents = Some(intents);
        self
    }

    pub fn with_history(mut self, history: Vec<HistoryMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedIntent {
    pub name: Intent,
    /// 占位，固定为 1.0
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingSummary {
    pub intents: Vec<RoutedIntent>,
    /// 路由模型名；`heuristic` / `manual` 表示未调用模型
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Fail,
}

/// 面向 UI 的单步记录；data 为成功时的原始输出，便于调试展示
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    pub step_id: String,
    pub tool: Intent,
    pub status: ToolStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    pub data: Option<ToolRunOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutput {
    fn from_run(index: usize, output: &ToolRunOutput) -> Self {
        let (status, data, error) = match output {
            ToolRunOutput::Success { .. } => (ToolStatus::Success, Some(output.clone()), None),
            ToolRunOutput::Failure { error, .. } => (ToolStatus::Fail, None, Some(error.clone())),
        };
        Self {
            step_id: step_id(index),
            tool: output.step(),
            status,
            duration: output.duration(),
            data,
            error,
        }
    }
}

/// 最终输出
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentOutput {
    pub routing: RoutingSummary,
    pub plan: Vec<PlanStep>,
    pub tool_outputs: Vec<ToolOutput>,
    /// 剥离内联图片后的答案；没有可用文本时为空串
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

/// 门面：一个路由器 + 一个执行器，可跨请求复用
pub struct Agent {
    router: Router,
    executor: Executor,
}

impl Agent {
    pub fn new(router: Router, executor: Executor) -> Self {
        Self { router, executor }
    }

    /// 按角色配置装配路由模型与四类工具；缺少 API Key 的文本角色退化为 Mock LLM
    pub fn from_config(cfg: &AppConfig) -> Self {
        let routing = llm_for_role(cfg, ModelRole::Routing);
        let chat = llm_for_role(cfg, ModelRole::Chat);
        let reasoning = llm_for_role(cfg, ModelRole::Reasoning);
        let vision = llm_for_role(cfg, ModelRole::Vision);

        let tools = Toolbox::new()
            .with_chat(Arc::new(LlmChatTool::new(chat)))
            .with_reasoning(Arc::new(
                LlmReasoningTool::new(reasoning)
                    .with_system_prompt(load_prompt("reasoning", REASONING_PROMPT)),
            ))
            .with_web_search(Arc::new(OpenAiWebSearchTool::new(
                cfg.resolve_auth(ModelRole::WebSearch),
            )))
            .with_image(Arc::new(OpenAiImageTool::new(
                cfg.resolve_auth(ModelRole::Image),
                cfg.image.clone(),
                vision,
            )));

        let executor = Executor::new(tools)
            .with_failure_policy(cfg.executor.failure_policy)
            .with_step_timeout(cfg.executor.step_timeout())
            .with_image_size(cfg.image.size.clone());
        let router = Router::new(routing).with_system_prompt(load_prompt("router", ROUTER_PROMPT));

        Self::new(router, executor)
    }

    pub async fn handle(&self, request: AgentRequest) -> Result<AgentOutput, AgentError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("agent", run_id = %run_id);
        self.handle_inner(request).instrument(span).await
    }

    async fn handle_inner(&self, request: AgentRequest) -> Result<AgentOutput, AgentError> {
        let AgentRequest {
            text,
            image,
            intents,
            history,
            progress,
            cancel,
        } = request;
        let tx = progress.as_ref();
        let image = parse_image_input(image.as_ref());

        let routing = match intents.filter(|i| !i.is_empty()) {
            Some(pinned) => {
                let plan = normalize(&pinned);
                tracing::info!(intents = ?plan.intents(), "manual route");
                RouteResult::manual(&plan)
            }
            None => {
                send_event(tx, ProgressEvent::RouteStart);
                let routing = self.router.route(&text, image.is_some(), &cancel).await?;
                tracing::info!(intents = ?routing.intents, model = %routing.model, "routed");
                send_event(
                    tx,
                    ProgressEvent::RouteComplete {
                        intents: routing.intents.clone(),
                    },
                );
                routing
            }
        };

        let context = self
            .executor
            .run(
                ExecutionRequest::new(&text, &routing.intents)
                    .with_image(image)
                    .with_history(&history)
                    .with_progress(tx)
                    .with_cancel(cancel),
            )
            .await?;

        let answer = pick_final_answer(&context.outputs);
        let inline = extract_inline_images(&answer);
        let mut images = collect_images(&context.outputs);
        images.extend(inline.images);

        Ok(AgentOutput {
            routing: RoutingSummary {
                intents: routing
                    .intents
                    .iter()
                    .map(|&name| RoutedIntent {
                        name,
                        confidence: 1.0,
                    })
                    .collect(),
                model: routing.model,
                duration: routing.duration,
            },
            plan: context.plan.describe(),
            tool_outputs: context
                .outputs
                .iter()
                .enumerate()
                .map(|(index, output)| ToolOutput::from_run(index, output))
                .collect(),
            answer: inline.cleaned,
            images: (!images.is_empty()).then_some(images),
        })
    }
}

fn llm_for_role(cfg: &AppConfig, role: ModelRole) -> Arc<dyn LlmClient> {
    let auth = cfg.resolve_auth(role);
    match OpenAiClient::from_auth(&auth) {
        Ok(client) => {
            tracing::info!(role = %role, model = %auth.model_name, "Using OpenAI-compatible LLM");
            Arc::new(client)
        }
        Err(e) => {
            tracing::warn!(role = %role, error = %e, "Using Mock LLM");
            Arc::new(MockLlmClient::new())
        }
    }
}
