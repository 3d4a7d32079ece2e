//! 计划执行器
//!
//! 按计划顺序逐步调用工具（严格串行），每一步发送 step:start / step:complete | step:error，
//! 并记录耗时；先前 webSearch 的文本作为后续 chat / reasoning 的上下文。
//! 失败策略：Abort（默认，首个失败即中止并抛出）或 Continue（记录后继续）。
//! 单步超时与取消令牌在每个挂起点生效；取消总是中止。

use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::events::send_event;
use super::plan::normalize;
use super::{ImageInput, Intent, Plan, ProgressEvent, ProgressSender};
use crate::config::FailurePolicy;
use crate::core::{AgentError, ToolError};
use crate::memory::HistoryMessage;
use crate::tools::{ToolResult, Toolbox};

/// 单步执行记录
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolRunOutput {
    Success {
        step: Intent,
        result: ToolResult,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration: Option<u64>,
    },
    Failure {
        step: Intent,
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration: Option<u64>,
    },
}

impl ToolRunOutput {
    pub fn step(&self) -> Intent {
        match self {
            ToolRunOutput::Success { step, .. } | ToolRunOutput::Failure { step, .. } => *step,
        }
    }

    /// 耗时（毫秒）
    pub fn duration(&self) -> Option<u64> {
        match self {
            ToolRunOutput::Success { duration, .. } | ToolRunOutput::Failure { duration, .. } => {
                *duration
            }
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ToolRunOutput::Failure { error, .. } => Some(error),
            ToolRunOutput::Success { .. } => None,
        }
    }
}

/// 单次执行的上下文；outputs 只追加
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutorContext {
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<Vec<ImageInput>>,
    pub outputs: Vec<ToolRunOutput>,
    pub plan: Plan,
}

impl ExecutorContext {
    /// 计划中从未开始的步骤（中止后非空）
    pub fn unattempted(&self) -> &[Intent] {
        let done = self.outputs.len().min(self.plan.len());
        &self.plan[done..]
    }
}

/// 一次执行的输入
pub struct ExecutionRequest<'a> {
    pub input: &'a str,
    pub intents: &'a [Intent],
    pub image: Option<Vec<ImageInput>>,
    pub history: &'a [HistoryMessage],
    pub progress: Option<&'a ProgressSender>,
    pub cancel: CancellationToken,
}

impl<'a> ExecutionRequest<'a> {
    pub fn new(input: &'a str, intents: &'a [Intent]) -> Self {
        Self {
            input,
            intents,
            image: None,
            history: &[],
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_image(mut self, image: Option<Vec<ImageInput>>) -> Self {
        self.image = image;
        self
    }

    pub fn with_history(mut self, history: &'a [HistoryMessage]) -> Self {
        self.history = history;
        self
    }

    pub fn with_progress(mut self, tx: Option<&'a ProgressSender>) -> Self {
        self.progress = tx;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// 单步失败原因
#[derive(Debug)]
enum StepFailure {
    /// 工具箱中没有处理该意图的适配器
    Unknown,
    Tool(ToolError),
    Timeout,
    Cancelled,
}

impl StepFailure {
    fn message(&self, step: Intent) -> String {
        match self {
            StepFailure::Unknown => format!("Unknown step: {step}"),
            StepFailure::Tool(e) => e.to_string(),
            StepFailure::Timeout => format!("Tool timeout: {step}"),
            StepFailure::Cancelled => "Cancelled".to_string(),
        }
    }
}

/// 执行器：持有工具箱与执行策略，可跨请求复用
pub struct Executor {
    tools: Toolbox,
    policy: FailurePolicy,
    step_timeout: Option<Duration>,
    image_size: Option<String>,
}

impl Executor {
    pub fn new(tools: Toolbox) -> Self {
        Self {
            tools,
            policy: FailurePolicy::Abort,
            step_timeout: None,
            image_size: None,
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_image_size(mut self, size: impl Into<String>) -> Self {
        self.image_size = Some(size.into());
        self
    }

    pub async fn run(&self, request: ExecutionRequest<'_>) -> Result<ExecutorContext, AgentError> {
        let plan = normalize(request.intents);
        let steps = plan.progress_steps();
        let tx = request.progress;

        if !steps.is_empty() {
            send_event(tx, ProgressEvent::PlanReady { steps: steps.clone() });
        }

        let mut context = ExecutorContext {
            input: request.input.to_string(),
            image: request.image,
            outputs: Vec::with_capacity(plan.len()),
            plan: plan.clone(),
        };
        let mut search_context: Option<String> = None;

        for (meta, &step) in steps.into_iter().zip(plan.iter()) {
            if request.cancel.is_cancelled() {
                tracing::debug!(step = %step, "Executor: cancelled before step");
                return Err(AgentError::Cancelled {
                    context: Some(Box::new(context)),
                });
            }

            send_event(tx, ProgressEvent::StepStart { step: meta.clone() });
            let started = Instant::now();

            let outcome = {
                let call = self.invoke(
                    step,
                    request.input,
                    context.image.as_deref().unwrap_or(&[]),
                    request.history,
                    search_context.as_deref(),
                );
                let limited = async {
                    match self.step_timeout {
                        Some(limit) => tokio::time::timeout(limit, call)
                            .await
                            .unwrap_or(Err(StepFailure::Timeout)),
                        None => call.await,
                    }
                };
                tokio::select! {
                    biased;
                    _ = request.cancel.cancelled() => Err(StepFailure::Cancelled),
                    r = limited => r,
                }
            };

            let duration_ms = started.elapsed().as_millis() as u64;
            let status = match &outcome {
                Ok(_) => "ok",
                Err(StepFailure::Timeout) => "timeout",
                Err(StepFailure::Cancelled) => "cancelled",
                Err(_) => "error",
            };
            let audit = json!({
                "event": "step_audit",
                "step": step,
                "id": meta.id,
                "ok": outcome.is_ok(),
                "outcome": status,
                "duration_ms": duration_ms,
            });
            tracing::info!(audit = %audit.to_string(), "step");

            match outcome {
                Ok(result) => {
                    if step == Intent::WebSearch {
                        search_context = result.text.clone().filter(|t| !t.is_empty());
                    }
                    context.outputs.push(ToolRunOutput::Success {
                        step,
                        result,
                        duration: Some(duration_ms),
                    });
                    send_event(tx, ProgressEvent::StepComplete { step: meta });
                }
                Err(failure) => {
                    let message = failure.message(step);
                    tracing::warn!(step = %step, error = %message, "step failed");
                    context.outputs.push(ToolRunOutput::Failure {
                        step,
                        error: message.clone(),
                        duration: Some(duration_ms),
                    });
                    send_event(
                        tx,
                        ProgressEvent::StepError {
                            step: meta,
                            error: message.clone(),
                        },
                    );

                    if matches!(failure, StepFailure::Cancelled) {
                        return Err(AgentError::Cancelled {
                            context: Some(Box::new(context)),
                        });
                    }
                    if self.policy == FailurePolicy::Abort {
                        return Err(AgentError::StepFailed {
                            step,
                            message,
                            context: Box::new(context),
                        });
                    }
                }
            }
        }

        send_event(tx, ProgressEvent::Complete);
        Ok(context)
    }

    /// 按意图分派到对应适配器
    async fn invoke(
        &self,
        step: Intent,
        input: &str,
        images: &[ImageInput],
        history: &[HistoryMessage],
        search_context: Option<&str>,
    ) -> Result<ToolResult, StepFailure> {
        let result = match step {
            Intent::Chat => match &self.tools.chat {
                Some(tool) => tool.reply(input, history, search_context).await,
                None => return Err(StepFailure::Unknown),
            },
            Intent::Reasoning => match &self.tools.reasoning {
                Some(tool) => tool.think(input, history, search_context).await,
                None => return Err(StepFailure::Unknown),
            },
            Intent::WebSearch => match &self.tools.web_search {
                Some(tool) => tool.search(input).await,
                None => return Err(StepFailure::Unknown),
            },
            Intent::ImageGenerate => match &self.tools.image {
                Some(tool) => tool.generate(input, self.image_size.as_deref()).await,
                None => return Err(StepFailure::Unknown),
            },
            Intent::ImageUnderstand => match &self.tools.image {
                Some(tool) => tool.understand(input, images).await,
                None => return Err(StepFailure::Unknown),
            },
        };
        result.map_err(StepFailure::Tool)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::Value;
    use tokio::sync::mpsc;

    use super::*;
    use crate::tools::{ChatTool, ReasoningTool, WebSearchTool};

    /// 记录调用顺序与收到的 context
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(Intent, Option<String>)>>,
    }

    impl Recorder {
        fn record(&self, step: Intent, context: Option<&str>) {
            self.calls
                .lock()
                .unwrap()
                .push((step, context.map(String::from)));
        }

        fn calls(&self) -> Vec<(Intent, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    struct FakeChat(Arc<Recorder>);

    #[async_trait]
    impl ChatTool for FakeChat {
        async fn reply(
            &self,
            input: &str,
            _history: &[HistoryMessage],
            context: Option<&str>,
        ) -> Result<ToolResult, ToolError> {
            self.0.record(Intent::Chat, context);
            Ok(ToolResult::text(format!("chat: {input}"), Value::Null))
        }
    }

    struct FakeSearch(Arc<Recorder>);

    #[async_trait]
    impl WebSearchTool for FakeSearch {
        async fn search(&self, _input: &str) -> Result<ToolResult, ToolError> {
            self.0.record(Intent::WebSearch, None);
            Ok(ToolResult::text("search results", Value::Null))
        }
    }

    struct FailingReasoning {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReasoningTool for FailingReasoning {
        async fn think(
            &self,
            _input: &str,
            _history: &[HistoryMessage],
            _context: Option<&str>,
        ) -> Result<ToolResult, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ToolError::Other("model overloaded".into()))
        }
    }

    struct SlowSearch;

    #[async_trait]
    impl WebSearchTool for SlowSearch {
        async fn search(&self, _input: &str) -> Result<ToolResult, ToolError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(ToolResult::text("late", Value::Null))
        }
    }

    /// 在调用内部读取已收到的事件
    struct EventPeekingChat {
        rx: Mutex<mpsc::UnboundedReceiver<ProgressEvent>>,
        seen: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl ChatTool for EventPeekingChat {
        async fn reply(
            &self,
            _input: &str,
            _history: &[HistoryMessage],
            _context: Option<&str>,
        ) -> Result<ToolResult, ToolError> {
            let mut rx = self.rx.lock().unwrap();
            let mut seen = self.seen.lock().unwrap();
            while let Ok(ev) = rx.try_recv() {
                seen.push(ev.kind());
            }
            Ok(ToolResult::text("ok", Value::Null))
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind());
        }
        kinds
    }

    #[tokio::test]
    async fn test_runs_in_order_and_feeds_search_context() {
        let rec = Arc::new(Recorder::default());
        let tools = Toolbox::new()
            .with_chat(Arc::new(FakeChat(rec.clone())))
            .with_web_search(Arc::new(FakeSearch(rec.clone())));
        let executor = Executor::new(tools);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let intents = [Intent::WebSearch, Intent::Chat, Intent::WebSearch];
        let ctx = executor
            .run(ExecutionRequest::new("tokyo weather", &intents).with_progress(Some(&tx)))
            .await
            .unwrap();

        assert_eq!(ctx.plan.intents(), &[Intent::WebSearch, Intent::Chat]);
        assert_eq!(ctx.outputs.len(), 2);
        assert!(ctx.unattempted().is_empty());
        assert_eq!(
            rec.calls(),
            vec![
                (Intent::WebSearch, None),
                (Intent::Chat, Some("search results".to_string())),
            ]
        );
        assert_eq!(
            drain(&mut rx),
            vec![
                "plan:ready",
                "step:start",
                "step:complete",
                "step:start",
                "step:complete",
                "complete"
            ]
        );
    }

    #[tokio::test]
    async fn test_step_start_is_delivered_before_adapter_runs() {
        let (tx, rx) = mpsc::unbounded_channel();
        let chat = Arc::new(EventPeekingChat {
            rx: Mutex::new(rx),
            seen: Mutex::new(Vec::new()),
        });
        let executor = Executor::new(Toolbox::new().with_chat(chat.clone()));

        executor
            .run(ExecutionRequest::new("hi", &[Intent::Chat]).with_progress(Some(&tx)))
            .await
            .unwrap();

        assert_eq!(*chat.seen.lock().unwrap(), vec!["plan:ready", "step:start"]);
    }

    #[tokio::test]
    async fn test_fail_fast_stops_at_failing_step() {
        let rec = Arc::new(Recorder::default());
        let reasoning = Arc::new(FailingReasoning {
            calls: AtomicUsize::new(0),
        });
        let tools = Toolbox::new()
            .with_chat(Arc::new(FakeChat(rec.clone())))
            .with_web_search(Arc::new(FakeSearch(rec.clone())))
            .with_reasoning(reasoning.clone());
        let executor = Executor::new(tools);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let intents = [Intent::WebSearch, Intent::Reasoning, Intent::Chat];
        let err = executor
            .run(ExecutionRequest::new("q", &intents).with_progress(Some(&tx)))
            .await
            .unwrap_err();

        match &err {
            AgentError::StepFailed {
                step,
                message,
                context,
            } => {
                assert_eq!(*step, Intent::Reasoning);
                assert_eq!(message, "model overloaded");
                assert_eq!(context.outputs.len(), 2);
                assert_eq!(context.outputs[1].error(), Some("model overloaded"));
                assert_eq!(context.unattempted(), &[Intent::Chat]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.to_string(), "model overloaded");
        assert_eq!(reasoning.calls.load(Ordering::SeqCst), 1);
        assert_eq!(rec.calls().len(), 1);
        assert_eq!(
            drain(&mut rx),
            vec!["plan:ready", "step:start", "step:complete", "step:start", "step:error"]
        );
    }

    #[tokio::test]
    async fn test_continue_policy_runs_remaining_steps() {
        let rec = Arc::new(Recorder::default());
        let tools = Toolbox::new()
            .with_chat(Arc::new(FakeChat(rec.clone())))
            .with_reasoning(Arc::new(FailingReasoning {
                calls: AtomicUsize::new(0),
            }));
        let executor = Executor::new(tools).with_failure_policy(FailurePolicy::Continue);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let intents = [Intent::Reasoning, Intent::Chat];
        let ctx = executor
            .run(ExecutionRequest::new("q", &intents).with_progress(Some(&tx)))
            .await
            .unwrap();

        assert_eq!(ctx.outputs.len(), 2);
        assert!(ctx.outputs[0].error().is_some());
        assert!(ctx.outputs[1].error().is_none());
        assert_eq!(drain(&mut rx).last(), Some(&"complete"));
    }

    #[tokio::test]
    async fn test_missing_adapter_is_unknown_step() {
        let rec = Arc::new(Recorder::default());
        let executor = Executor::new(Toolbox::new().with_chat(Arc::new(FakeChat(rec))));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let intents = [Intent::ImageGenerate, Intent::Chat];
        let err = executor
            .run(ExecutionRequest::new("draw", &intents).with_progress(Some(&tx)))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Unknown step: image_generate");
        let ctx = err.context().unwrap();
        assert_eq!(ctx.outputs.len(), 1);
        assert_eq!(ctx.outputs[0].step(), Intent::ImageGenerate);
        assert!(ctx.outputs[0].duration().is_some());
        assert_eq!(
            drain(&mut rx),
            vec!["plan:ready", "step:start", "step:error"]
        );
    }

    #[tokio::test]
    async fn test_empty_intents_fall_back_to_chat() {
        let rec = Arc::new(Recorder::default());
        let executor = Executor::new(Toolbox::new().with_chat(Arc::new(FakeChat(rec))));
        let ctx = executor.run(ExecutionRequest::new("hi", &[])).await.unwrap();
        assert_eq!(ctx.plan.intents(), &[Intent::Chat]);
        assert!(matches!(&ctx.outputs[0], ToolRunOutput::Success { result, .. } if result.text.as_deref() == Some("chat: hi")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_timeout_becomes_failure() {
        let executor = Executor::new(Toolbox::new().with_web_search(Arc::new(SlowSearch)))
            .with_step_timeout(Some(Duration::from_secs(5)));
        let err = executor
            .run(ExecutionRequest::new("q", &[Intent::WebSearch]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Tool timeout: webSearch");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_running_step() {
        let executor = Executor::new(Toolbox::new().with_web_search(Arc::new(SlowSearch)))
            .with_failure_policy(FailurePolicy::Continue);
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let err = executor
            .run(ExecutionRequest::new("q", &[Intent::WebSearch]).with_cancel(token))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Cancelled { .. }));
        assert_eq!(err.context().unwrap().outputs[0].error(), Some("Cancelled"));
    }
}
