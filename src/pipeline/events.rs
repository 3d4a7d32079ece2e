//! 编排过程事件：路由、计划、每一步的开始/完成/失败，供 UI 展示进度

use serde::Serialize;
use tokio::sync::mpsc;

use super::{Intent, PlanProgressStep};

/// 进度事件接收端（推送式；发送同步完成，不会阻塞流水线）
pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;

/// 单次编排内的状态转换
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ProgressEvent {
    #[serde(rename = "route:start")]
    RouteStart,
    #[serde(rename = "route:complete")]
    RouteComplete { intents: Vec<Intent> },
    #[serde(rename = "plan:ready")]
    PlanReady { steps: Vec<PlanProgressStep> },
    #[serde(rename = "step:start")]
    StepStart { step: PlanProgressStep },
    #[serde(rename = "step:complete")]
    StepComplete { step: PlanProgressStep },
    #[serde(rename = "step:error")]
    StepError { step: PlanProgressStep, error: String },
    #[serde(rename = "complete")]
    Complete,
}

impl ProgressEvent {
    /// 事件类型名（与序列化的 `type` 字段一致）
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::RouteStart => "route:start",
            ProgressEvent::RouteComplete { .. } => "route:complete",
            ProgressEvent::PlanReady { .. } => "plan:ready",
            ProgressEvent::StepStart { .. } => "step:start",
            ProgressEvent::StepComplete { .. } => "step:complete",
            ProgressEvent::StepError { .. } => "step:error",
            ProgressEvent::Complete => "complete",
        }
    }
}

/// 有接收方时发送；接收端已关闭则丢弃
pub(crate) fn send_event(tx: Option<&ProgressSender>, ev: ProgressEvent) {
    if let Some(t) = tx {
        let _ = t.send(ev);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let ev = ProgressEvent::StepError {
            step: PlanProgressStep {
                id: "step-1".into(),
                tool: Intent::Reasoning,
            },
            error: "boom".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "step:error");
        assert_eq!(json["step"]["tool"], "reasoning");
        assert_eq!(json["error"], "boom");
        assert_eq!(ev.kind(), "step:error");

        let json = serde_json::to_value(ProgressEvent::RouteStart).unwrap();
        assert_eq!(json, serde_json::json!({"type": "route:start"}));
    }

    #[test]
    fn test_send_event_after_receiver_dropped_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        send_event(Some(&tx), ProgressEvent::Complete);
        send_event(None, ProgressEvent::Complete);
    }
}
