//! Plan 规范化
//!
//! 把路由模型或调用方给出的（可能混乱的）意图名列表整理成去重、有序、非空的执行计划；
//! 未知名称静默丢弃，结果为空时回退为 `[chat]`。

use std::ops::Deref;

use serde::Serialize;

use super::Intent;

/// 规范化后的执行计划：有序、去重、至少一步
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Plan(Vec<Intent>);

/// plan:ready / step:* 事件携带的步骤元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanProgressStep {
    pub id: String,
    pub tool: Intent,
}

/// 面向 UI 的步骤描述（id / tool / 说明）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub id: String,
    pub tool: Intent,
    pub description: String,
}

/// 只做白名单过滤，保留顺序与重复
pub fn parse_intents<I, S>(names: I) -> Vec<Intent>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter_map(|name| Intent::parse(name.as_ref()))
        .collect()
}

/// 规范化意图列表：过滤未知值、按首次出现去重、空则 `[chat]`
pub fn normalize<I, S>(names: I) -> Plan
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut unique: Vec<Intent> = Vec::new();
    for intent in parse_intents(names) {
        if !unique.contains(&intent) {
            unique.push(intent);
        }
    }
    if unique.is_empty() {
        unique.push(Intent::Chat);
    }
    Plan(unique)
}

/// 步骤 id：`step-<index>`
pub fn step_id(index: usize) -> String {
    format!("step-{index}")
}

pub fn describe_intent(intent: Intent) -> &'static str {
    match intent {
        Intent::Chat => "Chat message response",
        Intent::WebSearch => "Perform web search",
        Intent::Reasoning => "Deep reasoning analysis",
        Intent::ImageGenerate => "Generate image",
        Intent::ImageUnderstand => "Understand image content",
    }
}

impl Plan {
    pub fn intents(&self) -> &[Intent] {
        &self.0
    }

    pub fn progress_steps(&self) -> Vec<PlanProgressStep> {
        self.0
            .iter()
            .enumerate()
            .map(|(index, &tool)| PlanProgressStep {
                id: step_id(index),
                tool,
            })
            .collect()
    }

    pub fn describe(&self) -> Vec<PlanStep> {
        self.0
            .iter()
            .enumerate()
            .map(|(index, &tool)| PlanStep {
                id: step_id(index),
                tool,
                description: describe_intent(tool).to_string(),
            })
            .collect()
    }
}

impl Deref for Plan {
    type Target = [Intent];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&[Intent]> for Plan {
    fn from(intents: &[Intent]) -> Self {
        normalize(intents)
    }
}
