//! 答案合成
//!
//! 逆序扫描步骤输出，取最后的"定论"文本；再把答案里内联的 base64 图片剥离出来，
//! 与 image_generate 直接产出的图片合并（直接产出在前，内联在后）。

use std::sync::OnceLock;

use regex::Regex;

use super::{Intent, ToolRunOutput};

static INLINE_IMAGE_RE: OnceLock<Regex> = OnceLock::new();
static BLANK_LINES_RE: OnceLock<Regex> = OnceLock::new();

/// 剥离内联图片后的答案
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineImageExtraction {
    pub cleaned: String,
    /// 原样的 data URI
    pub images: Vec<String>,
}

/// 逆序取第一个失败信息或有文本的 chat / reasoning / webSearch / image_understand 输出；都没有则为空串
pub fn pick_final_answer(outputs: &[ToolRunOutput]) -> String {
    for output in outputs.iter().rev() {
        match output {
            ToolRunOutput::Failure { error, .. } => return error.clone(),
            ToolRunOutput::Success { step, result, .. } if step.yields_answer() => {
                if let Some(text) = result.text.as_deref().filter(|t| !t.is_empty()) {
                    return text.to_string();
                }
            }
            ToolRunOutput::Success { .. } => {}
        }
    }
    String::new()
}

/// 移除 `![alt](data:image/...)`，收集其中的 data URI，并把连续空行压成一个
pub fn extract_inline_images(text: &str) -> InlineImageExtraction {
    if text.is_empty() {
        return InlineImageExtraction::default();
    }
    let inline = INLINE_IMAGE_RE
        .get_or_init(|| Regex::new(r"!\[[^\]]*\]\((data:image/[^)]+)\)").unwrap());
    let blank = BLANK_LINES_RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap());

    let images = inline
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect();
    let stripped = inline.replace_all(text, "");
    let cleaned = blank.replace_all(&stripped, "\n\n").trim().to_string();

    InlineImageExtraction { cleaned, images }
}

/// image_generate 成功步骤的图片，拼成 PNG data URI
pub fn collect_images(outputs: &[ToolRunOutput]) -> Vec<String> {
    outputs
        .iter()
        .filter_map(|output| match output {
            ToolRunOutput::Success { step, result, .. } if *step == Intent::ImageGenerate => {
                result.image.as_deref().filter(|b| !b.is_empty())
            }
            _ => None,
        })
        .map(|b64| format!("data:image/png;base64,{b64}"))
        .collect()
}
