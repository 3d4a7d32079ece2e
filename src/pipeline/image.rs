//! 调用方图片输入解析
//!
//! 支持：http(s) URL、base64 data URI、本地文件字节（编码为 base64），以及它们的列表。
//! 统一转为适配器使用的 ImageInput { data, url, mimeType }。

use base64::Engine;
use serde::{Deserialize, Serialize};

/// 适配器侧图片载荷：data（纯 base64，不含前缀）与 url 二选一
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ImageInput {
    /// 视觉模型可用的地址：有 data 时拼成 data URI，否则用 url
    pub fn to_url(&self) -> Option<String> {
        match (&self.data, &self.url) {
            (Some(data), _) => {
                let mime = self.mime_type.as_deref().unwrap_or("image/png");
                Some(format!("data:{mime};base64,{data}"))
            }
            (None, Some(url)) => Some(url.clone()),
            (None, None) => None,
        }
    }
}

/// 调用方原始图片输入
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawImage {
    /// URL 或 data URI
    Text(String),
    /// 文件内容（如上传或本地读取）；mime_type 为空时按文件头推断
    File {
        bytes: Vec<u8>,
        mime_type: Option<String>,
    },
    Many(Vec<RawImage>),
}

impl From<&str> for RawImage {
    fn from(value: &str) -> Self {
        RawImage::Text(value.to_string())
    }
}

impl From<String> for RawImage {
    fn from(value: String) -> Self {
        RawImage::Text(value)
    }
}

impl From<Vec<RawImage>> for RawImage {
    fn from(items: Vec<RawImage>) -> Self {
        RawImage::Many(items)
    }
}

/// 解析调用方图片输入；无可用图片时返回 None
pub fn parse_image_input(raw: Option<&RawImage>) -> Option<Vec<ImageInput>> {
    let mut parsed = Vec::new();
    if let Some(raw) = raw {
        collect(raw, &mut parsed);
    }
    if parsed.is_empty() {
        None
    } else {
        Some(parsed)
    }
}

fn collect(raw: &RawImage, out: &mut Vec<ImageInput>) {
    match raw {
        RawImage::Text(value) => out.extend(parse_image_string(value)),
        RawImage::File { bytes, mime_type } => {
            if bytes.is_empty() {
                return;
            }
            let mime = mime_type
                .clone()
                .unwrap_or_else(|| sniff_mime(bytes).to_string());
            out.push(ImageInput {
                data: Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
                url: None,
                mime_type: Some(mime),
            });
        }
        RawImage::Many(items) => {
            for item in items {
                collect(item, out);
            }
        }
    }
}

/// `data:<mime>;base64,<payload>` 拆为 data + mimeType；其余（含非 base64 的 data URI）按 URL 原样保留
pub fn parse_image_string(value: &str) -> Option<ImageInput> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Some(rest) = value.strip_prefix("data:") {
        let (meta, data) = rest.split_once(',')?;
        if let Some(mime) = meta.strip_suffix(";base64") {
            return Some(ImageInput {
                data: Some(data.to_string()),
                url: None,
                mime_type: (!mime.is_empty()).then(|| mime.to_string()),
            });
        }
    }
    Some(ImageInput {
        data: None,
        url: Some(value.to_string()),
        mime_type: None,
    })
}

fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/png"
    }
}
