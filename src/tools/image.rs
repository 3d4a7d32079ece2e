//! ImageTool：图片生成（/images/generations，兼容 Azure 部署）与图片理解（视觉补全）

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::{ImageSection, RuntimeAuth};
use crate::core::ToolError;
use crate::llm::{CompletionRequest, LlmClient};
use crate::memory::Message;
use crate::pipeline::ImageInput;
use crate::tools::http::{bearer_headers, post_json};
use crate::tools::{ImageTool, ToolResult};

/// 生成端点与鉴权头
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ImageEndpoint {
    pub url: String,
    pub azure: bool,
}

pub(crate) fn build_image_endpoint(base_url: &str, api_version: &str, model: &str) -> ImageEndpoint {
    let base = base_url.trim_end_matches('/');
    let lower = base.to_lowercase();
    if lower.contains("azure.com") || lower.contains("openai.azure") {
        return ImageEndpoint {
            url: format!(
                "{base}/openai/deployments/{model}/images/generations?api-version={api_version}"
            ),
            azure: true,
        };
    }
    ImageEndpoint {
        url: format!("{base}/images/generations"),
        azure: false,
    }
}

pub struct OpenAiImageTool {
    client: Client,
    auth: RuntimeAuth,
    settings: ImageSection,
    /// 图片理解使用的视觉模型
    vision: Arc<dyn LlmClient>,
}

impl OpenAiImageTool {
    pub fn new(auth: RuntimeAuth, settings: ImageSection, vision: Arc<dyn LlmClient>) -> Self {
        Self {
            client: Client::new(),
            auth,
            settings,
            vision,
        }
    }

    fn headers(&self, azure: bool) -> Result<HeaderMap, ToolError> {
        if !azure {
            return bearer_headers(&self.auth.api_key);
        }
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.auth.api_key)
            .map_err(|_| ToolError::NotConfigured("API key contains invalid header characters".into()))?;
        headers.insert("api-key", key);
        Ok(headers)
    }
}

#[async_trait]
impl ImageTool for OpenAiImageTool {
    async fn generate(&self, prompt: &str, size: Option<&str>) -> Result<ToolResult, ToolError> {
        let model = &self.auth.model_name;
        if self.auth.ensure_complete().is_err() {
            tracing::error!(model = %model, "ImageTool.generate:missing-config");
            return Err(ToolError::NotConfigured(
                "Image generation is not configured. Please set Base URL and API Key for the image model."
                    .into(),
            ));
        }

        let endpoint = build_image_endpoint(&self.auth.base_url, &self.auth.api_version, model);
        let body = json!({
            "model": model,
            "prompt": prompt,
            "n": 1,
            "size": size.unwrap_or(&self.settings.size),
            "quality": self.settings.quality,
            "output_format": "png",
        });

        let started = Instant::now();
        tracing::debug!(model = %model, provider = %self.auth.provider, url = %endpoint.url, "ImageTool.generate:start");

        let response = post_json(
            &self.client,
            &endpoint.url,
            self.headers(endpoint.azure)?,
            &body,
            "image",
        )
        .await?;

        tracing::debug!(
            model = %model,
            duration_ms = started.elapsed().as_millis() as u64,
            "ImageTool.generate:success"
        );

        let image = response
            .pointer("/data/0/b64_json")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| ToolError::InvalidResponse("missing data[0].b64_json".into()))?;
        Ok(ToolResult::image(image, response))
    }

    async fn understand(
        &self,
        prompt: &str,
        images: &[ImageInput],
    ) -> Result<ToolResult, ToolError> {
        let urls: Vec<String> = images.iter().filter_map(ImageInput::to_url).collect();
        if urls.is_empty() {
            return Err(ToolError::Other(
                "No image provided for image understanding".into(),
            ));
        }

        let model = self.vision.model().to_string();
        let started = Instant::now();
        tracing::debug!(model = %model, images = urls.len(), "ImageTool.understand:start");

        let request = CompletionRequest::new(vec![Message::user(prompt)]).with_images(urls);
        let text = self.vision.complete(request).await.map_err(|e| {
            tracing::error!(model = %model, error = %e, "ImageTool.understand:error");
            ToolError::from(e)
        })?;

        tracing::debug!(
            model = %model,
            duration_ms = started.elapsed().as_millis() as u64,
            "ImageTool.understand:success"
        );
        Ok(ToolResult::text(
            text.clone(),
            json!({ "model": model, "content": text }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelRole;
    use crate::llm::MockLlmClient;

    fn auth(base_url: &str) -> RuntimeAuth {
        RuntimeAuth {
            role: ModelRole::Image,
            model_id: "img".into(),
            model_name: "gpt-image-1".into(),
            provider: "openai".into(),
            base_url: base_url.into(),
            api_key: String::new(),
            api_version: "2025-04-01-preview".into(),
        }
    }

    #[test]
    fn test_endpoint_openai_and_azure() {
        let e = build_image_endpoint("https://api.openai.com/v1/", "v", "gpt-image-1");
        assert_eq!(e.url, "https://api.openai.com/v1/images/generations");
        assert!(!e.azure);

        let e = build_image_endpoint("https://my.openai.azure.com", "2025-04-01-preview", "dalle");
        assert_eq!(
            e.url,
            "https://my.openai.azure.com/openai/deployments/dalle/images/generations?api-version=2025-04-01-preview"
        );
        assert!(e.azure);
    }

    #[tokio::test]
    async fn test_generate_without_key_is_not_configured() {
        let tool = OpenAiImageTool::new(
            auth("https://api.openai.com/v1"),
            ImageSection::default(),
            Arc::new(MockLlmClient::new()),
        );
        let err = tool.generate("a cat", None).await.unwrap_err();
        assert!(matches!(err, ToolError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_understand_sends_images_to_vision_model() {
        let vision = Arc::new(MockLlmClient::with_replies(vec![Ok("a cat on a mat".into())]));
        let tool = OpenAiImageTool::new(auth(""), ImageSection::default(), vision.clone());
        let images = vec![ImageInput {
            data: Some("QUJD".into()),
            url: None,
            mime_type: Some("image/jpeg".into()),
        }];

        let result = tool.understand("what is this?", &images).await.unwrap();
        assert_eq!(result.text.as_deref(), Some("a cat on a mat"));
        assert_eq!(vision.requests()[0].images, vec!["data:image/jpeg;base64,QUJD"]);

        let err = tool.understand("what is this?", &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "No image provided for image understanding");
    }
}
