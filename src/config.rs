//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PLAYGROUND__*` 覆盖（双下划线表示嵌套，如 `PLAYGROUND__APP__DEBUG_MODE=true`）。
//! 每个角色（routing / chat / reasoning / web_search / vision / image）在 [roles] 中指定模型 id，
//! 模型连接信息在 [[models]] 中声明；resolve_auth 把两者解析为调用方显式持有的 RuntimeAuth。

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// 应用配置根
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub roles: RolesSection,
    pub models: Vec<ModelConfig>,
    pub executor: ExecutorSection,
    pub image: ImageSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// 打开后日志默认级别为 debug
    pub debug_mode: bool,
    /// 交互模式下保留的对话轮数
    pub max_context_turns: usize,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            debug_mode: false,
            max_context_turns: 20,
        }
    }
}

/// [roles] 段：各角色使用的模型 id；空字符串表示回退
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RolesSection {
    pub routing: String,
    pub chat: String,
    pub reasoning: String,
    pub web_search: String,
    pub vision: String,
    pub image: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelCapabilities {
    pub vision: bool,
    pub web_search: bool,
    pub reasoning: bool,
    pub image: bool,
}

/// [[models]]：一个可用模型的连接信息
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub id: String,
    /// 请求里的 model 字段；为空时用 id
    pub name: String,
    pub provider: String,
    pub base_url: String,
    /// 为空时读取 OPENAI_API_KEY
    pub api_key: String,
    pub api_version: Option<String>,
    pub capabilities: ModelCapabilities,
}

/// 执行失败策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// 首个失败即中止整个计划
    #[default]
    Abort,
    /// 记录失败后继续后续步骤
    Continue,
}

/// [executor] 段
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExecutorSection {
    pub failure_policy: FailurePolicy,
    /// 单步超时（秒），0 表示不限
    pub step_timeout_secs: u64,
}

impl ExecutorSection {
    pub fn step_timeout(&self) -> Option<Duration> {
        (self.step_timeout_secs > 0).then(|| Duration::from_secs(self.step_timeout_secs))
    }
}

/// [image] 段：图片生成参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageSection {
    pub size: String,
    pub quality: String,
    /// Azure 部署使用的 api-version
    pub api_version: String,
}

impl Default for ImageSection {
    fn default() -> Self {
        Self {
            size: "1024x1024".to_string(),
            quality: "medium".to_string(),
            api_version: "2025-04-01-preview".to_string(),
        }
    }
}

/// 模型角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ModelRole {
    Routing,
    Chat,
    Reasoning,
    WebSearch,
    Vision,
    Image,
}

impl ModelRole {
    pub fn label(&self) -> &'static str {
        match self {
            ModelRole::Routing => "Routing model",
            ModelRole::Chat => "Chat model",
            ModelRole::Reasoning => "Reasoning model",
            ModelRole::WebSearch => "Web search model",
            ModelRole::Vision => "Vision model",
            ModelRole::Image => "Image model",
        }
    }
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelRole::Routing => "routing",
            ModelRole::Chat => "chat",
            ModelRole::Reasoning => "reasoning",
            ModelRole::WebSearch => "webSearch",
            ModelRole::Vision => "vision",
            ModelRole::Image => "image",
        };
        f.write_str(name)
    }
}

/// 某个角色解析后的连接信息（显式传给路由与工具，不在调用时读全局状态）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeAuth {
    pub role: ModelRole,
    pub model_id: String,
    pub model_name: String,
    pub provider: String,
    pub base_url: String,
    pub api_key: String,
    pub api_version: String,
}

impl RuntimeAuth {
    /// 缺少 API Key / base URL 时返回说明文字
    pub fn ensure_complete(&self) -> Result<(), String> {
        let mut missing = Vec::new();
        if self.api_key.is_empty() {
            missing.push("API key");
        }
        if self.base_url.is_empty() {
            missing.push("base URL");
        }
        if missing.is_empty() {
            return Ok(());
        }
        let provider = if self.provider.is_empty() {
            String::new()
        } else {
            format!(" for provider \"{}\"", self.provider)
        };
        Err(format!(
            "Missing {}{} in settings for role \"{}\". Please configure it in the [[models]] section.",
            missing.join(" and "),
            provider,
            self.role
        ))
    }
}

/// 配置缺失项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfigIssue {
    pub role: ModelRole,
    pub role_label: String,
    pub model_id: Option<String>,
    pub model_name: Option<String>,
    pub missing_api_key: bool,
    pub missing_base_url: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelConfigStatus {
    pub configured: bool,
    pub issues: Vec<ModelConfigIssue>,
}

impl AppConfig {
    fn find_model(&self, id: &str) -> Option<&ModelConfig> {
        if id.is_empty() {
            return None;
        }
        self.models.iter().find(|m| m.id == id)
    }

    fn selected_id(&self, role: ModelRole) -> &str {
        match role {
            ModelRole::Routing => &self.roles.routing,
            ModelRole::Chat => &self.roles.chat,
            ModelRole::Reasoning => &self.roles.reasoning,
            ModelRole::WebSearch => &self.roles.web_search,
            ModelRole::Vision => &self.roles.vision,
            ModelRole::Image => &self.roles.image,
        }
    }

    /// 角色 → 模型：显式 id > 按能力挑选（vision / image）> chat 模型 > 第一个模型
    pub fn resolve_model(&self, role: ModelRole) -> Option<&ModelConfig> {
        if let Some(model) = self.find_model(self.selected_id(role)) {
            return Some(model);
        }
        let by_capability = match role {
            ModelRole::Image => self.models.iter().find(|m| m.capabilities.image),
            ModelRole::Vision => self.models.iter().find(|m| m.capabilities.vision),
            ModelRole::WebSearch => self.models.iter().find(|m| m.capabilities.web_search),
            _ => None,
        };
        by_capability
            .or_else(|| self.find_model(&self.roles.chat))
            .or_else(|| self.models.first())
    }

    pub fn resolve_auth(&self, role: ModelRole) -> RuntimeAuth {
        let empty = ModelConfig::default();
        let model = self.resolve_model(role).unwrap_or(&empty);
        RuntimeAuth {
            role,
            model_id: model.id.clone(),
            model_name: if model.name.is_empty() {
                model.id.clone()
            } else {
                model.name.clone()
            },
            provider: model.provider.clone(),
            base_url: effective_base_url(model),
            api_key: effective_api_key(model),
            api_version: model
                .api_version
                .clone()
                .unwrap_or_else(|| self.image.api_version.clone()),
        }
    }

    /// 检查 routing / chat / reasoning 三个必需角色是否可用
    pub fn config_status(&self) -> ModelConfigStatus {
        let issues: Vec<ModelConfigIssue> = [ModelRole::Routing, ModelRole::Chat, ModelRole::Reasoning]
            .into_iter()
            .filter_map(|role| {
                let selected = self.selected_id(role);
                let model = self.find_model(selected);
                let missing_base_url = model.map_or(true, |m| effective_base_url(m).is_empty());
                let missing_api_key = model.map_or(true, |m| effective_api_key(m).is_empty());
                if model.is_some() && !missing_base_url && !missing_api_key {
                    return None;
                }
                Some(ModelConfigIssue {
                    role,
                    role_label: role.label().to_string(),
                    model_id: model
                        .map(|m| m.id.clone())
                        .or_else(|| (!selected.is_empty()).then(|| selected.to_string())),
                    model_name: model.map(|m| m.name.clone()),
                    missing_api_key,
                    missing_base_url,
                })
            })
            .collect();
        ModelConfigStatus {
            configured: issues.is_empty(),
            issues,
        }
    }
}

fn effective_base_url(model: &ModelConfig) -> String {
    let base = model.base_url.trim().trim_end_matches('/');
    if base.is_empty() && model.provider.eq_ignore_ascii_case("openai") {
        return DEFAULT_OPENAI_BASE_URL.to_string();
    }
    base.to_string()
}

fn effective_api_key(model: &ModelConfig) -> String {
    let key = model.api_key.trim();
    if key.is_empty() {
        std::env::var("OPENAI_API_KEY").unwrap_or_default()
    } else {
        key.to_string()
    }
}

/// 从 config 目录加载配置，环境变量 PLAYGROUND__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path，则追加该文件（可覆盖前面的键）；文件不存在时返回 NotFound
/// 3. 最后叠加环境变量 PLAYGROUND__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if !path.exists() {
            return Err(config::ConfigError::NotFound(path.display().to_string()));
        }
        builder = builder.add_source(config::File::from(path.clone()));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PLAYGROUND")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn model(id: &str, key: &str) -> ModelConfig {
        ModelConfig {
            id: id.to_string(),
            name: format!("{id}-api"),
            provider: "custom".to_string(),
            base_url: "https://llm.example.com/v1/".to_string(),
            api_key: key.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_auth_falls_back_to_chat_model() {
        let cfg = AppConfig {
            roles: RolesSection {
                chat: "fast".into(),
                reasoning: "missing".into(),
                ..Default::default()
            },
            models: vec![model("other", "k0"), model("fast", "k1")],
            ..Default::default()
        };
        let auth = cfg.resolve_auth(ModelRole::Reasoning);
        assert_eq!(auth.model_id, "fast");
        assert_eq!(auth.model_name, "fast-api");
        assert_eq!(auth.base_url, "https://llm.example.com/v1");
        assert_eq!(auth.api_key, "k1");
        assert_eq!(auth.role, ModelRole::Reasoning);
    }

    #[test]
    fn test_image_role_prefers_image_capable_model() {
        let mut painter = model("painter", "k2");
        painter.capabilities.image = true;
        let cfg = AppConfig {
            roles: RolesSection {
                chat: "fast".into(),
                ..Default::default()
            },
            models: vec![model("fast", "k1"), painter],
            ..Default::default()
        };
        assert_eq!(cfg.resolve_auth(ModelRole::Image).model_id, "painter");
        assert_eq!(cfg.resolve_auth(ModelRole::Image).api_version, "2025-04-01-preview");
    }

    #[test]
    fn test_ensure_complete_reports_missing_fields() {
        let auth = RuntimeAuth {
            role: ModelRole::Routing,
            model_id: "m".into(),
            model_name: "m".into(),
            provider: "azure".into(),
            base_url: String::new(),
            api_key: "k".into(),
            api_version: String::new(),
        };
        let err = auth.ensure_complete().unwrap_err();
        assert!(err.contains("Missing base URL for provider \"azure\""));
        assert!(err.contains("role \"routing\""));
    }

    #[test]
    fn test_config_status_flags_unknown_model() {
        let cfg = AppConfig {
            roles: RolesSection {
                routing: "fast".into(),
                chat: "fast".into(),
                reasoning: "deep".into(),
                ..Default::default()
            },
            models: vec![model("fast", "k1")],
            ..Default::default()
        };
        let status = cfg.config_status();
        assert!(!status.configured);
        assert_eq!(status.issues.len(), 1);
        let issue = &status.issues[0];
        assert_eq!(issue.role, ModelRole::Reasoning);
        assert_eq!(issue.model_id.as_deref(), Some("deep"));
        assert!(issue.missing_base_url);
    }

    #[test]
    fn test_load_config_rejects_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("typo.toml");
        let err = load_config(Some(missing.clone())).unwrap_err();
        assert!(matches!(err, config::ConfigError::NotFound(ref p) if p.contains("typo.toml")));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[app]
debug_mode = true

[roles]
chat = "fast"

[[models]]
id = "fast"
provider = "openai"
api_key = "sk-file"

[executor]
failure_policy = "continue"
step_timeout_secs = 30
"#
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert!(cfg.app.debug_mode);
        assert_eq!(cfg.app.max_context_turns, 20);
        assert_eq!(cfg.executor.failure_policy, FailurePolicy::Continue);
        assert_eq!(cfg.executor.step_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(cfg.image.size, "1024x1024");

        let auth = cfg.resolve_auth(ModelRole::Chat);
        assert_eq!(auth.base_url, DEFAULT_OPENAI_BASE_URL);
        assert_eq!(auth.api_key, "sk-file");
    }

    #[test]
    fn test_legacy_app_name_key_is_ignored() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[app]\nname = \"bee\"\nmax_context_turns = 4").unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.app.max_context_turns, 4);
        assert!(!cfg.app.debug_mode);
    }
}
