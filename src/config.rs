//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SWARM__*` 覆盖（双下划线表示嵌套，
//! 如 `SWARM__LLM__MODEL=gpt-4o`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub guardrails: GuardrailsSection,
    #[serde(default)]
    pub tasks: TasksSection,
    #[serde(default)]
    pub tools: ToolsSection,
}

/// [app] 段：应用名、工作目录、图执行迭代上限
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// 文件系统工具的沙箱根目录，未设置时用 ./workspace
    pub workspace_root: Option<PathBuf>,
    /// 单回合内图节点调用次数上限（取消边界，不是性能调优项）
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

fn default_max_iterations() -> usize {
    50
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            workspace_root: None,
            max_iterations: default_max_iterations(),
        }
    }
}

/// [llm] 段：后端选择
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai 兼容端点 / mock；无 API Key 时自动降级 mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
        }
    }
}

/// [guardrails] 段：输入/输出护栏开关与输出长度限制
#[derive(Debug, Clone, Deserialize)]
pub struct GuardrailsSection {
    #[serde(default = "default_guardrails_enabled")]
    pub enabled: bool,
    /// 输出超过此字符数视为不合规
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
}

fn default_guardrails_enabled() -> bool {
    true
}

fn default_max_output_chars() -> usize {
    5000
}

impl Default for GuardrailsSection {
    fn default() -> Self {
        Self {
            enabled: default_guardrails_enabled(),
            max_output_chars: default_max_output_chars(),
        }
    }
}

/// [tasks] 段：任务清单 JSON 文件目录（尽力而为的外部持久化）
#[derive(Debug, Clone, Deserialize)]
pub struct TasksSection {
    #[serde(default = "default_tasks_dir")]
    pub tasks_dir: PathBuf,
}

fn default_tasks_dir() -> PathBuf {
    PathBuf::from("tasks")
}

impl Default for TasksSection {
    fn default() -> Self {
        Self {
            tasks_dir: default_tasks_dir(),
        }
    }
}

/// [tools] 段：单次工具调用超时
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

fn default_tool_timeout_secs() -> u64 {
    30
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 SWARM__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 SWARM__*（双下划线表示嵌套键）
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
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SWARM")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.app.max_iterations, 50);
        assert_eq!(cfg.llm.provider, "openai");
        assert!(cfg.guardrails.enabled);
        assert_eq!(cfg.tasks.tasks_dir, PathBuf::from("tasks"));
    }
}
