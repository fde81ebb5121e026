//! 编排错误类型
//!
//! Supervisor 对调用方是全函数（永不向图抛错）；这里的错误只在 LLM / 工具 /
//! 解析 / 图执行内部流转，最终折叠进任务状态或回合结果。

use thiserror::Error;

/// 编排过程中可能出现的错误（LLM、解析、工具、路由、迭代上限等）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Path escape attempt: {0}")]
    PathEscape(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// 迭代上限是取消边界：用于终止不收敛的 supervisor/agent 路由循环
    #[error("Iteration limit exceeded after {0} node invocations")]
    IterationLimitExceeded(usize),

    #[error("Config error: {0}")]
    ConfigError(String),
}
