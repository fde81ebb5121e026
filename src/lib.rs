//! Swarm - Rust 多智能体编排系统
//!
//! 模块划分：
//! - **agents**: 封闭的智能体集合（supervisor / planner / graph / filesystem / general_qa / mathematics）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **guardrails**: 意图分类输入闸门与输出检查
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **routing**: 路由决策解析链（多级降级，对任意输入全函数）
//! - **state**: 任务模型、编排状态与任务清单外部持久化
//! - **tools**: 工具箱（calculator、file_read/file_write/list_dir、graph_query）与执行器
//! - **workflow**: 节点差量适配、星型图、检查点与回合驱动服务

pub mod agents;
pub mod config;
pub mod error;
pub mod guardrails;
pub mod llm;
pub mod observability;
pub mod routing;
pub mod state;
pub mod tools;
pub mod workflow;

pub use error::AgentError;
