//! 状态层：任务模型、编排状态与任务清单外部持久化

pub mod persistence;
pub mod task;
pub mod workflow;

pub use persistence::TaskFileStore;
pub use task::{Task, TaskList, TaskStatus};
pub use workflow::{
    AgentMessage, ConversationEntry, TokenStats, UsageStats, WorkflowState, SNAPSHOT_MESSAGES,
};
