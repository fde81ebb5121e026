//! 文件系统智能体
//!
//! 持有沙箱文件工具（file_read / file_write / list_dir），所有路径被约束在
//! workspace 根目录之下。

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::{worker, AgentExecutor, AgentKind};
use crate::llm::LlmClient;
use crate::state::{TaskFileStore, UsageStats, WorkflowState};
use crate::tools::{FileReadTool, FileWriteTool, ListDirTool, ToolExecutor, ToolRegistry};

/// 文件系统智能体
pub struct FilesystemAgent {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    task_store: Arc<TaskFileStore>,
    system_prompt: String,
}

impl FilesystemAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        task_store: Arc<TaskFileStore>,
        workspace_root: impl AsRef<Path>,
        tool_timeout_secs: u64,
    ) -> Self {
        let root = workspace_root.as_ref();
        let mut registry = ToolRegistry::new();
        registry.register(FileReadTool::new(root));
        registry.register(FileWriteTool::new(root));
        registry.register(ListDirTool::new(root));
        let executor = ToolExecutor::new(registry, tool_timeout_secs);
        let system_prompt = format!(
            "You are the filesystem agent. Work only inside the workspace sandbox.\n\
             Available tools:\n{}\n\
             To call a tool respond with JSON: {{\"tool\": \"...\", \"args\": {{...}}}}.\n\
             Otherwise respond with the final answer in plain text.",
            executor.schema_json()
        );
        Self {
            llm,
            executor,
            task_store,
            system_prompt,
        }
    }
}

#[async_trait]
impl AgentExecutor for FilesystemAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Filesystem
    }

    async fn execute(
        &self,
        mut state: WorkflowState,
        mut usage: UsageStats,
    ) -> (WorkflowState, UsageStats) {
        tracing::info!("Filesystem agent executing");
        usage.increment_agent_usage("filesystem");

        worker::execute_pending_task(
            AgentKind::Filesystem,
            &self.llm,
            &self.system_prompt,
            Some(&self.executor),
            &self.task_store,
            &mut state,
            &mut usage,
        )
        .await;
        (state, usage)
    }
}
