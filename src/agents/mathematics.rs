//! 数学智能体
//!
//! 持有 calculator 工具；LLM 以 {"tool": "calculator", "args": {...}} 发起
//! 计算，观察结果后给出最终答复。

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::{worker, AgentExecutor, AgentKind};
use crate::llm::LlmClient;
use crate::state::{TaskFileStore, UsageStats, WorkflowState};
use crate::tools::{CalculatorTool, ToolExecutor, ToolRegistry};

/// 数学智能体
pub struct MathematicsAgent {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    task_store: Arc<TaskFileStore>,
    system_prompt: String,
}

impl MathematicsAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        task_store: Arc<TaskFileStore>,
        tool_timeout_secs: u64,
    ) -> Self {
        let mut registry = ToolRegistry::new();
        registry.register(CalculatorTool);
        let executor = ToolExecutor::new(registry, tool_timeout_secs);
        let system_prompt = format!(
            "You are the mathematics agent. Solve the task numerically.\n\
             Available tools:\n{}\n\
             To call a tool respond with JSON: {{\"tool\": \"calculator\", \"args\": {{\"expression\": \"...\"}}}}.\n\
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
impl AgentExecutor for MathematicsAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Mathematics
    }

    async fn execute(
        &self,
        mut state: WorkflowState,
        mut usage: UsageStats,
    ) -> (WorkflowState, UsageStats) {
        tracing::info!("Mathematics agent executing");
        usage.increment_agent_usage("mathematics");

        worker::execute_pending_task(
            AgentKind::Mathematics,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::state::{Task, TaskList, TaskStatus};

    #[tokio::test]
    async fn test_calculator_round_completes_task() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::with_responses([
            r#"{"tool": "calculator", "args": {"expression": "21 * 2"}}"#,
            "21 * 2 = 42",
        ]));
        let agent =
            MathematicsAgent::new(llm, Arc::new(TaskFileStore::new(dir.path())), 5);

        let mut state = WorkflowState::new("what is 21 times 2?");
        state.task_list = Some(TaskList::new(vec![Task::new(
            AgentKind::Mathematics,
            "Compute 21 * 2",
        )]));

        let (state, usage) = agent.execute(state, UsageStats::default()).await;
        let task = &state.task_list.as_ref().unwrap().tasks[0];
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.as_deref(), Some("21 * 2 = 42"));
        assert_eq!(usage.tool_usage.get("calculator"), Some(&1));
    }
}
