//! 图查询智能体
//!
//! 持有 graph_query 工具，对内存属性图做节点 / 邻居 / 计数 / 列表查询。

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::agents::{worker, AgentExecutor, AgentKind};
use crate::llm::LlmClient;
use crate::state::{TaskFileStore, UsageStats, WorkflowState};
use crate::tools::{GraphQueryTool, GraphStore, ToolExecutor, ToolRegistry};

/// 图查询智能体
pub struct GraphAgent {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    task_store: Arc<TaskFileStore>,
    system_prompt: String,
}

impl GraphAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        task_store: Arc<TaskFileStore>,
        store: Arc<RwLock<GraphStore>>,
        tool_timeout_secs: u64,
    ) -> Self {
        let mut registry = ToolRegistry::new();
        registry.register(GraphQueryTool::new(store));
        let executor = ToolExecutor::new(registry, tool_timeout_secs);
        let system_prompt = format!(
            "You are the graph agent. Answer the task by querying the property graph.\n\
             Available tools:\n{}\n\
             To call a tool respond with JSON: {{\"tool\": \"graph_query\", \"args\": {{...}}}}.\n\
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
impl AgentExecutor for GraphAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Graph
    }

    async fn execute(
        &self,
        mut state: WorkflowState,
        mut usage: UsageStats,
    ) -> (WorkflowState, UsageStats) {
        tracing::info!("Graph agent executing");
        usage.increment_agent_usage("graph");

        worker::execute_pending_task(
            AgentKind::Graph,
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
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_graph_query_round() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = GraphStore::new();
        store.add_node("api", "Service", HashMap::new());
        let store = Arc::new(RwLock::new(store));

        let llm = Arc::new(MockLlmClient::with_responses([
            r#"{"tool": "graph_query", "args": {"op": "count", "label": "Service"}}"#,
            "There is 1 service node.",
        ]));
        let agent = GraphAgent::new(llm, Arc::new(TaskFileStore::new(dir.path())), store, 5);

        let mut state = WorkflowState::new("how many services?");
        state.task_list = Some(TaskList::new(vec![Task::new(
            AgentKind::Graph,
            "Count service nodes",
        )]));

        let (state, usage) = agent.execute(state, UsageStats::default()).await;
        assert_eq!(
            state.task_list.as_ref().unwrap().tasks[0].status,
            TaskStatus::Completed
        );
        assert_eq!(usage.tool_usage.get("graph_query"), Some(&1));
    }
}
