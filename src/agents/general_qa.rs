//! 通用问答智能体
//!
//! 无工具，直接用 LLM 生成对话式回复。Supervisor 对简单查询可不经规划直接
//! 路由到此：无任务清单时就地应答并结束本回合。

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::{worker, AgentExecutor, AgentKind, RouteTarget};
use crate::llm::LlmClient;
use crate::state::{AgentMessage, TaskFileStore, UsageStats, WorkflowState};

const GREETING_REPLY: &str = "Hello! I'm here to help you with various tasks including file operations, mathematical calculations, graph queries, and more. What would you like assistance with?";
const STATUS_REPLY: &str = "I'm doing well, thank you! I'm ready to help you with your tasks. What can I assist you with today?";
const CLARIFY_REPLY: &str = "I understand you need assistance. For complex requests, I can create a task plan to help organize the work. Could you provide more details about what you'd like to accomplish?";

/// 通用问答智能体
pub struct GeneralQaAgent {
    llm: Arc<dyn LlmClient>,
    task_store: Arc<TaskFileStore>,
    system_prompt: String,
}

impl GeneralQaAgent {
    pub fn new(llm: Arc<dyn LlmClient>, task_store: Arc<TaskFileStore>) -> Self {
        Self {
            llm,
            task_store,
            system_prompt: "You are the general_qa agent, a friendly conversational assistant. \
                            Answer the task directly and concisely in plain text."
                .to_string(),
        }
    }

    /// 无任务清单时的直接应答
    fn direct_reply(user_input: &str) -> &'static str {
        let lower = user_input.to_lowercase();
        if ["hello", "hi", "hey", "howdy"]
            .iter()
            .any(|greeting| lower.contains(greeting))
        {
            GREETING_REPLY
        } else if lower.contains("how are you") || lower.contains("what's up") {
            STATUS_REPLY
        } else {
            CLARIFY_REPLY
        }
    }
}

#[async_trait]
impl AgentExecutor for GeneralQaAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::GeneralQa
    }

    async fn execute(
        &self,
        mut state: WorkflowState,
        mut usage: UsageStats,
    ) -> (WorkflowState, UsageStats) {
        tracing::info!("General QA agent executing");
        usage.increment_agent_usage("general_qa");

        if state.task_list.is_none() {
            let reply = Self::direct_reply(&state.user_input);
            state.final_result = Some(reply.to_string());
            state.current_agent = Some(RouteTarget::End);
            state.messages.push(AgentMessage::from_agent(
                AgentKind::GeneralQa,
                format!("Handled conversational query: {}", reply),
            ));
            return (state, usage);
        }

        worker::execute_pending_task(
            AgentKind::GeneralQa,
            &self.llm,
            &self.system_prompt,
            None,
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

    #[tokio::test]
    async fn test_greeting_without_task_list_ends_turn() {
        let dir = tempfile::tempdir().unwrap();
        let agent = GeneralQaAgent::new(
            Arc::new(MockLlmClient::new()),
            Arc::new(TaskFileStore::new(dir.path())),
        );
        let state = WorkflowState::new("hello");
        let (state, usage) = agent.execute(state, UsageStats::default()).await;

        assert_eq!(state.current_agent, Some(RouteTarget::End));
        assert!(state.final_result.unwrap().starts_with("Hello!"));
        assert_eq!(usage.agent_usage.get("general_qa"), Some(&1));
    }
}
