//! Supervisor 智能体：路由决策状态机
//!
//! 每次进入依次检查：规划熔断（错误提及 planner 且 planner 相关消息 ≥ 3 →
//! 直接结束）→ 任务全部终态（聚合 final_result 并结束）→ 构建上下文调用
//! LLM → 决策解析链。LLM 调用失败走长度/问候启发降级；本执行器对图而言
//! 永不抛错。

use std::sync::Arc;

use async_trait::async_trait;

use crate::agents::{AgentExecutor, AgentKind, RouteTarget};
use crate::guardrails::IntentGuardrail;
use crate::llm::{ChatMessage, LlmClient};
use crate::routing::{heuristic_decision, DecisionParser};
use crate::state::{AgentMessage, TaskList, UsageStats, WorkflowState};

/// 连续 planner 相关失败达到该计数即熔断
const PLANNER_FAILURE_THRESHOLD: usize = 3;
/// 上下文携带的历史条数
const HISTORY_CONTEXT_ENTRIES: usize = 3;
/// 上下文中每条历史答案的最大字符数
const HISTORY_RESULT_PREVIEW_CHARS: usize = 200;

const NO_TASKS_MSG: &str = "No tasks required for this request.";

/// Supervisor：构建上下文、调用 LLM、运行决策解析链并应用终态规则
pub struct SupervisorAgent {
    llm: Arc<dyn LlmClient>,
    parser: DecisionParser,
    system_prompt: String,
}

impl SupervisorAgent {
    pub fn new(llm: Arc<dyn LlmClient>, classifier: Arc<IntentGuardrail>) -> Self {
        let capabilities = AgentKind::workers()
            .iter()
            .map(|kind| format!("- {}: {}", kind, kind.capability()))
            .collect::<Vec<_>>()
            .join("\n");
        let system_prompt = format!(
            "You are the supervisor agent. Decide which agent should act next.\n\
             Available agents:\n{}\n\
             - planner: {}\n\
             Route to planner when no task list exists yet. Route to \"__end__\" when the work is done.\n\
             Respond ONLY with JSON: {{\"next_agent\": \"...\", \"reasoning\": \"...\"}}.",
            capabilities,
            AgentKind::Planner.capability()
        );
        Self {
            llm,
            parser: DecisionParser::new(classifier),
            system_prompt,
        }
    }

    /// planner 相关消息计数：role 为 planner，或内容提及 planner
    /// （supervisor 的路由痕迹也算在内）
    fn planner_attributed_count(messages: &[AgentMessage]) -> usize {
        messages
            .iter()
            .filter(|m| m.role == "planner" || m.content.to_lowercase().contains("planner"))
            .count()
    }

    /// 聚合任务结果：非空 result 按序拼接，失败任务以 "Error: ..." 呈现
    fn aggregate_results(task_list: &TaskList) -> String {
        let mut results = Vec::new();
        for task in &task_list.tasks {
            if let Some(result) = task.result.as_deref().filter(|r| !r.is_empty()) {
                results.push(result.to_string());
            } else if let Some(error) = task.error.as_deref() {
                results.push(format!("Error: {}", error));
            }
        }
        results.join("\n")
    }

    /// 决策上下文：用户输入、最近历史（截断预览）、带状态记号的任务清单
    fn build_context(state: &WorkflowState) -> String {
        let mut parts = vec![format!("User Input: {}", state.user_input)];

        if !state.conversation_history.is_empty() {
            parts.push("\n=== Previous Conversation History ===".to_string());
            let skip = state
                .conversation_history
                .len()
                .saturating_sub(HISTORY_CONTEXT_ENTRIES);
            for (i, entry) in state.conversation_history[skip..].iter().enumerate() {
                parts.push(format!("\nPrevious Question {}: {}", i + 1, entry.user_input));
                if !entry.result.is_empty() {
                    let preview: String = entry
                        .result
                        .chars()
                        .take(HISTORY_RESULT_PREVIEW_CHARS)
                        .collect();
                    let preview = if entry.result.chars().count() > HISTORY_RESULT_PREVIEW_CHARS {
                        format!("{}...", preview)
                    } else {
                        preview
                    };
                    parts.push(format!("Previous Answer {}: {}", i + 1, preview));
                }
            }
            parts.push("\n=== End of Conversation History ===\n".to_string());
        }

        match &state.task_list {
            Some(task_list) if task_list.is_empty() => {
                parts.push("\nTask list is empty (no tasks needed).".to_string());
            }
            Some(task_list) => {
                parts.push("\nCurrent Task List:".to_string());
                for (i, task) in task_list.tasks.iter().enumerate() {
                    let glyph = if task.status == crate::state::TaskStatus::Completed {
                        "✓"
                    } else {
                        "○"
                    };
                    parts.push(format!(
                        "  {}. {} [{}] {} (Status: {})",
                        i + 1,
                        glyph,
                        task.agent,
                        task.description,
                        task.status.as_str()
                    ));
                }
                if task_list.all_tasks_completed() {
                    parts.push("\nAll tasks are completed.".to_string());
                } else if let Some(next) = task_list.next_pending() {
                    parts.push(format!(
                        "\nNext pending task: [{}] {}",
                        next.agent, next.description
                    ));
                }
            }
            None => parts.push("\nNo task list exists. Need to create one.".to_string()),
        }

        parts.join("\n")
    }
}

#[async_trait]
impl AgentExecutor for SupervisorAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Supervisor
    }

    async fn execute(
        &self,
        mut state: WorkflowState,
        mut usage: UsageStats,
    ) -> (WorkflowState, UsageStats) {
        tracing::info!("Supervisor agent executing");
        usage.increment_agent_usage("supervisor");

        // 熔断：错误提及 planner 且 planner 相关消息已达阈值
        let planner_count = Self::planner_attributed_count(&state.messages);
        if let Some(error) = state.error.clone() {
            if error.to_lowercase().contains("planner")
                && planner_count >= PLANNER_FAILURE_THRESHOLD
            {
                tracing::error!("Planner has failed multiple times, ending workflow");
                state.current_agent = Some(RouteTarget::End);
                state.final_result =
                    Some(format!("Workflow ended due to planner errors: {}", error));
                return (state, usage);
            }
        }

        // 任务全部终态 → 聚合结果并立即结束
        if let Some(task_list) = &state.task_list {
            if !task_list.is_empty() && task_list.all_tasks_completed() {
                tracing::info!("All tasks completed, ending workflow");
                state.current_agent = Some(RouteTarget::End);
                state.final_result = Some(Self::aggregate_results(task_list));
                state
                    .messages
                    .push(AgentMessage::supervisor("All tasks completed - ending workflow"));
                return (state, usage);
            }
        }

        let context = Self::build_context(&state);
        let messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(context),
        ];

        let before = self.llm.token_usage();
        let decision = match self.llm.complete(&messages).await {
            Ok(response) => {
                usage.record_token_delta(before, self.llm.token_usage());
                tracing::debug!(response = %response.chars().take(200).collect::<String>(), "Supervisor LLM response");
                self.parser.parse(&response, &state.user_input)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Supervisor LLM call failed, using heuristic fallback");
                let decision = heuristic_decision(&state.user_input);
                state.messages.push(AgentMessage::supervisor(format!(
                    "Supervisor exception occurred, falling back to {}: {}",
                    decision.next_agent, e
                )));
                decision
            }
        };

        tracing::info!(
            next_agent = %decision.next_agent,
            reasoning = %decision.reasoning,
            "Supervisor decision"
        );
        state.current_agent = Some(decision.next_agent);

        // 存在但为空的任务清单 → 无需任何工作
        if state.task_list.as_ref().is_some_and(|t| t.is_empty()) {
            state.current_agent = Some(RouteTarget::End);
            state.final_result = Some(NO_TASKS_MSG.to_string());
        }

        // 带任务结束 → 聚合 final_result
        if decision.next_agent == RouteTarget::End {
            if let Some(task_list) = &state.task_list {
                if !task_list.is_empty() {
                    state.final_result = Some(Self::aggregate_results(task_list));
                }
            }
        }

        state.messages.push(AgentMessage::supervisor(format!(
            "Routing to {}: {}",
            decision.next_agent, decision.reasoning
        )));

        (state, usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::state::{Task, TaskStatus};

    fn supervisor_with(responses: &[&str]) -> SupervisorAgent {
        SupervisorAgent::new(
            Arc::new(MockLlmClient::with_responses(responses.iter().copied())),
            Arc::new(IntentGuardrail::new()),
        )
    }

    fn completed_task(result: &str) -> Task {
        let mut task = Task::new(AgentKind::Mathematics, "t");
        task.status = TaskStatus::Completed;
        task.result = Some(result.to_string());
        task
    }

    fn failed_task(error: &str) -> Task {
        let mut task = Task::new(AgentKind::Filesystem, "t");
        task.status = TaskStatus::Failed;
        task.error = Some(error.to_string());
        task
    }

    #[tokio::test]
    async fn test_all_tasks_completed_aggregates_and_ends() {
        let supervisor = supervisor_with(&[]);
        let mut state = WorkflowState::new("question");
        state.task_list = Some(TaskList::new(vec![
            completed_task("first"),
            failed_task("disk full"),
        ]));

        let (state, _) = supervisor.execute(state, UsageStats::default()).await;
        assert_eq!(state.current_agent, Some(RouteTarget::End));
        assert_eq!(
            state.final_result.as_deref(),
            Some("first\nError: disk full")
        );
    }

    #[tokio::test]
    async fn test_structured_decision_routes() {
        let supervisor = supervisor_with(&[
            r#"{"next_agent": "planner", "reasoning": "no plan yet"}"#,
        ]);
        let state = WorkflowState::new("do a complex thing");
        let (state, usage) = supervisor.execute(state, UsageStats::default()).await;

        assert_eq!(
            state.current_agent,
            Some(RouteTarget::Agent(AgentKind::Planner))
        );
        assert_eq!(usage.agent_usage.get("supervisor"), Some(&1));
        assert!(state
            .messages
            .iter()
            .any(|m| m.role == "supervisor" && m.content == "Routing to planner: no plan yet"));
    }

    #[tokio::test]
    async fn test_empty_task_list_short_circuits_to_no_tasks() {
        let supervisor = supervisor_with(&[
            r#"{"next_agent": "general_qa", "reasoning": "whatever"}"#,
        ]);
        let mut state = WorkflowState::new("question");
        state.task_list = Some(TaskList::default());

        let (state, _) = supervisor.execute(state, UsageStats::default()).await;
        assert_eq!(state.current_agent, Some(RouteTarget::End));
        assert_eq!(state.final_result.as_deref(), Some(NO_TASKS_MSG));
    }

    #[tokio::test]
    async fn test_circuit_breaker_requires_three_attributions() {
        // 2 条 planner 相关消息：不熔断
        let supervisor = supervisor_with(&[
            r#"{"next_agent": "planner", "reasoning": "retry planning"}"#,
        ]);
        let mut state = WorkflowState::new("question");
        state.error = Some("Planner error: bad json".to_string());
        for _ in 0..2 {
            state
                .messages
                .push(AgentMessage::supervisor("Routing to planner: planning"));
        }
        let (state, _) = supervisor.execute(state, UsageStats::default()).await;
        assert_eq!(
            state.current_agent,
            Some(RouteTarget::Agent(AgentKind::Planner))
        );

        // 3 条：熔断并携带最后的错误文本
        let supervisor = supervisor_with(&[]);
        let mut state = WorkflowState::new("question");
        state.error = Some("Planner error: bad json".to_string());
        for _ in 0..3 {
            state
                .messages
                .push(AgentMessage::supervisor("Routing to planner: planning"));
        }
        let (state, _) = supervisor.execute(state, UsageStats::default()).await;
        assert_eq!(state.current_agent, Some(RouteTarget::End));
        assert!(state
            .final_result
            .as_deref()
            .unwrap()
            .contains("Planner error: bad json"));
    }

    #[tokio::test]
    async fn test_context_shows_task_glyphs() {
        let mut state = WorkflowState::new("q");
        state.task_list = Some(TaskList::new(vec![
            completed_task("done"),
            Task::new(AgentKind::Filesystem, "write file"),
        ]));
        let context = SupervisorAgent::build_context(&state);
        assert!(context.contains("✓ [mathematics]"));
        assert!(context.contains("○ [filesystem]"));
        assert!(context.contains("Next pending task: [filesystem] write file"));
    }
}
