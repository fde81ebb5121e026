//! 规划智能体
//!
//! 调用 LLM 把用户请求拆解为有序任务清单（JSON {reasoning, tasks}）。
//! 新计划整体替换旧清单，从不合并；解析失败时置 state.error 并清空
//! current_agent，交回 supervisor（多次失败触发熔断）。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::agents::{AgentExecutor, AgentKind};
use crate::error::AgentError;
use crate::llm::{ChatMessage, LlmClient};
use crate::routing::extract_json_block;
use crate::state::{AgentMessage, Task, TaskFileStore, TaskList, UsageStats, WorkflowState};

/// 上下文中每条历史答案的最大字符数
const HISTORY_RESULT_PREVIEW_CHARS: usize = 300;
/// 上下文携带的历史条数
const HISTORY_CONTEXT_ENTRIES: usize = 3;

#[derive(Deserialize)]
struct RawPlan {
    #[serde(default)]
    reasoning: String,
    tasks: Vec<RawPlanTask>,
}

#[derive(Deserialize)]
struct RawPlanTask {
    agent: String,
    description: String,
}

/// 规划智能体
pub struct PlannerAgent {
    llm: Arc<dyn LlmClient>,
    task_store: Arc<TaskFileStore>,
    system_prompt: String,
}

impl PlannerAgent {
    pub fn new(llm: Arc<dyn LlmClient>, task_store: Arc<TaskFileStore>) -> Self {
        let capabilities = AgentKind::workers()
            .iter()
            .map(|kind| format!("- {}: {}", kind, kind.capability()))
            .collect::<Vec<_>>()
            .join("\n");
        let system_prompt = format!(
            "You are the planner agent. Break the user request into an ordered task list.\n\
             Available agents:\n{}\n\
             Respond ONLY with JSON: {{\"reasoning\": \"...\", \"tasks\": [{{\"agent\": \"...\", \"description\": \"...\"}}]}}.\n\
             Use an empty tasks array when no work is required.",
            capabilities
        );
        Self {
            llm,
            task_store,
            system_prompt,
        }
    }

    /// 规划上下文：用户输入 + 最近历史（截断预览），提示跟进语境
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
            parts.push(
                "Note: Consider the conversation history when planning tasks. \
                 The user may be asking a follow-up question or referring to previous context."
                    .to_string(),
            );
        }

        parts.join("\n")
    }

    /// 解析计划 JSON；未知智能体或非工作智能体一律报错
    fn parse_plan(response: &str) -> Result<(String, Vec<Task>), AgentError> {
        let json = extract_json_block(response).ok_or_else(|| {
            AgentError::JsonParseError("no JSON object in planner response".to_string())
        })?;
        let raw: RawPlan = serde_json::from_str(json)
            .map_err(|e| AgentError::JsonParseError(e.to_string()))?;

        let mut tasks = Vec::with_capacity(raw.tasks.len());
        for task in raw.tasks {
            let kind = AgentKind::parse(&task.agent)
                .filter(|kind| AgentKind::workers().contains(kind))
                .ok_or_else(|| {
                    AgentError::UnknownAgent(format!(
                        "{} (available agents: graph, filesystem, general_qa, mathematics)",
                        task.agent
                    ))
                })?;
            tasks.push(Task::new(kind, task.description));
        }
        Ok((raw.reasoning, tasks))
    }
}

#[async_trait]
impl AgentExecutor for PlannerAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Planner
    }

    async fn execute(
        &self,
        mut state: WorkflowState,
        mut usage: UsageStats,
    ) -> (WorkflowState, UsageStats) {
        tracing::info!("Planner agent executing");
        usage.increment_agent_usage("planner");

        let context = Self::build_context(&state);
        let messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(context),
        ];

        let before = self.llm.token_usage();
        let outcome = match self.llm.complete(&messages).await {
            Ok(response) => {
                usage.record_token_delta(before, self.llm.token_usage());
                Self::parse_plan(&response)
            }
            Err(e) => Err(AgentError::LlmError(e)),
        };

        match outcome {
            Ok((reasoning, tasks)) => {
                let count = tasks.len();
                state.task_list = Some(TaskList::new(tasks));
                self.task_store.save_plan(&state, &reasoning);
                tracing::info!(tasks = count, "Planner created task list");
                state.messages.push(AgentMessage::planner(format!(
                    "Created task plan with {} tasks. Reasoning: {}",
                    count, reasoning
                )));
            }
            Err(e) => {
                tracing::error!(error = %e, "Planner error");
                state.error = Some(format!("Planner error: {}", e));
                // 交回 supervisor 重新决策；重复失败会触发熔断
                state.current_agent = None;
            }
        }

        (state, usage)
    }
}
