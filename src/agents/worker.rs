//! 工作智能体公共流程
//!
//! 取本智能体的下一个 Pending 任务 → InProgress → LLM（可选一轮工具调用）→
//! Completed / Failed → 尽力而为地更新任务文件。工具失败折叠为 "Error: ..."
//! 观察文本回馈给 LLM，从不升级为回合失败。

use std::sync::Arc;

use serde::Deserialize;

use crate::agents::AgentKind;
use crate::error::AgentError;
use crate::llm::{ChatMessage, LlmClient};
use crate::routing::extract_json_block;
use crate::state::{AgentMessage, TaskFileStore, UsageStats, WorkflowState};
use crate::tools::ToolExecutor;

/// 智能体 LLM 输出：直接回复或工具调用
#[derive(Debug, Clone)]
pub enum AgentOutput {
    Response(String),
    ToolCall {
        tool: String,
        args: serde_json::Value,
    },
}

#[derive(Deserialize)]
struct RawToolCall {
    tool: String,
    #[serde(default)]
    args: serde_json::Value,
}

/// 解析智能体 LLM 输出：含有效 {"tool": ..., "args": ...} JSON 则为 ToolCall，
/// 否则原文即回复（格式不良一律当作回复，不报错）
pub fn parse_agent_output(output: &str) -> AgentOutput {
    if let Some(json) = extract_json_block(output) {
        if let Ok(call) = serde_json::from_str::<RawToolCall>(json) {
            if !call.tool.is_empty() {
                return AgentOutput::ToolCall {
                    tool: call.tool,
                    args: call.args,
                };
            }
        }
    }
    AgentOutput::Response(output.trim().to_string())
}

/// 一次 LLM 调用，如产生工具调用则执行并带观察结果再要一次最终答复
pub async fn run_tool_round(
    llm: &Arc<dyn LlmClient>,
    system_prompt: &str,
    executor: Option<&ToolExecutor>,
    task_description: &str,
    usage: &mut UsageStats,
) -> Result<String, AgentError> {
    let mut messages = vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(task_description),
    ];

    let before = llm.token_usage();
    let output = llm
        .complete(&messages)
        .await
        .map_err(AgentError::LlmError)?;
    usage.record_token_delta(before, llm.token_usage());

    let Some(executor) = executor else {
        return Ok(output.trim().to_string());
    };

    match parse_agent_output(&output) {
        AgentOutput::Response(text) => Ok(text),
        AgentOutput::ToolCall { tool, args } => {
            let observation = match executor.execute(&tool, args, usage).await {
                Ok(result) => result,
                Err(e) => format!("Error: {e}"),
            };

            messages.push(ChatMessage::assistant(output.clone()));
            messages.push(ChatMessage::user(format!(
                "Observation from {}: {}\nProvide the final answer for the task.",
                tool, observation
            )));
            let before = llm.token_usage();
            let final_text = llm
                .complete(&messages)
                .await
                .map_err(AgentError::LlmError)?;
            usage.record_token_delta(before, llm.token_usage());

            let final_text = final_text.trim();
            if final_text.is_empty() {
                // LLM 最终答复为空时直接用工具结果
                Ok(observation)
            } else {
                Ok(final_text.to_string())
            }
        }
    }
}

/// 标准任务执行流程；无任务清单时置 state.error 交回 supervisor 重新决策
pub async fn execute_pending_task(
    kind: AgentKind,
    llm: &Arc<dyn LlmClient>,
    system_prompt: &str,
    executor: Option<&ToolExecutor>,
    task_store: &TaskFileStore,
    state: &mut WorkflowState,
    usage: &mut UsageStats,
) {
    let (index, description) = {
        let Some(task_list) = state.task_list.as_ref() else {
            tracing::error!(agent = %kind, "No task list available");
            state.error = Some("No task list available".to_string());
            return;
        };
        match task_list.find_next_pending(kind) {
            Some((index, task)) => (index, task.description.clone()),
            None => {
                tracing::warn!(agent = %kind, "No pending task found");
                state.messages.push(AgentMessage::from_agent(
                    kind,
                    format!("No pending task for {} agent", kind),
                ));
                return;
            }
        }
    };

    let task_description = format!(
        "Task: {}\n\nUser Request: {}",
        description, state.user_input
    );
    if let Some(list) = state.task_list.as_mut() {
        list.mark_in_progress(index);
    }

    match run_tool_round(llm, system_prompt, executor, &task_description, usage).await {
        Ok(result_text) => {
            let result_text = if result_text.trim().is_empty() {
                tracing::error!(agent = %kind, "Agent produced empty result");
                "Error: no result was generated for this task".to_string()
            } else {
                result_text
            };
            if let Some(list) = state.task_list.as_mut() {
                list.mark_completed(index, result_text.clone());
            }
            tracing::info!(agent = %kind, task = %description, "Task completed");
            task_store.update_latest(state);
            state.messages.push(AgentMessage::from_agent(
                kind,
                format!("Completed task: {}\nResult: {}", description, result_text),
            ));
        }
        Err(e) => {
            tracing::error!(agent = %kind, error = %e, "Agent task failed");
            if let Some(list) = state.task_list.as_mut() {
                list.mark_failed(index, e.to_string());
            }
            task_store.update_latest(state);
            state.error = Some(format!("{} agent error: {}", kind, e));
        }
    }
}
