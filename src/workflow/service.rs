//! 回合驱动服务：护栏 → 恢复 → 图执行 → 持久化 → 结果封装
//!
//! 一次回合：输入护栏（拒绝则任何智能体都不运行）→ 规整/生成 thread id →
//! 按 thread 串行化 → 从检查点恢复或初始化 → 图循环 → 写回检查点 →
//! 输出护栏（不合规则丢弃回复）→ TurnResult。同一 thread id 的并发回合被
//! 异步互斥锁串行化；不同 thread id 相互独立。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::guardrails::GuardrailManager;
use crate::state::{AgentMessage, ConversationEntry, UsageStats, WorkflowState};
use crate::workflow::checkpoint::CheckpointStore;
use crate::workflow::graph::WorkflowGraph;

/// 一个回合的结果封装
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub user_input: String,
    pub final_result: Option<String>,
    pub error: Option<String>,
    pub usage_stats: UsageStats,
    pub messages: Vec<AgentMessage>,
    pub thread_id: String,
    pub conversation_history: Vec<ConversationEntry>,
}

impl TurnResult {
    fn rejected(user_input: &str, thread_id: String, error: String) -> Self {
        Self {
            user_input: user_input.to_string(),
            final_result: None,
            error: Some(error),
            usage_stats: UsageStats::default(),
            messages: Vec::new(),
            thread_id,
            conversation_history: Vec::new(),
        }
    }
}

/// 回合驱动服务
pub struct WorkflowService {
    graph: WorkflowGraph,
    guardrails: GuardrailManager,
    checkpoints: Arc<dyn CheckpointStore>,
    /// 每线程一把异步互斥锁，串行化同一 thread 的回合
    thread_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// 空白或字面量 "string"（常见的占位请求值）视为未提供
fn normalize_thread_id(thread_id: Option<&str>) -> Option<String> {
    let id = thread_id?.trim();
    if id.is_empty() || id.eq_ignore_ascii_case("string") {
        return None;
    }
    Some(id.to_string())
}

impl WorkflowService {
    pub fn new(
        graph: WorkflowGraph,
        guardrails: GuardrailManager,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            graph,
            guardrails,
            checkpoints,
            thread_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, thread_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.thread_locks.lock().await;
        locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 执行一个回合
    pub async fn run_turn(&self, user_input: &str, thread_id: Option<&str>) -> TurnResult {
        let thread_id = normalize_thread_id(thread_id).unwrap_or_else(|| {
            let id = uuid::Uuid::new_v4().to_string();
            tracing::info!(thread_id = %id, "Created new conversation thread");
            id
        });
        tracing::info!(thread_id = %thread_id, "Starting workflow turn");

        // 输入护栏：拒绝即早退，任何智能体都不运行
        let input_check = self.guardrails.check_input(user_input).await;
        if !input_check.passed {
            let reason = input_check
                .reason
                .unwrap_or_else(|| "input rejected".to_string());
            tracing::warn!(reason = %reason, "Input guardrail failed");
            return TurnResult::rejected(
                user_input,
                thread_id,
                format!("Input validation failed: {}", reason),
            );
        }

        let lock = self.lock_for(&thread_id).await;
        let _turn_guard = lock.lock().await;

        // 恢复或初始化
        let initial = match self.checkpoints.get(&thread_id).await {
            Some(previous) => {
                tracing::info!(
                    thread_id = %thread_id,
                    entries = previous.conversation_history.len(),
                    messages = previous.messages.len(),
                    "Restored state from checkpoint"
                );
                previous.resumed_for_turn(user_input)
            }
            None => WorkflowState::new(user_input),
        };

        let final_state = match self.graph.run(initial).await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(error = %e, "Workflow error");
                return TurnResult::rejected(user_input, thread_id, e.to_string());
            }
        };

        // 先持久化（每线程 last-write-wins），输出护栏只影响对外回复
        self.checkpoints
            .put(&thread_id, final_state.clone())
            .await;

        if let Some(result) = &final_state.final_result {
            let output_check = self.guardrails.check_output(result).await;
            if !output_check.passed {
                let reason = output_check
                    .reason
                    .unwrap_or_else(|| "output rejected".to_string());
                tracing::warn!(reason = %reason, "Output guardrail failed");
                return TurnResult {
                    user_input: final_state.user_input,
                    final_result: None,
                    error: Some(format!("Output validation failed: {}", reason)),
                    usage_stats: final_state.usage_stats,
                    messages: final_state.messages,
                    thread_id,
                    conversation_history: final_state.conversation_history,
                };
            }
        }

        tracing::info!(thread_id = %thread_id, "Workflow turn completed");
        TurnResult {
            user_input: final_state.user_input,
            final_result: final_state.final_result,
            error: final_state.error,
            usage_stats: final_state.usage_stats,
            messages: final_state.messages,
            thread_id,
            conversation_history: final_state.conversation_history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_thread_id() {
        assert_eq!(normalize_thread_id(None), None);
        assert_eq!(normalize_thread_id(Some("")), None);
        assert_eq!(normalize_thread_id(Some("  ")), None);
        assert_eq!(normalize_thread_id(Some("string")), None);
        assert_eq!(normalize_thread_id(Some("STRING")), None);
        assert_eq!(
            normalize_thread_id(Some(" thread-7 ")),
            Some("thread-7".to_string())
        );
    }
}
