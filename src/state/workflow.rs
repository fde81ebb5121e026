//! 编排状态：消息、用量统计、对话历史与每回合工作流状态
//!
//! WorkflowState 由单个在途回合独占；延续层是唯一按 thread id 读写持久副本的
//! 权威。messages 是只追加日志；conversation_history 每个完成的回合恰好追加
//! 一条（按 user_input + result 去重）。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::agents::{AgentKind, RouteTarget};
use crate::state::task::TaskList;

/// ConversationEntry 保留的消息快照条数
pub const SNAPSHOT_MESSAGES: usize = 10;

/// 角色标注消息；role 为智能体名或 "user"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub role: String,
    pub content: String,
}

impl AgentMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn supervisor(content: impl Into<String>) -> Self {
        Self::new("supervisor", content)
    }

    pub fn planner(content: impl Into<String>) -> Self {
        Self::new("planner", content)
    }

    pub fn from_agent(kind: AgentKind, content: impl Into<String>) -> Self {
        Self::new(kind.as_str(), content)
    }
}

/// Token 用量（单调递增计数）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenStats {
    pub fn add(&mut self, input: u64, output: u64) {
        self.input_tokens += input;
        self.output_tokens += output;
        self.total_tokens += input + output;
    }
}

/// 智能体与工具的使用计数，以及 token 统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub agent_usage: HashMap<String, u64>,
    pub tool_usage: HashMap<String, u64>,
    pub token_stats: TokenStats,
}

impl UsageStats {
    pub fn increment_agent_usage(&mut self, agent_name: &str) {
        *self.agent_usage.entry(agent_name.to_string()).or_insert(0) += 1;
    }

    pub fn increment_tool_usage(&mut self, tool_name: &str) {
        *self.tool_usage.entry(tool_name.to_string()).or_insert(0) += 1;
    }

    /// 用 LLM 客户端调用前后的累计计数差值累加 token 统计
    pub fn record_token_delta(&mut self, before: (u64, u64, u64), after: (u64, u64, u64)) {
        self.token_stats.add(
            after.0.saturating_sub(before.0),
            after.1.saturating_sub(before.1),
        );
    }
}

/// 一条对话历史：一个完成回合的输入、最终结果与消息快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub user_input: String,
    pub result: String,
    pub messages: Vec<AgentMessage>,
}

/// 每回合/每线程的编排状态
///
/// current_agent 为 None 表示"路由未决"；RouteTarget::End 是结束本回合的哨兵。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub user_input: String,
    pub task_list: Option<TaskList>,
    pub current_agent: Option<RouteTarget>,
    pub messages: Vec<AgentMessage>,
    pub usage_stats: UsageStats,
    pub final_result: Option<String>,
    pub error: Option<String>,
    pub conversation_history: Vec<ConversationEntry>,
}

impl WorkflowState {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            task_list: None,
            current_agent: None,
            messages: Vec::new(),
            usage_stats: UsageStats::default(),
            final_result: None,
            error: None,
            conversation_history: Vec::new(),
        }
    }

    /// 从检查点恢复后开启新回合：保留 messages / usage_stats /
    /// conversation_history，重置其余的每回合字段
    pub fn resumed_for_turn(mut self, user_input: impl Into<String>) -> Self {
        self.user_input = user_input.into();
        self.task_list = None;
        self.current_agent = None;
        self.final_result = None;
        self.error = None;
        self
    }

    /// 幂等守卫：历史中是否已有完全相同的 (user_input, result) 条目
    pub fn history_contains(&self, user_input: &str, result: &str) -> bool {
        self.conversation_history
            .iter()
            .any(|entry| entry.user_input == user_input && entry.result == result)
    }

    /// 最近 SNAPSHOT_MESSAGES 条消息的快照（用于 ConversationEntry）
    pub fn snapshot_messages(&self) -> Vec<AgentMessage> {
        let skip = self.messages.len().saturating_sub(SNAPSHOT_MESSAGES);
        self.messages[skip..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resumed_for_turn_preserves_continuity_fields() {
        let mut state = WorkflowState::new("first question");
        state.messages.push(AgentMessage::supervisor("Routing to planner: plan"));
        state.usage_stats.increment_agent_usage("supervisor");
        state.final_result = Some("answer".to_string());
        state.error = Some("stale".to_string());
        state.task_list = Some(TaskList::default());
        state.conversation_history.push(ConversationEntry {
            user_input: "first question".to_string(),
            result: "answer".to_string(),
            messages: vec![],
        });

        let resumed = state.resumed_for_turn("second question");
        assert_eq!(resumed.user_input, "second question");
        assert_eq!(resumed.messages.len(), 1);
        assert_eq!(resumed.conversation_history.len(), 1);
        assert_eq!(resumed.usage_stats.agent_usage.get("supervisor"), Some(&1));
        assert!(resumed.task_list.is_none());
        assert!(resumed.current_agent.is_none());
        assert!(resumed.final_result.is_none());
        assert!(resumed.error.is_none());
    }

    #[test]
    fn test_history_contains_exact_match_only() {
        let mut state = WorkflowState::new("q");
        state.conversation_history.push(ConversationEntry {
            user_input: "q".to_string(),
            result: "r".to_string(),
            messages: vec![],
        });
        assert!(state.history_contains("q", "r"));
        assert!(!state.history_contains("q", "other"));
        assert!(!state.history_contains("other", "r"));
    }

    #[test]
    fn test_snapshot_keeps_last_messages() {
        let mut state = WorkflowState::new("q");
        for i in 0..(SNAPSHOT_MESSAGES + 5) {
            state.messages.push(AgentMessage::supervisor(format!("m{}", i)));
        }
        let snapshot = state.snapshot_messages();
        assert_eq!(snapshot.len(), SNAPSHOT_MESSAGES);
        assert_eq!(snapshot[0].content, "m5");
    }

    #[test]
    fn test_token_delta_is_monotonic() {
        let mut usage = UsageStats::default();
        usage.record_token_delta((10, 5, 15), (30, 15, 45));
        assert_eq!(usage.token_stats.input_tokens, 20);
        assert_eq!(usage.token_stats.output_tokens, 10);
        assert_eq!(usage.token_stats.total_tokens, 30);

        // 计数器倒退（如客户端被替换）时不应下溢
        usage.record_token_delta((30, 15, 45), (0, 0, 0));
        assert_eq!(usage.token_stats.total_tokens, 30);
    }
}
