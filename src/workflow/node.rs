//! 节点适配器：把智能体执行包装为最小状态差量
//!
//! 智能体拿到整份状态克隆，适配器对比执行前后产出 StateUpdate：
//! 按值变更才携带的标量字段、总是携带的 task_list（任务被原地推进，
//! 结构相等性不可靠）与 usage_stats（单调计数，整体替换安全）、只含新增
//! 项的 messages（加法合并），以及至多一条新的 ConversationEntry——
//! 仅当本回合刚到达 End 且 final_result 非空且历史中不存在等值条目时产生，
//! 保证同一终态转换被重复执行也只追加一次。

use std::sync::Arc;

use crate::agents::{AgentExecutor, AgentKind, RouteTarget};
use crate::state::{AgentMessage, ConversationEntry, TaskList, UsageStats, WorkflowState};

/// 一次节点执行产出的最小状态差量
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    /// 外层 Some 表示字段有变化，内层是新值
    pub current_agent: Option<Option<RouteTarget>>,
    pub final_result: Option<Option<String>>,
    pub error: Option<Option<String>>,
    /// 执行后存在即携带
    pub task_list: Option<TaskList>,
    /// 仅新增消息
    pub messages: Vec<AgentMessage>,
    /// 总是携带（计数单调递增）
    pub usage_stats: Option<UsageStats>,
    /// 本回合刚完成时的新历史条目
    pub new_history_entry: Option<ConversationEntry>,
}

impl StateUpdate {
    /// 合并进状态：messages 与 conversation_history 加法合并，其余替换。
    /// 历史条目在此处再做一次等值去重，重复应用同一差量也只 +1。
    pub fn apply(self, state: &mut WorkflowState) {
        if let Some(current_agent) = self.current_agent {
            state.current_agent = current_agent;
        }
        if let Some(task_list) = self.task_list {
            state.task_list = Some(task_list);
        }
        if let Some(final_result) = self.final_result {
            state.final_result = final_result;
        }
        if let Some(error) = self.error {
            state.error = error;
        }
        state.messages.extend(self.messages);
        if let Some(usage_stats) = self.usage_stats {
            state.usage_stats = usage_stats;
        }
        if let Some(entry) = self.new_history_entry {
            if !state.history_contains(&entry.user_input, &entry.result) {
                state.conversation_history.push(entry);
            }
        }
    }
}

/// 图节点：包装任意智能体执行器，产出最小差量
pub struct NodeAdapter {
    executor: Arc<dyn AgentExecutor>,
}

impl NodeAdapter {
    pub fn new(executor: Arc<dyn AgentExecutor>) -> Self {
        Self { executor }
    }

    pub fn kind(&self) -> AgentKind {
        self.executor.kind()
    }

    /// 克隆快照交给执行器，对比前后状态产出差量
    pub async fn invoke(&self, pre: &WorkflowState) -> StateUpdate {
        let (post, post_usage) = self
            .executor
            .execute(pre.clone(), pre.usage_stats.clone())
            .await;
        diff_states(pre, &post, post_usage)
    }
}

fn diff_states(pre: &WorkflowState, post: &WorkflowState, usage: UsageStats) -> StateUpdate {
    let mut update = StateUpdate {
        usage_stats: Some(usage),
        ..StateUpdate::default()
    };

    if post.current_agent != pre.current_agent {
        update.current_agent = Some(post.current_agent);
    }
    if post.final_result != pre.final_result {
        update.final_result = Some(post.final_result.clone());
    }
    if post.error != pre.error {
        update.error = Some(post.error.clone());
    }
    // 任务对象被执行器原地推进，这里不依赖与旧快照的结构相等性
    if let Some(task_list) = &post.task_list {
        update.task_list = Some(task_list.clone());
    }

    update.messages = post
        .messages
        .iter()
        .filter(|message| !pre.messages.contains(message))
        .cloned()
        .collect();

    if post.current_agent == Some(RouteTarget::End) {
        if let Some(result) = post.final_result.as_deref().filter(|r| !r.is_empty()) {
            if !pre.history_contains(&post.user_input, result) {
                update.new_history_entry = Some(ConversationEntry {
                    user_input: post.user_input.clone(),
                    result: result.to_string(),
                    messages: post.snapshot_messages(),
                });
            }
        }
    }

    update
}
