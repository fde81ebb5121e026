//! 任务模型：Task 与 TaskList 生命周期状态机
//!
//! 状态只沿 Pending → InProgress → {Completed | Failed} 前进，永不回退；
//! result 仅在 Completed 时设置，error 仅在 Failed 时设置。
//! 越界索引与回退尝试容忍并记录 warn 日志，不视为错误。

use serde::{Deserialize, Serialize};

use crate::agents::AgentKind;

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Completed 或 Failed 视为终态
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// 单个任务：由 Planner 创建，执行中的智能体原地推进状态，终态后只读
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub agent: AgentKind,
    pub description: String,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl Task {
    pub fn new(agent: AgentKind, description: impl Into<String>) -> Self {
        Self {
            agent,
            description: description.into(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
        }
    }
}

/// 有序任务清单；每次产生新计划时整体替换，从不合并
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskList {
    pub tasks: Vec<Task>,
    pub current_task_index: usize,
}

impl TaskList {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            current_task_index: 0,
        }
    }

    /// 按序找到第一个属于指定智能体且仍为 Pending 的任务。
    /// 无中间变更时重复调用结果稳定。
    pub fn find_next_pending(&self, agent: AgentKind) -> Option<(usize, &Task)> {
        self.tasks
            .iter()
            .enumerate()
            .find(|(_, task)| task.agent == agent && task.status == TaskStatus::Pending)
    }

    /// 按序找到第一个 Pending 任务（不区分智能体，用于上下文摘要）
    pub fn next_pending(&self) -> Option<&Task> {
        self.tasks
            .iter()
            .find(|task| task.status == TaskStatus::Pending)
    }

    /// Pending → InProgress；仅允许从 Pending 推进
    pub fn mark_in_progress(&mut self, index: usize) {
        let Some(task) = self.tasks.get_mut(index) else {
            tracing::warn!(index, "mark_in_progress: index out of bounds, ignoring");
            return;
        };
        if task.status != TaskStatus::Pending {
            tracing::warn!(
                index,
                status = task.status.as_str(),
                "mark_in_progress: task not pending, ignoring"
            );
            return;
        }
        task.status = TaskStatus::InProgress;
        self.current_task_index = index;
    }

    /// 标记完成并记录结果；越界或已达终态时忽略并记 warn
    pub fn mark_completed(&mut self, index: usize, result: impl Into<String>) {
        let Some(task) = self.tasks.get_mut(index) else {
            tracing::warn!(index, "mark_completed: index out of bounds, ignoring");
            return;
        };
        if task.status.is_terminal() {
            tracing::warn!(
                index,
                status = task.status.as_str(),
                "mark_completed: task already terminal, ignoring"
            );
            return;
        }
        task.status = TaskStatus::Completed;
        task.result = Some(result.into());
    }

    /// 标记失败并记录错误；越界或已达终态时忽略并记 warn
    pub fn mark_failed(&mut self, index: usize, error: impl Into<String>) {
        let Some(task) = self.tasks.get_mut(index) else {
            tracing::warn!(index, "mark_failed: index out of bounds, ignoring");
            return;
        };
        if task.status.is_terminal() {
            tracing::warn!(
                index,
                status = task.status.as_str(),
                "mark_failed: task already terminal, ignoring"
            );
            return;
        }
        task.status = TaskStatus::Failed;
        task.error = Some(error.into());
    }

    /// 所有任务均为 Completed 或 Failed 时为真（短路）
    pub fn all_tasks_completed(&self) -> bool {
        self.tasks.iter().all(|task| task.status.is_terminal())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_list() -> TaskList {
        TaskList::new(vec![
            Task::new(AgentKind::Mathematics, "Compute 2+2"),
            Task::new(AgentKind::Filesystem, "Write result to file"),
        ])
    }

    #[test]
    fn test_find_next_pending_filters_by_agent() {
        let list = sample_list();
        let (index, task) = list.find_next_pending(AgentKind::Filesystem).unwrap();
        assert_eq!(index, 1);
        assert_eq!(task.description, "Write result to file");
        assert!(list.find_next_pending(AgentKind::Graph).is_none());
    }

    #[test]
    fn test_find_next_pending_stable_without_mutation() {
        let list = sample_list();
        let first = list.find_next_pending(AgentKind::Mathematics).map(|(i, _)| i);
        let second = list.find_next_pending(AgentKind::Mathematics).map(|(i, _)| i);
        assert_eq!(first, second);
    }

    #[test]
    fn test_completion_predicate() {
        let mut list = sample_list();
        assert!(!list.all_tasks_completed());

        list.mark_completed(0, "4");
        assert!(!list.all_tasks_completed());
        // Scenario: first completed, second pending -> next pending is the second task
        let (index, _) = list.find_next_pending(AgentKind::Filesystem).unwrap();
        assert_eq!(index, 1);

        list.mark_failed(1, "disk full");
        assert!(list.all_tasks_completed());
    }

    #[test]
    fn test_empty_list_is_vacuously_completed() {
        let list = TaskList::default();
        assert!(list.all_tasks_completed());
    }

    #[test]
    fn test_status_never_regresses() {
        let mut list = sample_list();
        list.mark_in_progress(0);
        list.mark_completed(0, "4");
        assert_eq!(list.tasks[0].status, TaskStatus::Completed);

        // 对终态任务的再次标记被忽略
        list.mark_failed(0, "late failure");
        assert_eq!(list.tasks[0].status, TaskStatus::Completed);
        assert_eq!(list.tasks[0].result.as_deref(), Some("4"));
        assert!(list.tasks[0].error.is_none());

        list.mark_in_progress(0);
        assert_eq!(list.tasks[0].status, TaskStatus::Completed);
    }

    #[test]
    fn test_result_iff_completed_error_iff_failed() {
        let mut list = sample_list();
        list.mark_completed(0, "4");
        assert!(list.tasks[0].result.is_some());
        assert!(list.tasks[0].error.is_none());

        list.mark_failed(1, "boom");
        assert!(list.tasks[1].result.is_none());
        assert!(list.tasks[1].error.is_some());
    }

    #[test]
    fn test_out_of_bounds_marks_are_ignored() {
        let mut list = sample_list();
        list.mark_completed(99, "ghost");
        list.mark_failed(99, "ghost");
        list.mark_in_progress(99);
        assert_eq!(list.tasks[0].status, TaskStatus::Pending);
        assert_eq!(list.tasks[1].status, TaskStatus::Pending);
    }
}
