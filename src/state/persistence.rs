//! 任务清单外部持久化（尽力而为）
//!
//! 计划创建时写入 tasks/task_<时间戳>.json；每次任务状态变更后原地更新最新
//! 文件的 tasks 数组。目录或文件缺失一律记日志后跳过，从不让核心失败。

use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;

use crate::state::task::Task;
use crate::state::workflow::WorkflowState;

#[derive(Serialize)]
struct TaskFileRecord<'a> {
    user_input: &'a str,
    created_at: String,
    reasoning: &'a str,
    tasks: Vec<TaskRecord<'a>>,
}

#[derive(Serialize)]
struct TaskRecord<'a> {
    agent: &'a str,
    description: &'a str,
    status: &'a str,
    result: Option<&'a str>,
    error: Option<&'a str>,
}

fn task_records(tasks: &[Task]) -> Vec<TaskRecord<'_>> {
    tasks
        .iter()
        .map(|task| TaskRecord {
            agent: task.agent.as_str(),
            description: &task.description,
            status: task.status.as_str(),
            result: task.result.as_deref(),
            error: task.error.as_deref(),
        })
        .collect()
}

/// 任务清单文件存储：绑定一个 tasks 目录
#[derive(Debug, Clone)]
pub struct TaskFileStore {
    tasks_dir: PathBuf,
}

impl TaskFileStore {
    pub fn new(tasks_dir: impl AsRef<Path>) -> Self {
        Self {
            tasks_dir: tasks_dir.as_ref().to_path_buf(),
        }
    }

    /// 将新计划写入 task_<时间戳>.json；失败只记 error 日志
    pub fn save_plan(&self, state: &WorkflowState, reasoning: &str) {
        let Some(task_list) = &state.task_list else {
            tracing::warn!("save_plan: no task list to save");
            return;
        };

        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let record = TaskFileRecord {
            user_input: &state.user_input,
            created_at: timestamp.clone(),
            reasoning,
            tasks: task_records(&task_list.tasks),
        };

        if let Err(e) = std::fs::create_dir_all(&self.tasks_dir) {
            tracing::error!(error = %e, "save_plan: failed to create tasks dir");
            return;
        }
        let path = self.tasks_dir.join(format!("task_{}.json", timestamp));
        match serde_json::to_string_pretty(&record) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    tracing::error!(error = %e, path = %path.display(), "save_plan: write failed");
                } else {
                    tracing::info!(path = %path.display(), "Saved task list");
                }
            }
            Err(e) => tracing::error!(error = %e, "save_plan: serialization failed"),
        }
    }

    /// 用当前任务状态原地更新最新的 task_*.json 的 tasks 数组；
    /// 无目录/无文件/解析失败均为 no-op
    pub fn update_latest(&self, state: &WorkflowState) {
        let Some(task_list) = &state.task_list else {
            tracing::debug!("update_latest: no task list to save");
            return;
        };
        let Some(path) = self.find_latest() else {
            tracing::debug!("update_latest: no task file found to update");
            return;
        };

        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(error = %e, path = %path.display(), "update_latest: read failed");
                return;
            }
        };
        let mut doc: serde_json::Value = match serde_json::from_str(&data) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::error!(error = %e, path = %path.display(), "update_latest: parse failed");
                return;
            }
        };

        let tasks = match serde_json::to_value(task_records(&task_list.tasks)) {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::error!(error = %e, "update_latest: serialization failed");
                return;
            }
        };
        match doc.as_object_mut() {
            Some(object) => {
                object.insert("tasks".to_string(), tasks);
            }
            None => {
                tracing::warn!(path = %path.display(), "update_latest: task file is not an object");
                return;
            }
        }

        match serde_json::to_string_pretty(&doc) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    tracing::error!(error = %e, path = %path.display(), "update_latest: write failed");
                } else {
                    tracing::debug!(path = %path.display(), "Updated task file");
                }
            }
            Err(e) => tracing::error!(error = %e, "update_latest: serialization failed"),
        }
    }

    /// 按修改时间找到最新的 task_*.json
    fn find_latest(&self) -> Option<PathBuf> {
        let entries = std::fs::read_dir(&self.tasks_dir).ok()?;
        let mut latest: Option<(std::time::SystemTime, PathBuf)> = None;
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with("task_") || !name.ends_with(".json") {
                continue;
            }
            let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
                continue;
            };
            match &latest {
                Some((time, _)) if *time >= modified => {}
                _ => latest = Some((modified, path)),
            }
        }
        latest.map(|(_, path)| path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentKind;
    use crate::state::task::TaskList;

    fn state_with_tasks() -> WorkflowState {
        let mut state = WorkflowState::new("compute something");
        state.task_list = Some(TaskList::new(vec![Task::new(
            AgentKind::Mathematics,
            "Compute 2+2",
        )]));
        state
    }

    #[test]
    fn test_save_and_update_round() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskFileStore::new(dir.path());
        let mut state = state_with_tasks();

        store.save_plan(&state, "single arithmetic step");
        let latest = store.find_latest().expect("plan file written");
        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&latest).unwrap()).unwrap();
        assert_eq!(doc["user_input"], "compute something");
        assert_eq!(doc["reasoning"], "single arithmetic step");
        assert_eq!(doc["tasks"][0]["status"], "pending");

        state.task_list.as_mut().unwrap().mark_completed(0, "4");
        store.update_latest(&state);
        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&latest).unwrap()).unwrap();
        assert_eq!(doc["tasks"][0]["status"], "completed");
        assert_eq!(doc["tasks"][0]["result"], "4");
        // 原有字段保留
        assert_eq!(doc["reasoning"], "single arithmetic step");
    }

    #[test]
    fn test_update_without_dir_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskFileStore::new(dir.path().join("missing"));
        let state = state_with_tasks();
        // 不应 panic，也不应创建目录
        store.update_latest(&state);
        assert!(!dir.path().join("missing").exists());
    }
}
