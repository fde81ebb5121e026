//! 检查点存储：按 thread id 持久化整份编排状态
//!
//! 延续层是读写持久副本的唯一权威；语义为每线程 last-write-wins，
//! 核心不要求事务性。存储是可注入协作者，这里提供内存实现。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::state::WorkflowState;

/// 检查点存储接口
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(&self, thread_id: &str) -> Option<WorkflowState>;

    async fn put(&self, thread_id: &str, state: WorkflowState);
}

/// 内存检查点存储
#[derive(Default)]
pub struct MemoryCheckpointStore {
    states: RwLock<HashMap<String, WorkflowState>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, thread_id: &str) -> Option<WorkflowState> {
        self.states.read().await.get(thread_id).cloned()
    }

    async fn put(&self, thread_id: &str, state: WorkflowState) {
        self.states.write().await.insert(thread_id.to_string(), state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_last_write_wins_per_thread() {
        let store = MemoryCheckpointStore::new();
        assert!(store.get("t1").await.is_none());

        store.put("t1", WorkflowState::new("first")).await;
        store.put("t1", WorkflowState::new("second")).await;
        store.put("t2", WorkflowState::new("other")).await;

        assert_eq!(store.get("t1").await.unwrap().user_input, "second");
        assert_eq!(store.get("t2").await.unwrap().user_input, "other");
    }
}
