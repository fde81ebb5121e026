//! 工作流图：星型拓扑与有界执行循环
//!
//! Supervisor 是入口与中心：对每个已知智能体有一条条件边，另有一条终止边；
//! 其余节点各有一条无条件边回到 supervisor。路由读 state.current_agent：
//! None 或 End 走终止；未注册的目标按致命路由错误强制终止。循环以节点调用
//! 次数为界（取消边界），任一节点使状态到达 End 即停——保证历史条目
//! "每回合恰好一条" 不被后续节点破坏。

use std::collections::HashMap;

use crate::agents::{AgentKind, AgentRegistry, RouteTarget};
use crate::error::AgentError;
use crate::state::WorkflowState;
use crate::workflow::node::NodeAdapter;

/// 星型工作流图
pub struct WorkflowGraph {
    nodes: HashMap<AgentKind, NodeAdapter>,
    max_iterations: usize,
}

impl WorkflowGraph {
    /// 从注册表构建；supervisor 必须在注册表内
    pub fn new(registry: AgentRegistry, max_iterations: usize) -> Result<Self, AgentError> {
        let nodes: HashMap<AgentKind, NodeAdapter> = registry
            .into_agents()
            .into_values()
            .map(|agent| (agent.kind(), NodeAdapter::new(agent)))
            .collect();
        if !nodes.contains_key(&AgentKind::Supervisor) {
            return Err(AgentError::UnknownAgent("supervisor".to_string()));
        }
        tracing::info!(
            agents = nodes.len(),
            max_iterations,
            "Workflow graph compiled"
        );
        Ok(Self {
            nodes,
            max_iterations,
        })
    }

    /// 执行一个回合直到 End 或触达迭代上限
    pub async fn run(&self, initial: WorkflowState) -> Result<WorkflowState, AgentError> {
        let supervisor = self
            .nodes
            .get(&AgentKind::Supervisor)
            .ok_or_else(|| AgentError::UnknownAgent("supervisor".to_string()))?;

        let mut state = initial;
        let mut iterations = 0usize;

        loop {
            if iterations >= self.max_iterations {
                return Err(AgentError::IterationLimitExceeded(self.max_iterations));
            }
            let update = supervisor.invoke(&state).await;
            update.apply(&mut state);
            iterations += 1;

            let kind = match state.current_agent {
                None | Some(RouteTarget::End) => break,
                Some(RouteTarget::Agent(kind)) => kind,
            };
            let Some(node) = self.nodes.get(&kind) else {
                // 封闭枚举下只会因注册表缺项发生；按致命路由错误终止
                tracing::error!(agent = %kind, "Unknown agent in routing, forcing terminal");
                break;
            };

            if iterations >= self.max_iterations {
                return Err(AgentError::IterationLimitExceeded(self.max_iterations));
            }
            tracing::info!(agent = %kind, "Routing to agent");
            let update = node.invoke(&state).await;
            update.apply(&mut state);
            iterations += 1;

            // 工作节点也可能直接终结本回合（如免规划的直接应答）
            if state.current_agent == Some(RouteTarget::End) {
                break;
            }
        }

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentExecutor;
    use crate::state::{AgentMessage, UsageStats};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// 永远把球踢给 general_qa 的 supervisor（不收敛）
    struct LoopingSupervisor;

    #[async_trait]
    impl AgentExecutor for LoopingSupervisor {
        fn kind(&self) -> AgentKind {
            AgentKind::Supervisor
        }
        async fn execute(
            &self,
            mut state: WorkflowState,
            usage: UsageStats,
        ) -> (WorkflowState, UsageStats) {
            state.current_agent = Some(RouteTarget::Agent(AgentKind::GeneralQa));
            (state, usage)
        }
    }

    struct CountingWorker {
        invocations: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AgentExecutor for CountingWorker {
        fn kind(&self) -> AgentKind {
            AgentKind::GeneralQa
        }
        async fn execute(
            &self,
            state: WorkflowState,
            usage: UsageStats,
        ) -> (WorkflowState, UsageStats) {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            (state, usage)
        }
    }

    /// 第一次路由给 worker，第二次结束
    struct TwoStepSupervisor;

    #[async_trait]
    impl AgentExecutor for TwoStepSupervisor {
        fn kind(&self) -> AgentKind {
            AgentKind::Supervisor
        }
        async fn execute(
            &self,
            mut state: WorkflowState,
            usage: UsageStats,
        ) -> (WorkflowState, UsageStats) {
            if state.messages.is_empty() {
                state.current_agent = Some(RouteTarget::Agent(AgentKind::GeneralQa));
                state
                    .messages
                    .push(AgentMessage::supervisor("Routing to general_qa: first"));
            } else {
                state.current_agent = Some(RouteTarget::End);
                state.final_result = Some("done".to_string());
            }
            (state, usage)
        }
    }

    #[tokio::test]
    async fn test_iteration_ceiling_stops_nonconverging_cycle() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(LoopingSupervisor));
        registry.register(Arc::new(CountingWorker {
            invocations: invocations.clone(),
        }));
        let graph = WorkflowGraph::new(registry, 7).unwrap();

        let result = graph.run(WorkflowState::new("q")).await;
        assert!(matches!(
            result,
            Err(AgentError::IterationLimitExceeded(7))
        ));
        // 7 次节点调用 = 4 次 supervisor + 3 次 worker
        assert_eq!(invocations.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_supervisor_terminal_ends_run() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(TwoStepSupervisor));
        registry.register(Arc::new(CountingWorker {
            invocations: invocations.clone(),
        }));
        let graph = WorkflowGraph::new(registry, 50).unwrap();

        let state = graph.run(WorkflowState::new("q")).await.unwrap();
        assert_eq!(state.final_result.as_deref(), Some("done"));
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unregistered_route_is_forced_terminal() {
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(LoopingSupervisor));
        // general_qa 未注册：路由被强制终止而不是 panic
        let graph = WorkflowGraph::new(registry, 10).unwrap();
        let state = graph.run(WorkflowState::new("q")).await.unwrap();
        assert_eq!(
            state.current_agent,
            Some(RouteTarget::Agent(AgentKind::GeneralQa))
        );
    }

    #[test]
    fn test_graph_requires_supervisor() {
        let registry = AgentRegistry::new();
        assert!(matches!(
            WorkflowGraph::new(registry, 10),
            Err(AgentError::UnknownAgent(_))
        ));
    }
}
