//! 智能体层：封闭枚举、能力表、执行器 trait 与静态注册表
//!
//! 智能体集合在编译期封闭（无运行时反射注册）；AgentRegistry 在进程启动时
//! 构建一次，之后只读。执行器对图而言是全函数：错误落入任务状态或
//! state.error，从不向上抛出。

pub mod filesystem;
pub mod general_qa;
pub mod graph;
pub mod mathematics;
pub mod planner;
pub mod supervisor;
pub mod worker;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use filesystem::FilesystemAgent;
pub use general_qa::GeneralQaAgent;
pub use graph::GraphAgent;
pub use mathematics::MathematicsAgent;
pub use planner::PlannerAgent;
pub use supervisor::SupervisorAgent;

use crate::config::AppConfig;
use crate::guardrails::IntentGuardrail;
use crate::llm::LlmClient;
use crate::state::{TaskFileStore, UsageStats, WorkflowState};
use crate::tools::GraphStore;

/// 系统内的全部智能体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Supervisor,
    Planner,
    Graph,
    Filesystem,
    GeneralQa,
    Mathematics,
}

impl AgentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentKind::Supervisor => "supervisor",
            AgentKind::Planner => "planner",
            AgentKind::Graph => "graph",
            AgentKind::Filesystem => "filesystem",
            AgentKind::GeneralQa => "general_qa",
            AgentKind::Mathematics => "mathematics",
        }
    }

    pub fn parse(s: &str) -> Option<AgentKind> {
        match s.trim().to_lowercase().as_str() {
            "supervisor" => Some(AgentKind::Supervisor),
            "planner" => Some(AgentKind::Planner),
            "graph" => Some(AgentKind::Graph),
            "filesystem" => Some(AgentKind::Filesystem),
            "general_qa" => Some(AgentKind::GeneralQa),
            "mathematics" => Some(AgentKind::Mathematics),
            _ => None,
        }
    }

    /// 可承接任务的工作智能体（不含 supervisor / planner）
    pub fn workers() -> [AgentKind; 4] {
        [
            AgentKind::Graph,
            AgentKind::Filesystem,
            AgentKind::GeneralQa,
            AgentKind::Mathematics,
        ]
    }

    /// 能力描述，用于 supervisor / planner 的提示词
    pub fn capability(self) -> &'static str {
        match self {
            AgentKind::Supervisor => "Routes work to the appropriate agent.",
            AgentKind::Planner => "Breaks a request down into an ordered task list.",
            AgentKind::Graph => {
                "Query and analyze the property graph. Can retrieve nodes, relationships, and counts."
            }
            AgentKind::Filesystem => {
                "Read and write files and list directories inside the workspace sandbox."
            }
            AgentKind::GeneralQa => {
                "Handle general conversational queries, greetings, and questions with friendly responses."
            }
            AgentKind::Mathematics => {
                "Perform mathematical calculations and evaluate expressions."
            }
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 路由目标：具体智能体或结束哨兵
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteTarget {
    Agent(AgentKind),
    End,
}

impl RouteTarget {
    /// 接受智能体名、"__end__" 与 "end"；其余一律视为未知
    pub fn parse(s: &str) -> Option<RouteTarget> {
        let cleaned = s.trim().to_lowercase();
        if cleaned == "__end__" || cleaned == "end" {
            return Some(RouteTarget::End);
        }
        AgentKind::parse(&cleaned).map(RouteTarget::Agent)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteTarget::Agent(kind) => kind.as_str(),
            RouteTarget::End => "__end__",
        }
    }
}

impl std::fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 智能体执行器：取当前状态与用量统计，返回更新后的两者。
/// 实现必须自行吞掉内部错误（记入任务或 state.error）。
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    fn kind(&self) -> AgentKind;

    async fn execute(
        &self,
        state: WorkflowState,
        usage: UsageStats,
    ) -> (WorkflowState, UsageStats);
}

/// 静态注册表：AgentKind -> 执行器，进程启动时构建一次
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<AgentKind, Arc<dyn AgentExecutor>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent: Arc<dyn AgentExecutor>) {
        self.agents.insert(agent.kind(), agent);
    }

    pub fn get(&self, kind: AgentKind) -> Option<Arc<dyn AgentExecutor>> {
        self.agents.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<AgentKind> {
        self.agents.keys().copied().collect()
    }

    pub fn into_agents(self) -> HashMap<AgentKind, Arc<dyn AgentExecutor>> {
        self.agents
    }
}

/// 构建全部智能体的标准注册表（进程启动时调用一次，之后只读）
pub fn build_standard_registry(
    cfg: &AppConfig,
    llm: Arc<dyn LlmClient>,
    classifier: Arc<IntentGuardrail>,
    task_store: Arc<TaskFileStore>,
    graph_store: Arc<std::sync::RwLock<GraphStore>>,
) -> AgentRegistry {
    let workspace = cfg
        .app
        .workspace_root
        .clone()
        .unwrap_or_else(|| std::path::PathBuf::from("workspace"));
    let timeout = cfg.tools.tool_timeout_secs;

    let mut registry = AgentRegistry::new();
    registry.register(Arc::new(SupervisorAgent::new(llm.clone(), classifier)));
    registry.register(Arc::new(PlannerAgent::new(llm.clone(), task_store.clone())));
    registry.register(Arc::new(GeneralQaAgent::new(llm.clone(), task_store.clone())));
    registry.register(Arc::new(MathematicsAgent::new(
        llm.clone(),
        task_store.clone(),
        timeout,
    )));
    registry.register(Arc::new(FilesystemAgent::new(
        llm.clone(),
        task_store.clone(),
        &workspace,
        timeout,
    )));
    registry.register(Arc::new(GraphAgent::new(llm, task_store, graph_store, timeout)));
    registry
}
