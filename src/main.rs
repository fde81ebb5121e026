//! Swarm - Rust 多智能体编排系统
//!
//! 入口：初始化日志与配置，组装智能体注册表 / 图 / 护栏 / 检查点，
//! 以行读 REPL 驱动回合（同一进程内一个会话线程）。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use swarm::agents::build_standard_registry;
use swarm::config::{load_config, AppConfig};
use swarm::guardrails::{GuardrailManager, IntentGuardrail};
use swarm::llm::create_llm_from_config;
use swarm::state::TaskFileStore;
use swarm::tools::GraphStore;
use swarm::workflow::{MemoryCheckpointStore, WorkflowGraph, WorkflowService};

/// 演示用属性图：几个服务节点与依赖边
fn seed_graph() -> GraphStore {
    let mut store = GraphStore::new();
    store.add_node(
        "api_gateway",
        "Service",
        HashMap::from([("lang".to_string(), "rust".to_string())]),
    );
    store.add_node(
        "user_service",
        "Service",
        HashMap::from([("lang".to_string(), "rust".to_string())]),
    );
    store.add_node("orders_db", "Database", HashMap::new());
    store.add_edge("api_gateway", "user_service", "CALLS");
    store.add_edge("user_service", "orders_db", "READS_FROM");
    store
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    swarm::observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let workspace = cfg
        .app
        .workspace_root
        .clone()
        .unwrap_or_else(|| std::path::PathBuf::from("workspace"));
    let _ = std::fs::create_dir_all(&workspace);

    let llm = create_llm_from_config(&cfg);
    let classifier = Arc::new(IntentGuardrail::new());
    let task_store = Arc::new(TaskFileStore::new(&cfg.tasks.tasks_dir));
    let graph_store = Arc::new(RwLock::new(seed_graph()));

    let registry = build_standard_registry(
        &cfg,
        llm,
        classifier.clone(),
        task_store,
        graph_store,
    );
    let graph = WorkflowGraph::new(registry, cfg.app.max_iterations)
        .context("Failed to compile workflow graph")?;
    let guardrails = GuardrailManager::new(
        classifier,
        cfg.guardrails.enabled,
        cfg.guardrails.max_output_chars,
    );
    let service = WorkflowService::new(graph, guardrails, Arc::new(MemoryCheckpointStore::new()));

    let thread_id = uuid::Uuid::new_v4().to_string();
    println!("Swarm multi-agent orchestrator (thread {})", thread_id);
    println!("Type a request, or 'exit' to quit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        let result = service.run_turn(input, Some(&thread_id)).await;
        if let Some(final_result) = &result.final_result {
            println!("\n{}\n", final_result);
        }
        if let Some(error) = &result.error {
            println!("\n[error] {}\n", error);
        }
        let tokens = result.usage_stats.token_stats;
        tracing::info!(
            turns = result.conversation_history.len(),
            total_tokens = tokens.total_tokens,
            "Turn finished"
        );
    }

    Ok(())
}
