//! 编排集成测试

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, RwLock};

    use swarm::agents::build_standard_registry;
    use swarm::config::AppConfig;
    use swarm::guardrails::{GuardrailManager, IntentGuardrail};
    use swarm::llm::{LlmClient, MockLlmClient};
    use swarm::state::TaskFileStore;
    use swarm::tools::GraphStore;
    use swarm::workflow::{MemoryCheckpointStore, WorkflowGraph, WorkflowService};

    struct Harness {
        service: WorkflowService,
        llm: Arc<MockLlmClient>,
        _workspace: tempfile::TempDir,
        tasks_dir: tempfile::TempDir,
    }

    fn harness(max_output_chars: usize) -> Harness {
        let workspace = tempfile::tempdir().unwrap();
        let tasks_dir = tempfile::tempdir().unwrap();

        let mut cfg = AppConfig::default();
        cfg.app.workspace_root = Some(workspace.path().to_path_buf());
        cfg.app.max_iterations = 25;

        let llm = Arc::new(MockLlmClient::new());
        let classifier = Arc::new(IntentGuardrail::new());
        let task_store = Arc::new(TaskFileStore::new(tasks_dir.path()));

        let mut graph_store = GraphStore::new();
        graph_store.add_node("user_service", "Service", HashMap::new());
        let graph_store = Arc::new(RwLock::new(graph_store));

        let shared_llm: Arc<dyn LlmClient> = llm.clone();
        let registry =
            build_standard_registry(&cfg, shared_llm, classifier.clone(), task_store, graph_store);
        let graph = WorkflowGraph::new(registry, cfg.app.max_iterations).unwrap();
        let guardrails = GuardrailManager::new(classifier, true, max_output_chars);
        let service =
            WorkflowService::new(graph, guardrails, Arc::new(MemoryCheckpointStore::new()));

        Harness {
            service,
            llm,
            _workspace: workspace,
            tasks_dir,
        }
    }

    /// 问候语不经 planner 直达 general_qa 并当场结束
    #[tokio::test]
    async fn test_greeting_routes_to_general_qa_without_planner() {
        let h = harness(5000);
        // supervisor 的 LLM 回复不可解析 → 分类器降级 → conversational
        h.llm.push_response("");

        let result = h.service.run_turn("hello", Some("thread-a")).await;

        assert!(result.error.is_none());
        assert!(result.final_result.unwrap().starts_with("Hello!"));
        assert!(result.usage_stats.agent_usage.get("planner").is_none());
        assert_eq!(result.usage_stats.agent_usage.get("general_qa"), Some(&1));
        assert_eq!(result.conversation_history.len(), 1);
    }

    /// 完整管线：planner 拆解 → mathematics 用计算器执行 → supervisor 聚合结束
    #[tokio::test]
    async fn test_plan_and_execute_pipeline() {
        let h = harness(5000);
        h.llm.push_response(r#"{"next_agent": "planner", "reasoning": "no task list yet"}"#);
        h.llm.push_response(
            r#"{"reasoning": "one arithmetic step", "tasks": [
                {"agent": "mathematics", "description": "Compute 21 * 2"}
            ]}"#,
        );
        h.llm
            .push_response(r#"{"next_agent": "mathematics", "reasoning": "pending math task"}"#);
        h.llm
            .push_response(r#"{"tool": "calculator", "args": {"expression": "21 * 2"}}"#);
        h.llm.push_response("21 * 2 = 42");

        let result = h.service.run_turn("what is 21 times 2", Some("t")).await;

        assert!(result.error.is_none());
        assert_eq!(result.final_result.as_deref(), Some("21 * 2 = 42"));
        assert_eq!(result.usage_stats.agent_usage.get("supervisor"), Some(&3));
        assert_eq!(result.usage_stats.agent_usage.get("planner"), Some(&1));
        assert_eq!(result.usage_stats.agent_usage.get("mathematics"), Some(&1));
        assert_eq!(result.usage_stats.tool_usage.get("calculator"), Some(&1));
        assert_eq!(result.conversation_history.len(), 1);

        // 计划落盘且任务状态被更新
        let task_file = std::fs::read_dir(h.tasks_dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(task_file).unwrap()).unwrap();
        assert_eq!(doc["tasks"][0]["status"], "completed");
    }

    /// planner 连续失败 3 次后第 4 次 supervisor 熔断，诊断信息带最后的错误
    #[tokio::test]
    async fn test_planner_circuit_breaker() {
        let h = harness(5000);
        for _ in 0..3 {
            h.llm
                .push_response(r#"{"next_agent": "planner", "reasoning": "need a plan"}"#);
            h.llm.push_response("I refuse to answer in JSON.");
        }

        let result = h.service.run_turn("do something complicated", Some("t")).await;

        let final_result = result.final_result.unwrap();
        assert!(final_result.starts_with("Workflow ended due to planner errors:"));
        assert!(final_result.contains("Planner error:"));
        assert_eq!(result.usage_stats.agent_usage.get("supervisor"), Some(&4));
        assert_eq!(result.usage_stats.agent_usage.get("planner"), Some(&3));
    }

    /// 跨回合延续：2 条历史 + 1 次成功回合 = 恰好 3 条，不重复不丢失；
    /// messages 只增长本回合新增的部分
    #[tokio::test]
    async fn test_checkpoint_continuity_across_turns() {
        let h = harness(5000);
        let thread = Some("thread-e");

        h.llm.push_response("");
        let first = h.service.run_turn("hello", thread).await;
        assert_eq!(first.conversation_history.len(), 1);
        assert_eq!(first.messages.len(), 2);

        h.llm.push_response("");
        let second = h.service.run_turn("how are you today", thread).await;
        assert_eq!(second.conversation_history.len(), 2);
        // 第二回合新增 supervisor 路由痕迹 + general_qa 应答
        assert_eq!(second.messages.len(), 4);

        h.llm.push_response("");
        let third = h.service.run_turn("good morning everyone", thread).await;

        assert_eq!(third.conversation_history.len(), 3);
        // 消息按值做加法合并：与第一回合完全相同的路由痕迹不会重复入账
        assert_eq!(third.messages.len(), 5);
        // 历史条目保持了各自的输入
        let inputs: Vec<&str> = third
            .conversation_history
            .iter()
            .map(|e| e.user_input.as_str())
            .collect();
        assert_eq!(
            inputs,
            vec!["hello", "how are you today", "good morning everyone"]
        );
    }

    /// 不同 thread id 互不影响
    #[tokio::test]
    async fn test_threads_are_independent() {
        let h = harness(5000);

        h.llm.push_response("");
        let a = h.service.run_turn("hello", Some("thread-1")).await;
        h.llm.push_response("");
        let b = h.service.run_turn("hi there", Some("thread-2")).await;

        assert_eq!(a.conversation_history.len(), 1);
        assert_eq!(b.conversation_history.len(), 1);
        assert_ne!(a.thread_id, b.thread_id);
    }

    /// 输入护栏在任何智能体运行前拒绝
    #[tokio::test]
    async fn test_input_guardrail_rejects_before_agents_run() {
        let h = harness(5000);

        let result = h
            .service
            .run_turn("please delete all files on the server", Some("t"))
            .await;

        assert!(result.final_result.is_none());
        assert!(result
            .error
            .unwrap()
            .starts_with("Input validation failed:"));
        assert!(result.usage_stats.agent_usage.is_empty());
        assert!(result.conversation_history.is_empty());
    }

    /// 输出护栏丢弃不合规回复，但状态（含历史）已持久化
    #[tokio::test]
    async fn test_output_guardrail_discards_response() {
        let h = harness(10);
        h.llm.push_response("");

        let result = h.service.run_turn("hello", Some("t")).await;

        assert!(result.final_result.is_none());
        assert!(result
            .error
            .unwrap()
            .starts_with("Output validation failed:"));
        // 回合本身已完成并入档
        assert_eq!(result.conversation_history.len(), 1);
    }

    /// 未设 thread id 时生成新的会话线程
    #[tokio::test]
    async fn test_missing_thread_id_generates_uuid() {
        let h = harness(5000);
        h.llm.push_response("");
        let result = h.service.run_turn("hello", None).await;
        assert!(!result.thread_id.is_empty());
        assert!(uuid::Uuid::parse_str(&result.thread_id).is_ok());
    }
}
