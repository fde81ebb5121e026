//! 图数据库查询工具
//!
//! 内存属性图（节点带标签与属性，边带关系类型），GraphQueryTool 提供
//! get_node / neighbors / count / list 四种操作。作为图查询智能体的边界实现。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::Tool;

/// 图节点：唯一 key、标签与属性
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub key: String,
    pub label: String,
    pub properties: HashMap<String, String>,
}

/// 有向边：source --relationship--> target
#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub relationship: String,
}

/// 内存属性图存储
#[derive(Debug, Default)]
pub struct GraphStore {
    nodes: HashMap<String, GraphNode>,
    edges: Vec<GraphEdge>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(
        &mut self,
        key: impl Into<String>,
        label: impl Into<String>,
        properties: HashMap<String, String>,
    ) {
        let key = key.into();
        self.nodes.insert(
            key.clone(),
            GraphNode {
                key,
                label: label.into(),
                properties,
            },
        );
    }

    pub fn add_edge(
        &mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        relationship: impl Into<String>,
    ) {
        self.edges.push(GraphEdge {
            source: source.into(),
            target: target.into(),
            relationship: relationship.into(),
        });
    }

    pub fn get_node(&self, key: &str) -> Option<&GraphNode> {
        self.nodes.get(key)
    }

    /// key 的出边邻居：(relationship, 邻居节点)
    pub fn neighbors(&self, key: &str) -> Vec<(String, &GraphNode)> {
        self.edges
            .iter()
            .filter(|edge| edge.source == key)
            .filter_map(|edge| {
                self.nodes
                    .get(&edge.target)
                    .map(|node| (edge.relationship.clone(), node))
            })
            .collect()
    }

    pub fn count_label(&self, label: &str) -> usize {
        self.nodes.values().filter(|n| n.label == label).count()
    }

    pub fn list_label(&self, label: &str) -> Vec<&GraphNode> {
        let mut nodes: Vec<&GraphNode> =
            self.nodes.values().filter(|n| n.label == label).collect();
        nodes.sort_by(|a, b| a.key.cmp(&b.key));
        nodes
    }
}

fn render_node(node: &GraphNode) -> String {
    let mut props: Vec<String> = node
        .properties
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    props.sort();
    format!("{} [{}] {{{}}}", node.key, node.label, props.join(", "))
}

/// 图查询工具：op 决定操作类型
pub struct GraphQueryTool {
    store: Arc<RwLock<GraphStore>>,
}

impl GraphQueryTool {
    pub fn new(store: Arc<RwLock<GraphStore>>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GraphQueryTool {
    fn name(&self) -> &str {
        "graph_query"
    }

    fn description(&self) -> &str {
        "Query the property graph. Args: {\"op\": \"get_node|neighbors|count|list\", \"key\": \"node key\", \"label\": \"node label\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "op": { "type": "string", "enum": ["get_node", "neighbors", "count", "list"] },
                "key": { "type": "string" },
                "label": { "type": "string" }
            },
            "required": ["op"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let op = args
            .get("op")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "Missing 'op' argument".to_string())?;
        let store = self.store.read().map_err(|_| "Graph store poisoned".to_string())?;
        tracing::info!(op = %op, "graph_query tool execute");

        match op {
            "get_node" => {
                let key = args
                    .get("key")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| "Missing 'key' argument".to_string())?;
                store
                    .get_node(key)
                    .map(render_node)
                    .ok_or_else(|| format!("Node not found: {key}"))
            }
            "neighbors" => {
                let key = args
                    .get("key")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| "Missing 'key' argument".to_string())?;
                let neighbors = store.neighbors(key);
                if neighbors.is_empty() {
                    return Ok(format!("No neighbors for {key}"));
                }
                Ok(neighbors
                    .iter()
                    .map(|(rel, node)| format!("--{}--> {}", rel, render_node(node)))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            "count" => {
                let label = args
                    .get("label")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| "Missing 'label' argument".to_string())?;
                Ok(format!("{}", store.count_label(label)))
            }
            "list" => {
                let label = args
                    .get("label")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| "Missing 'label' argument".to_string())?;
                let nodes = store.list_label(label);
                if nodes.is_empty() {
                    return Ok(format!("No nodes with label {label}"));
                }
                Ok(nodes
                    .iter()
                    .map(|n| render_node(n))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            other => Err(format!("Unknown op: {other}")),
        }
    }
}
