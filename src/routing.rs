//! 路由决策解析链
//!
//! 将 LLM 的自由文本路由回复解析为结构化 Decision。按固定顺序尝试纯解析
//! 函数（字面量 → 严格 JSON → 宽松 JSON → 关键词提取），首个成功者短路；
//! 全部失败则对 user_input（不是 LLM 回复）做意图分类降级，最后是长度 /
//! 问候语启发。链对任意输入字符串都产出非空 Decision，从不抛错。

use std::sync::Arc;

use serde::Deserialize;

use crate::agents::{AgentKind, RouteTarget};
use crate::guardrails::{IntentCategory, IntentGuardrail};

/// 意图分类拦截时的统一话术
pub const SAFETY_STOP_MSG: &str =
    "I apologize, but I'm unable to assist with that request due to content safety guidelines.";

/// 关键词提取的固定优先级
const KEYWORD_PRIORITY: [AgentKind; 5] = [
    AgentKind::Graph,
    AgentKind::Filesystem,
    AgentKind::GeneralQa,
    AgentKind::Mathematics,
    AgentKind::Planner,
];

const GREETINGS: [&str; 5] = ["hi", "hello", "hey", "howdy", "how are you"];

/// 词数不超过此值的输入视为简单对话
const SHORT_QUERY_WORDS: usize = 3;

/// 路由决策：目标智能体（或 End 哨兵）与理由。
/// 只在一次 Supervisor 调用内产生并消费，从不单独持久化。
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub next_agent: RouteTarget,
    pub reasoning: String,
}

impl Decision {
    fn new(next_agent: RouteTarget, reasoning: impl Into<String>) -> Self {
        Self {
            next_agent,
            reasoning: reasoning.into(),
        }
    }
}

#[derive(Deserialize)]
struct RawDecision {
    next_agent: String,
    #[serde(default)]
    reasoning: String,
}

impl RawDecision {
    fn validate(self) -> Option<Decision> {
        if self.reasoning.trim().is_empty() {
            return None;
        }
        let target = RouteTarget::parse(&self.next_agent)?;
        Some(Decision::new(target, self.reasoning))
    }
}

/// 从文本中取出 JSON 块：```json 围栏优先，否则取最外层花括号
pub fn extract_json_block(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(
            rest.find("```")
                .map(|end| rest[..end].trim())
                .unwrap_or_else(|| rest.trim()),
        );
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end > start {
        Some(&trimmed[start..=end])
    } else {
        None
    }
}

/// 策略 1：回复就是 "next_agent" 字面量（可带引号）→ 交给 planner 重新规划
fn parse_unclear_token(response: &str) -> Option<Decision> {
    let cleaned = response
        .trim()
        .to_lowercase()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string();
    if cleaned == "next_agent" {
        return Some(Decision::new(
            RouteTarget::Agent(AgentKind::Planner),
            "LLM response unclear, routing to planner for task planning",
        ));
    }
    None
}

/// 策略 2：严格解析——提取 JSON 块并反序列化，两个字段都必须有效
fn parse_strict_json(response: &str) -> Option<Decision> {
    let json = extract_json_block(response)?;
    serde_json::from_str::<RawDecision>(json)
        .ok()
        .and_then(RawDecision::validate)
}

/// 策略 3：宽松解析——整个文本被 {...} 包住时按通用 JSON 取字段再校验
fn parse_loose_json(response: &str) -> Option<Decision> {
    let trimmed = response.trim();
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(trimmed).ok()?;
    let next_agent = value.get("next_agent")?.as_str()?.to_string();
    let reasoning = value.get("reasoning")?.as_str()?.to_string();
    RawDecision {
        next_agent,
        reasoning,
    }
    .validate()
}

/// 策略 4：关键词提取——按固定优先级扫已知智能体名；都没有时找结束关键词
fn parse_keyword(response: &str) -> Option<Decision> {
    let lower = response.to_lowercase();
    for kind in KEYWORD_PRIORITY {
        if lower.contains(kind.as_str()) {
            return Some(Decision::new(
                RouteTarget::Agent(kind),
                format!("Extracted agent '{}' from LLM response", kind),
            ));
        }
    }
    if lower.contains("__end__") || lower.contains("end") {
        return Some(Decision::new(
            RouteTarget::End,
            "LLM indicated workflow should end",
        ));
    }
    None
}

/// 绝对降级：词数 / 问候语启发。Supervisor 在 LLM 调用本身失败时也直接用它。
pub fn heuristic_decision(user_input: &str) -> Decision {
    let lower = user_input.to_lowercase();
    let is_simple = user_input.split_whitespace().count() <= SHORT_QUERY_WORDS
        || GREETINGS.iter().any(|greeting| lower.contains(greeting));
    let agent = if is_simple {
        AgentKind::GeneralQa
    } else {
        AgentKind::Planner
    };
    Decision::new(
        RouteTarget::Agent(agent),
        format!("Routing to {} based on query complexity", agent),
    )
}

/// 意图类别到智能体的固定映射
fn map_intent(intent: IntentCategory) -> AgentKind {
    match intent {
        IntentCategory::InformationSeeking
        | IntentCategory::Conversational
        | IntentCategory::HelpRequest => AgentKind::GeneralQa,
        IntentCategory::DataRetrieval
        | IntentCategory::AnalysisRequest
        | IntentCategory::DatabaseOperations => AgentKind::Graph,
        IntentCategory::FileOperations => AgentKind::Filesystem,
        _ => AgentKind::Planner,
    }
}

/// 决策解析链：纯解析函数序列 + 分类器降级
pub struct DecisionParser {
    classifier: Arc<IntentGuardrail>,
}

impl DecisionParser {
    pub fn new(classifier: Arc<IntentGuardrail>) -> Self {
        Self { classifier }
    }

    /// 全函数：对任意 (response, user_input) 都返回 Decision
    pub fn parse(&self, response: &str, user_input: &str) -> Decision {
        const PARSERS: [fn(&str) -> Option<Decision>; 4] = [
            parse_unclear_token,
            parse_strict_json,
            parse_loose_json,
            parse_keyword,
        ];
        for parser in PARSERS {
            if let Some(decision) = parser(response) {
                return decision;
            }
        }
        tracing::warn!(
            response = %response.chars().take(200).collect::<String>(),
            "All parsing strategies failed, using classifier fallback"
        );
        self.classifier_fallback(user_input)
    }

    /// 策略 5：对 user_input 做意图分类；拦截 → End，否则映射到智能体
    fn classifier_fallback(&self, user_input: &str) -> Decision {
        let result = self.classifier.check(user_input);

        if !result.passed {
            return Decision::new(
                RouteTarget::End,
                result.reason.unwrap_or_else(|| SAFETY_STOP_MSG.to_string()),
            );
        }

        let intent = result.intent.unwrap_or(IntentCategory::InformationSeeking);
        if intent == IntentCategory::Conversational
            && user_input.split_whitespace().count() <= SHORT_QUERY_WORDS
        {
            return Decision::new(
                RouteTarget::Agent(AgentKind::GeneralQa),
                "Simple greeting - routing to general_qa for response",
            );
        }

        let agent = map_intent(intent);
        Decision::new(
            RouteTarget::Agent(agent),
            format!("Mapped intent '{}'", intent),
        )
    }
}
