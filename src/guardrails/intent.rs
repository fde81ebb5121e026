//! 基于规则的意图分类器
//!
//! 固定有序规则表 (pattern, category, confidence)。分类取全部命中规则中
//! 置信度最高者（非首个命中；平手按表序），无命中时默认 information_seeking
//! @ 0.3。上下文合法性复核可为看似高危的类别解除拦截。同一输入重复分类
//! 结果恒定。

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::guardrails::GuardrailResult;

/// 意图类别：安全 / 中风险 / 高风险
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    // 安全类
    InformationSeeking,
    DataRetrieval,
    AnalysisRequest,
    Conversational,
    HelpRequest,

    // 中风险类
    SystemModification,
    FileOperations,
    DatabaseOperations,
    CodeExecution,
    NetworkOperations,

    // 高风险类
    DestructiveActions,
    MaliciousActivities,
    PrivilegeEscalation,
    ViolentActivities,
    HarmfulRequests,
}

impl IntentCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            IntentCategory::InformationSeeking => "information_seeking",
            IntentCategory::DataRetrieval => "data_retrieval",
            IntentCategory::AnalysisRequest => "analysis_request",
            IntentCategory::Conversational => "conversational",
            IntentCategory::HelpRequest => "help_request",
            IntentCategory::SystemModification => "system_modification",
            IntentCategory::FileOperations => "file_operations",
            IntentCategory::DatabaseOperations => "database_operations",
            IntentCategory::CodeExecution => "code_execution",
            IntentCategory::NetworkOperations => "network_operations",
            IntentCategory::DestructiveActions => "destructive_actions",
            IntentCategory::MaliciousActivities => "malicious_activities",
            IntentCategory::PrivilegeEscalation => "privilege_escalation",
            IntentCategory::ViolentActivities => "violent_activities",
            IntentCategory::HarmfulRequests => "harmful_requests",
        }
    }
}

impl std::fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct IntentRule {
    pattern: Regex,
    intent: IntentCategory,
    confidence: f64,
}

fn rule(pattern: &str, intent: IntentCategory, confidence: f64) -> IntentRule {
    IntentRule {
        // 规则表是编译期常量文本，构造失败属于编程错误
        pattern: Regex::new(&format!("(?i){}", pattern)).expect("invalid intent rule pattern"),
        intent,
        confidence,
    }
}

/// 意图护栏：分类 + 上下文复核 + 拦截判定
pub struct IntentGuardrail {
    rules: Vec<IntentRule>,
    data_key_context: Regex,
    provide_key_context: Regex,
    file_read_context: Regex,
    db_query_context: Regex,
}

impl Default for IntentGuardrail {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentGuardrail {
    pub fn new() -> Self {
        Self {
            rules: Self::build_rules(),
            data_key_context: Regex::new(r"(?i)(database|db|table|node|graph).*key")
                .expect("invalid context pattern"),
            provide_key_context: Regex::new(r"(?i)provide.*key.*for.*(node|method|class)")
                .expect("invalid context pattern"),
            file_read_context: Regex::new(r"(?i)read|analyze|examine|check")
                .expect("invalid context pattern"),
            db_query_context: Regex::new(r"(?i)select|query|find|get|retrieve")
                .expect("invalid context pattern"),
        }
    }

    fn build_rules() -> Vec<IntentRule> {
        use IntentCategory::*;
        vec![
            // 安全的信息类查询
            rule(r"what is|how does|explain|tell me about", InformationSeeking, 0.9),
            rule(
                r"show me|display|list|provide|give me|get.*data|get.*from.*database|get.*keys|get.*from.*table",
                DataRetrieval,
                0.8,
            ),
            rule(r"analyze|compare|evaluate|assess", AnalysisRequest, 0.8),
            rule(r"hello|hi|hey|good morning|how are you", Conversational, 0.95),
            rule(r"help|assist|support|guide", HelpRequest, 0.9),
            // 破坏性操作
            rule(r"delete.*file|remove.*file|rm.*file", DestructiveActions, 0.95),
            rule(r"delete.*directory|remove.*dir|rmdir", DestructiveActions, 0.95),
            rule(
                r"drop.*database|drop.*table|delete.*database|truncate.*table",
                DestructiveActions,
                0.95,
            ),
            rule(r"format.*disk|wipe.*drive|erase.*system", DestructiveActions, 0.98),
            rule(
                r"shutdown.*server|kill.*process|terminate.*service",
                DestructiveActions,
                0.9,
            ),
            // 暴力与有害请求
            rule(
                r"help.*harm|how.*to.*harm|harm.*someone|hurt.*someone|injure.*someone",
                ViolentActivities,
                0.95,
            ),
            rule(
                r"kill|murder|assault|attack|violence|violent|abuse",
                ViolentActivities,
                0.95,
            ),
            rule(r"bomb|explosive|weapon|gun|knife|poison|toxic", ViolentActivities, 0.9),
            rule(r"illegal|crime|criminal|hack|steal|fraud|scam", HarmfulRequests, 0.9),
            rule(r"drugs|drug.*use|addiction|overdose|narcotics", HarmfulRequests, 0.9),
            rule(r"suicide|self.*harm|self.*injury|end.*life", HarmfulRequests, 0.95),
            // 文件操作
            rule(r"create.*file|write.*file|save.*file", FileOperations, 0.7),
            rule(r"read.*file|open.*file|access.*file", FileOperations, 0.6),
            rule(r"modify.*file|edit.*file|update.*file", FileOperations, 0.7),
            // 数据库操作
            rule(r"insert.*into|update.*set|alter.*table", DatabaseOperations, 0.7),
            rule(r"select.*from|query.*database|fetch.*data", DatabaseOperations, 0.5),
            // 代码执行
            rule(r"execute.*code|run.*script|eval.*code", CodeExecution, 0.9),
            rule(r"execute.*rm|execute.*del|execute.*format", CodeExecution, 0.95),
            rule(r"system.*command|shell.*command|bash.*command", CodeExecution, 0.95),
            rule(r"subprocess|os\.system|os\.popen", CodeExecution, 0.9),
            // 网络操作
            rule(r"connect.*to|send.*request|curl|wget", NetworkOperations, 0.7),
            rule(r"download.*file|upload.*file|transfer.*data", NetworkOperations, 0.6),
        ]
    }

    /// 扫描全部规则，保留置信度严格更高的命中；平手时保留表序靠前者
    pub fn classify(&self, content: &str) -> (IntentCategory, f64) {
        let mut best_intent = IntentCategory::InformationSeeking;
        let mut best_confidence = 0.3;

        for rule in &self.rules {
            if rule.pattern.is_match(content) && rule.confidence > best_confidence {
                best_intent = rule.intent;
                best_confidence = rule.confidence;
            }
        }

        (best_intent, best_confidence)
    }

    /// 共现的良性措辞可将原本看似高危的类别视为合法
    fn context_legitimate(&self, content: &str, intent: IntentCategory) -> bool {
        match intent {
            IntentCategory::DataRetrieval => {
                self.data_key_context.is_match(content)
                    || self.provide_key_context.is_match(content)
            }
            IntentCategory::FileOperations => self.file_read_context.is_match(content),
            IntentCategory::DatabaseOperations => self.db_query_context.is_match(content),
            _ => false,
        }
    }

    /// 按类别的固定置信度阈值判定拦截
    fn should_block(intent: IntentCategory, confidence: f64) -> bool {
        match intent {
            IntentCategory::DestructiveActions => confidence > 0.8,
            IntentCategory::MaliciousActivities => confidence > 0.7,
            IntentCategory::PrivilegeEscalation => confidence > 0.6,
            IntentCategory::CodeExecution => confidence > 0.7,
            IntentCategory::ViolentActivities => confidence > 0.8,
            IntentCategory::HarmfulRequests => confidence > 0.8,
            _ => false,
        }
    }

    /// 分类 + 合法性复核 + 拦截判定；确定性
    pub fn check(&self, content: &str) -> GuardrailResult {
        let (intent, confidence) = self.classify(content);
        let context_legitimate = self.context_legitimate(content, intent);
        let blocked = Self::should_block(intent, confidence) && !context_legitimate;

        if blocked {
            return GuardrailResult {
                passed: false,
                score: confidence,
                reason: Some(format!(
                    "Detected {} intent with {:.2} confidence - operation not permitted",
                    intent, confidence
                )),
                intent: Some(intent),
                confidence,
                context_legitimate,
            };
        }

        GuardrailResult {
            passed: true,
            score: confidence,
            reason: None,
            intent: Some(intent),
            confidence,
            context_legitimate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_is_conversational_high_confidence() {
        let guardrail = IntentGuardrail::new();
        let (intent, confidence) = guardrail.classify("hello");
        assert_eq!(intent, IntentCategory::Conversational);
        assert!(confidence >= 0.9);
        assert!(guardrail.check("hello").passed);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let guardrail = IntentGuardrail::new();
        let first = guardrail.classify("analyze the sales data");
        for _ in 0..5 {
            assert_eq!(guardrail.classify("analyze the sales data"), first);
        }
    }

    #[test]
    fn test_highest_confidence_wins_over_first_match() {
        let guardrail = IntentGuardrail::new();
        // "show me" (data_retrieval 0.8) 先于 "hello" (conversational 0.95) 命中，
        // 但分类取置信度更高者
        let (intent, confidence) = guardrail.classify("show me around, hello there");
        assert_eq!(intent, IntentCategory::Conversational);
        assert!((confidence - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn test_no_match_defaults_to_information_seeking() {
        let guardrail = IntentGuardrail::new();
        let (intent, confidence) = guardrail.classify("zzz qqq");
        assert_eq!(intent, IntentCategory::InformationSeeking);
        assert!((confidence - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_destructive_request_is_blocked() {
        let guardrail = IntentGuardrail::new();
        let result = guardrail.check("please delete all files in the project");
        assert!(!result.passed);
        assert_eq!(result.intent, Some(IntentCategory::DestructiveActions));
        assert!(result.reason.unwrap().contains("destructive_actions"));
    }

    #[test]
    fn test_database_key_context_is_legitimate() {
        let guardrail = IntentGuardrail::new();
        // data_retrieval 本身不拦截，但复核标志也应为真
        let result = guardrail.check("show me the graph node key for the User class");
        assert!(result.passed);
        assert!(result.context_legitimate);
    }

    #[test]
    fn test_code_execution_blocked_above_threshold() {
        let guardrail = IntentGuardrail::new();
        let result = guardrail.check("run script to clean temp data");
        assert!(!result.passed);
        assert_eq!(result.intent, Some(IntentCategory::CodeExecution));
    }
}
