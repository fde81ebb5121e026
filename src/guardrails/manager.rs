//! 护栏管理器：输入闸门与输出检查
//!
//! 输入检查用意图分类器（图执行前 await）；输出检查在图执行后 await，
//! 校验长度与敏感内容模式。两者都不与图执行交错。

use std::sync::Arc;

use regex::Regex;

use crate::guardrails::{GuardrailResult, IntentGuardrail};

/// 护栏管理器
pub struct GuardrailManager {
    intent: Arc<IntentGuardrail>,
    sensitive_patterns: Vec<Regex>,
    max_output_chars: usize,
    enabled: bool,
}

impl GuardrailManager {
    pub fn new(intent: Arc<IntentGuardrail>, enabled: bool, max_output_chars: usize) -> Self {
        let sensitive_patterns = [
            // 回复里不该出现的脚本与凭据泄露
            r"(?is)<script[^>]*>.*?</script>",
            r"(?i)javascript:",
            r"(?i)password\s*[=:]",
            r"(?i)api[_-]?key\s*[=:]",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("invalid output pattern"))
        .collect();

        Self {
            intent,
            sensitive_patterns,
            max_output_chars,
            enabled,
        }
    }

    /// 输入闸门：意图分类拦截即拒绝
    pub async fn check_input(&self, content: &str) -> GuardrailResult {
        if !self.enabled {
            return GuardrailResult::pass();
        }
        self.intent.check(content)
    }

    /// 输出检查：超长或命中敏感模式即丢弃回复
    pub async fn check_output(&self, content: &str) -> GuardrailResult {
        if !self.enabled {
            return GuardrailResult::pass();
        }

        if content.chars().count() > self.max_output_chars {
            return GuardrailResult::reject(
                0.0,
                format!(
                    "Output exceeds maximum length of {} characters",
                    self.max_output_chars
                ),
            );
        }

        for pattern in &self.sensitive_patterns {
            if pattern.is_match(content) {
                return GuardrailResult::reject(
                    0.95,
                    "Output contains potentially sensitive information",
                );
            }
        }

        GuardrailResult::pass()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> GuardrailManager {
        GuardrailManager::new(Arc::new(IntentGuardrail::new()), true, 100)
    }

    #[tokio::test]
    async fn test_input_gate_blocks_destructive() {
        let result = manager().check_input("delete all files right now").await;
        assert!(!result.passed);
    }

    #[tokio::test]
    async fn test_output_length_limit() {
        let long = "x".repeat(101);
        assert!(!manager().check_output(&long).await.passed);
        assert!(manager().check_output("short answer").await.passed);
    }

    #[tokio::test]
    async fn test_output_sensitive_patterns() {
        let result = manager()
            .check_output("your password: hunter2")
            .await;
        assert!(!result.passed);
        let result = manager()
            .check_output("here is <script>alert(1)</script>")
            .await;
        assert!(!result.passed);
    }

    #[tokio::test]
    async fn test_disabled_manager_passes_everything() {
        let manager = GuardrailManager::new(Arc::new(IntentGuardrail::new()), false, 10);
        assert!(manager.check_input("delete all files").await.passed);
        assert!(manager.check_output(&"x".repeat(100)).await.passed);
    }
}
