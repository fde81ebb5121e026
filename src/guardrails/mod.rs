//! 安全护栏层
//!
//! 意图分类器在两处使用：图执行前的输入闸门（拒绝后任何智能体都不运行），
//! 以及 Supervisor 解析链的最后路由手段。输出检查在图执行后丢弃不合规回复。
//! 护栏拒绝是一等策略结果，不是错误。

pub mod intent;
pub mod manager;

pub use intent::{IntentCategory, IntentGuardrail};
pub use manager::GuardrailManager;

/// 护栏检查结果；reason 总是人类可读
#[derive(Debug, Clone)]
pub struct GuardrailResult {
    pub passed: bool,
    pub score: f64,
    pub reason: Option<String>,
    pub intent: Option<IntentCategory>,
    pub confidence: f64,
    pub context_legitimate: bool,
}

impl GuardrailResult {
    /// 无意图信息的通过结果（护栏关闭等场景）
    pub fn pass() -> Self {
        Self {
            passed: true,
            score: 1.0,
            reason: None,
            intent: None,
            confidence: 0.0,
            context_legitimate: false,
        }
    }

    pub fn reject(score: f64, reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            score,
            reason: Some(reason.into()),
            intent: None,
            confidence: 0.0,
            context_legitimate: false,
        }
    }
}
