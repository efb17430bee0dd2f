//! 网关内部错误 (不会离开网关)

use std::time::Duration;

use thiserror::Error;

use mt_core::record::DegradedReason;

use crate::capability::CapabilityError;

#[derive(Error, Debug)]
pub enum JudgmentError {
    #[error("Judgment call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Judgment budget exceeded: {0}")]
    BudgetExceeded(&'static str),

    #[error("Circuit breaker is open, retry after {retry_after:?}")]
    CircuitOpen { retry_after: Duration },

    #[error("Judgment capability error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Invalid judgment response: {0}")]
    InvalidResponse(String),
}

impl JudgmentError {
    /// 对应的降级原因
    pub fn reason(&self) -> DegradedReason {
        match self {
            JudgmentError::Timeout(_) => DegradedReason::Timeout,
            JudgmentError::BudgetExceeded(_) => DegradedReason::BudgetExceeded,
            JudgmentError::CircuitOpen { .. } => DegradedReason::CircuitOpen,
            JudgmentError::Capability(_) => DegradedReason::CapabilityError,
            JudgmentError::InvalidResponse(_) => DegradedReason::InvalidResponse,
        }
    }

    /// 是否计入熔断失败
    pub fn counts_as_failure(&self) -> bool {
        matches!(
            self,
            JudgmentError::Timeout(_)
                | JudgmentError::Capability(_)
                | JudgmentError::InvalidResponse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, JudgmentError>;
