//! 熔断器 (按请求类型各一个)
//!
//! - Closed: 正常放行
//! - Open: 连续失败达到阈值后短路所有调用，持续 `open_duration`
//! - HalfOpen: 放行一次探测，成功则关闭，失败则重新打开

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::error::JudgmentError;
use crate::request::RequestKind;

/// 熔断配置
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// 连续失败多少次后打开
    pub failure_threshold: u32,
    /// 打开状态持续时间
    pub open_duration: Duration,
    /// 半开状态允许的探测数
    pub half_open_max_requests: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_duration: Duration::from_secs(300),
            half_open_max_requests: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

struct InternalState {
    state: CircuitState,
    opened_at: Option<Instant>,
    half_open_requests: u32,
    half_open_successes: u32,
}

/// 单个熔断器
pub struct CircuitBreaker {
    name: &'static str,
    config: BreakerConfig,
    state: Mutex<InternalState>,
    consecutive_failures: AtomicU32,
    open_count: AtomicU64,
}

/// 放行凭证
///
/// 调用结束时必须报告 `success` 或 `failure`；未报告就被丢弃 (调用未发生或被取消)
/// 时归还半开探测名额，不计成败。
#[must_use]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl BreakerPermit<'_> {
    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.abandon_trial();
        }
    }
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: BreakerConfig) -> Self {
        Self {
            name,
            config,
            state: Mutex::new(InternalState {
                state: CircuitState::Closed,
                opened_at: None,
                half_open_requests: 0,
                half_open_successes: 0,
            }),
            consecutive_failures: AtomicU32::new(0),
            open_count: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, InternalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 打开时长已过则进入半开
    fn refresh(&self, state: &mut InternalState) {
        if state.state == CircuitState::Open {
            if let Some(opened_at) = state.opened_at {
                if opened_at.elapsed() >= self.config.open_duration {
                    state.state = CircuitState::HalfOpen;
                    state.half_open_requests = 0;
                    state.half_open_successes = 0;
                    tracing::info!(kind = self.name, "Circuit breaker transitioning to half-open");
                }
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        let mut state = self.lock();
        self.refresh(&mut state);
        state.state
    }

    /// 检查是否放行
    pub fn allow_request(&self) -> Result<BreakerPermit<'_>, JudgmentError> {
        let mut state = self.lock();
        self.refresh(&mut state);

        match state.state {
            CircuitState::Closed => Ok(BreakerPermit {
                breaker: self,
                trial: false,
                settled: false,
            }),
            CircuitState::Open => {
                let retry_after = state
                    .opened_at
                    .map(|t| self.config.open_duration.saturating_sub(t.elapsed()))
                    .unwrap_or(self.config.open_duration);
                Err(JudgmentError::CircuitOpen { retry_after })
            }
            CircuitState::HalfOpen => {
                if state.half_open_requests < self.config.half_open_max_requests {
                    state.half_open_requests += 1;
                    Ok(BreakerPermit {
                        breaker: self,
                        trial: true,
                        settled: false,
                    })
                } else {
                    Err(JudgmentError::CircuitOpen {
                        retry_after: Duration::from_secs(1),
                    })
                }
            }
        }
    }

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        let mut state = self.lock();
        if state.state == CircuitState::HalfOpen {
            state.half_open_successes += 1;
            if state.half_open_successes >= self.config.half_open_max_requests {
                state.state = CircuitState::Closed;
                state.opened_at = None;
                tracing::info!(kind = self.name, "Circuit breaker closing after successful trial request");
            }
        }
    }

    fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        let mut state = self.lock();
        match state.state {
            CircuitState::Closed => {
                if failures >= self.config.failure_threshold {
                    state.state = CircuitState::Open;
                    state.opened_at = Some(Instant::now());
                    self.open_count.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        kind = self.name,
                        consecutive_failures = failures,
                        open_duration_secs = self.config.open_duration.as_secs(),
                        "Circuit breaker opening due to consecutive failures"
                    );
                }
            }
            CircuitState::HalfOpen => {
                state.state = CircuitState::Open;
                state.opened_at = Some(Instant::now());
                self.open_count.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(kind = self.name, "Circuit breaker re-opening after failed trial request");
            }
            CircuitState::Open => {}
        }
    }

    /// 归还未使用的半开探测名额
    fn abandon_trial(&self) {
        let mut state = self.lock();
        if state.state == CircuitState::HalfOpen && state.half_open_requests > 0 {
            state.half_open_requests -= 1;
        }
    }

    pub fn open_count(&self) -> u64 {
        self.open_count.load(Ordering::Relaxed)
    }
}

/// 每种请求类型一个熔断器
pub struct BreakerSet {
    breakers: HashMap<RequestKind, CircuitBreaker>,
}

impl BreakerSet {
    pub fn new(config: BreakerConfig) -> Self {
        let breakers = RequestKind::ALL
            .into_iter()
            .map(|kind| (kind, CircuitBreaker::new(kind.as_str(), config.clone())))
            .collect();
        Self { breakers }
    }

    pub fn get(&self, kind: RequestKind) -> Option<&CircuitBreaker> {
        self.breakers.get(&kind)
    }

    pub fn state(&self, kind: RequestKind) -> CircuitState {
        self.get(kind)
            .map(CircuitBreaker::state)
            .unwrap_or(CircuitState::Closed)
    }
}

impl Default for BreakerSet {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
