//! Judgment Gateway 执行编排层
//!
//! 调用顺序：缓存 -> 熔断 -> 预算 -> 超时包裹的能力调用 -> 校验 -> 写缓存。
//! 任一环节失败都回落到确定性兜底裁决。每个裁决的去向都记入用量统计。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use mt_core::ids::GameId;
use mt_core::record::VerdictSource;

use crate::breaker::{BreakerConfig, BreakerSet, CircuitState};
use crate::budget::{BudgetConfig, BudgetScope, BudgetStats, CallBudget};
use crate::cache::{CacheConfig, VerdictCache};
use crate::capability::{CapabilityError, JudgmentCapability, UnavailableCapability};
use crate::error::JudgmentError;
use crate::fallback;
use crate::request::{JudgmentRequest, RequestKind};
use crate::usage::{DailyUsage, GameUsage, TokenUsage, UsageKind, UsagePricing, UsageTracker};
use crate::verdict::{Judgment, Verdict};

/// 网关配置
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// 单次调用超时
    pub call_timeout: Duration,
    pub cache: CacheConfig,
    pub budget: BudgetConfig,
    pub breaker: BreakerConfig,
    pub pricing: UsagePricing,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
            cache: CacheConfig::default(),
            budget: BudgetConfig::default(),
            breaker: BreakerConfig::default(),
            pricing: UsagePricing::default(),
        }
    }
}

/// 裁决入口
///
/// 永远返回一个裁决，降级只体现在 `Judgment::source` 上。
#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(&self, request: &JudgmentRequest, scope: BudgetScope) -> Judgment;

    /// 指令结束后释放其预算计数
    fn forget_command(&self, _scope: BudgetScope) {}

    /// 对局结束后释放该局的预算计数
    fn forget_game(&self, _game_id: GameId) {}

    /// 新对局占用当天的实时裁决名额；返回 false 表示该局只会得到兜底裁决
    fn admit_game(&self, _game_id: GameId) -> bool {
        true
    }

    /// 单局用量；不计量的实现返回 `None`
    fn game_usage(&self, _game_id: GameId) -> Option<GameUsage> {
        None
    }

    fn daily_usage(&self) -> Option<DailyUsage> {
        None
    }
}

pub struct JudgmentGateway {
    config: GatewayConfig,
    capability: Arc<dyn JudgmentCapability>,
    cache: VerdictCache,
    budget: CallBudget,
    breakers: BreakerSet,
    usage: UsageTracker,
}

impl JudgmentGateway {
    pub fn new(config: GatewayConfig, capability: Arc<dyn JudgmentCapability>) -> Self {
        Self {
            cache: VerdictCache::new(config.cache.clone()),
            budget: CallBudget::new(config.budget.clone()),
            breakers: BreakerSet::new(config.breaker.clone()),
            usage: UsageTracker::new(config.pricing),
            config,
            capability,
        }
    }

    /// 只使用兜底裁决的网关
    pub fn fallback_only() -> Self {
        Self::new(GatewayConfig::default(), Arc::new(UnavailableCapability))
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn stats(&self, game_id: GameId) -> BudgetStats {
        self.budget.stats(game_id)
    }

    pub fn reset_game(&self, game_id: GameId) {
        self.budget.reset_game(game_id);
        self.usage.forget_game(game_id);
    }

    pub fn forget_command(&self, scope: BudgetScope) {
        self.budget.forget_command(scope);
    }

    pub fn breaker_state(&self, kind: RequestKind) -> CircuitState {
        self.breakers.state(kind)
    }

    async fn call_live(
        &self,
        request: &JudgmentRequest,
        scope: BudgetScope,
    ) -> Result<(Verdict, Option<TokenUsage>), JudgmentError> {
        let kind = request.kind();
        if !self.capability.is_available() {
            return Err(JudgmentError::Capability(CapabilityError::Unavailable));
        }

        let breaker = self
            .breakers
            .get(kind)
            .ok_or_else(|| JudgmentError::InvalidResponse(format!("no breaker for {kind}")))?;
        let permit = breaker.allow_request()?;
        // 预算不足时 permit 被丢弃，半开探测名额归还
        self.budget.try_acquire(scope)?;

        let call = self.capability.call_metered(request);
        let outcome = match tokio::time::timeout(self.config.call_timeout, call).await {
            Err(_) => Err(JudgmentError::Timeout(self.config.call_timeout)),
            Ok(Err(e)) => Err(JudgmentError::from(e)),
            Ok(Ok(metered)) => metered
                .verdict
                .validated_for(kind)
                .map(|verdict| (verdict, metered.usage)),
        };

        match outcome {
            Ok(live) => {
                permit.success();
                Ok(live)
            }
            Err(e) => {
                if e.counts_as_failure() {
                    permit.failure();
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Judge for JudgmentGateway {
    async fn judge(&self, request: &JudgmentRequest, scope: BudgetScope) -> Judgment {
        let kind = request.kind();
        let fingerprint = request.fingerprint();

        if let Some(verdict) = self.cache.get(&fingerprint).await {
            tracing::debug!(%kind, game_id = %scope.game_id, "Judgment cache hit");
            self.usage.record(scope.game_id, UsageKind::Cached);
            return Judgment::new(verdict, VerdictSource::Cached);
        }

        match self.call_live(request, scope).await {
            Ok((verdict, usage)) => {
                self.cache.insert(fingerprint, verdict.clone()).await;
                self.usage.record(scope.game_id, UsageKind::Live(usage));
                tracing::debug!(%kind, game_id = %scope.game_id, "Live judgment received");
                Judgment::new(verdict, VerdictSource::Live)
            }
            Err(e) => {
                let reason = e.reason();
                if matches!(e, JudgmentError::Capability(CapabilityError::Unavailable)) {
                    tracing::debug!(
                        %kind,
                        game_id = %scope.game_id,
                        "No judgment capability, using fallback"
                    );
                } else {
                    tracing::warn!(
                        %kind,
                        game_id = %scope.game_id,
                        ply = scope.ply,
                        reason = reason.as_str(),
                        error = %e,
                        "Judgment degraded to fallback"
                    );
                }
                self.usage.record(scope.game_id, UsageKind::Fallback);
                Judgment::new(fallback::for_request(request), VerdictSource::Fallback(reason))
            }
        }
    }

    fn forget_command(&self, scope: BudgetScope) {
        self.budget.forget_command(scope);
    }

    fn forget_game(&self, game_id: GameId) {
        self.reset_game(game_id);
    }

    fn admit_game(&self, game_id: GameId) -> bool {
        // 没有实时能力时不占名额
        !self.capability.is_available() || self.budget.admit_game(game_id)
    }

    fn game_usage(&self, game_id: GameId) -> Option<GameUsage> {
        Some(GameUsage {
            game_id,
            budget: self.stats(game_id),
            usage: self.usage.game(game_id),
        })
    }

    fn daily_usage(&self) -> Option<DailyUsage> {
        let (date, usage) = self.usage.today();
        Some(DailyUsage {
            date,
            games: self.budget.daily_games(),
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mt_core::record::DegradedReason;

    use super::*;
    use crate::request::fixtures;
    use crate::verdict::ObedienceVerdict;

    /// 可编排行为的假能力
    struct ScriptedCapability {
        calls: AtomicUsize,
        delay: Duration,
        reply: fn(&JudgmentRequest) -> Result<Verdict, CapabilityError>,
    }

    impl ScriptedCapability {
        fn new(
            delay: Duration,
            reply: fn(&JudgmentRequest) -> Result<Verdict, CapabilityError>,
        ) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                reply,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JudgmentCapability for ScriptedCapability {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn call(&self, request: &JudgmentRequest) -> Result<Verdict, CapabilityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            (self.reply)(request)
        }
    }

    fn obey(_: &JudgmentRequest) -> Result<Verdict, CapabilityError> {
        Ok(Verdict::Obedience(ObedienceVerdict {
            will_obey: true,
            narrative: "As you wish.".into(),
            willingness_delta: 40,
        }))
    }

    fn refuse_transport(_: &JudgmentRequest) -> Result<Verdict, CapabilityError> {
        Err(CapabilityError::Transport("connection refused".into()))
    }

    fn wrong_variant(_: &JudgmentRequest) -> Result<Verdict, CapabilityError> {
        Ok(Verdict::Taunt(crate::verdict::TauntVerdict {
            text: "Ha!".into(),
            intensity: 2,
        }))
    }

    fn scope() -> BudgetScope {
        BudgetScope::new(GameId::new(), 0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_verdict_is_clamped_and_cached() {
        let capability = ScriptedCapability::new(Duration::from_millis(10), obey);
        let gateway = JudgmentGateway::new(GatewayConfig::default(), capability.clone());
        let request = JudgmentRequest::Obedience(fixtures::obedience(50, true));
        let scope = scope();

        let first = gateway.judge(&request, scope).await;
        assert_eq!(first.source, VerdictSource::Live);
        let (verdict, _) = first.into_obedience(&fixtures::obedience(50, true));
        assert_eq!(verdict.willingness_delta, 15);

        let second = gateway.judge(&request, scope).await;
        assert_eq!(second.source, VerdictSource::Cached);
        assert_eq!(capability.calls(), 1);
        // 缓存命中不占预算
        assert_eq!(gateway.stats(scope.game_id).game_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_timeouts_open_circuit_for_five_minutes() {
        let capability = ScriptedCapability::new(Duration::from_secs(10), obey);
        let gateway = JudgmentGateway::new(GatewayConfig::default(), capability.clone());
        let game = GameId::new();

        for ply in 0..3 {
            let request = JudgmentRequest::Obedience(fixtures::obedience(50 + ply as u8, true));
            let judgment = gateway.judge(&request, BudgetScope::new(game, ply)).await;
            assert_eq!(judgment.source, VerdictSource::Fallback(DegradedReason::Timeout));
        }
        assert_eq!(capability.calls(), 3);
        assert_eq!(gateway.breaker_state(RequestKind::Obedience), CircuitState::Open);

        // 打开期间短路，不调用能力
        tokio::time::advance(Duration::from_secs(280)).await;
        let request = JudgmentRequest::Obedience(fixtures::obedience(70, true));
        let judgment = gateway.judge(&request, BudgetScope::new(game, 3)).await;
        assert_eq!(judgment.source, VerdictSource::Fallback(DegradedReason::CircuitOpen));
        assert_eq!(capability.calls(), 3);

        // 其他请求类型不受影响
        assert_eq!(gateway.breaker_state(RequestKind::Taunt), CircuitState::Closed);

        // 5 分钟后放行一次探测
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(gateway.breaker_state(RequestKind::Obedience), CircuitState::HalfOpen);
        let judgment = gateway.judge(&request, BudgetScope::new(game, 4)).await;
        assert_eq!(judgment.source, VerdictSource::Fallback(DegradedReason::Timeout));
        assert_eq!(capability.calls(), 4);
        assert_eq!(gateway.breaker_state(RequestKind::Obedience), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exceeded_skips_capability() {
        let capability = ScriptedCapability::new(Duration::ZERO, obey);
        let gateway = JudgmentGateway::new(GatewayConfig::default(), capability.clone());
        let scope = scope();

        for w in 0..5u8 {
            let request = JudgmentRequest::Obedience(fixtures::obedience(40 + w, true));
            assert_eq!(gateway.judge(&request, scope).await.source, VerdictSource::Live);
        }
        let request = JudgmentRequest::Obedience(fixtures::obedience(60, true));
        let judgment = gateway.judge(&request, scope).await;
        assert_eq!(
            judgment.source,
            VerdictSource::Fallback(DegradedReason::BudgetExceeded)
        );
        assert_eq!(capability.calls(), 5);
        // 预算耗尽不算熔断失败
        assert_eq!(gateway.breaker_state(RequestKind::Obedience), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mismatched_variant_counts_as_failure() {
        let capability = ScriptedCapability::new(Duration::ZERO, wrong_variant);
        let gateway = JudgmentGateway::new(GatewayConfig::default(), capability);
        let ctx = fixtures::obedience(95, true);
        let judgment = gateway
            .judge(&JudgmentRequest::Obedience(ctx.clone()), scope())
            .await;
        assert_eq!(
            judgment.source,
            VerdictSource::Fallback(DegradedReason::InvalidResponse)
        );
        let (verdict, _) = judgment.into_obedience(&ctx);
        assert_eq!(verdict, fallback::obedience(&ctx));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capability_error_falls_back() {
        let capability = ScriptedCapability::new(Duration::ZERO, refuse_transport);
        let gateway = JudgmentGateway::new(GatewayConfig::default(), capability);
        let request = JudgmentRequest::Taunt(fixtures::taunt(crate::request::TauntTrigger::Check, 0));
        let judgment = gateway.judge(&request, scope()).await;
        assert_eq!(
            judgment.source,
            VerdictSource::Fallback(DegradedReason::CapabilityError)
        );
        assert!(matches!(judgment.verdict, Verdict::Taunt(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_usage_tracks_every_verdict_source() {
        let capability = ScriptedCapability::new(Duration::ZERO, obey);
        let gateway = JudgmentGateway::new(GatewayConfig::default(), capability);
        let scope = scope();
        let request = JudgmentRequest::Obedience(fixtures::obedience(50, true));

        gateway.judge(&request, scope).await;
        gateway.judge(&request, scope).await;
        let usage = gateway.game_usage(scope.game_id).unwrap();
        assert_eq!((usage.usage.live_calls, usage.usage.cache_hits), (1, 1));
        assert_eq!(usage.budget.game_calls, 1);
        assert!(usage.budget.admitted_today);

        let daily = gateway.daily_usage().unwrap();
        assert_eq!(daily.usage.live_calls, 1);
        assert_eq!(daily.games.admitted, 1);

        gateway.forget_game(scope.game_id);
        assert_eq!(gateway.game_usage(scope.game_id).unwrap().usage.live_calls, 0);
        assert_eq!(gateway.daily_usage().unwrap().usage.live_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_game_cap_degrades_new_games() {
        let capability = ScriptedCapability::new(Duration::ZERO, obey);
        let config = GatewayConfig {
            budget: BudgetConfig {
                daily_games: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let gateway = JudgmentGateway::new(config, capability.clone());
        let (first, second) = (GameId::new(), GameId::new());

        assert!(gateway.admit_game(first));
        assert!(!gateway.admit_game(second));

        let request = JudgmentRequest::Obedience(fixtures::obedience(50, true));
        let judgment = gateway.judge(&request, BudgetScope::new(second, 0)).await;
        assert_eq!(
            judgment.source,
            VerdictSource::Fallback(DegradedReason::BudgetExceeded)
        );
        assert_eq!(capability.calls(), 0);
        assert_eq!(gateway.game_usage(second).unwrap().usage.fallbacks, 1);

        let judgment = gateway.judge(&request, BudgetScope::new(first, 0)).await;
        assert_eq!(judgment.source, VerdictSource::Live);
    }

    #[tokio::test]
    async fn test_fallback_only_gateway_never_consumes_budget() {
        let gateway = JudgmentGateway::fallback_only();
        let scope = scope();
        for _ in 0..10 {
            let request = JudgmentRequest::Obedience(fixtures::obedience(20, true));
            let judgment = gateway.judge(&request, scope).await;
            assert!(judgment.source.is_degraded());
        }
        assert_eq!(gateway.stats(scope.game_id).game_calls, 0);
        assert_eq!(gateway.breaker_state(RequestKind::Obedience), CircuitState::Closed);
        // 没有实时能力时新对局不占当日名额
        assert!(gateway.admit_game(GameId::new()));
        assert_eq!(gateway.daily_usage().unwrap().games.admitted, 0);
    }
}
