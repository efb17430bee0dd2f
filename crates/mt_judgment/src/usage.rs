//! 裁决用量与费用统计
//!
//! 按对局和按自然日 (UTC) 累计实时调用、缓存命中、兜底次数与 token 费用。

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use mt_core::ids::GameId;

use crate::budget::{BudgetStats, DailyGames};

/// 单次实时调用消耗的 token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// 计价 (美元 / 百万 token)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsagePricing {
    pub input_usd_per_million: f64,
    pub output_usd_per_million: f64,
}

impl Default for UsagePricing {
    fn default() -> Self {
        Self {
            input_usd_per_million: 0.075,
            output_usd_per_million: 0.30,
        }
    }
}

impl UsagePricing {
    pub fn cost_of(&self, usage: TokenUsage) -> f64 {
        (usage.input_tokens as f64 * self.input_usd_per_million
            + usage.output_tokens as f64 * self.output_usd_per_million)
            / 1_000_000.0
    }
}

/// 一次裁决的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageKind {
    /// 实时调用成功，能力未报告用量时为 `None`
    Live(Option<TokenUsage>),
    Cached,
    Fallback,
}

/// 累计用量
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub live_calls: u64,
    pub cache_hits: u64,
    pub fallbacks: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

impl UsageTotals {
    fn add(&mut self, kind: UsageKind, pricing: &UsagePricing) {
        match kind {
            UsageKind::Live(usage) => {
                self.live_calls += 1;
                if let Some(usage) = usage {
                    self.input_tokens += usage.input_tokens;
                    self.output_tokens += usage.output_tokens;
                    self.cost_usd += pricing.cost_of(usage);
                }
            }
            UsageKind::Cached => self.cache_hits += 1,
            UsageKind::Fallback => self.fallbacks += 1,
        }
    }
}

/// 单局用量报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameUsage {
    pub game_id: GameId,
    pub budget: BudgetStats,
    pub usage: UsageTotals,
}

/// 当日用量报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub games: DailyGames,
    pub usage: UsageTotals,
}

struct DailyTotals {
    date: NaiveDate,
    totals: UsageTotals,
}

/// 用量统计器
pub struct UsageTracker {
    pricing: UsagePricing,
    games: Mutex<HashMap<GameId, UsageTotals>>,
    daily: Mutex<DailyTotals>,
}

impl UsageTracker {
    pub fn new(pricing: UsagePricing) -> Self {
        Self {
            pricing,
            games: Mutex::new(HashMap::new()),
            daily: Mutex::new(DailyTotals {
                date: Utc::now().date_naive(),
                totals: UsageTotals::default(),
            }),
        }
    }

    pub fn pricing(&self) -> &UsagePricing {
        &self.pricing
    }

    pub fn record(&self, game_id: GameId, kind: UsageKind) {
        self.record_on(game_id, kind, Utc::now().date_naive());
    }

    pub fn record_on(&self, game_id: GameId, kind: UsageKind, today: NaiveDate) {
        self.games
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(game_id)
            .or_default()
            .add(kind, &self.pricing);

        let mut daily = self.daily.lock().unwrap_or_else(PoisonError::into_inner);
        if daily.date != today {
            daily.date = today;
            daily.totals = UsageTotals::default();
        }
        daily.totals.add(kind, &self.pricing);
    }

    pub fn game(&self, game_id: GameId) -> UsageTotals {
        self.games
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&game_id)
            .cloned()
            .unwrap_or_default()
    }

    /// 当日累计；跨日后尚无记录时返回零
    pub fn today(&self) -> (NaiveDate, UsageTotals) {
        let today = Utc::now().date_naive();
        let daily = self.daily.lock().unwrap_or_else(PoisonError::into_inner);
        if daily.date == today {
            (daily.date, daily.totals.clone())
        } else {
            (today, UsageTotals::default())
        }
    }

    /// 对局结束后丢弃其累计 (当日累计保留)
    pub fn forget_game(&self, game_id: GameId) {
        self.games
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&game_id);
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new(UsagePricing::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_of_tokens() {
        let pricing = UsagePricing::default();
        let cost = pricing.cost_of(TokenUsage {
            input_tokens: 2_000_000,
            output_tokens: 1_000_000,
        });
        assert!((cost - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_per_game_and_daily_totals() {
        let tracker = UsageTracker::default();
        let (a, b) = (GameId::new(), GameId::new());
        let usage = TokenUsage {
            input_tokens: 1_000,
            output_tokens: 200,
        };

        tracker.record(a, UsageKind::Live(Some(usage)));
        tracker.record(a, UsageKind::Cached);
        tracker.record(b, UsageKind::Live(None));
        tracker.record(b, UsageKind::Fallback);

        let game = tracker.game(a);
        assert_eq!((game.live_calls, game.cache_hits, game.fallbacks), (1, 1, 0));
        assert_eq!(game.input_tokens, 1_000);
        assert!(game.cost_usd > 0.0);

        let (_, daily) = tracker.today();
        assert_eq!((daily.live_calls, daily.cache_hits, daily.fallbacks), (2, 1, 1));
        assert_eq!(daily.output_tokens, 200);

        tracker.forget_game(a);
        assert_eq!(tracker.game(a), UsageTotals::default());
        assert_eq!(tracker.today().1.live_calls, 2);
    }

    #[test]
    fn test_daily_totals_reset_on_new_day() {
        let tracker = UsageTracker::default();
        let game = GameId::new();
        let yesterday = Utc::now().date_naive().pred_opt().unwrap();

        tracker.record_on(game, UsageKind::Live(None), yesterday);
        assert_eq!(tracker.today().1, UsageTotals::default());

        tracker.record(game, UsageKind::Fallback);
        let (_, daily) = tracker.today();
        assert_eq!((daily.live_calls, daily.fallbacks), (0, 1));
        assert_eq!(tracker.game(game).live_calls, 1);
    }
}
