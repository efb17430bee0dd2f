//! 裁决调用预算
//!
//! 每个指令 (以对局内的半回合号为键) 与每局都有硬上限，计数器使用原子 CAS。
//! 另有按自然日 (UTC) 计的对局数上限：超出后新对局只能使用兜底裁决。

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use mt_core::ids::GameId;

use crate::error::{JudgmentError, Result};

/// 预算配置
#[derive(Debug, Clone)]
pub struct BudgetConfig {
    /// 每个指令的最大调用次数
    pub per_command: u32,
    /// 每局的最大调用次数
    pub per_game: u32,
    /// 每天允许使用实时裁决的对局数
    pub daily_games: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            per_command: 5,
            per_game: 200,
            daily_games: 50,
        }
    }
}

/// 预算作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BudgetScope {
    pub game_id: GameId,
    /// 指令所在的半回合号
    pub ply: u32,
}

impl BudgetScope {
    pub fn new(game_id: GameId, ply: u32) -> Self {
        Self { game_id, ply }
    }
}

/// 单局用量统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetStats {
    pub game_calls: u32,
    pub per_game_limit: u32,
    pub per_command_limit: u32,
    /// 各半回合的调用次数
    pub command_calls: HashMap<u32, u32>,
    /// 是否计入了今天的对局名额
    pub admitted_today: bool,
}

/// 当天的对局名额
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyGames {
    pub date: NaiveDate,
    pub admitted: usize,
    pub limit: usize,
}

impl DailyGames {
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.admitted)
    }
}

#[derive(Default)]
struct GameCounters {
    total: Arc<AtomicU32>,
    per_command: HashMap<u32, Arc<AtomicU32>>,
}

struct DailyLedger {
    date: NaiveDate,
    games: HashSet<GameId>,
}

/// 调用预算
pub struct CallBudget {
    config: BudgetConfig,
    games: RwLock<HashMap<GameId, GameCounters>>,
    daily: Mutex<DailyLedger>,
}

/// CAS 自增，达到上限时失败
fn try_increment(counter: &AtomicU32, limit: u32) -> bool {
    counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
            (n < limit).then_some(n + 1)
        })
        .is_ok()
}

impl CallBudget {
    pub fn new(config: BudgetConfig) -> Self {
        Self {
            config,
            games: RwLock::new(HashMap::new()),
            daily: Mutex::new(DailyLedger {
                date: Utc::now().date_naive(),
                games: HashSet::new(),
            }),
        }
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    fn counters(&self, scope: BudgetScope) -> (Arc<AtomicU32>, Arc<AtomicU32>) {
        {
            let games = self.games.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(game) = games.get(&scope.game_id) {
                if let Some(command) = game.per_command.get(&scope.ply) {
                    return (command.clone(), game.total.clone());
                }
            }
        }

        let mut games = self.games.write().unwrap_or_else(PoisonError::into_inner);
        let game = games.entry(scope.game_id).or_default();
        let command = game.per_command.entry(scope.ply).or_default().clone();
        (command, game.total.clone())
    }

    /// 为对局占用今天的名额；已占用时直接返回 true，日期变化时名额清零
    pub fn admit_game(&self, game_id: GameId) -> bool {
        self.admit_game_on(game_id, Utc::now().date_naive())
    }

    pub fn admit_game_on(&self, game_id: GameId, today: NaiveDate) -> bool {
        let mut daily = self.daily.lock().unwrap_or_else(PoisonError::into_inner);
        if daily.date != today {
            daily.date = today;
            daily.games.clear();
        }
        if daily.games.contains(&game_id) {
            return true;
        }
        if daily.games.len() >= self.config.daily_games {
            return false;
        }
        daily.games.insert(game_id);
        true
    }

    /// 今天的对局名额使用情况
    pub fn daily_games(&self) -> DailyGames {
        let today = Utc::now().date_naive();
        let daily = self.daily.lock().unwrap_or_else(PoisonError::into_inner);
        let admitted = if daily.date == today {
            daily.games.len()
        } else {
            0
        };
        DailyGames {
            date: today,
            admitted,
            limit: self.config.daily_games,
        }
    }

    /// 尝试占用一次调用额度
    pub fn try_acquire(&self, scope: BudgetScope) -> Result<()> {
        self.try_acquire_on(scope, Utc::now().date_naive())
    }

    pub fn try_acquire_on(&self, scope: BudgetScope, today: NaiveDate) -> Result<()> {
        if !self.admit_game_on(scope.game_id, today) {
            return Err(JudgmentError::BudgetExceeded("daily-games"));
        }
        let (command, game) = self.counters(scope);

        if !try_increment(&command, self.config.per_command) {
            return Err(JudgmentError::BudgetExceeded("per-command"));
        }
        if !try_increment(&game, self.config.per_game) {
            command.fetch_sub(1, Ordering::AcqRel);
            return Err(JudgmentError::BudgetExceeded("per-game"));
        }
        Ok(())
    }

    pub fn stats(&self, game_id: GameId) -> BudgetStats {
        let admitted_today = self
            .daily
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .games
            .contains(&game_id);
        let games = self.games.read().unwrap_or_else(PoisonError::into_inner);
        let mut stats = BudgetStats {
            per_game_limit: self.config.per_game,
            per_command_limit: self.config.per_command,
            admitted_today,
            ..Default::default()
        };
        if let Some(game) = games.get(&game_id) {
            stats.game_calls = game.total.load(Ordering::Acquire);
            stats.command_calls = game
                .per_command
                .iter()
                .map(|(ply, n)| (*ply, n.load(Ordering::Acquire)))
                .collect();
        }
        stats
    }

    /// 清除某局的全部计数
    pub fn reset_game(&self, game_id: GameId) {
        self.games
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&game_id);
    }

    /// 指令结束后释放其计数器 (局计数保留)
    pub fn forget_command(&self, scope: BudgetScope) {
        let mut games = self.games.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(game) = games.get_mut(&scope.game_id) {
            game.per_command.remove(&scope.ply);
        }
    }
}

impl Default for CallBudget {
    fn default() -> Self {
        Self::new(BudgetConfig::default())
    }
}
