//! 守护进程配置
//!
//! 读取顺序：默认值 -> `MUTINY_CONFIG` 指向的 TOML 文件 -> 环境变量覆盖。

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use mt_api::{ApiServerConfig, OracleClientConfig};
use mt_durable::OutboxConfig;
use mt_engine::EngineConfig;
use mt_judgment::{
    BreakerConfig, BudgetConfig, CacheConfig, GatewayConfig, HttpCapabilityConfig,
    HttpJudgmentCapability, JudgmentCapability, UnavailableCapability, UsagePricing,
};

pub const CONFIG_PATH_ENV: &str = "MUTINY_CONFIG";
pub const LISTEN_ADDR_ENV: &str = "MUTINY_LISTEN_ADDR";
pub const JUDGMENT_URL_ENV: &str = "MUTINY_JUDGMENT_URL";
pub const ORACLE_URL_ENV: &str = "MUTINY_ORACLE_URL";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MutinyConfig {
    pub server: ApiServerConfig,
    pub gateway: GatewaySettings,
    pub oracle: OracleSettings,
    pub engine: EngineConfig,
    pub outbox: OutboxSettings,
}

/// 裁决网关配置 (秒/毫秒为单位的扁平形式)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// 外部裁决服务地址，为空时仅使用兜底裁决
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub call_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub analysis_ttl_secs: u64,
    pub taunt_ttl_secs: u64,
    pub cache_capacity: usize,
    pub per_command_budget: u32,
    pub per_game_budget: u32,
    /// 每天允许使用实时裁决的对局数
    pub daily_game_budget: usize,
    /// 每百万输入/输出 token 的美元价格
    pub input_usd_per_million: f64,
    pub output_usd_per_million: f64,
    pub failure_threshold: u32,
    pub open_duration_secs: u64,
    pub half_open_max_requests: u32,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        let gateway = GatewayConfig::default();
        Self {
            endpoint: None,
            api_key: None,
            call_timeout_ms: gateway.call_timeout.as_millis() as u64,
            request_timeout_ms: HttpCapabilityConfig::default().request_timeout.as_millis() as u64,
            analysis_ttl_secs: gateway.cache.analysis_ttl.as_secs(),
            taunt_ttl_secs: gateway.cache.taunt_ttl.as_secs(),
            cache_capacity: gateway.cache.capacity,
            per_command_budget: gateway.budget.per_command,
            per_game_budget: gateway.budget.per_game,
            daily_game_budget: gateway.budget.daily_games,
            input_usd_per_million: gateway.pricing.input_usd_per_million,
            output_usd_per_million: gateway.pricing.output_usd_per_million,
            failure_threshold: gateway.breaker.failure_threshold,
            open_duration_secs: gateway.breaker.open_duration.as_secs(),
            half_open_max_requests: gateway.breaker.half_open_max_requests,
        }
    }
}

impl GatewaySettings {
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            cache: CacheConfig {
                analysis_ttl: Duration::from_secs(self.analysis_ttl_secs),
                taunt_ttl: Duration::from_secs(self.taunt_ttl_secs),
                capacity: self.cache_capacity,
            },
            budget: BudgetConfig {
                per_command: self.per_command_budget,
                per_game: self.per_game_budget,
                daily_games: self.daily_game_budget,
            },
            pricing: UsagePricing {
                input_usd_per_million: self.input_usd_per_million,
                output_usd_per_million: self.output_usd_per_million,
            },
            breaker: BreakerConfig {
                failure_threshold: self.failure_threshold,
                open_duration: Duration::from_secs(self.open_duration_secs),
                half_open_max_requests: self.half_open_max_requests,
            },
        }
    }

    pub fn capability(&self) -> Arc<dyn JudgmentCapability> {
        match &self.endpoint {
            Some(endpoint) => Arc::new(HttpJudgmentCapability::new(HttpCapabilityConfig {
                endpoint: endpoint.clone(),
                api_key: self.api_key.clone(),
                request_timeout: Duration::from_millis(self.request_timeout_ms),
            })),
            None => Arc::new(UnavailableCapability),
        }
    }
}

/// 规则预言机接入方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleMode {
    /// 内存占位预言机 + 固定准确度校验器
    #[default]
    Grid,
    Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    pub mode: OracleMode,
    #[serde(flatten)]
    pub client: OracleClientConfig,
    /// Grid 模式下校验器返回的准确度
    pub grid_accuracy: f64,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            mode: OracleMode::default(),
            client: OracleClientConfig::default(),
            grid_accuracy: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutboxSettings {
    pub max_pending: usize,
    pub drain_batch_size: usize,
}

impl Default for OutboxSettings {
    fn default() -> Self {
        let outbox = OutboxConfig::default();
        Self {
            max_pending: outbox.max_pending,
            drain_batch_size: outbox.drain_batch_size,
        }
    }
}

impl OutboxSettings {
    pub fn outbox_config(&self) -> OutboxConfig {
        OutboxConfig {
            max_pending: self.max_pending,
            drain_batch_size: self.drain_batch_size,
        }
    }
}

impl MutinyConfig {
    /// 从进程环境加载
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// 应用环境变量覆盖；设置预言机地址即切换到 HTTP 模式
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(addr) = lookup(LISTEN_ADDR_ENV) {
            self.server.addr = addr
                .parse::<SocketAddr>()
                .with_context(|| format!("{LISTEN_ADDR_ENV} is not a socket address: {addr}"))?;
        }
        if let Some(url) = lookup(JUDGMENT_URL_ENV) {
            self.gateway.endpoint = Some(url);
        }
        if let Some(url) = lookup(ORACLE_URL_ENV) {
            self.oracle.mode = OracleMode::Http;
            self.oracle.client.legality_url = url;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    use mt_engine::ThresholdPolicy;

    #[test]
    fn test_defaults() {
        let config = MutinyConfig::default();
        assert_eq!(config.oracle.mode, OracleMode::Grid);
        assert!(config.gateway.endpoint.is_none());
        assert_eq!(config.gateway.gateway_config().breaker.failure_threshold, 3);
        assert_eq!(config.engine.threshold, ThresholdPolicy::Random);
    }

    #[test]
    fn test_from_toml() {
        let config = MutinyConfig::from_toml(
            r#"
            [server]
            addr = "127.0.0.1:9000"

            [gateway]
            endpoint = "http://judge.local/judge"
            per_game_budget = 50
            daily_game_budget = 10
            open_duration_secs = 60

            [oracle]
            mode = "http"
            legality_url = "http://rules.local"

            [engine]
            starting_willingness = 60
            threshold = { mode = "seeded", value = 42 }
            "#,
        )
        .unwrap();

        assert_eq!(config.server.addr.port(), 9000);
        assert_eq!(config.gateway.per_game_budget, 50);
        let gateway = config.gateway.gateway_config();
        assert_eq!(gateway.breaker.open_duration, Duration::from_secs(60));
        assert_eq!(gateway.budget.per_command, BudgetConfig::default().per_command);
        assert_eq!(gateway.budget.daily_games, 10);
        assert_eq!(gateway.pricing, UsagePricing::default());
        assert_eq!(config.oracle.mode, OracleMode::Http);
        assert_eq!(config.oracle.client.legality_url, "http://rules.local");
        assert_eq!(config.engine.starting_willingness, 60);
        assert_eq!(config.engine.threshold, ThresholdPolicy::Seeded(42));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (LISTEN_ADDR_ENV, "127.0.0.1:7000"),
            (ORACLE_URL_ENV, "http://oracle.local"),
        ]);
        let mut config = MutinyConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.addr.port(), 7000);
        assert_eq!(config.oracle.mode, OracleMode::Http);
        assert_eq!(config.oracle.client.legality_url, "http://oracle.local");
        assert!(config.gateway.endpoint.is_none());

        let bad: HashMap<&str, &str> = HashMap::from([(LISTEN_ADDR_ENV, "not-an-addr")]);
        assert!(config
            .apply_overrides(|key| bad.get(key).map(|v| v.to_string()))
            .is_err());
    }
}
