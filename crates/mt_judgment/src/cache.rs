//! 按指纹缓存的裁决 (仅作提示，过期即失效)

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::request::RequestKind;
use crate::verdict::Verdict;

/// 缓存配置
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// 分析类请求 (服从/说服/点评) 的存活时间
    pub analysis_ttl: Duration,
    /// 嘲讽的存活时间
    pub taunt_ttl: Duration,
    /// 最大条目数
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            analysis_ttl: Duration::from_secs(300),
            taunt_ttl: Duration::from_secs(1800),
            capacity: 4096,
        }
    }
}

struct CacheEntry {
    verdict: Verdict,
    inserted_at: Instant,
    expires_at: Instant,
}

/// 裁决缓存
pub struct VerdictCache {
    config: CacheConfig,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl VerdictCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl_for(&self, kind: RequestKind) -> Duration {
        if kind.is_taunt() {
            self.config.taunt_ttl
        } else {
            self.config.analysis_ttl
        }
    }

    /// 读取未过期的裁决
    pub async fn get(&self, fingerprint: &str) -> Option<Verdict> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get(fingerprint) {
            Some(entry) if entry.expires_at > now => Some(entry.verdict.clone()),
            Some(_) => {
                entries.remove(fingerprint);
                None
            }
            None => None,
        }
    }

    /// 写入裁决，容量满时先淘汰过期条目，再淘汰最早写入的条目
    pub async fn insert(&self, fingerprint: String, verdict: Verdict) {
        if self.config.capacity == 0 {
            return;
        }
        let now = Instant::now();
        let ttl = self.ttl_for(verdict.kind());
        let mut entries = self.entries.lock().await;

        if !entries.contains_key(&fingerprint) && entries.len() >= self.config.capacity {
            entries.retain(|_, e| e.expires_at > now);
            if entries.len() >= self.config.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.inserted_at)
                    .map(|(k, _)| k.clone());
                if let Some(key) = oldest {
                    entries.remove(&key);
                }
            }
        }

        entries.insert(
            fingerprint,
            CacheEntry {
                verdict,
                inserted_at: now,
                expires_at: now + ttl,
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

impl Default for VerdictCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
