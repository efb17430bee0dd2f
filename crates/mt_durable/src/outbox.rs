//! 发件箱 - 不可变领域记录的追加队列
//!
//! 引擎只负责追加，不等待投递确认；外部协作方 (广播/持久化) 通过 `drain` 批量取走。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};

use mt_core::event::DomainEvent;
use mt_core::ids::GameId;
use mt_core::Result;

/// 发件箱配置
#[derive(Debug, Clone)]
pub struct OutboxConfig {
    /// 最多保留的未投递记录数，超出时丢弃最旧记录
    pub max_pending: usize,
    /// 默认单次取出数量
    pub drain_batch_size: usize,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            max_pending: 100_000,
            drain_batch_size: 100,
        }
    }
}

/// 发件箱统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxStats {
    pub appended: u64,
    pub drained: u64,
    pub dropped: u64,
    pub pending: usize,
}

/// 发件箱
pub struct Outbox {
    config: OutboxConfig,
    buffer: Mutex<VecDeque<DomainEvent>>,
    notify: Notify,
    appended: AtomicU64,
    drained: AtomicU64,
    dropped: AtomicU64,
}

impl Outbox {
    /// 创建新的发件箱
    pub fn new(config: OutboxConfig) -> Self {
        Self {
            config,
            buffer: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            appended: AtomicU64::new(0),
            drained: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &OutboxConfig {
        &self.config
    }

    /// 追加记录
    pub async fn append(&self, event: DomainEvent) -> Result<()> {
        self.append_batch(vec![event]).await
    }

    /// 批量追加，保持顺序
    pub async fn append_batch(&self, events: Vec<DomainEvent>) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let count = events.len() as u64;
        let mut buffer = self.buffer.lock().await;
        buffer.extend(events);

        let mut overflow = 0u64;
        while buffer.len() > self.config.max_pending {
            buffer.pop_front();
            overflow += 1;
        }
        drop(buffer);

        if overflow > 0 {
            self.dropped.fetch_add(overflow, Ordering::Relaxed);
            tracing::warn!(dropped = overflow, "Outbox over capacity, oldest records dropped");
        }
        self.appended.fetch_add(count, Ordering::Relaxed);
        self.notify.notify_waiters();
        Ok(())
    }

    /// 取出至多 `max` 条记录 (不等待)
    pub async fn drain(&self, max: usize) -> Vec<DomainEvent> {
        let mut buffer = self.buffer.lock().await;
        let take = max.min(buffer.len());
        let batch: Vec<DomainEvent> = buffer.drain(..take).collect();
        self.drained.fetch_add(batch.len() as u64, Ordering::Relaxed);
        batch
    }

    /// 等待直到至少有一条记录，然后取出至多 `max` 条
    pub async fn recv_batch(&self, max: usize) -> Vec<DomainEvent> {
        loop {
            let notified = self.notify.notified();
            let batch = self.drain(max).await;
            if !batch.is_empty() || max == 0 {
                return batch;
            }
            notified.await;
        }
    }

    /// 查看某局尚未投递的记录 (不取出)
    pub async fn pending_for(&self, game_id: GameId) -> Vec<DomainEvent> {
        let buffer = self.buffer.lock().await;
        buffer
            .iter()
            .filter(|e| e.game_id == game_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.buffer.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.buffer.lock().await.is_empty()
    }

    pub async fn stats(&self) -> OutboxStats {
        OutboxStats {
            appended: self.appended.load(Ordering::Relaxed),
            drained: self.drained.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            pending: self.len().await,
        }
    }
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new(OutboxConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use mt_core::event::DomainEventKind;

    use super::*;

    fn record(game: GameId, n: u64) -> DomainEvent {
        DomainEvent::new(
            DomainEventKind::WillingnessChanged,
            game,
            serde_json::json!({ "n": n }),
        )
    }

    #[tokio::test]
    async fn test_append_and_drain_in_order() {
        let outbox = Outbox::default();
        let game = GameId::new();
        for n in 0..5 {
            outbox.append(record(game, n)).await.unwrap();
        }

        let first = outbox.drain(3).await;
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].payload["n"], 0);
        assert_eq!(first[2].payload["n"], 2);

        let rest = outbox.drain(10).await;
        assert_eq!(rest.len(), 2);
        assert!(outbox.is_empty().await);

        let stats = outbox.stats().await;
        assert_eq!(stats.appended, 5);
        assert_eq!(stats.drained, 5);
    }

    #[tokio::test]
    async fn test_overflow_drops_oldest() {
        let outbox = Outbox::new(OutboxConfig {
            max_pending: 2,
            drain_batch_size: 10,
        });
        let game = GameId::new();
        outbox
            .append_batch(vec![record(game, 1), record(game, 2), record(game, 3)])
            .await
            .unwrap();

        let batch = outbox.drain(10).await;
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].payload["n"], 2);
        assert_eq!(outbox.stats().await.dropped, 1);
    }

    #[tokio::test]
    async fn test_recv_batch_waits_for_append() {
        let outbox = Arc::new(Outbox::default());
        let game = GameId::new();

        let reader = {
            let outbox = outbox.clone();
            tokio::spawn(async move { outbox.recv_batch(10).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        outbox.append(record(game, 7)).await.unwrap();

        let batch = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("reader should wake")
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].payload["n"], 7);
    }

    #[tokio::test]
    async fn test_pending_for_filters_by_game() {
        let outbox = Outbox::default();
        let a = GameId::new();
        let b = GameId::new();
        outbox.append(record(a, 1)).await.unwrap();
        outbox.append(record(b, 2)).await.unwrap();
        outbox.append(record(a, 3)).await.unwrap();

        let pending = outbox.pending_for(a).await;
        assert_eq!(pending.len(), 2);
        assert_eq!(outbox.len().await, 3);
    }
}
