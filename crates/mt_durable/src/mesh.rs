//! Actor Mesh - 每个键一个邮箱与一个任务
//!
//! 同一个 Actor 的消息严格按到达顺序逐条处理，不同 Actor 之间完全并行。

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};

use mt_core::{MutinyError, Result};

/// Actor 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorState {
    /// 正在运行
    Running,
    /// 已终止
    Terminated,
}

/// 消息处理后的流转指令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorFlow {
    Continue,
    Stop,
}

/// Actor 地址
#[derive(Debug)]
pub struct ActorAddress<M> {
    sender: mpsc::Sender<M>,
}

impl<M> Clone for ActorAddress<M> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<M: Send + 'static> ActorAddress<M> {
    /// 投递消息，邮箱满时等待
    pub async fn send(&self, msg: M) -> Result<()> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| MutinyError::Actor("actor mailbox closed".to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Actor 上下文
///
/// 只持有弱引用，Actor 自身不会阻止邮箱关闭。
pub struct ActorContext<M> {
    mailbox: mpsc::WeakSender<M>,
}

impl<M: Send + 'static> ActorContext<M> {
    /// 获取自身地址 (用于派生任务回投消息)
    pub fn address(&self) -> Option<ActorAddress<M>> {
        self.mailbox
            .upgrade()
            .map(|sender| ActorAddress { sender })
    }
}

/// Actor 特征
#[async_trait]
pub trait Actor: Send + 'static {
    type Message: Send + 'static;

    /// Actor 类型名称
    fn type_name(&self) -> &'static str;

    /// 处理消息
    async fn handle(&mut self, msg: Self::Message, ctx: &ActorContext<Self::Message>) -> ActorFlow;

    /// 邮箱关闭或收到停止指令后调用
    async fn on_stop(&mut self) {}
}

/// Actor Mesh - 管理所有 Actor
pub struct ActorMesh<K, M> {
    actors: Arc<RwLock<HashMap<K, ActorAddress<M>>>>,
    states: Arc<RwLock<HashMap<K, ActorState>>>,
    mailbox_capacity: usize,
}

impl<K, M> ActorMesh<K, M>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    M: Send + 'static,
{
    /// 创建新的 Actor Mesh
    pub fn new(mailbox_capacity: usize) -> Self {
        Self {
            actors: Arc::new(RwLock::new(HashMap::new())),
            states: Arc::new(RwLock::new(HashMap::new())),
            mailbox_capacity: mailbox_capacity.max(1),
        }
    }

    /// 启动并注册一个 Actor，已存在同键 Actor 时返回错误
    pub async fn spawn<A>(&self, key: K, mut actor: A) -> Result<ActorAddress<M>>
    where
        A: Actor<Message = M>,
    {
        let mut actors = self.actors.write().await;
        if actors.contains_key(&key) {
            return Err(MutinyError::Actor(format!("actor already registered: {key:?}")));
        }

        let (sender, mut receiver) = mpsc::channel::<M>(self.mailbox_capacity);
        let ctx = ActorContext {
            mailbox: sender.downgrade(),
        };
        let address = ActorAddress { sender };
        actors.insert(key.clone(), address.clone());
        drop(actors);
        self.states
            .write()
            .await
            .insert(key.clone(), ActorState::Running);

        let registry = self.actors.clone();
        let states = self.states.clone();
        let type_name = actor.type_name();
        tracing::debug!(actor = type_name, key = ?key, "Actor spawned");

        tokio::spawn(async move {
            while let Some(msg) = receiver.recv().await {
                if actor.handle(msg, &ctx).await == ActorFlow::Stop {
                    break;
                }
            }
            actor.on_stop().await;
            registry.write().await.remove(&key);
            states.write().await.insert(key.clone(), ActorState::Terminated);
            tracing::debug!(actor = type_name, key = ?key, "Actor terminated");
        });

        Ok(address)
    }

    /// 查找 Actor 地址
    pub async fn address(&self, key: &K) -> Option<ActorAddress<M>> {
        self.actors.read().await.get(key).cloned()
    }

    /// 发送消息到 Actor
    pub async fn send(&self, key: &K, msg: M) -> Result<()> {
        let address = self
            .address(key)
            .await
            .ok_or_else(|| MutinyError::Actor(format!("actor not found: {key:?}")))?;
        address.send(msg).await
    }

    /// 注销 Actor，邮箱在所有地址释放后关闭
    pub async fn unregister(&self, key: &K) {
        self.actors.write().await.remove(key);
    }

    /// 获取 Actor 状态
    pub async fn get_state(&self, key: &K) -> Option<ActorState> {
        self.states.read().await.get(key).copied()
    }

    /// 获取所有 Actor 键
    pub async fn all_actors(&self) -> Vec<K> {
        self.actors.read().await.keys().cloned().collect()
    }

    /// 获取 Actor 数量
    pub async fn count(&self) -> usize {
        self.actors.read().await.len()
    }
}
