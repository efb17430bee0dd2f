//! # mt_durable - Mutiny Durable Execution
//!
//! 执行底座：不可变领域记录发件箱 (Outbox)，以及每局一个邮箱的 Actor Mesh，
//! 保证同一对局的指令严格串行处理。

pub mod mesh;
pub mod outbox;

pub use mesh::{Actor, ActorAddress, ActorContext, ActorFlow, ActorMesh, ActorState};
pub use outbox::{Outbox, OutboxConfig, OutboxStats};
