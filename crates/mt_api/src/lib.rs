//! # mt_api - Mutiny 外部接口
//!
//! - [`routes`]: axum 命令面，玩家身份取自 `x-session-id` 请求头
//! - [`oracle_client`]: 规则预言机与局面校验器的 HTTP 客户端
//! - [`server`]: 监听与中间件装配

pub mod error;
pub mod oracle_client;
pub mod routes;
pub mod server;

pub use error::{ApiError, ServerError};
pub use oracle_client::{HttpBoardTruthChecker, HttpLegalityOracle, OracleClientConfig};
pub use routes::{build_router, AppState, SESSION_HEADER};
pub use server::{ApiServer, ApiServerConfig};
