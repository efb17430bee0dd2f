//! API 服务器

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use mt_engine::MutinyService;

use crate::error::ServerError;
use crate::routes;

/// API 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiServerConfig {
    /// 监听地址
    pub addr: SocketAddr,
    /// 是否允许跨域 (前端开发时开启)
    pub permissive_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8780)),
            permissive_cors: false,
        }
    }
}

/// API 服务器
pub struct ApiServer {
    config: ApiServerConfig,
    service: Arc<MutinyService>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, service: Arc<MutinyService>) -> Self {
        Self { config, service }
    }

    pub fn config(&self) -> &ApiServerConfig {
        &self.config
    }

    /// 构建 Axum 路由
    pub fn build_router(&self) -> Router {
        let router = routes::build_router(self.service.clone()).layer(TraceLayer::new_for_http());
        if self.config.permissive_cors {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// 启动服务器，直到 `shutdown` 完成
    pub async fn start<F>(&self, shutdown: F) -> Result<(), ServerError>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = self.build_router();
        let listener = tokio::net::TcpListener::bind(self.config.addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.config.addr,
                source,
            })?;

        tracing::info!(addr = %self.config.addr, "API server listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        tracing::info!("API server stopped");
        Ok(())
    }
}
