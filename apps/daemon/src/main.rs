//! Mutiny Daemon - 命令面服务进程

mod config;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mt_api::{ApiServer, HttpBoardTruthChecker, HttpLegalityOracle};
use mt_durable::Outbox;
use mt_engine::{BoardTruthChecker, FixedTruthChecker, GridOracle, LegalityOracle, MutinyService};
use mt_judgment::JudgmentGateway;

use crate::config::{MutinyConfig, OracleMode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mutiny_daemon=debug,mt_engine=debug,mt_judgment=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Mutiny Daemon starting...");

    let config = MutinyConfig::load()?;

    // 裁决网关
    let capability = config.gateway.capability();
    tracing::info!(capability = capability.name(), "Judgment capability configured");
    let gateway = Arc::new(JudgmentGateway::new(
        config.gateway.gateway_config(),
        capability,
    ));

    // 外部协作方
    let (oracle, truth): (Arc<dyn LegalityOracle>, Arc<dyn BoardTruthChecker>) =
        match config.oracle.mode {
            OracleMode::Grid => {
                tracing::warn!("Using in-memory grid oracle (development mode)");
                (
                    Arc::new(GridOracle),
                    Arc::new(FixedTruthChecker(config.oracle.grid_accuracy)),
                )
            }
            OracleMode::Http => {
                let oracle = HttpLegalityOracle::new(&config.oracle.client);
                tracing::info!(url = oracle.base_url(), "Legality oracle configured");
                (
                    Arc::new(oracle),
                    Arc::new(HttpBoardTruthChecker::new(&config.oracle.client)),
                )
            }
        };

    // 发件箱与引擎
    let outbox = Arc::new(Outbox::new(config.outbox.outbox_config()));
    let service = Arc::new(MutinyService::new(
        config.engine.clone(),
        oracle,
        truth,
        gateway,
        outbox.clone(),
    ));
    tracing::info!(
        starting_willingness = config.engine.starting_willingness,
        threshold = ?config.engine.threshold,
        "Resolution engine initialized"
    );

    let server = ApiServer::new(config.server.clone(), service.clone());
    tracing::info!("Mutiny Daemon is ready!");
    tracing::info!("Press Ctrl+C to shutdown...");

    server
        .start(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await?;

    let stats = outbox.stats().await;
    tracing::info!(
        games = service.game_count().await,
        undelivered = stats.pending,
        appended = stats.appended,
        "Shutting down..."
    );

    Ok(())
}
