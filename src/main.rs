//! warrantcore 主入口
//! 仓单抵押借贷核心服务

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warrantcore::{
    api, app_state::AppState, config::Config, infrastructure::ledger_rpc::LedgerRpcClient,
    service::interest_accrual::InterestAccrual,
};

#[tokio::main]
async fn main() -> Result<()> {
    // ✅ 1. 加载环境变量
    dotenvy::dotenv().ok();

    // ✅ 2. 加载配置（CONFIG_PATH 指向TOML时覆盖环境变量）
    let config = Arc::new(Config::from_env_and_file(
        std::env::var("CONFIG_PATH").ok().as_deref(),
    )?);
    config.validate()?;

    // ✅ 3. 初始化日志（结构化日志）
    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warrantcore=debug,tower_http=debug".into()),
    );
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("🚀 Starting warrantcore lending service");

    // ✅ 4. 账本客户端 + 应用状态
    let client = Arc::new(LedgerRpcClient::new(config.ledger.rpc_url.clone()));
    let state = AppState::new(config.clone(), client);
    tracing::info!(rpc_url = %config.ledger.rpc_url, "✅ Ledger client initialized");

    // ✅ 5. 启动后台计息任务（带停机句柄）
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let lending_address = state
        .workflow
        .lending_wallet()
        .map(|w| w.address.clone())
        .map_err(|e| anyhow::anyhow!("failed to derive lending wallet: {}", e))?;
    let accrual = Arc::new(InterestAccrual::new(
        state.gateway.clone(),
        state.registry.clone(),
        lending_address,
        config.loan.clone(),
    ));
    let accrual_handle = tokio::spawn(accrual.run(shutdown_rx));
    tracing::info!("✅ Interest accrual task spawned");

    // ✅ 6. HTTP 服务
    let app = api::build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    tracing::info!(bind_addr = %config.server.bind_addr, "✅ Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    // ✅ 7. 停掉计息任务后退出
    let _ = shutdown_tx.send(true);
    let _ = accrual_handle.await;
    tracing::info!("👋 warrantcore stopped");

    Ok(())
}
