//! 储蓄查询服务
//!
//! 提供 GetSavings 的 gRPC 服务入口。

use anyhow::Result;
use money_proto::money_service::money_service_server::MoneyServiceServer;
use money_shared::{
    clickhouse::ClickHouse,
    config::{AppConfig, StoreBackend},
    observability,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tonic::transport::Server;
use tracing::{info, warn};

use money_count::{
    CashbackPolicy, SavingsService,
    grpc::MoneyServiceImpl,
    store::{ClickHouseEventStore, EventStore, MemoryEventStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载配置：config/{service_name}.toml 与环境变量
    let config = AppConfig::load("money-count-service")?;

    // 2. 初始化可观测性
    let obs_config = config.observability.clone().with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting money-count-service...");
    info!(
        environment = %config.environment,
        store = ?config.store,
        "Configuration loaded"
    );

    let grpc_addr: SocketAddr = config.server_addr().parse()?;
    let policy = CashbackPolicy::from(&config.cashback);
    let query_timeout = Duration::from_millis(config.store.query_timeout_ms);

    if config.is_production() && config.store.backend == StoreBackend::Memory {
        anyhow::bail!("memory event store is not allowed in production");
    }

    // 3. 按配置选择事件存储
    match config.store.backend {
        StoreBackend::ClickHouse => {
            let clickhouse = ClickHouse::connect(&config.store).await?;
            let store = ClickHouseEventStore::new(clickhouse, &config.store.table)?;
            info!(table = %config.store.table, "ClickHouse event store ready");
            serve(store, policy, query_timeout, grpc_addr).await?;
        }
        StoreBackend::Memory => {
            warn!("Using in-memory event store, data is not persisted");
            serve(MemoryEventStore::new(), policy, query_timeout, grpc_addr).await?;
        }
    }

    info!("Service shutdown complete");
    Ok(())
}

/// 启动 gRPC 服务直至收到关闭信号
async fn serve<S>(
    store: S,
    policy: CashbackPolicy,
    query_timeout: Duration,
    addr: SocketAddr,
) -> Result<()>
where
    S: EventStore + 'static,
{
    let service = Arc::new(
        SavingsService::new(Arc::new(store), policy).with_query_timeout(query_timeout),
    );
    let grpc_service = MoneyServiceImpl::new(service);

    // 健康检查端点已由 observability 模块在 metrics_port 上提供
    info!("gRPC server listening on {}", addr);

    Server::builder()
        .add_service(MoneyServiceServer::new(grpc_service))
        .serve_with_shutdown(addr, shutdown_signal())
        .await?;

    Ok(())
}

/// 优雅关闭信号处理
///
/// 监听 Ctrl+C 和 SIGTERM 信号
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
