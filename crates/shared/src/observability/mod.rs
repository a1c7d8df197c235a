//! 统一可观测性模块
//!
//! 提供 logging 与 metrics 的统一初始化和管理。
//! 服务通过单一入口点配置可观测性，确保一致的指标命名。

pub mod metrics;
pub mod tracing;

use ::tracing::info;
use anyhow::Result;
use serde::Deserialize;

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// 服务名称，用于标识日志和指标的来源
    pub service_name: String,

    /// 日志级别（如 "info", "debug"），RUST_LOG 优先
    pub log_level: String,

    /// 是否启用 JSON 格式日志
    pub json_logs: bool,

    /// 是否启动 Prometheus 指标端点
    pub metrics_enabled: bool,

    /// Prometheus 指标导出端口，同时提供 /health
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown-service".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_port: 9090,
        }
    }
}

impl ObservabilityConfig {
    /// 注入服务名
    pub fn with_service_name(mut self, service_name: &str) -> Self {
        self.service_name = service_name.to_string();
        self
    }
}

/// 可观测性资源守卫
///
/// 持有 metrics 服务器的生命周期，drop 时记录关闭日志。
pub struct ObservabilityGuard {
    _metrics_handle: Option<metrics::MetricsHandle>,
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        info!("Shutting down observability...");
    }
}

/// 统一初始化可观测性
///
/// 初始化顺序：
/// 1. Tracing（日志）
/// 2. Metrics（Prometheus 指标，可关闭）
///
/// # Example
///
/// ```ignore
/// use money_shared::observability::{init, ObservabilityConfig};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = ObservabilityConfig::default().with_service_name("money-count-service");
///     let _guard = init(&config).await?;
///     Ok(())
/// }
/// ```
pub async fn init(config: &ObservabilityConfig) -> Result<ObservabilityGuard> {
    tracing::init(config)?;

    info!(
        service = %config.service_name,
        metrics_enabled = config.metrics_enabled,
        metrics_port = config.metrics_port,
        "Observability initialized"
    );

    let metrics_handle = if config.metrics_enabled {
        Some(metrics::init(config).await?)
    } else {
        None
    };

    Ok(ObservabilityGuard {
        _metrics_handle: metrics_handle,
    })
}
