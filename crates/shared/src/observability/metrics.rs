//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 与 `/health` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册指标描述，出现在 /metrics 的 HELP 注释中
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!(
        "savings_requests_total",
        "Total number of GetSavings requests by status"
    );
    metrics::describe_histogram!(
        "savings_request_duration_seconds",
        "GetSavings request duration in seconds"
    );
    metrics::describe_counter!(
        "savings_records_skipped_total",
        "Purchase records skipped because their payload could not be decoded"
    );
    metrics::describe_counter!(
        "event_store_queries_total",
        "Total number of event store queries by query kind and outcome"
    );
    metrics::describe_histogram!(
        "event_store_query_duration_seconds",
        "Event store query duration in seconds"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

// ============================================================================
// 指标记录函数
// ============================================================================

/// 记录一次 GetSavings 请求
#[inline]
pub fn record_savings_request(status: &'static str, duration_secs: f64) {
    metrics::counter!("savings_requests_total", "status" => status).increment(1);
    metrics::histogram!("savings_request_duration_seconds", "status" => status)
        .record(duration_secs);
}

/// 记录被跳过的购买记录
#[inline]
pub fn record_skipped_records(count: u64) {
    if count > 0 {
        metrics::counter!("savings_records_skipped_total").increment(count);
    }
}

/// 记录事件存储查询
#[inline]
pub fn record_store_query(query: &'static str, outcome: &'static str, duration_secs: f64) {
    metrics::counter!(
        "event_store_queries_total",
        "query" => query,
        "outcome" => outcome
    )
    .increment(1);

    metrics::histogram!("event_store_query_duration_seconds", "query" => query)
        .record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_recorder() {
        // 未安装 recorder 时记录应是空操作
        record_savings_request("OK", 0.01);
        record_skipped_records(0);
        record_skipped_records(3);
        record_store_query("fetch_parameters", "ok", 0.02);
    }
}
