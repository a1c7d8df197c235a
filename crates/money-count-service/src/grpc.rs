//! gRPC 服务实现
//!
//! 实现 MoneyService gRPC 服务接口。所有业务结果都通过响应中的 status 字段表达，
//! 处理函数不返回 gRPC 错误状态。

use std::sync::Arc;
use std::time::Duration;

use money_proto::money_service::money_service_server::MoneyService;
use money_proto::money_service::{
    GetSavingsRequest, GetSavingsResponse, SavingsStatus as ProtoSavingsStatus,
};
use rust_decimal::prelude::ToPrimitive;
use tokio_util::sync::CancellationToken;
use tonic::metadata::MetadataMap;
use tonic::{Request, Response, Status};
use tracing::{debug, instrument};

use crate::models::{SavingsStatus, SavingsSummary};
use crate::service::{CallContext, SavingsService};
use crate::store::EventStore;

const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// gRPC 服务实现
pub struct MoneyServiceImpl<S>
where
    S: EventStore,
{
    service: Arc<SavingsService<S>>,
}

impl<S> MoneyServiceImpl<S>
where
    S: EventStore,
{
    pub fn new(service: Arc<SavingsService<S>>) -> Self {
        Self { service }
    }

    /// 根据请求元数据构造调用上下文
    fn call_context(metadata: &MetadataMap, cancel: CancellationToken) -> CallContext {
        let ctx = CallContext::new().with_cancellation(cancel);

        match metadata
            .get(GRPC_TIMEOUT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_grpc_timeout)
        {
            Some(timeout) => {
                debug!(timeout_ms = timeout.as_millis() as u64, "Caller deadline applied");
                ctx.with_timeout(timeout)
            }
            None => ctx,
        }
    }
}

#[tonic::async_trait]
impl<S> MoneyService for MoneyServiceImpl<S>
where
    S: EventStore + 'static,
{
    /// 查询用户储蓄
    #[instrument(skip(self, request))]
    async fn get_savings(
        &self,
        request: Request<GetSavingsRequest>,
    ) -> Result<Response<GetSavingsResponse>, Status> {
        // 客户端断开时处理 future 被丢弃，guard 随之取消令牌
        let cancel = CancellationToken::new();
        let _guard = cancel.clone().drop_guard();

        let ctx = Self::call_context(request.metadata(), cancel);
        let req = request.into_inner();

        let summary = self.service.get_savings(req.user_id, &ctx).await;

        Ok(Response::new(to_response(summary)))
    }
}

/// 内部结果转换为 Proto 响应
pub fn to_response(summary: SavingsSummary) -> GetSavingsResponse {
    GetSavingsResponse {
        total_savings: summary.total_savings.to_f64().unwrap_or_default(),
        currency: summary.currency,
        total_purchases: summary.total_purchases,
        wb_card_purchases: summary.preferred_instrument_purchases,
        status: to_proto_status(summary.status) as i32,
        message: summary.message,
    }
}

fn to_proto_status(status: SavingsStatus) -> ProtoSavingsStatus {
    match status {
        SavingsStatus::Ok => ProtoSavingsStatus::Ok,
        SavingsStatus::NoPurchases => ProtoSavingsStatus::NoPurchases,
        SavingsStatus::UserNotFound => ProtoSavingsStatus::UserNotFound,
        SavingsStatus::InvalidRequest => ProtoSavingsStatus::InvalidRequest,
        SavingsStatus::DbError => ProtoSavingsStatus::DbError,
    }
}

/// 解析 grpc-timeout 头，格式为至多 8 位数字加单位
fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 || !value.is_ascii() {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    let timeout = match unit {
        "H" => Duration::from_secs(amount * 3600),
        "M" => Duration::from_secs(amount * 60),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(timeout)
}
