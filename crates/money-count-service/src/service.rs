//! 储蓄查询服务
//!
//! 请求处理入口：校验用户 ID，依次调用存在性检查与参数查询，逐条解码、聚合，
//! 最后交给分类器生成响应。任何内部失败都会被折叠进响应状态，不向调用方抛出。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use money_shared::error::Result as StoreResult;
use money_shared::observability::metrics::{
    record_savings_request, record_skipped_records, record_store_query,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::aggregator::{self, CashbackPolicy};
use crate::classifier::{self, Outcome};
use crate::decoder;
use crate::error::{Result, SavingsError};
use crate::models::{PurchaseRecord, SavingsSummary};
use crate::store::EventStore;

/// 默认单次查询上限
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// 调用上下文
///
/// 携带调用方的取消信号和截止时间，贯穿两次存储调用
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用外部取消信号
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// 调用方截止时间与查询上限取较早者
    fn effective_deadline(&self, query_timeout: Duration) -> Instant {
        let limit = Instant::now() + query_timeout;
        match self.deadline {
            Some(deadline) => deadline.min(limit),
            None => limit,
        }
    }
}

/// 储蓄查询服务
///
/// 不持有跨请求状态，事件存储通过构造函数注入
pub struct SavingsService<S>
where
    S: EventStore,
{
    store: Arc<S>,
    policy: CashbackPolicy,
    query_timeout: Duration,
}

impl<S> SavingsService<S>
where
    S: EventStore,
{
    pub fn new(store: Arc<S>, policy: CashbackPolicy) -> Self {
        Self {
            store,
            policy,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    pub fn policy(&self) -> &CashbackPolicy {
        &self.policy
    }

    /// 查询用户储蓄
    ///
    /// 总是返回带唯一状态的完整结果
    #[instrument(skip(self, ctx))]
    pub async fn get_savings(&self, user_id: u64, ctx: &CallContext) -> SavingsSummary {
        let started = Instant::now();

        let result = self.evaluate(user_id, ctx).await;
        if let Err(e) = &result {
            log_failure(user_id, e);
        }

        let summary = classifier::classify(user_id, &result, &self.policy);

        info!(
            status = %summary.status,
            total_purchases = summary.total_purchases,
            preferred_purchases = summary.preferred_instrument_purchases,
            total_savings = %summary.total_savings,
            "Savings calculated"
        );
        record_savings_request(summary.status.as_str(), started.elapsed().as_secs_f64());

        summary
    }

    async fn evaluate(&self, user_id: u64, ctx: &CallContext) -> Result<Outcome> {
        validate_user_id(user_id)?;

        let exists = self
            .guarded(ctx, "user_has_any_event", self.store.user_has_any_event(user_id))
            .await?;
        if !exists {
            return Ok(Outcome::UserNotFound);
        }

        let payloads = self
            .guarded(
                ctx,
                "fetch_event_parameters",
                self.store
                    .fetch_event_parameters(user_id, &self.policy.purchase_event),
            )
            .await?;

        let records = decode_purchases(user_id, &payloads);
        let totals = aggregator::fold(&records, &self.policy);
        if totals.overflowed_records > 0 {
            warn!(
                user_id,
                overflowed = totals.overflowed_records,
                "Skipping purchase records whose cashback overflows the total"
            );
            record_skipped_records(totals.overflowed_records);
        }

        Ok(Outcome::Aggregated(totals))
    }

    /// 以取消信号和截止时间约束一次存储调用
    async fn guarded<T, F>(&self, ctx: &CallContext, query: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        let started = Instant::now();
        let deadline = ctx.effective_deadline(self.query_timeout);

        let result = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(SavingsError::Cancelled),
            outcome = tokio::time::timeout_at(deadline, call) => match outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(SavingsError::StoreUnavailable(e)),
                Err(_) => Err(SavingsError::DeadlineExceeded),
            },
        };

        let label = match &result {
            Ok(_) => "ok",
            Err(e) => e.error_code(),
        };
        record_store_query(query, label, started.elapsed().as_secs_f64());

        result
    }
}

fn validate_user_id(user_id: u64) -> Result<()> {
    if user_id == 0 {
        return Err(SavingsError::InvalidInput(
            "user_id 必须为正整数".to_string(),
        ));
    }
    Ok(())
}

/// 逐条解码，失败的记录跳过
fn decode_purchases(user_id: u64, payloads: &[String]) -> Vec<PurchaseRecord> {
    let mut skipped = 0u64;
    let records = payloads
        .iter()
        .enumerate()
        .filter_map(|(index, payload)| match decoder::decode(payload) {
            Ok(record) => Some(record),
            Err(e) => {
                skipped += 1;
                warn!(user_id, index, error = %e, "Skipping undecodable purchase record");
                None
            }
        })
        .collect();

    record_skipped_records(skipped);
    records
}

fn log_failure(user_id: u64, err: &SavingsError) {
    match err {
        SavingsError::InvalidInput(reason) => {
            warn!(user_id, reason = %reason, "Rejected savings request");
        }
        SavingsError::StoreUnavailable(cause) => {
            error!(
                user_id,
                code = cause.code(),
                retryable = cause.is_retryable(),
                error = %cause,
                "Event store query failed"
            );
        }
        SavingsError::Cancelled => {
            warn!(user_id, "Savings request cancelled by caller");
        }
        SavingsError::DeadlineExceeded => {
            warn!(user_id, "Savings request exceeded its deadline");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SavingsStatus;
    use crate::store::MockEventStore;
    use money_shared::error::MoneyError;
    use rust_decimal::Decimal;

    fn service(store: MockEventStore) -> SavingsService<MockEventStore> {
        SavingsService::new(Arc::new(store), CashbackPolicy::default())
    }

    #[tokio::test]
    async fn test_zero_user_id_never_touches_store() {
        let mut store = MockEventStore::new();
        store.expect_user_has_any_event().never();
        store.expect_fetch_event_parameters().never();

        let summary = service(store).get_savings(0, &CallContext::new()).await;
        assert_eq!(summary.status, SavingsStatus::InvalidRequest);
    }

    #[tokio::test]
    async fn test_existence_failure_is_db_error() {
        let mut store = MockEventStore::new();
        store.expect_user_has_any_event().times(1).returning(|_| {
            Err(MoneyError::QueryFailed {
                status: 500,
                body: "Code: 210. DB::NetException: Connection refused".to_string(),
            })
        });
        store.expect_fetch_event_parameters().never();

        let summary = service(store).get_savings(42, &CallContext::new()).await;
        assert_eq!(summary.status, SavingsStatus::DbError);
        assert!(!summary.message.contains("Connection refused"));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_db_error() {
        let mut store = MockEventStore::new();
        store
            .expect_user_has_any_event()
            .returning(|_| Ok(true));
        store
            .expect_fetch_event_parameters()
            .times(1)
            .returning(|_, _| Err(MoneyError::InvalidResponse("truncated".to_string())));

        let summary = service(store).get_savings(42, &CallContext::new()).await;
        assert_eq!(summary.status, SavingsStatus::DbError);
        assert_eq!(summary.total_purchases, 0);
    }

    #[tokio::test]
    async fn test_unknown_user_skips_fetch() {
        let mut store = MockEventStore::new();
        store
            .expect_user_has_any_event()
            .withf(|user_id| *user_id == 9_999_999)
            .returning(|_| Ok(false));
        store.expect_fetch_event_parameters().never();

        let summary = service(store)
            .get_savings(9_999_999, &CallContext::new())
            .await;
        assert_eq!(summary.status, SavingsStatus::UserNotFound);
    }

    #[tokio::test]
    async fn test_fetches_configured_purchase_event() {
        let mut store = MockEventStore::new();
        store.expect_user_has_any_event().returning(|_| Ok(true));
        store
            .expect_fetch_event_parameters()
            .withf(|user_id, event_name| *user_id == 1001 && event_name == "buy")
            .returning(|_, _| {
                Ok(vec![
                    r#"{"amount": 1000, "payment_method": "card"}"#.to_string(),
                    r#"{"amount": 500, "payment_method": "wallet"}"#.to_string(),
                    r#"{"amount": 2000, "payment_method": "cash"}"#.to_string(),
                ])
            });

        let summary = service(store).get_savings(1001, &CallContext::new()).await;
        assert_eq!(summary.status, SavingsStatus::Ok);
        assert_eq!(summary.total_purchases, 3);
        assert_eq!(summary.preferred_instrument_purchases, 2);
        assert_eq!(summary.total_savings, Decimal::from(90));
    }

    #[tokio::test]
    async fn test_malformed_records_are_skipped() {
        let mut store = MockEventStore::new();
        store.expect_user_has_any_event().returning(|_| Ok(true));
        store.expect_fetch_event_parameters().returning(|_, _| {
            Ok(vec![
                r#"{"amount": 100, "payment_method": "card"}"#.to_string(),
                "not json".to_string(),
                r#"{"amount": -1, "payment_method": "card"}"#.to_string(),
            ])
        });

        let summary = service(store).get_savings(7, &CallContext::new()).await;
        assert_eq!(summary.status, SavingsStatus::Ok);
        assert_eq!(summary.total_purchases, 1);
        assert_eq!(summary.total_savings, Decimal::from(3));
    }

    #[tokio::test]
    async fn test_huge_amounts_do_not_abort_request() {
        let mut store = MockEventStore::new();
        store.expect_user_has_any_event().returning(|_| Ok(true));
        store.expect_fetch_event_parameters().returning(|_, _| {
            let mut payloads: Vec<String> = (0..40)
                .map(|_| r#"{"amount": 7.9e28, "payment_method": "card"}"#.to_string())
                .collect();
            payloads.push(r#"{"amount": 100, "payment_method": "card"}"#.to_string());
            Ok(payloads)
        });

        let summary = service(store).get_savings(7, &CallContext::new()).await;
        assert_eq!(summary.status, SavingsStatus::Ok);
        assert_eq!(summary.total_purchases, 1);
        assert_eq!(summary.total_savings, Decimal::from(3));
    }

    #[tokio::test]
    async fn test_only_malformed_records_means_no_purchases() {
        let mut store = MockEventStore::new();
        store.expect_user_has_any_event().returning(|_| Ok(true));
        store
            .expect_fetch_event_parameters()
            .returning(|_, _| Ok(vec!["{}".to_string()]));

        let summary = service(store).get_savings(7, &CallContext::new()).await;
        assert_eq!(summary.status, SavingsStatus::NoPurchases);
        assert_eq!(summary.total_savings, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_cancelled_before_store_access() {
        let mut store = MockEventStore::new();
        store.expect_user_has_any_event().returning(|_| Ok(true));
        store.expect_fetch_event_parameters().never();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = CallContext::new().with_cancellation(cancel);

        let summary = service(store).get_savings(42, &ctx).await;
        assert_eq!(summary.status, SavingsStatus::DbError);
        assert_ne!(summary.status, SavingsStatus::NoPurchases);
    }

    #[test]
    fn test_effective_deadline_prefers_earlier() {
        let ctx = CallContext::new().with_timeout(Duration::from_millis(50));
        let deadline = ctx.effective_deadline(Duration::from_secs(60));
        assert_eq!(Some(deadline), ctx.deadline());

        let ctx = CallContext::new();
        let before = Instant::now();
        let deadline = ctx.effective_deadline(Duration::from_secs(1));
        assert!(deadline >= before + Duration::from_secs(1));
    }

    #[test]
    fn test_validate_user_id() {
        assert!(validate_user_id(0).is_err());
        assert!(validate_user_id(1).is_ok());
        assert!(validate_user_id(u64::MAX).is_ok());
    }
}
