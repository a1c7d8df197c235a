//! ClickHouse 事件存储集成测试
//!
//! 在真实 ClickHouse 中创建独立的测试表，验证存在性检查、参数查询和完整计算流程。
//!
//! ## 运行方式
//!
//! ```bash
//! CLICKHOUSE_URL=http://localhost:8123 \
//!   cargo test --test clickhouse_store_test -- --ignored
//! ```

use std::sync::Arc;

use money_count::store::{ClickHouseEventStore, EventStore};
use money_count::{CallContext, CashbackPolicy, SavingsService, SavingsStatus};
use money_shared::clickhouse::ClickHouse;
use money_shared::test_utils::{TestDataGenerator, test_store_config, test_user_id};
use rust_decimal::Decimal;

// ==================== 辅助函数 ====================

/// 创建测试表并返回对应的存储
async fn setup_store(table: &str) -> (ClickHouse, ClickHouseEventStore) {
    let clickhouse = ClickHouse::connect(&test_store_config())
        .await
        .expect("ClickHouse must be reachable for integration tests");

    clickhouse
        .command(&format!(
            "CREATE TABLE IF NOT EXISTS {} (\
                 timestamp DateTime, \
                 user_id UInt64, \
                 event_name String, \
                 parameters String\
             ) ENGINE = MergeTree ORDER BY (user_id, timestamp)",
            table
        ))
        .await
        .expect("创建测试表失败");

    let store = ClickHouseEventStore::new(clickhouse.clone(), table).expect("表名无效");
    (clickhouse, store)
}

async fn insert_event(clickhouse: &ClickHouse, table: &str, user_id: u64, event_name: &str, parameters: &str) {
    let row = serde_json::json!({
        "timestamp": chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        "user_id": user_id,
        "event_name": event_name,
        "parameters": parameters,
    });

    clickhouse
        .command(&format!("INSERT INTO {} FORMAT JSONEachRow {}", table, row))
        .await
        .expect("写入测试事件失败");
}

async fn drop_table(clickhouse: &ClickHouse, table: &str) {
    let _ = clickhouse
        .command(&format!("DROP TABLE IF EXISTS {}", table))
        .await;
}

// ==================== 测试用例 ====================

#[tokio::test]
#[ignore] // 需要 ClickHouse 连接
async fn test_existence_and_fetch() {
    let table = format!("money_it_events_{}", test_user_id());
    let (clickhouse, store) = setup_store(&table).await;
    let user_id = test_user_id();

    insert_event(&clickhouse, &table, user_id, "open_app", &TestDataGenerator::open_app_event("ios")).await;
    insert_event(&clickhouse, &table, user_id, "buy", &TestDataGenerator::buy_event(250.0, "card")).await;

    assert!(store.user_has_any_event(user_id).await.unwrap());
    assert!(!store.user_has_any_event(user_id + 1).await.unwrap());

    let params = store.fetch_event_parameters(user_id, "buy").await.unwrap();
    assert_eq!(params.len(), 1);
    assert!(params[0].contains("card"));

    // 事件名按参数传递，带引号的名称不会改变查询语义
    let params = store
        .fetch_event_parameters(user_id, "buy' OR '1'='1")
        .await
        .unwrap();
    assert!(params.is_empty());

    drop_table(&clickhouse, &table).await;
}

#[tokio::test]
#[ignore] // 需要 ClickHouse 连接
async fn test_full_flow_against_clickhouse() {
    let table = format!("money_it_events_{}", test_user_id());
    let (clickhouse, store) = setup_store(&table).await;
    let user_id = test_user_id();

    for (amount, method) in [(1000.0, "card"), (500.0, "wallet"), (2000.0, "cash")] {
        insert_event(&clickhouse, &table, user_id, "buy", &TestDataGenerator::buy_event(amount, method)).await;
    }
    insert_event(&clickhouse, &table, user_id, "buy", &TestDataGenerator::malformed_payload()).await;

    let service = SavingsService::new(Arc::new(store), CashbackPolicy::default());
    let summary = service.get_savings(user_id, &CallContext::new()).await;

    assert_eq!(summary.status, SavingsStatus::Ok);
    assert_eq!(summary.total_purchases, 3);
    assert_eq!(summary.preferred_instrument_purchases, 2);
    assert_eq!(summary.total_savings, Decimal::from(90));

    let summary = service.get_savings(user_id + 1, &CallContext::new()).await;
    assert_eq!(summary.status, SavingsStatus::UserNotFound);

    drop_table(&clickhouse, &table).await;
}

#[tokio::test]
#[ignore] // 需要 ClickHouse 连接
async fn test_missing_table_is_db_error() {
    let clickhouse = ClickHouse::connect(&test_store_config()).await.unwrap();
    let store = ClickHouseEventStore::new(clickhouse, "money_it_missing_table").unwrap();

    assert!(store.user_has_any_event(1).await.is_err());

    let service = SavingsService::new(Arc::new(store), CashbackPolicy::default());
    let summary = service.get_savings(1, &CallContext::new()).await;
    assert_eq!(summary.status, SavingsStatus::DbError);
}
