//! 测试工具模块
//!
//! 提供集成测试所需的配置辅助和测试数据生成器。

use serde_json::json;

use crate::config::StoreConfig;

// ==================== 测试配置辅助 ====================

/// 创建测试用 ClickHouse 配置
///
/// 优先使用环境变量，否则使用本地默认实例
pub fn test_store_config() -> StoreConfig {
    StoreConfig {
        url: std::env::var("CLICKHOUSE_URL").unwrap_or_else(|_| "http://localhost:8123".to_string()),
        database: std::env::var("CLICKHOUSE_DB").unwrap_or_else(|_| "default".to_string()),
        connect_timeout_ms: 2_000,
        query_timeout_ms: 5_000,
        ..Default::default()
    }
}

/// 生成唯一的测试用户 ID
///
/// 使用原子计数器确保并行测试时的唯一性，从不返回 0
pub fn test_user_id() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let base = (chrono::Utc::now().timestamp_micros() as u64) % 1_000_000_000;
    1_000_000_000 + base + COUNTER.fetch_add(1, Ordering::SeqCst)
}

// ==================== 测试数据生成器 ====================

/// 事件参数生成器
///
/// 生成与线上事件格式一致的 parameters JSON 文本
pub struct TestDataGenerator;

impl TestDataGenerator {
    /// 购买事件参数
    pub fn buy_event(amount: f64, payment_method: &str) -> String {
        json!({
            "amount": amount,
            "payment_method": payment_method,
        })
        .to_string()
    }

    /// 打开应用事件参数
    pub fn open_app_event(platform: &str) -> String {
        json!({
            "platform": platform,
            "region": "RU",
        })
        .to_string()
    }

    /// 购物车事件参数
    pub fn cart_event(total_amount: u64, n_goods: u32) -> String {
        json!({
            "total_amount": total_amount,
            "currency": "RUB",
            "n_goods": n_goods,
            "goods_list": "...",
        })
        .to_string()
    }

    /// 支付方式选择事件参数
    pub fn payment_methods_event(default_method: &str) -> String {
        json!({ "default_method": default_method }).to_string()
    }

    /// 无法解析的参数
    pub fn malformed_payload() -> String {
        "{\"amount\": 100, \"payment_method\":".to_string()
    }
}
