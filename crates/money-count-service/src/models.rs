//! 领域模型
//!
//! 事件日志中的原始事件、解码后的购买记录，以及一次查询的汇总结果。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 用户行为事件
///
/// 事件存储中的只读记录，parameters 为未解析的 JSON 文本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub user_id: u64,
    pub event_name: String,
    pub parameters: String,
}

impl Event {
    /// 以当前时间创建事件
    pub fn new(user_id: u64, event_name: impl Into<String>, parameters: impl Into<String>) -> Self {
        Self::at(Utc::now(), user_id, event_name, parameters)
    }

    /// 以指定时间创建事件
    pub fn at(
        timestamp: DateTime<Utc>,
        user_id: u64,
        event_name: impl Into<String>,
        parameters: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            user_id,
            event_name: event_name.into(),
            parameters: parameters.into(),
        }
    }
}

/// 解码后的购买记录，只在一次聚合期间存在
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRecord {
    /// 非负金额
    pub amount: Decimal,
    pub payment_method: String,
}

/// 查询结果状态
///
/// 五种状态互斥且覆盖所有调用结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SavingsStatus {
    Ok,
    NoPurchases,
    UserNotFound,
    InvalidRequest,
    DbError,
}

impl SavingsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::NoPurchases => "NO_PURCHASES",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::DbError => "DB_ERROR",
        }
    }
}

impl std::fmt::Display for SavingsStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次 GetSavings 调用的汇总结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsSummary {
    pub total_savings: Decimal,
    pub currency: String,
    pub total_purchases: u64,
    pub preferred_instrument_purchases: u64,
    pub status: SavingsStatus,
    pub message: String,
}
