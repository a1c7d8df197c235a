//! 响应分类
//!
//! 把一次调用的结果映射为唯一的 [`SavingsStatus`] 并生成面向用户的说明。
//! 优先级：INVALID_REQUEST > DB_ERROR > USER_NOT_FOUND > NO_PURCHASES > OK，
//! 前两者由错误类型决定，其余由查询结果决定。

use rust_decimal::Decimal;

use crate::aggregator::{CashbackPolicy, SavingsTotals};
use crate::error::SavingsError;
use crate::models::{SavingsStatus, SavingsSummary};

/// 存储访问成功后的查询结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    UserNotFound,
    Aggregated(SavingsTotals),
}

mod messages {
    pub const INVALID_REQUEST: &str = "Некорректный идентификатор пользователя";
    pub const STORAGE_ERROR: &str = "Ошибка хранилища данных, попробуйте позже";
    pub const CANCELLED: &str = "Запрос был отменён";
    pub const DEADLINE_EXCEEDED: &str = "Хранилище данных не ответило вовремя";
    pub const NO_PURCHASES: &str = "У пользователя пока нет покупок";
}

/// 生成最终响应
pub fn classify(
    user_id: u64,
    result: &Result<Outcome, SavingsError>,
    policy: &CashbackPolicy,
) -> SavingsSummary {
    match result {
        Err(SavingsError::InvalidInput(_)) => {
            empty(policy, SavingsStatus::InvalidRequest, messages::INVALID_REQUEST)
        }
        // 原始错误只进日志
        Err(SavingsError::StoreUnavailable(_)) => {
            empty(policy, SavingsStatus::DbError, messages::STORAGE_ERROR)
        }
        Err(SavingsError::Cancelled) => empty(policy, SavingsStatus::DbError, messages::CANCELLED),
        Err(SavingsError::DeadlineExceeded) => {
            empty(policy, SavingsStatus::DbError, messages::DEADLINE_EXCEEDED)
        }
        Ok(Outcome::UserNotFound) => empty(
            policy,
            SavingsStatus::UserNotFound,
            &format!("Пользователь {} не найден", user_id),
        ),
        Ok(Outcome::Aggregated(totals)) if totals.is_empty() => {
            empty(policy, SavingsStatus::NoPurchases, messages::NO_PURCHASES)
        }
        Ok(Outcome::Aggregated(totals)) => SavingsSummary {
            total_savings: totals.total_savings,
            currency: policy.currency.clone(),
            total_purchases: totals.total_purchases,
            preferred_instrument_purchases: totals.preferred_instrument_purchases,
            status: SavingsStatus::Ok,
            message: summary_message(totals, policy),
        },
    }
}

/// 成功结果的说明文字
fn summary_message(totals: &SavingsTotals, policy: &CashbackPolicy) -> String {
    if totals.total_savings > Decimal::ZERO {
        format!(
            "Вы сэкономили {:.2} {}: {} из {} покупок оплачены с кешбэком",
            totals.total_savings,
            policy.currency,
            totals.preferred_instrument_purchases,
            totals.total_purchases
        )
    } else {
        format!(
            "Экономии пока нет: ни одна из {} покупок не принесла кешбэк. \
             Оплачивайте покупки не через {}, чтобы получать {}% обратно",
            totals.total_purchases,
            policy.excluded_method,
            policy.rate_percent()
        )
    }
}

fn empty(policy: &CashbackPolicy, status: SavingsStatus, message: &str) -> SavingsSummary {
    SavingsSummary {
        total_savings: Decimal::ZERO,
        currency: policy.currency.clone(),
        total_purchases: 0,
        preferred_instrument_purchases: 0,
        status,
        message: message.to_string(),
    }
}
