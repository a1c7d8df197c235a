//! 返现聚合
//!
//! 将购买记录折叠为购买次数、返现支付次数和返现总额。
//! 折叠结果与记录顺序无关，[`SavingsTotals::merge`] 满足结合律与交换律。
//! 金额运算全部使用 checked 版本，溢出的记录不计入结果。

use money_shared::config::CashbackConfig;
use rust_decimal::Decimal;

use crate::models::PurchaseRecord;

/// 返现策略
///
/// 比例与排除的支付方式来自配置，聚合逻辑不含字面量
#[derive(Debug, Clone, PartialEq)]
pub struct CashbackPolicy {
    pub rate: Decimal,
    pub excluded_method: String,
    pub currency: String,
    pub purchase_event: String,
}

impl CashbackPolicy {
    /// 该支付方式是否获得返现
    pub fn is_eligible(&self, payment_method: &str) -> bool {
        payment_method != self.excluded_method
    }

    /// 单笔金额对应的返现，溢出时返回 None
    pub fn cashback_for(&self, amount: Decimal) -> Option<Decimal> {
        amount.checked_mul(self.rate)
    }

    /// 返现比例的百分数表示，如 3
    pub fn rate_percent(&self) -> Decimal {
        (self.rate * Decimal::ONE_HUNDRED).normalize()
    }
}

impl From<&CashbackConfig> for CashbackPolicy {
    fn from(config: &CashbackConfig) -> Self {
        Self {
            rate: config.rate,
            excluded_method: config.excluded_method.clone(),
            currency: config.currency.clone(),
            purchase_event: config.purchase_event.clone(),
        }
    }
}

impl Default for CashbackPolicy {
    fn default() -> Self {
        Self::from(&CashbackConfig::default())
    }
}

/// 聚合中间结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SavingsTotals {
    pub total_savings: Decimal,
    pub total_purchases: u64,
    pub preferred_instrument_purchases: u64,
    /// 因返现累加溢出而未计入的记录数
    pub overflowed_records: u64,
}

impl SavingsTotals {
    /// 计入一条记录
    ///
    /// 返现累加会溢出时记录不计入任何计数，返回 false
    pub fn add(&mut self, record: &PurchaseRecord, policy: &CashbackPolicy) -> bool {
        if !policy.is_eligible(&record.payment_method) {
            self.total_purchases += 1;
            return true;
        }

        match policy
            .cashback_for(record.amount)
            .and_then(|cashback| self.total_savings.checked_add(cashback))
        {
            Some(total_savings) => {
                self.total_savings = total_savings;
                self.total_purchases += 1;
                self.preferred_instrument_purchases += 1;
                true
            }
            None => {
                self.overflowed_records += 1;
                false
            }
        }
    }

    /// 合并两段独立聚合的结果，返现总额溢出时返回 None
    pub fn merge(self, other: Self) -> Option<Self> {
        Some(Self {
            total_savings: self.total_savings.checked_add(other.total_savings)?,
            total_purchases: self.total_purchases + other.total_purchases,
            preferred_instrument_purchases: self.preferred_instrument_purchases
                + other.preferred_instrument_purchases,
            overflowed_records: self.overflowed_records + other.overflowed_records,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.total_purchases == 0
    }
}

/// 单次遍历折叠记录
pub fn fold<'a, I>(records: I, policy: &CashbackPolicy) -> SavingsTotals
where
    I: IntoIterator<Item = &'a PurchaseRecord>,
{
    records
        .into_iter()
        .fold(SavingsTotals::default(), |mut totals, record| {
            let _ = totals.add(record, policy);
            totals
        })
}
