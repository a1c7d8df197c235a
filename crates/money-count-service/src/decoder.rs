//! 购买记录解码
//!
//! 将 buy 事件的 parameters 解析为 [`PurchaseRecord`]。解码失败只影响单条记录，
//! 由调用方跳过，不会中断整次聚合。

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::models::PurchaseRecord;

/// 单笔金额上限，保证常规记录数下的累加不会溢出 Decimal
pub const MAX_AMOUNT: u64 = 1_000_000_000_000;

/// 单条记录的解码失败原因
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeFailure {
    /// 不是合法 JSON，或缺少字段、字段类型不符
    #[error("参数格式无效: {0}")]
    MalformedJson(String),

    /// 金额为负、非有限值或超过 [`MAX_AMOUNT`]
    #[error("金额无效: {0}")]
    InvalidAmount(String),
}

/// buy 事件参数，其余字段忽略
#[derive(Debug, Deserialize)]
struct BuyParameters {
    amount: serde_json::Number,
    payment_method: String,
}

/// 解码一条购买事件参数
///
/// 纯函数，不会 panic
pub fn decode(payload: &str) -> Result<PurchaseRecord, DecodeFailure> {
    let params: BuyParameters =
        serde_json::from_str(payload).map_err(|e| DecodeFailure::MalformedJson(e.to_string()))?;

    let amount = parse_amount(&params.amount)?;

    Ok(PurchaseRecord {
        amount,
        payment_method: params.payment_method,
    })
}

/// JSON 数值转为非负 Decimal
fn parse_amount(number: &serde_json::Number) -> Result<Decimal, DecodeFailure> {
    if let Some(value) = number.as_u64() {
        if value > MAX_AMOUNT {
            return Err(DecodeFailure::InvalidAmount(number.to_string()));
        }
        return Ok(Decimal::from(value));
    }
    if number.is_i64() {
        return Err(DecodeFailure::InvalidAmount(number.to_string()));
    }

    let value = number
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| DecodeFailure::InvalidAmount(number.to_string()))?;

    if value < 0.0 || value > MAX_AMOUNT as f64 {
        return Err(DecodeFailure::InvalidAmount(number.to_string()));
    }
    if value == 0.0 {
        return Ok(Decimal::ZERO);
    }

    // f64 的 Display 给出最短往返表示，避免二进制误差进入金额
    Decimal::from_str(&value.to_string())
        .map_err(|_| DecodeFailure::InvalidAmount(number.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_integer_amount() {
        let record = decode(r#"{"amount": 1000, "payment_method": "card"}"#).unwrap();
        assert_eq!(record.amount, Decimal::from(1000));
        assert_eq!(record.payment_method, "card");
    }

    #[test]
    fn test_decode_fractional_amount_is_exact() {
        let record = decode(r#"{"amount": 199.9, "payment_method": "wallet"}"#).unwrap();
        assert_eq!(record.amount, Decimal::new(1999, 1));
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let record = decode(
            r#"{"amount": 500, "payment_method": "cash", "currency": "RUB", "n_goods": 3}"#,
        )
        .unwrap();
        assert_eq!(record.amount, Decimal::from(500));
        assert_eq!(record.payment_method, "cash");
    }

    #[test]
    fn test_decode_zero_amount() {
        let record = decode(r#"{"amount": 0.0, "payment_method": "card"}"#).unwrap();
        assert_eq!(record.amount, Decimal::ZERO);
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        assert!(matches!(
            decode(r#"{"amount": 100}"#),
            Err(DecodeFailure::MalformedJson(_))
        ));
        assert!(matches!(
            decode(r#"{"payment_method": "card"}"#),
            Err(DecodeFailure::MalformedJson(_))
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_types() {
        // 字符串金额不做宽松转换
        assert!(matches!(
            decode(r#"{"amount": "100", "payment_method": "card"}"#),
            Err(DecodeFailure::MalformedJson(_))
        ));
        assert!(matches!(
            decode(r#"{"amount": 100, "payment_method": 7}"#),
            Err(DecodeFailure::MalformedJson(_))
        ));
    }

    #[test]
    fn test_decode_rejects_negative_amount() {
        assert!(matches!(
            decode(r#"{"amount": -5, "payment_method": "card"}"#),
            Err(DecodeFailure::InvalidAmount(_))
        ));
        assert!(matches!(
            decode(r#"{"amount": -0.5, "payment_method": "card"}"#),
            Err(DecodeFailure::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_decode_rejects_out_of_range_amount() {
        assert!(matches!(
            decode(r#"{"amount": 1e300, "payment_method": "card"}"#),
            Err(DecodeFailure::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_decode_amount_bound() {
        let record = decode(r#"{"amount": 1000000000000, "payment_method": "card"}"#).unwrap();
        assert_eq!(record.amount, Decimal::from(MAX_AMOUNT));

        for payload in [
            r#"{"amount": 1000000000001, "payment_method": "card"}"#,
            r#"{"amount": 1000000000000.5, "payment_method": "card"}"#,
            r#"{"amount": 7.9e28, "payment_method": "card"}"#,
            r#"{"amount": 18446744073709551615, "payment_method": "card"}"#,
        ] {
            assert!(
                matches!(decode(payload), Err(DecodeFailure::InvalidAmount(_))),
                "{}",
                payload
            );
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode(""), Err(DecodeFailure::MalformedJson(_))));
        assert!(matches!(decode("null"), Err(DecodeFailure::MalformedJson(_))));
        assert!(matches!(
            decode(r#"{"amount": 100, "payment_method":"#),
            Err(DecodeFailure::MalformedJson(_))
        ));
    }
}
