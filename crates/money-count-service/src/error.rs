//! 储蓄查询服务错误类型
//!
//! 在共享库 MoneyError 基础上区分输入错误、存储失败、取消与超时。
//! 这些错误都不会直接返回给调用方，而是由分类器折叠为响应状态。

use money_shared::error::MoneyError;
use thiserror::Error;

/// 储蓄查询错误
#[derive(Debug, Error)]
pub enum SavingsError {
    /// 用户 ID 为 0 或缺失，不访问存储
    #[error("无效的请求参数: {0}")]
    InvalidInput(String),

    /// 存在性检查或参数查询在存储层失败
    #[error("事件存储不可用: {0}")]
    StoreUnavailable(#[from] MoneyError),

    /// 调用方取消了请求
    #[error("请求已取消")]
    Cancelled,

    /// 超过调用截止时间或查询超时
    #[error("存储查询超时")]
    DeadlineExceeded,
}

/// 储蓄查询 Result 类型别名
pub type Result<T> = std::result::Result<T, SavingsError>;

impl SavingsError {
    /// 获取错误码（用于日志和指标）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Cancelled => "CANCELLED",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
        }
    }

    /// 是否发生在存储边界
    pub fn is_store_failure(&self) -> bool {
        !matches!(self, Self::InvalidInput(_))
    }
}
