//! 统一错误处理模块
//!
//! 定义基础设施层共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum MoneyError {
    // ==================== 存储错误 ====================
    #[error("ClickHouse 请求失败: {0}")]
    ClickHouse(#[from] reqwest::Error),

    #[error("ClickHouse 查询失败: status={status}, {body}")]
    QueryFailed { status: u16, body: String },

    #[error("ClickHouse 返回格式无效: {0}")]
    InvalidResponse(String),

    // ==================== 配置错误 ====================
    #[error("配置错误: {0}")]
    Config(#[from] config::ConfigError),

    #[error("无效的参数: {field} - {message}")]
    InvalidArgument { field: String, message: String },

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, MoneyError>;

impl MoneyError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::ClickHouse(_) => "CLICKHOUSE_ERROR",
            Self::QueryFailed { .. } => "QUERY_FAILED",
            Self::InvalidResponse(_) => "INVALID_RESPONSE",
            Self::Config(_) => "CONFIG_ERROR",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    ///
    /// 仅供调用方参考，引擎内部不做重试
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ClickHouse(e) => e.is_timeout() || e.is_connect(),
            Self::QueryFailed { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
