//! 事件存储
//!
//! 定义引擎依赖的只读查询接口，便于服务层依赖抽象而非具体实现，支持 mock 测试。
//! 存储实现通过构造函数注入，引擎自身不持有连接。

mod clickhouse;
mod memory;

use async_trait::async_trait;
use money_shared::error::Result;

pub use clickhouse::ClickHouseEventStore;
pub use memory::MemoryEventStore;

/// 事件存储接口
///
/// 两个操作都是只读、幂等、无副作用的；任何底层失败统一以 `MoneyError` 返回
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventStore: Send + Sync {
    /// 用户是否有任意一条事件
    async fn user_has_any_event(&self, user_id: u64) -> Result<bool>;

    /// 返回用户指定名称事件的 parameters 字段，可能为空
    async fn fetch_event_parameters(&self, user_id: u64, event_name: &str) -> Result<Vec<String>>;
}
