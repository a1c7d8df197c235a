//! 储蓄查询服务
//!
//! 根据事件日志中的购买事件计算用户通过返现节省的金额：
//! - 事件存储抽象（ClickHouse / 内存）
//! - 购买参数解码与返现聚合
//! - 结果状态分类
//! - gRPC 服务接口

pub mod aggregator;
pub mod classifier;
pub mod decoder;
pub mod error;
pub mod grpc;
pub mod models;
pub mod service;
pub mod store;

pub use aggregator::{CashbackPolicy, SavingsTotals};
pub use error::{Result, SavingsError};
pub use models::{Event, PurchaseRecord, SavingsStatus, SavingsSummary};
pub use service::{CallContext, SavingsService};
