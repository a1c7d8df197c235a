//! 共享库
//!
//! 包含服务共用的配置、错误处理、ClickHouse 连接、可观测性等基础设施代码。

pub mod clickhouse;
pub mod config;
pub mod error;
pub mod observability;
pub mod test_utils;
