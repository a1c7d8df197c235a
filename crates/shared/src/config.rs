//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

use crate::observability::ObservabilityConfig;

/// gRPC 服务配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 50051,
        }
    }
}

/// 事件存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    ClickHouse,
    /// 进程内存储，仅用于本地开发
    Memory,
}

/// 事件存储配置
///
/// 通过 ClickHouse HTTP 接口访问 product_events 表
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// HTTP 接口地址，如 http://localhost:8123
    pub url: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub table: String,
    pub connect_timeout_ms: u64,
    /// 单次查询的上限时间，调用方未给出更早的截止时间时生效
    pub query_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::ClickHouse,
            url: "http://localhost:8123".to_string(),
            database: "default".to_string(),
            user: "default".to_string(),
            password: String::new(),
            table: "product_events".to_string(),
            connect_timeout_ms: 5_000,
            query_timeout_ms: 10_000,
        }
    }
}

// 密码不进日志
impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("backend", &self.backend)
            .field("url", &self.url)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("table", &self.table)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("query_timeout_ms", &self.query_timeout_ms)
            .finish()
    }
}

/// 返现策略配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CashbackConfig {
    /// 返现比例，0.03 即 3%
    pub rate: Decimal,
    /// 不参与返现的支付方式
    pub excluded_method: String,
    pub currency: String,
    /// 购买事件名
    pub purchase_event: String,
}

impl Default for CashbackConfig {
    fn default() -> Self {
        Self {
            rate: Decimal::new(3, 2),
            excluded_method: "wallet".to_string(),
            currency: "RUB".to_string(),
            purchase_event: "buy".to_string(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub cashback: CashbackConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（MONEY__ 前缀，如 MONEY__STORE__URL -> store.url）
    /// 5. 旧部署沿用的环境变量（CLICKHOUSE_HOST、GRPC_PORT 等）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        // .env 不存在时忽略
        let _ = dotenvy::dotenv();

        let env = std::env::var("MONEY_ENV").unwrap_or_else(|_| "development".to_string());

        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env.clone())?
            .add_source(File::from(Path::new(&config_dir).join("default.toml")).required(false))
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", env))).required(false),
            )
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", service_name)))
                    .required(false),
            )
            .add_source(
                Environment::with_prefix("MONEY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;

        config.apply_legacy_env(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
        config.validate()?;

        Ok(config)
    }

    /// 校验配置取值
    ///
    /// 返现比例必须在 [0, 1] 内，支付方式与事件名不能为空
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cashback = &self.cashback;
        if cashback.rate.is_sign_negative() || cashback.rate > Decimal::ONE {
            return Err(ConfigError::Message(format!(
                "cashback.rate must be within [0, 1], got {}",
                cashback.rate
            )));
        }
        if cashback.excluded_method.trim().is_empty() {
            return Err(ConfigError::Message(
                "cashback.excluded_method must not be empty".to_string(),
            ));
        }
        if cashback.purchase_event.trim().is_empty() {
            return Err(ConfigError::Message(
                "cashback.purchase_event must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// 兼容旧部署的环境变量
    ///
    /// - CLICKHOUSE_HOST / CLICKHOUSE_PORT -> store.url
    /// - CLICKHOUSE_DB / CLICKHOUSE_USER / CLICKHOUSE_PASSWORD
    /// - GRPC_HOST / GRPC_PORT（允许 ":50051" 形式）
    fn apply_legacy_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("CLICKHOUSE_HOST");
        let port = lookup("CLICKHOUSE_PORT");
        if host.is_some() || port.is_some() {
            self.store.url = format!(
                "http://{}:{}",
                host.as_deref().unwrap_or("localhost"),
                port.as_deref().unwrap_or("8123")
            );
        }
        if let Some(db) = lookup("CLICKHOUSE_DB") {
            self.store.database = db;
        }
        if let Some(user) = lookup("CLICKHOUSE_USER") {
            self.store.user = user;
        }
        if let Some(password) = lookup("CLICKHOUSE_PASSWORD") {
            self.store.password = password;
        }

        if let Some(host) = lookup("GRPC_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("GRPC_PORT").and_then(|p| p.trim_start_matches(':').parse().ok())
        {
            self.server.port = port;
        }
    }

    /// 获取服务地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
