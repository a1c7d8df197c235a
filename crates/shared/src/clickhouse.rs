//! ClickHouse 连接管理模块
//!
//! 通过 ClickHouse HTTP 接口执行只读查询，查询参数使用服务端类型化参数
//! （`{name:Type}` 占位符 + `param_name` 请求参数）传递，不做字符串拼接。

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::config::StoreConfig;
use crate::error::{MoneyError, Result};

/// ClickHouse HTTP 客户端包装
///
/// 内部的 reqwest::Client 自带连接池，clone 是廉价操作
#[derive(Clone)]
pub struct ClickHouse {
    client: Client,
    url: String,
    database: String,
    user: String,
    password: String,
}

impl ClickHouse {
    /// 创建客户端，不发起网络请求
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.query_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            database: config.database.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    /// 创建客户端并确认服务端可达
    #[instrument(skip(config), fields(url = %config.url, database = %config.database))]
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        info!("Connecting to ClickHouse...");

        let clickhouse = Self::new(config)?;
        clickhouse.health_check().await?;

        info!("ClickHouse connection established");
        Ok(clickhouse)
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<()> {
        let body = self.execute("SELECT 1", &[]).await?;
        if body.trim() == "1" {
            Ok(())
        } else {
            Err(MoneyError::InvalidResponse(format!(
                "unexpected ping result: {}",
                body.trim()
            )))
        }
    }

    /// 执行查询并按 JSONEachRow 解析每一行
    ///
    /// `sql` 不应包含 FORMAT 子句，由本方法追加
    pub async fn query_rows<T>(&self, sql: &str, params: &[(&str, String)]) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let sql = format!("{} FORMAT JSONEachRow", sql.trim_end());
        let body = self.execute(&sql, params).await?;
        parse_json_each_row(&body)
    }

    /// 执行不返回结果集的语句，如建表和写入
    pub async fn command(&self, sql: &str) -> Result<()> {
        self.execute(sql, &[]).await.map(|_| ())
    }

    /// 发送查询，返回原始响应体
    async fn execute(&self, sql: &str, params: &[(&str, String)]) -> Result<String> {
        let mut query: Vec<(String, String)> = Vec::with_capacity(params.len() + 1);
        query.push(("database".to_string(), self.database.clone()));
        query.extend(
            params
                .iter()
                .map(|(name, value)| (format!("param_{}", name), value.clone())),
        );

        debug!(sql = %sql, "Executing ClickHouse query");

        let response = self
            .client
            .post(&self.url)
            .header("X-ClickHouse-User", &self.user)
            .header("X-ClickHouse-Key", &self.password)
            .query(&query)
            .body(sql.to_string())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(MoneyError::QueryFailed {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        Ok(body)
    }
}

/// 解析 JSONEachRow 格式的响应体
fn parse_json_each_row<T: DeserializeOwned>(body: &str) -> Result<Vec<T>> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|e| MoneyError::InvalidResponse(e.to_string()))
        })
        .collect()
}
