//! ClickHouse 事件存储
//!
//! 查询 product_events(timestamp, user_id, event_name, parameters) 表。

use async_trait::async_trait;
use money_shared::clickhouse::ClickHouse;
use money_shared::error::{MoneyError, Result};
use serde::Deserialize;
use serde::de::IgnoredAny;
use tracing::{debug, instrument};

use super::EventStore;

/// parameters 列可能是 String，也可能是 JSON 类型
#[derive(Debug, Deserialize)]
struct ParametersRow {
    parameters: serde_json::Value,
}

impl ParametersRow {
    fn into_text(self) -> String {
        match self.parameters {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        }
    }
}

/// 基于 ClickHouse HTTP 接口的事件存储
#[derive(Clone)]
pub struct ClickHouseEventStore {
    clickhouse: ClickHouse,
    exists_sql: String,
    fetch_sql: String,
}

impl ClickHouseEventStore {
    /// 表名来自配置，只允许字母、数字、下划线和库名分隔符
    pub fn new(clickhouse: ClickHouse, table: &str) -> Result<Self> {
        validate_table_name(table)?;

        Ok(Self {
            clickhouse,
            exists_sql: format!(
                "SELECT 1 AS found FROM {} WHERE user_id = {{user_id:UInt64}} LIMIT 1",
                table
            ),
            fetch_sql: format!(
                "SELECT parameters FROM {} \
                 WHERE user_id = {{user_id:UInt64}} AND event_name = {{event_name:String}}",
                table
            ),
        })
    }
}

fn validate_table_name(table: &str) -> Result<()> {
    let valid = !table.is_empty()
        && table
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));

    if valid {
        Ok(())
    } else {
        Err(MoneyError::InvalidArgument {
            field: "store.table".to_string(),
            message: format!("invalid table name: {}", table),
        })
    }
}

#[async_trait]
impl EventStore for ClickHouseEventStore {
    #[instrument(skip(self))]
    async fn user_has_any_event(&self, user_id: u64) -> Result<bool> {
        let rows: Vec<IgnoredAny> = self
            .clickhouse
            .query_rows(&self.exists_sql, &[("user_id", user_id.to_string())])
            .await?;

        Ok(!rows.is_empty())
    }

    #[instrument(skip(self))]
    async fn fetch_event_parameters(&self, user_id: u64, event_name: &str) -> Result<Vec<String>> {
        let rows: Vec<ParametersRow> = self
            .clickhouse
            .query_rows(
                &self.fetch_sql,
                &[
                    ("user_id", user_id.to_string()),
                    ("event_name", event_name.to_string()),
                ],
            )
            .await?;

        debug!(rows = rows.len(), "Fetched event parameters");
        Ok(rows.into_iter().map(ParametersRow::into_text).collect())
    }
}
