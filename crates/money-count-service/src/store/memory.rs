//! 内存事件存储
//!
//! 使用 DashMap 按用户分片保存只追加的事件日志，适用于测试和本地开发。

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use money_shared::error::Result;

use super::EventStore;
use crate::models::Event;

/// 进程内事件日志
///
/// clone 共享同一份数据
#[derive(Debug, Clone, Default)]
pub struct MemoryEventStore {
    events: Arc<DashMap<u64, Vec<Event>>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条事件
    pub fn append(&self, event: Event) {
        self.events.entry(event.user_id).or_default().push(event);
    }

    /// 批量追加事件
    pub fn extend<I>(&self, events: I)
    where
        I: IntoIterator<Item = Event>,
    {
        for event in events {
            self.append(event);
        }
    }

    /// 用户的全部事件，按时间排序
    pub fn events_for(&self, user_id: u64) -> Vec<Event> {
        let mut events = self
            .events
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        events.sort_by_key(|e| e.timestamp);
        events
    }

    /// 事件总数
    pub fn len(&self) -> usize {
        self.events.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn user_has_any_event(&self, user_id: u64) -> Result<bool> {
        Ok(self
            .events
            .get(&user_id)
            .is_some_and(|entry| !entry.value().is_empty()))
    }

    async fn fetch_event_parameters(&self, user_id: u64, event_name: &str) -> Result<Vec<String>> {
        Ok(self
            .events
            .get(&user_id)
            .map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|e| e.event_name == event_name)
                    .map(|e| e.parameters.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}
