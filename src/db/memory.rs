use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    db::{EventFilter, EventStore, SiteConfigStore, StatusStore},
    domain::{BypassEvent, DomainCount, NewBypassEvent, NewStatusCheck, SiteConfig, StatusCheck},
    errors::AppError,
};

/// In-process store used for tests and for running without `DATABASE_URL`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    events: Arc<RwLock<Vec<BypassEvent>>>,
    configs: Arc<RwLock<BTreeMap<String, SiteConfig>>>,
    status_checks: Arc<RwLock<Vec<StatusCheck>>>,
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    /// While offline every operation fails with `StorageUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Stores an already-built event as-is, keeping its id and timestamp.
    #[cfg(test)]
    pub(crate) async fn insert_event(&self, event: BypassEvent) {
        self.events.write().await.push(event);
    }

    fn ensure_online(&self) -> Result<(), AppError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::storage("memory store is offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn append(&self, event: NewBypassEvent) -> Result<BypassEvent, AppError> {
        self.ensure_online()?;
        let stored = BypassEvent {
            id: Uuid::new_v4(),
            action: event.action,
            domain: event.domain,
            url: event.url,
            timestamp: chrono::Utc::now(),
            user_agent: event.user_agent,
            success: event.success,
        };
        self.events.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn count(&self, filter: &EventFilter) -> Result<i64, AppError> {
        self.ensure_online()?;
        let count = self
            .events
            .read()
            .await
            .iter()
            .filter(|event| filter.matches(event))
            .count();
        Ok(count as i64)
    }

    async fn top_domains(&self, limit: usize) -> Result<Vec<DomainCount>, AppError> {
        self.ensure_online()?;
        let events = self.events.read().await;

        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut counts: Vec<DomainCount> = Vec::new();
        for event in events.iter() {
            match index.get(event.domain.as_str()) {
                Some(&slot) => counts[slot].count += 1,
                None => {
                    index.insert(&event.domain, counts.len());
                    counts.push(DomainCount {
                        domain: event.domain.clone(),
                        count: 1,
                    });
                }
            }
        }

        // stable: ties keep first-appearance order
        counts.sort_by(|a, b| b.count.cmp(&a.count));
        counts.truncate(limit);
        Ok(counts)
    }
}

#[async_trait]
impl SiteConfigStore for MemoryStore {
    async fn find_config(&self, domain: &str) -> Result<Option<SiteConfig>, AppError> {
        self.ensure_online()?;
        Ok(self.configs.read().await.get(domain).cloned())
    }

    async fn upsert_config(&self, config: SiteConfig) -> Result<SiteConfig, AppError> {
        self.ensure_online()?;
        self.configs
            .write()
            .await
            .insert(config.domain.clone(), config.clone());
        Ok(config)
    }

    async fn list_configs(&self, limit: usize) -> Result<Vec<SiteConfig>, AppError> {
        self.ensure_online()?;
        Ok(self
            .configs
            .read()
            .await
            .values()
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn create_status(&self, status: NewStatusCheck) -> Result<StatusCheck, AppError> {
        self.ensure_online()?;
        let stored = StatusCheck {
            id: Uuid::new_v4(),
            client_name: status.client_name,
            timestamp: chrono::Utc::now(),
        };
        self.status_checks.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn list_status(&self, limit: usize) -> Result<Vec<StatusCheck>, AppError> {
        self.ensure_online()?;
        Ok(self
            .status_checks
            .read()
            .await
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }
}
