use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    domain::{BypassEvent, DomainCount, NewBypassEvent, NewStatusCheck, SiteConfig, StatusCheck},
    errors::AppError,
};

pub mod memory;
pub mod pg;

/// Append-only log of bypass actions.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Assigns id and timestamp, persists, and returns the stored record.
    async fn append(&self, event: NewBypassEvent) -> Result<BypassEvent, AppError>;
    async fn count(&self, filter: &EventFilter) -> Result<i64, AppError>;
    /// Domains ordered by event count, highest first.
    async fn top_domains(&self, limit: usize) -> Result<Vec<DomainCount>, AppError>;
}

/// Per-domain site configuration, keyed by domain.
#[async_trait]
pub trait SiteConfigStore: Send + Sync {
    async fn find_config(&self, domain: &str) -> Result<Option<SiteConfig>, AppError>;
    /// Replace-or-insert keyed by `config.domain`.
    async fn upsert_config(&self, config: SiteConfig) -> Result<SiteConfig, AppError>;
    async fn list_configs(&self, limit: usize) -> Result<Vec<SiteConfig>, AppError>;
}

#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn create_status(&self, status: NewStatusCheck) -> Result<StatusCheck, AppError>;
    async fn list_status(&self, limit: usize) -> Result<Vec<StatusCheck>, AppError>;
}

/// Exact-match predicate over stored events plus a half-open timestamp range.
/// Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub action: Option<String>,
    pub domain: Option<String>,
    pub url: Option<String>,
    pub user_agent: Option<String>,
    pub success: Option<bool>,
    /// Inclusive lower bound.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub until: Option<DateTime<Utc>>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn matches(&self, event: &BypassEvent) -> bool {
        self.action.as_deref().map_or(true, |v| v == event.action)
            && self.domain.as_deref().map_or(true, |v| v == event.domain)
            && self.url.as_deref().map_or(true, |v| v == event.url)
            && self
                .user_agent
                .as_deref()
                .map_or(true, |v| event.user_agent.as_deref() == Some(v))
            && self.success.map_or(true, |v| v == event.success)
            && self.since.map_or(true, |v| event.timestamp >= v)
            && self.until.map_or(true, |v| event.timestamp < v)
    }
}
