use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use url::Url;

use crate::{
    db::{EventStore, SiteConfigStore, StatusStore},
    domain::{
        actions, BypassEvent, NewBypassEvent, NewStatusCheck, SiteConfig, Stats, StatusCheck,
        TestBypassResponse, UpdateRulesResponse,
    },
    errors::AppError,
    registry::{expanded_config, ConfigRegistry, RESERVED_DOMAIN},
    stats,
};

pub const SUPPORTED_SITES_LIMIT: usize = 100;
pub const STATUS_LIST_LIMIT: usize = 1000;

/// Ingestion and query operations over the event log and config registry.
#[derive(Clone)]
pub struct BypassService {
    events: Arc<dyn EventStore>,
    registry: ConfigRegistry,
    status: Arc<dyn StatusStore>,
}

impl BypassService {
    pub fn new<S>(store: Arc<S>) -> Self
    where
        S: EventStore + SiteConfigStore + StatusStore + 'static,
    {
        Self {
            events: store.clone(),
            registry: ConfigRegistry::new(store.clone()),
            status: store,
        }
    }

    pub async fn log_action(&self, event: NewBypassEvent) -> Result<BypassEvent, AppError> {
        let stored = self.events.append(event).await?;
        tracing::debug!(
            id = %stored.id,
            action = %stored.action,
            domain = %stored.domain,
            success = stored.success,
            "bypass action logged"
        );
        Ok(stored)
    }

    pub async fn get_stats<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<Stats, AppError> {
        stats::compute_stats(self.events.as_ref(), now).await
    }

    pub async fn get_site_config(&self, domain: &str) -> Result<Option<SiteConfig>, AppError> {
        self.registry.get(domain).await
    }

    pub async fn list_supported_sites(&self, limit: usize) -> Result<Vec<SiteConfig>, AppError> {
        self.registry
            .list_all(limit.min(SUPPORTED_SITES_LIMIT))
            .await
    }

    /// Applies the built-in expanded descriptor for the reserved domain.
    /// Nothing is fetched remotely.
    pub async fn update_rules(&self) -> Result<UpdateRulesResponse, AppError> {
        self.registry
            .upsert(RESERVED_DOMAIN, expanded_config())
            .await?;

        Ok(UpdateRulesResponse {
            success: true,
            message: "Rules updated successfully".to_owned(),
            updated_sites: 1,
            timestamp: Utc::now(),
        })
    }

    pub async fn test_bypass(&self, url: &str) -> Result<TestBypassResponse, AppError> {
        let domain = domain_from_url(url);
        self.events
            .append(NewBypassEvent::new(actions::TEST_BYPASS, domain.clone(), url))
            .await?;

        let supported = domain == RESERVED_DOMAIN;
        tracing::info!(%domain, supported, "bypass test recorded");
        Ok(TestBypassResponse {
            success: true,
            message: format!("Test completed for {domain}"),
            domain,
            supported,
        })
    }

    pub async fn create_status(&self, status: NewStatusCheck) -> Result<StatusCheck, AppError> {
        self.status.create_status(status).await
    }

    pub async fn list_status(&self) -> Result<Vec<StatusCheck>, AppError> {
        self.status.list_status(STATUS_LIST_LIMIT).await
    }
}

/// Host (and explicit non-default port) of `raw` without a leading `www.`.
/// The host comes back lowercased. Input that does not parse as an absolute
/// URL yields an empty domain.
pub fn domain_from_url(raw: &str) -> String {
    let Ok(parsed) = Url::parse(raw) else {
        return String::new();
    };
    let Some(host) = parsed.host_str() else {
        return String::new();
    };
    let host = host.strip_prefix("www.").unwrap_or(host);
    match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    }
}
