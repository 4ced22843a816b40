//! Per-domain bypass configuration with a built-in fallback for the one
//! reserved domain the extension ships support for.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::{
    db::SiteConfigStore,
    domain::{SiteConfig, SiteMethods},
    errors::AppError,
};

pub const RESERVED_DOMAIN: &str = "lefigaro.fr";
pub const RESERVED_SITE_NAME: &str = "Le Figaro";

const GOOGLEBOT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";
const GOOGLE_REFERER: &str = "https://www.google.com/";
const BASELINE_COOKIES: [&str; 4] = ["PHPSESSID", "_ga", "_gid", "tarteaucitron"];
const EXTRA_COOKIES: [&str; 2] = ["figaro_paywall", "premium_views"];
const PAYWALL_SELECTORS: [&str; 4] = [
    ".fig-paywall",
    ".fig-premium-paywall",
    ".subscription-banner",
    "[class*='paywall']",
];
const EXPANDED_NOTES: &str = "Full support with JSON-LD extraction and archive redirect";

fn as_methods(value: serde_json::Value) -> SiteMethods {
    match value {
        serde_json::Value::Object(map) => map,
        _ => SiteMethods::new(),
    }
}

/// Descriptor served for the reserved domain when nothing is persisted.
pub fn baseline_config() -> SiteConfig {
    SiteConfig {
        domain: RESERVED_DOMAIN.to_owned(),
        name: RESERVED_SITE_NAME.to_owned(),
        enabled: true,
        methods: as_methods(json!({
            "removeCookies": BASELINE_COOKIES,
            "useragent": GOOGLEBOT_USER_AGENT,
            "referer": GOOGLE_REFERER,
            "techniques": ["cookies", "useragent", "referer", "archive"],
        })),
        notes: None,
        last_updated: None,
    }
}

/// Descriptor written by the rules update. Its cookie list is a superset of
/// the baseline's.
pub fn expanded_config() -> SiteConfig {
    let cookies: Vec<&str> = BASELINE_COOKIES.iter().chain(EXTRA_COOKIES.iter()).copied().collect();
    SiteConfig {
        domain: RESERVED_DOMAIN.to_owned(),
        name: RESERVED_SITE_NAME.to_owned(),
        enabled: true,
        methods: as_methods(json!({
            "removeCookies": cookies,
            "removePaywallSelectors": PAYWALL_SELECTORS,
            "useragent": GOOGLEBOT_USER_AGENT,
            "referer": GOOGLE_REFERER,
            "techniques": ["cookies", "useragent", "referer", "dom_manipulation", "archive"],
        })),
        notes: Some(EXPANDED_NOTES.to_owned()),
        last_updated: None,
    }
}

#[derive(Clone)]
pub struct ConfigRegistry {
    store: Arc<dyn SiteConfigStore>,
}

impl ConfigRegistry {
    pub fn new(store: Arc<dyn SiteConfigStore>) -> Self {
        Self { store }
    }

    /// Stored config, else the synthesized baseline for the reserved domain,
    /// else `None`.
    pub async fn get(&self, domain: &str) -> Result<Option<SiteConfig>, AppError> {
        if let Some(config) = self.store.find_config(domain).await? {
            return Ok(Some(config));
        }
        if domain == RESERVED_DOMAIN {
            tracing::debug!(domain, "serving synthesized default config");
            return Ok(Some(baseline_config()));
        }
        Ok(None)
    }

    /// Full replace keyed by `domain`; `last_updated` is stamped here.
    pub async fn upsert(&self, domain: &str, config: SiteConfig) -> Result<SiteConfig, AppError> {
        let config = SiteConfig {
            domain: domain.to_owned(),
            last_updated: Some(Utc::now()),
            ..config
        };
        let stored = self.store.upsert_config(config).await?;
        tracing::info!(domain = %stored.domain, "site config replaced");
        Ok(stored)
    }

    /// Persisted configs only; the synthesized default never appears here.
    pub async fn list_all(&self, limit: usize) -> Result<Vec<SiteConfig>, AppError> {
        self.store.list_configs(limit).await
    }
}
