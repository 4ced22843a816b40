use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-form technique parameters keyed by technique name
/// (`removeCookies`, `useragent`, `referer`, `removePaywallSelectors`, `techniques`).
pub type SiteMethods = serde_json::Map<String, serde_json::Value>;

/// Action tags the extension is known to emit. The vocabulary is open; any
/// string is accepted on ingest.
pub mod actions {
    pub const HEADER_MODIFIED: &str = "header_modified";
    pub const COOKIES_CLEARED: &str = "cookies_cleared";
    pub const PAYWALL_DETECTED: &str = "paywall_detected";
    pub const CONTENT_UNLOCKED: &str = "content_unlocked";
    pub const TEST_BYPASS: &str = "test_bypass";
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BypassEvent {
    pub id: Uuid,
    pub action: String,
    pub domain: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub success: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBypassEvent {
    pub action: String,
    pub domain: String,
    pub url: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_success")]
    pub success: bool,
}

fn default_success() -> bool {
    true
}

impl NewBypassEvent {
    pub fn new(
        action: impl Into<String>,
        domain: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            domain: domain.into(),
            url: url.into(),
            user_agent: None,
            success: true,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SiteConfig {
    pub domain: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[sqlx(json)]
    pub methods: SiteMethods,
    #[serde(default)]
    pub notes: Option<String>,
    /// Unset on synthesized defaults, which are never written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

fn default_enabled() -> bool {
    true
}

impl SiteConfig {
    /// String entries of a list-valued technique parameter, e.g. `removeCookies`.
    pub fn method_list(&self, key: &str) -> Vec<&str> {
        self.methods
            .get(key)
            .and_then(serde_json::Value::as_array)
            .map(|values| values.iter().filter_map(serde_json::Value::as_str).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DomainCount {
    pub domain: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(rename = "total_bypasses")]
    pub total: i64,
    #[serde(rename = "bypasses_today")]
    pub today: i64,
    #[serde(rename = "bypasses_this_week")]
    pub this_week: i64,
    #[serde(rename = "most_bypassed_sites")]
    pub top_domains: Vec<DomainCount>,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRulesResponse {
    pub success: bool,
    pub message: String,
    pub updated_sites: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestBypassResponse {
    pub success: bool,
    pub domain: String,
    pub supported: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct TestBypassQuery {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StatusCheck {
    pub id: Uuid,
    pub client_name: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewStatusCheck {
    pub client_name: String,
}
