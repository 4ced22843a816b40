use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    db::{EventFilter, EventStore, SiteConfigStore, StatusStore},
    domain::{BypassEvent, DomainCount, NewBypassEvent, NewStatusCheck, SiteConfig, StatusCheck},
    errors::AppError,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &EventFilter) {
    builder.push(" WHERE TRUE");
    if let Some(action) = &filter.action {
        builder.push(" AND action = ").push_bind(action.clone());
    }
    if let Some(domain) = &filter.domain {
        builder.push(" AND domain = ").push_bind(domain.clone());
    }
    if let Some(url) = &filter.url {
        builder.push(" AND url = ").push_bind(url.clone());
    }
    if let Some(user_agent) = &filter.user_agent {
        builder.push(" AND user_agent = ").push_bind(user_agent.clone());
    }
    if let Some(success) = filter.success {
        builder.push(" AND success = ").push_bind(success);
    }
    if let Some(since) = filter.since {
        builder.push(" AND timestamp >= ").push_bind(since);
    }
    if let Some(until) = filter.until {
        builder.push(" AND timestamp < ").push_bind(until);
    }
}

#[async_trait]
impl EventStore for PgStore {
    async fn append(&self, event: NewBypassEvent) -> Result<BypassEvent, AppError> {
        let created = sqlx::query_as::<_, BypassEvent>(
            r#"
            INSERT INTO bypass_logs (id, action, domain, url, timestamp, user_agent, success)
            VALUES ($1, $2, $3, $4, NOW(), $5, $6)
            RETURNING id, action, domain, url, timestamp, user_agent, success
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.action)
        .bind(event.domain)
        .bind(event.url)
        .bind(event.user_agent)
        .bind(event.success)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn count(&self, filter: &EventFilter) -> Result<i64, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM bypass_logs");
        push_filter(&mut builder, filter);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn top_domains(&self, limit: usize) -> Result<Vec<DomainCount>, AppError> {
        let rows = sqlx::query_as::<_, DomainCount>(
            r#"
            SELECT domain, COUNT(*) AS count
            FROM bypass_logs
            GROUP BY domain
            ORDER BY count DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[async_trait]
impl SiteConfigStore for PgStore {
    async fn find_config(&self, domain: &str) -> Result<Option<SiteConfig>, AppError> {
        let config = sqlx::query_as::<_, SiteConfig>(
            r#"
            SELECT domain, name, enabled, methods, notes, last_updated
            FROM site_configs
            WHERE domain = $1
            "#,
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;

        Ok(config)
    }

    async fn upsert_config(&self, config: SiteConfig) -> Result<SiteConfig, AppError> {
        let stored = sqlx::query_as::<_, SiteConfig>(
            r#"
            INSERT INTO site_configs (domain, name, enabled, methods, notes, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (domain) DO UPDATE SET
                name = EXCLUDED.name,
                enabled = EXCLUDED.enabled,
                methods = EXCLUDED.methods,
                notes = EXCLUDED.notes,
                last_updated = EXCLUDED.last_updated
            RETURNING domain, name, enabled, methods, notes, last_updated
            "#,
        )
        .bind(&config.domain)
        .bind(&config.name)
        .bind(config.enabled)
        .bind(Json(&config.methods))
        .bind(&config.notes)
        .bind(config.last_updated)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn list_configs(&self, limit: usize) -> Result<Vec<SiteConfig>, AppError> {
        let configs = sqlx::query_as::<_, SiteConfig>(
            r#"
            SELECT domain, name, enabled, methods, notes, last_updated
            FROM site_configs
            ORDER BY domain ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(configs)
    }
}

#[async_trait]
impl StatusStore for PgStore {
    async fn create_status(&self, status: NewStatusCheck) -> Result<StatusCheck, AppError> {
        let created = sqlx::query_as::<_, StatusCheck>(
            r#"
            INSERT INTO status_checks (id, client_name, timestamp)
            VALUES ($1, $2, NOW())
            RETURNING id, client_name, timestamp
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(status.client_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn list_status(&self, limit: usize) -> Result<Vec<StatusCheck>, AppError> {
        let checks = sqlx::query_as::<_, StatusCheck>(
            r#"
            SELECT id, client_name, timestamp
            FROM status_checks
            ORDER BY timestamp ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(checks)
    }
}
