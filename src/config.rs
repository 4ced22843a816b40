use std::{env, error::Error};

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres URL; the in-memory store is used when unset.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
}

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8001";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

impl AppConfig {
    pub fn from_env() -> Result<Self, Box<dyn Error>> {
        let database_url = match env::var("DATABASE_URL") {
            Ok(raw) if raw.trim().is_empty() => None,
            Ok(raw) => Some(raw),
            Err(env::VarError::NotPresent) => None,
            Err(err) => return Err(Box::new(err)),
        };
        let bind_addr = match env::var("BIND_ADDR") {
            Ok(raw) => raw,
            Err(env::VarError::NotPresent) => DEFAULT_BIND_ADDR.to_owned(),
            Err(err) => return Err(Box::new(err)),
        };
        let cors_origins = match env::var("CORS_ORIGINS") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned)
                .collect(),
            Err(env::VarError::NotPresent) => vec!["*".to_owned()],
            Err(err) => return Err(Box::new(err)),
        };
        let db_max_connections = match env::var("DB_MAX_CONNECTIONS") {
            Ok(raw) => raw.parse::<u32>()?,
            Err(env::VarError::NotPresent) => DEFAULT_DB_MAX_CONNECTIONS,
            Err(err) => return Err(Box::new(err)),
        };

        Ok(Self {
            database_url,
            bind_addr,
            cors_origins,
            db_max_connections,
        })
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|origin| origin == "*")
    }
}
