use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::HeaderValue,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::{
    config::AppConfig,
    domain::{
        BypassEvent, NewBypassEvent, NewStatusCheck, SiteConfig, Stats, StatusCheck,
        TestBypassQuery, TestBypassResponse, UpdateRulesResponse,
    },
    errors::AppError,
    service::{BypassService, SUPPORTED_SITES_LIMIT},
};

#[derive(Clone)]
pub struct AppState {
    pub service: BypassService,
}

/// All routes, mounted under `/api`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/", get(index))
        .route("/bypass-log", post(log_bypass))
        .route("/bypass-stats", get(bypass_stats))
        .route("/site-config/:domain", get(site_config))
        .route("/update-rules", post(update_rules))
        .route("/supported-sites", get(supported_sites))
        .route("/test-bypass", post(test_bypass))
        .route("/status", post(create_status).get(list_status))
        .with_state(state);

    Router::new().nest("/api", api)
}

pub fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origin = if config.allows_any_origin() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Extractor rejections go through the same JSON error envelope as other failures.
fn bad_request(rejection: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(rejection.to_string())
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Bypass ledger API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "bypass-log": "POST - Log bypass actions",
            "bypass-stats": "GET - Get bypass statistics",
            "site-config/{domain}": "GET - Get site configuration",
            "update-rules": "POST - Update bypass rules",
            "supported-sites": "GET - Get supported sites list",
            "test-bypass": "POST - Test bypass for URL",
        }
    }))
}

async fn log_bypass(
    State(state): State<AppState>,
    payload: Result<Json<NewBypassEvent>, JsonRejection>,
) -> Result<Json<BypassEvent>, AppError> {
    let Json(payload) = payload.map_err(bad_request)?;
    Ok(Json(state.service.log_action(payload).await?))
}

async fn bypass_stats(State(state): State<AppState>) -> Result<Json<Stats>, AppError> {
    Ok(Json(state.service.get_stats(&chrono::Local::now()).await?))
}

async fn site_config(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<Option<SiteConfig>>, AppError> {
    Ok(Json(state.service.get_site_config(&domain).await?))
}

async fn update_rules(
    State(state): State<AppState>,
) -> Result<Json<UpdateRulesResponse>, AppError> {
    Ok(Json(state.service.update_rules().await?))
}

async fn supported_sites(
    State(state): State<AppState>,
) -> Result<Json<Vec<SiteConfig>>, AppError> {
    Ok(Json(
        state
            .service
            .list_supported_sites(SUPPORTED_SITES_LIMIT)
            .await?,
    ))
}

async fn test_bypass(
    State(state): State<AppState>,
    query: Result<Query<TestBypassQuery>, QueryRejection>,
) -> Result<Json<TestBypassResponse>, AppError> {
    let Query(query) = query.map_err(bad_request)?;
    Ok(Json(state.service.test_bypass(&query.url).await?))
}

async fn create_status(
    State(state): State<AppState>,
    payload: Result<Json<NewStatusCheck>, JsonRejection>,
) -> Result<Json<StatusCheck>, AppError> {
    let Json(payload) = payload.map_err(bad_request)?;
    Ok(Json(state.service.create_status(payload).await?))
}

async fn list_status(State(state): State<AppState>) -> Result<Json<Vec<StatusCheck>>, AppError> {
    Ok(Json(state.service.list_status().await?))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::json;
    use tower::ServiceExt;

    use crate::{config::AppConfig, db::memory::MemoryStore, service::BypassService};

    use super::{cors_layer, router, AppState};

    fn test_app(store: MemoryStore) -> Router {
        router(AppState {
            service: BypassService::new(Arc::new(store)),
        })
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post_json(uri: &str, value: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn log_then_read_stats() {
        let app = test_app(MemoryStore::default());

        for success in [true, true, false] {
            let response = app
                .clone()
                .oneshot(post_json(
                    "/api/bypass-log",
                    json!({
                        "action": "content_unlocked",
                        "domain": "lefigaro.fr",
                        "url": "https://www.lefigaro.fr/politique/article",
                        "success": success,
                    }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let event = json_body(response).await;
            assert!(!event["id"].as_str().unwrap().is_empty());
            assert!(event["timestamp"].is_string());
        }

        let stats = app
            .oneshot(Request::get("/api/bypass-stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(stats.status(), StatusCode::OK);
        let stats = json_body(stats).await;
        assert_eq!(stats["total_bypasses"], 3);
        assert_eq!(stats["success_rate"], 66.67);
        assert_eq!(stats["most_bypassed_sites"][0]["domain"], "lefigaro.fr");
        assert_eq!(stats["most_bypassed_sites"][0]["count"], 3);
    }

    #[tokio::test]
    async fn log_defaults_success_and_ignores_client_timestamp() {
        let app = test_app(MemoryStore::default());

        let response = app
            .oneshot(post_json(
                "/api/bypass-log",
                json!({
                    "action": "cookies_cleared",
                    "domain": "",
                    "url": "not-a-url",
                    "timestamp": "1999-01-01T00:00:00Z",
                    "id": "client-chosen",
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let event = json_body(response).await;
        assert_eq!(event["success"], true);
        assert_ne!(event["id"], "client-chosen");
        assert!(!event["timestamp"].as_str().unwrap().starts_with("1999"));
    }

    #[tokio::test]
    async fn site_config_falls_back_then_null() {
        let app = test_app(MemoryStore::default());

        let reserved = app
            .clone()
            .oneshot(
                Request::get("/api/site-config/lefigaro.fr")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(reserved.status(), StatusCode::OK);
        let config = json_body(reserved).await;
        assert_eq!(config["name"], "Le Figaro");
        assert!(!config["methods"]["removeCookies"]
            .as_array()
            .unwrap()
            .is_empty());

        let unknown = app
            .oneshot(
                Request::get("/api/site-config/unknown.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(unknown.status(), StatusCode::OK);
        assert_eq!(json_body(unknown).await, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn update_rules_then_list_supported_sites() {
        let app = test_app(MemoryStore::default());

        let empty = app
            .clone()
            .oneshot(Request::get("/api/supported-sites").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(json_body(empty).await, json!([]));

        let update = app
            .clone()
            .oneshot(Request::post("/api/update-rules").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(update.status(), StatusCode::OK);
        let update = json_body(update).await;
        assert_eq!(update["success"], true);
        assert_eq!(update["updated_sites"], 1);
        assert!(update["timestamp"].is_string());

        let sites = app
            .oneshot(Request::get("/api/supported-sites").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let sites = json_body(sites).await;
        assert_eq!(sites.as_array().unwrap().len(), 1);
        let techniques = sites[0]["methods"]["techniques"].as_array().unwrap();
        assert!(techniques.contains(&json!("dom_manipulation")));
    }

    #[tokio::test]
    async fn test_bypass_parses_domain() {
        let app = test_app(MemoryStore::default());

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/test-bypass?url=https%3A%2F%2Fwww.lefigaro.fr%2Fx")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["domain"], "lefigaro.fr");
        assert_eq!(body["supported"], true);

        let missing = app
            .oneshot(Request::post("/api/test-bypass").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        let error = json_body(missing).await;
        assert_eq!(error["error"]["code"], "bad_request");
        assert!(error["error"]["message"].as_str().unwrap().contains("url"));
    }

    #[tokio::test]
    async fn malformed_log_body_uses_json_error() {
        let app = test_app(MemoryStore::default());

        let response = app
            .oneshot(post_json("/api/bypass-log", json!({"domain": "lefigaro.fr"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn cors_preflight_allows_any_method() {
        let app = test_app(MemoryStore::default()).layer(cors_layer(&AppConfig {
            database_url: None,
            bind_addr: "127.0.0.1:0".to_owned(),
            cors_origins: vec!["*".to_owned()],
            db_max_connections: 1,
        }));

        let response = app
            .oneshot(
                Request::options("/api/bypass-log")
                    .header("origin", "chrome-extension://abc")
                    .header("access-control-request-method", "PUT")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(response.headers()["access-control-allow-methods"], "*");
    }

    #[tokio::test]
    async fn storage_outage_maps_to_server_error() {
        let store = MemoryStore::default();
        let app = test_app(store.clone());
        store.set_offline(true);

        let log = app
            .clone()
            .oneshot(post_json(
                "/api/bypass-log",
                json!({"action": "header_modified", "domain": "a", "url": "b"}),
            ))
            .await
            .unwrap();
        assert_eq!(log.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(log).await["error"]["code"], "storage_unavailable");

        let stats = app
            .oneshot(Request::get("/api/bypass-stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(stats.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(stats).await["error"]["code"], "stats_unavailable");
    }

    #[tokio::test]
    async fn legacy_status_round_trip() {
        let app = test_app(MemoryStore::default());

        let created = app
            .clone()
            .oneshot(post_json("/api/status", json!({"client_name": "popup"})))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::OK);

        let listed = app
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let listed = json_body(listed).await;
        assert_eq!(listed[0]["client_name"], "popup");
    }
}
