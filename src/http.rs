use crate::resolver::Resolver;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
pub struct HttpAppState {
    pub resolver: Arc<Resolver>,
}

pub fn build_router(resolver: Arc<Resolver>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics/system", get(system_handler))
        .route("/metrics/env", get(env_handler))
        .with_state(HttpAppState { resolver })
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn system_handler(State(state): State<HttpAppState>) -> Response {
    let resolver = state.resolver.clone();
    // The resolver is synchronous and nsenter can block for up to its
    // timeout; keep it off the async workers.
    match tokio::task::spawn_blocking(move || resolver.resolve()).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(err) => {
            error!(error = %err, "host snapshot resolution failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "failed to resolve host metrics" })),
            )
                .into_response()
        }
    }
}

async fn env_handler() -> impl IntoResponse {
    Json(filter_env_vars(std::env::vars()))
}

/// Application-style variables only (SCREAMING_SNAKE names), sorted, with
/// credential-looking values partially masked.
fn filter_env_vars(vars: impl Iterator<Item = (String, String)>) -> BTreeMap<String, String> {
    let name_re = Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("static regex");
    let mut out = BTreeMap::new();
    for (name, value) in vars {
        if value.is_empty() || !name_re.is_match(&name) {
            continue;
        }
        let value = if is_sensitive_name(&name) {
            mask_value(&value)
        } else {
            value
        };
        out.insert(name, value);
    }
    out
}

fn is_sensitive_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    ["key", "api", "auth", "token"]
        .iter()
        .any(|marker| lower.contains(marker))
}

/// First and last four characters with the middle elided, or "***" for
/// values too short to mask meaningfully.
fn mask_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let cfg = Config {
            listen: "127.0.0.1:9105".to_string(),
            host_root: "/nonexistent-host-root".to_string(),
            pid1_root: "/nonexistent-pid1-root".to_string(),
            ..Config::default()
        };
        build_router(Arc::new(Resolver::new(&cfg)))
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.as_ref(), b"ok");
    }

    #[tokio::test]
    async fn system_endpoint_returns_complete_snapshot() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/metrics/system")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        for key in [
            "os",
            "cpu",
            "memory",
            "uptime",
            "hostname",
            "localIP",
            "loadAvg",
            "cpuUsage",
            "hostMounted",
        ] {
            assert!(json.get(key).is_some(), "missing field {key}");
        }
        assert!(json["cpu"]["count"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn env_endpoint_returns_json_mapping() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/metrics/env")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json.is_object());
    }

    #[test]
    fn env_filter_masks_and_excludes() {
        let vars = vec![
            ("API_KEY".to_string(), "abcdefghij".to_string()),
            ("SHORT_KEY".to_string(), "ab1".to_string()),
            ("password".to_string(), "secret".to_string()),
            ("PLAIN_VALUE".to_string(), "visible".to_string()),
            ("EMPTY_VALUE".to_string(), String::new()),
        ];
        let out = filter_env_vars(vars.into_iter());

        assert_eq!(out.get("API_KEY").map(String::as_str), Some("abcd...ghij"));
        assert_eq!(out.get("SHORT_KEY").map(String::as_str), Some("***"));
        assert_eq!(out.get("PLAIN_VALUE").map(String::as_str), Some("visible"));
        assert!(!out.contains_key("password"));
        assert!(!out.contains_key("EMPTY_VALUE"));
    }

    #[test]
    fn env_filter_orders_keys_lexicographically() {
        let vars = vec![
            ("ZZZ".to_string(), "1".to_string()),
            ("AAA".to_string(), "2".to_string()),
            ("MMM".to_string(), "3".to_string()),
        ];
        let keys: Vec<String> = filter_env_vars(vars.into_iter()).into_keys().collect();
        assert_eq!(keys, ["AAA", "MMM", "ZZZ"]);
    }

    #[test]
    fn masking_treats_auth_and_token_names_as_sensitive() {
        assert!(is_sensitive_name("OAUTH_SECRET"));
        assert!(is_sensitive_name("SESSION_TOKEN"));
        assert!(is_sensitive_name("GOOGLE_API_URL"));
        assert!(!is_sensitive_name("DATABASE_HOST"));
        assert_eq!(mask_value("123456789"), "1234...6789");
        assert_eq!(mask_value("eight8ch"), "***");
    }
}
