use actix_web::HttpResponse;
use http::StatusCode;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::RelayConfig;
use crate::gemini::GeminiClient;
use crate::provider::GenerativeModel;

/// Initialize dotenv and structured tracing based on RUST_LOG.
/// - Supports explicit env file paths via ENV_FILE, DOTENV_PATH
/// - Falls back to default .env discovery
/// - Logs the source used
pub fn init_tracing() {
    let mut env_source: String = "none".into();
    for key in ["ENV_FILE", "DOTENV_PATH"] {
        if let Ok(p) = std::env::var(key) {
            let p = p.trim();
            if !p.is_empty()
                && std::path::Path::new(p).is_file()
                && dotenvy::from_filename(p).is_ok()
            {
                env_source = format!("{p} ({key})");
                break;
            }
        }
    }

    if env_source == "none" && dotenvy::dotenv().is_ok() {
        env_source = ".env".into();
    }

    // Initialize tracing (respects RUST_LOG potentially provided by the env file)
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,actix_web=info".into());
    let subscriber = fmt().with_env_filter(EnvFilter::new(filter)).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    tracing::info!("Environment loaded from: {}", env_source);
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v.trim().to_ascii_lowercase())
        .map(|v| v == "1" || v == "true" || v == "yes" || v == "on")
        .unwrap_or(false)
}

/// Build an HTTP client honoring proxy and timeout environment variables.
///
/// Environment:
/// - INTERVIEW_RELAY_NO_PROXY = 1|true|yes|on  -> disable all proxies
/// - INTERVIEW_RELAY_PROXY_URL = <url>         -> proxy for all schemes
/// - INTERVIEW_RELAY_CONNECT_TIMEOUT_SECONDS   -> connect timeout (u64)
///
/// No overall timeout is set here: it would cut long streams. One-shot calls
/// get theirs per request from `provider.timeout_seconds`.
pub fn build_http_client_from_env() -> reqwest::Client {
    let mut builder = reqwest::Client::builder();

    if let Ok(secs) = std::env::var("INTERVIEW_RELAY_CONNECT_TIMEOUT_SECONDS") {
        if let Ok(n) = secs.trim().parse::<u64>() {
            builder = builder.connect_timeout(std::time::Duration::from_secs(n));
        }
    }

    if env_flag("INTERVIEW_RELAY_NO_PROXY") {
        builder = builder.no_proxy();
    } else if let Ok(url) = std::env::var("INTERVIEW_RELAY_PROXY_URL") {
        let u = url.trim();
        if !u.is_empty() {
            match reqwest::Proxy::all(u) {
                Ok(p) => builder = builder.proxy(p),
                Err(e) => tracing::warn!("Ignoring invalid INTERVIEW_RELAY_PROXY_URL: {}", e),
            }
        }
    }

    builder = builder.user_agent(format!("interview-relay/{}", env!("CARGO_PKG_VERSION")));

    builder.build().unwrap_or_else(|e| {
        tracing::warn!("Falling back to default HTTP client: {}", e);
        reqwest::Client::new()
    })
}

/// Shared application state used by the HTTP server and handlers.
///
/// Holds no per-conversation data: every request carries its full history.
#[derive(Clone)]
pub struct AppState {
    /// Provider capability; a fresh session is started per request
    pub model: Arc<dyn GenerativeModel>,
    pub config: Arc<RelayConfig>,
}

impl AppState {
    pub fn new(model: Arc<dyn GenerativeModel>, config: RelayConfig) -> Self {
        Self {
            model,
            config: Arc::new(config),
        }
    }

    /// Wire a Gemini client from config and environment.
    pub fn from_config(config: RelayConfig) -> Self {
        let client = GeminiClient::new(build_http_client_from_env(), &config.provider);
        Self::new(Arc::new(client), config)
    }
}

/// Build a JSON error response: `{ "error": ..., "details": ... }`.
pub fn error_response(status: StatusCode, error: &str, details: &str) -> HttpResponse {
    let body = serde_json::json!({ "error": error, "details": details });
    let status = actix_web::http::StatusCode::from_u16(status.as_u16())
        .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).json(body)
}

/// Build a CORS configuration from environment variables for Actix-web.
///
/// Environment variables:
/// - CORS_ALLOWED_ORIGINS: "*" or comma-separated origins (e.g., "https://a.com, https://b.com")
/// - CORS_ALLOWED_METHODS: "*" or comma-separated methods (e.g., "GET,POST,OPTIONS")
/// - CORS_ALLOWED_HEADERS: "*" or comma-separated request header names
/// - CORS_MAX_AGE: max age in seconds (usize)
///
/// Defaults are permissive so a browser UI on another origin works out of the box.
pub fn cors_config_from_env() -> actix_cors::Cors {
    let mut cors = actix_cors::Cors::default();

    match std::env::var("CORS_ALLOWED_ORIGINS") {
        Ok(origins) if origins.trim() != "*" => {
            for part in origins.split(',') {
                let p = part.trim();
                if !p.is_empty() {
                    cors = cors.allowed_origin(p);
                }
            }
        }
        _ => cors = cors.allow_any_origin(),
    }

    match std::env::var("CORS_ALLOWED_METHODS") {
        Ok(methods) if methods.trim() != "*" => {
            let methods: Vec<&str> = methods
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();
            if !methods.is_empty() {
                cors = cors.allowed_methods(methods);
            }
        }
        _ => cors = cors.allow_any_method(),
    }

    match std::env::var("CORS_ALLOWED_HEADERS") {
        Ok(headers) if headers.trim() != "*" => {
            for h in headers.split(',').map(str::trim).filter(|h| !h.is_empty()) {
                cors = cors.allowed_header(h);
            }
        }
        _ => cors = cors.allow_any_header(),
    }

    // Let the browser read the framing-version and request-id headers
    cors = cors.expose_headers(vec![crate::relay::DATA_STREAM_HEADER, "x-request-id"]);

    if let Ok(secs) = std::env::var("CORS_MAX_AGE") {
        if let Ok(n) = secs.trim().parse::<usize>() {
            cors = cors.max_age(n);
        }
    }

    cors
}
