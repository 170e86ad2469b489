//! HTTP server setup and the proxy request pipeline.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID, CORS, limits, timeout)
//! - Bind server to listener with graceful shutdown
//! - Resolve routes and forward requests to upstream sites
//! - Hand responses to the redirect rewriter, the HTML engine or passthrough
//! - Observability (metrics, correlation IDs)

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{
        header::{ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, LOCATION},
        HeaderValue, Method, Request, StatusCode,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use url::Url;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::cors::{self, ALLOW_HEADERS, ALLOW_METHODS, ALLOW_ORIGIN};
use crate::http::request::{buffer_body, canonical_url, request_id};
use crate::http::response;
use crate::lifecycle::shutdown;
use crate::observability::metrics;
use crate::resilience::retry_budget;
use crate::rewrite::assets::homepage;
use crate::rewrite::redirect::{absolute_location, redirect_headers};
use crate::rewrite::urls::{RewriteContext, ENDPOINT_PATH};
use crate::rewrite::transform;
use crate::routing::{Route, RouteTable, RouteTag};
use crate::security::{filter_request_headers, spoof_origin};
use crate::upstream::Fetcher;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub routes: Arc<RouteTable>,
    pub fetcher: Fetcher,
    pub public_origin: Option<Arc<Url>>,
}

/// HTTP server for the mirror proxy.
pub struct HttpServer {
    router: Router,
    config: Arc<ProxyConfig>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
        let config = Arc::new(config);
        let routes = Arc::new(RouteTable::from_config(&config));
        let fetcher = Fetcher::new(&config)?;
        let public_origin = match &config.public_origin {
            Some(raw) => Some(Arc::new(Url::parse(raw).map_err(|e| {
                ProxyError::Configuration(format!("invalid public_origin {}: {}", raw, e))
            })?)),
            None => None,
        };

        let state = AppState {
            config: config.clone(),
            routes,
            fetcher,
            public_origin,
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let overall_timeout = overall_deadline(config);

        let mut router = Router::new().route(ENDPOINT_PATH, any(endpoint_handler));
        if config.homepage {
            router = router.route("/", any(homepage_handler));
        }

        router
            .fallback(proxy_handler)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(middleware::from_fn(cors::preflight))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::INTERNAL_SERVER_ERROR,
                overall_timeout,
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static(ALLOW_ORIGIN),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOW_HEADERS),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOW_METHODS),
            ))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server on `listener` until `shutdown` fires, then drain.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.config.routes.len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// The router, for driving the server without a socket.
    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Outer deadline for one request: every upstream attempt with its backoff,
/// then reading the body, plus the connect timeout as slack. The inner
/// deadlines always fire first; this only catches a stuck handler.
fn overall_deadline(config: &ProxyConfig) -> Duration {
    let per_attempt = Duration::from_secs(config.timeouts.request_secs);
    retry_budget(&config.retries, per_attempt)
        + per_attempt
        + Duration::from_secs(config.timeouts.connect_secs)
}

/// Landing page on `/` for GET/HEAD; other methods are proxied.
async fn homepage_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    if request.method() != Method::GET && request.method() != Method::HEAD {
        return proxy_handler(State(state), request).await;
    }
    let start = Instant::now();
    let response = response::static_html(homepage(state.routes.routes()));
    metrics::record_request(request.method().as_str(), 200, RouteTag::Static.label(), start);
    response
}

/// Main proxy handler: every path not claimed by another handler.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request_id(request.headers());
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let Some(resolution) = state.routes.resolve(&path) else {
        tracing::warn!(request_id = %request_id, path = %path, "No route matched");
        let response = ProxyError::RouteNotFound(path.clone()).into_response();
        metrics::record_request(method.as_str(), response.status().as_u16(), "none", start);
        return response;
    };
    let route = resolution.route;
    let route_label = route.tag.label().to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        route = %route_label,
        "Proxying request"
    );

    let response = match forward(&state, route, resolution.residual_path, request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(request_id = %request_id, route = %route_label, error = %e, "Proxy request failed");
            e.into_response()
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), &route_label, start);
    response
}

/// Fetch the upstream target for `route` and compose the client response.
async fn forward(state: &AppState, route: &Route, residual_path: &str, request: Request<Body>) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();

    let target = route
        .target(residual_path, parts.uri.query())
        .map_err(|e| ProxyError::Configuration(format!("route {}: {}", route.name, e)))?;
    let canonical = canonical_url(state.public_origin.as_deref(), &parts.headers, &parts.uri)?;

    let mut headers = filter_request_headers(&parts.headers);
    if route.policy.spoof_origin {
        spoof_origin(&mut headers, &target.url);
    }
    let body = buffer_body(body, state.config.security.max_body_size).await?;

    let upstream = state
        .fetcher
        .fetch(&target.url, &parts.method, headers, body)
        .await?;
    let suppress = route.policy.suppress_redirects;
    let ctx = RewriteContext::for_route(route, canonical, target.url.clone(), &state.config.seo);

    if upstream.is_redirect() {
        let (headers, _) = redirect_headers(upstream.status.as_u16(), &upstream.headers, &ctx)?;
        return Ok(response::redirect_response(upstream.status, headers));
    }

    if upstream.is_html() && parts.method != Method::HEAD {
        let status = upstream.status;
        let upstream_headers = upstream.headers.clone();
        let html = upstream.text().await?;
        let rewritten = transform(&html, &ctx);
        return Ok(response::html_response(status, &upstream_headers, rewritten, suppress));
    }

    Ok(response::passthrough_response(upstream, suppress))
}

/// How the `/proxy` endpoint returns what it fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndpointMode {
    /// Rewritten page (or streamed body) with links kept on the endpoint.
    Html,
    /// `{ "contents": "<body text>" }`.
    Json,
}

fn endpoint_error(status: StatusCode, message: &str) -> Response {
    let mut response = (status, Json(json!({ "error": message }))).into_response();
    cors::apply_cors(response.headers_mut());
    response
}

/// Generic fetcher: `/proxy?url=<absolute>&type=html|json`.
async fn endpoint_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request_id(request.headers());
    let method = request.method().clone();

    let mut target_param = None;
    let mut mode = EndpointMode::Json;
    if let Some(query) = request.uri().query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match &*key {
                "url" => target_param = Some(value.into_owned()),
                "type" if value.eq_ignore_ascii_case("html") => mode = EndpointMode::Html,
                _ => {}
            }
        }
    }

    let target = match target_param.as_deref().map(str::trim) {
        None | Some("") => {
            metrics::record_request(method.as_str(), 400, "proxy", start);
            return endpoint_error(StatusCode::BAD_REQUEST, "Missing url parameter");
        }
        Some(raw) => match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            _ => {
                tracing::warn!(request_id = %request_id, url = %raw, "Rejected invalid endpoint target");
                metrics::record_request(method.as_str(), 400, "proxy", start);
                return endpoint_error(StatusCode::BAD_REQUEST, "Invalid url parameter");
            }
        },
    };

    tracing::debug!(request_id = %request_id, target = %target, ?mode, "Endpoint fetch");

    let response = match fetch_endpoint(&state, target, mode, request).await {
        Ok(response) => response,
        Err(ProxyError::PayloadTooLarge(limit)) => ProxyError::PayloadTooLarge(limit).into_response(),
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Endpoint fetch failed");
            endpoint_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch target")
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), "proxy", start);
    response
}

async fn fetch_endpoint(state: &AppState, target: Url, mode: EndpointMode, request: Request<Body>) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();
    let route = Route::endpoint(&target);
    let canonical = canonical_url(state.public_origin.as_deref(), &parts.headers, &parts.uri)?;

    let mut headers = filter_request_headers(&parts.headers);
    spoof_origin(&mut headers, &target);
    let body = buffer_body(body, state.config.security.max_body_size).await?;

    let upstream = state.fetcher.fetch(&target, &parts.method, headers, body).await?;
    let ctx = RewriteContext::for_endpoint(&route, canonical, target.clone(), &state.config.seo);

    if upstream.is_redirect() {
        return match mode {
            EndpointMode::Html => {
                let (headers, _) = redirect_headers(upstream.status.as_u16(), &upstream.headers, &ctx)?;
                Ok(response::redirect_response(upstream.status, headers))
            }
            EndpointMode::Json => {
                let location = upstream
                    .location()
                    .ok_or(ProxyError::MalformedRedirect(upstream.status.as_u16()))?;
                let absolute = absolute_location(location, &target);
                let mut headers = response::compose_headers(&upstream.headers, false, true);
                if let Ok(value) = HeaderValue::from_str(&absolute) {
                    headers.insert(LOCATION, value);
                }
                Ok(response::redirect_response(upstream.status, headers))
            }
        };
    }

    match mode {
        EndpointMode::Html if upstream.is_html() && parts.method != Method::HEAD => {
            let status = upstream.status;
            let upstream_headers = upstream.headers.clone();
            let html = upstream.text().await?;
            let rewritten = transform(&html, &ctx);
            Ok(response::html_response(status, &upstream_headers, rewritten, false))
        }
        EndpointMode::Html => Ok(response::passthrough_response(upstream, false)),
        EndpointMode::Json => {
            let contents = upstream.text().await?;
            let mut response = Json(json!({ "contents": contents })).into_response();
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            cors::apply_cors(response.headers_mut());
            Ok(response)
        }
    }
}
