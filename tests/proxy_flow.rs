//! End-to-end tests: client → proxy → mock upstream.

use axum::http::StatusCode;
use mirror_proxy::config::ProxyConfig;
use serde_json::Value;

mod common;

use common::{client, start_mock_backend, start_programmable_backend, start_proxy, test_config, MockResponse};

/// Point the anime route and the default route at the given upstreams.
fn config_with(anime: &str, default: &str) -> ProxyConfig {
    let mut config = test_config();
    for route in config.routes.iter_mut() {
        if route.name == "anime" {
            route.upstream = anime.to_string();
        }
    }
    config.default_route.upstream = default.to_string();
    config
}

#[tokio::test]
async fn test_prefixed_request_reaches_upstream_path() {
    let upstream = start_mock_backend(MockResponse::text("text/plain", "ok")).await;
    let proxy = start_proxy(config_with(&upstream.url(), &upstream.url())).await;

    let res = client()
        .get(proxy.url("/anime/page/2/?x=1"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "ok");
    assert_eq!(upstream.last_request().target, "/page/2/?x=1");
    proxy.stop();
}

#[tokio::test]
async fn test_relative_redirect_stays_under_prefix() {
    let upstream = start_mock_backend(MockResponse::redirect(302, "/watch?id=9")).await;
    let proxy = start_proxy(config_with(&upstream.url(), &upstream.url())).await;

    let res = client().get(proxy.url("/anime/page/2/")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(
        res.headers().get("location").unwrap(),
        "https://mirror.test/anime/watch?id=9"
    );
    assert_eq!(res.headers().get("access-control-allow-origin").unwrap(), "*");
    assert!(res.text().await.unwrap().is_empty());
    proxy.stop();
}

#[tokio::test]
async fn test_absolute_same_site_redirect_is_rewritten() {
    let upstream = start_programmable_backend(|req| {
        // Host header carries the mock's own address.
        let host = req.header("host").unwrap_or_default().to_string();
        MockResponse::redirect(301, &format!("http://{}/ep/7", host))
    })
    .await;
    let proxy = start_proxy(config_with(&upstream.url(), &upstream.url())).await;

    let res = client().get(proxy.url("/anime/old")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(res.headers().get("location").unwrap(), "https://mirror.test/anime/ep/7");
    proxy.stop();
}

#[tokio::test]
async fn test_html_links_rewritten_and_foreign_left_alone() {
    let upstream = start_programmable_backend(|req| {
        let host = req.header("host").unwrap_or_default().to_string();
        MockResponse::html(&format!(
            r##"<html><head><title>Ep</title></head><body>
<a href="http://{host}/ep/5">same</a>
<a href="https://other-site.example/x">other</a>
<a href="#top">anchor</a>
<img src="/cover.jpg">
</body></html>"##
        ))
    })
    .await;
    let proxy = start_proxy(config_with(&upstream.url(), &upstream.url())).await;

    let res = client().get(proxy.url("/anime/list")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get("content-type").unwrap(),
        "text/html; charset=utf-8"
    );
    let body = res.text().await.unwrap();

    assert!(body.starts_with("<!DOCTYPE html>"), "{body}");
    assert!(body.contains(r#"href="https://mirror.test/anime/ep/5""#), "{body}");
    assert!(body.contains(r#"href="https://other-site.example/x""#), "{body}");
    assert!(body.contains(r##"href="#top""##), "{body}");
    assert!(body.contains(r#"src="https://mirror.test/anime/cover.jpg""#), "{body}");
    assert!(body.contains(r#"loading="lazy""#), "{body}");
    assert!(body.contains(r#"<link rel="canonical" href="https://mirror.test/anime/list">"#), "{body}");
    assert!(body.contains("application/ld+json"), "{body}");
    proxy.stop();
}

#[tokio::test]
async fn test_unmatched_path_uses_default_route() {
    let anime = start_mock_backend(MockResponse::text("text/plain", "anime")).await;
    let fallback = start_mock_backend(MockResponse::text("text/plain", "fallback")).await;
    let proxy = start_proxy(config_with(&anime.url(), &fallback.url())).await;

    let res = client().get(proxy.url("/randompath")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "fallback");
    assert_eq!(fallback.last_request().target, "/randompath");
    assert!(anime.requests().is_empty());
    proxy.stop();
}

#[tokio::test]
async fn test_prefix_match_respects_segment_boundary() {
    let anime = start_mock_backend(MockResponse::text("text/plain", "anime")).await;
    let fallback = start_mock_backend(MockResponse::text("text/plain", "fallback")).await;
    let proxy = start_proxy(config_with(&anime.url(), &fallback.url())).await;

    let res = client().get(proxy.url("/animequiz")).send().await.unwrap();

    assert_eq!(res.text().await.unwrap(), "fallback");
    assert_eq!(fallback.last_request().target, "/animequiz");
    proxy.stop();
}

#[tokio::test]
async fn test_request_headers_filtered_and_origin_spoofed() {
    let upstream = start_mock_backend(MockResponse::text("text/plain", "ok")).await;
    let proxy = start_proxy(config_with(&upstream.url(), &upstream.url())).await;

    client()
        .get(proxy.url("/anime/page"))
        .header("Cookie", "session=secret")
        .header("Authorization", "Bearer secret")
        .header("X-Forwarded-For", "203.0.113.9")
        .header("CF-Connecting-IP", "203.0.113.9")
        .header("X-Vercel-IP-Country", "ID")
        .header("Origin", "https://attacker.example")
        .header("Accept-Language", "id-ID")
        .send()
        .await
        .unwrap();

    let seen = upstream.last_request();
    assert!(seen.header("cookie").is_none());
    assert!(seen.header("authorization").is_none());
    assert!(seen.header("x-forwarded-for").is_none());
    assert!(seen.header("cf-connecting-ip").is_none());
    assert!(seen.header("x-vercel-ip-country").is_none());
    assert_eq!(seen.header("accept-language"), Some("id-ID"));
    assert_eq!(seen.header("origin"), Some(upstream.url().as_str()));
    assert_eq!(
        seen.header("referer").map(str::to_string),
        Some(format!("{}/page", upstream.url()))
    );
    assert!(seen.header("user-agent").is_some());
    proxy.stop();
}

#[tokio::test]
async fn test_suppressed_redirect_has_no_location() {
    let upstream = start_mock_backend(MockResponse::redirect(302, "https://throwaway.example/")).await;
    let mut config = test_config();
    for route in config.routes.iter_mut() {
        if route.name == "movies" {
            route.upstream = upstream.url();
        }
    }
    let proxy = start_proxy(config).await;

    let res = client().get(proxy.url("/movies/film")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::FOUND);
    assert!(res.headers().get("location").is_none());
    proxy.stop();
}

#[tokio::test]
async fn test_preflight_answered_locally() {
    let upstream = start_mock_backend(MockResponse::text("text/plain", "ok")).await;
    let proxy = start_proxy(config_with(&upstream.url(), &upstream.url())).await;

    let res = client()
        .request(reqwest::Method::OPTIONS, proxy.url("/anime/api"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(res.headers().get("access-control-allow-origin").unwrap(), "*");
    assert_eq!(
        res.headers().get("access-control-allow-methods").unwrap(),
        "GET, POST, PUT, DELETE, OPTIONS"
    );
    assert!(upstream.requests().is_empty());
    proxy.stop();
}

#[tokio::test]
async fn test_redirect_without_location_is_server_error() {
    let upstream = start_mock_backend(MockResponse::status(302)).await;
    let proxy = start_proxy(config_with(&upstream.url(), &upstream.url())).await;

    let res = client().get(proxy.url("/anime/x")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.headers().get("access-control-allow-origin").unwrap(), "*");
    proxy.stop();
}

#[tokio::test]
async fn test_unreachable_upstream_is_server_error() {
    let dead = format!("http://{}", common::unused_addr().await);
    let proxy = start_proxy(config_with(&dead, &dead)).await;

    let res = client().get(proxy.url("/anime/x")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.headers().get("access-control-allow-origin").unwrap(), "*");
    assert_eq!(res.text().await.unwrap(), "Internal Server Error");
    proxy.stop();
}

#[tokio::test]
async fn test_silent_upstream_times_out_as_server_error() {
    let upstream = common::start_hanging_backend().await;
    let mut config = config_with(&upstream.url(), &upstream.url());
    config.timeouts.connect_secs = 1;
    config.timeouts.request_secs = 1;
    config.retries.enabled = true;
    config.retries.max_attempts = 3;
    config.retries.base_delay_ms = 10;
    config.retries.max_delay_ms = 20;
    let proxy = start_proxy(config).await;

    let res = client().get(proxy.url("/anime/x")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.headers().get("access-control-allow-origin").unwrap(), "*");
    assert_eq!(res.text().await.unwrap(), "Internal Server Error");
    assert_eq!(upstream.requests().len(), 3);
    proxy.stop();
}

#[tokio::test]
async fn test_passthrough_keeps_upstream_status_and_headers() {
    let upstream = start_mock_backend(MockResponse::text("text/plain", "gone").with_header("X-Upstream", "1")).await;
    let proxy = start_proxy(config_with(&upstream.url(), &upstream.url())).await;

    let res = client().get(proxy.url("/anime/x")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers().get("x-upstream").unwrap(), "1");
    assert_eq!(res.headers().get("content-type").unwrap(), "text/plain");
    proxy.stop();

    let missing = start_mock_backend(MockResponse::status(404)).await;
    let proxy = start_proxy(config_with(&missing.url(), &missing.url())).await;
    let res = client().get(proxy.url("/anime/x")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    proxy.stop();
}

#[tokio::test]
async fn test_post_body_forwarded() {
    let upstream = start_mock_backend(MockResponse::text("application/json", "{}")).await;
    let proxy = start_proxy(config_with(&upstream.url(), &upstream.url())).await;

    let res = client()
        .post(proxy.url("/anime/api/search"))
        .body("q=naruto")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let seen = upstream.last_request();
    assert_eq!(seen.method, "POST");
    assert_eq!(seen.header("content-length"), Some("8"));
    proxy.stop();
}

#[tokio::test]
async fn test_disabled_default_route_is_not_found() {
    let mut config = test_config();
    config.default_route.upstream = "not a url".to_string();
    let proxy = start_proxy(config).await;

    let res = client().get(proxy.url("/randompath")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.text().await.unwrap(), "Not Found");
    proxy.stop();
}

#[tokio::test]
async fn test_homepage_lists_routes() {
    let proxy = start_proxy(test_config()).await;

    let res = client().get(proxy.url("/")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body = res.text().await.unwrap();
    assert!(body.contains(r#"<a href="/anime/">anime</a>"#), "{body}");
    assert!(body.contains(r#"<a href="/movies/">movies</a>"#), "{body}");
    proxy.stop();
}

#[tokio::test]
async fn test_request_id_propagated() {
    let proxy = start_proxy(test_config()).await;

    let res = client()
        .get(proxy.url("/"))
        .header("x-request-id", "abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers().get("x-request-id").unwrap(), "abc-123");

    let res = client().get(proxy.url("/")).send().await.unwrap();
    assert!(res.headers().get("x-request-id").is_some());
    proxy.stop();
}

#[tokio::test]
async fn test_endpoint_requires_url() {
    let proxy = start_proxy(test_config()).await;

    let res = client().get(proxy.url("/proxy")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.headers().get("access-control-allow-origin").unwrap(), "*");
    let json: Value = res.json().await.unwrap();
    assert_eq!(json["error"], "Missing url parameter");

    let res = client()
        .get(proxy.url("/proxy?url=ftp%3A%2F%2Fexample.com%2F"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let json: Value = res.json().await.unwrap();
    assert_eq!(json["error"], "Invalid url parameter");
    proxy.stop();
}

#[tokio::test]
async fn test_endpoint_json_mode_wraps_contents() {
    let upstream = start_mock_backend(MockResponse::text("text/plain", "hello")).await;
    let proxy = start_proxy(test_config()).await;

    let target = format!("{}/data.txt", upstream.url());
    let res = client()
        .get(proxy.url("/proxy"))
        .query(&[("url", target.as_str())])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers().get("content-type").unwrap(), "application/json");
    let json: Value = res.json().await.unwrap();
    assert_eq!(json["contents"], "hello");
    assert_eq!(upstream.last_request().target, "/data.txt");
    proxy.stop();
}

#[tokio::test]
async fn test_endpoint_html_mode_keeps_links_on_endpoint() {
    let upstream = start_programmable_backend(|req| {
        let host = req.header("host").unwrap_or_default().to_string();
        MockResponse::html(&format!(
            r#"<html><head></head><body><a href="http://{host}/next">n</a></body></html>"#
        ))
    })
    .await;
    let proxy = start_proxy(test_config()).await;

    let target = format!("{}/page", upstream.url());
    let res = client()
        .get(proxy.url("/proxy"))
        .query(&[("url", target.as_str()), ("type", "html")])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body = res.text().await.unwrap();
    assert!(
        body.contains("https://mirror.test/proxy?type=html&amp;url=") || body.contains("https://mirror.test/proxy?type=html&url="),
        "{body}"
    );
    assert!(body.contains("%2Fnext"), "{body}");
    proxy.stop();
}

#[tokio::test]
async fn test_endpoint_unreachable_target() {
    let dead = format!("http://{}/", common::unused_addr().await);
    let proxy = start_proxy(test_config()).await;

    let res = client()
        .get(proxy.url("/proxy"))
        .query(&[("url", dead.as_str())])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = res.json().await.unwrap();
    assert_eq!(json["error"], "Failed to fetch target");
    proxy.stop();
}
