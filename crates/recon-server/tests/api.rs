//! End-to-end tests: the router served on an ephemeral port, every upstream
//! replaced by a wiremock server.

#![allow(clippy::unwrap_used, clippy::panic)]

use anyhow::Result;
use recon_core::{Config, Recon};
use recon_server::{AppState, router};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Config pointing every upstream at `upstream`, without relays.
fn config_for(upstream: &MockServer) -> Config {
    let base = upstream.uri();
    let mut config = Config::default();
    config.upstreams.crt_sh = base.clone();
    config.upstreams.dns_google = base.clone();
    config.upstreams.ssllabs = base.clone();
    config.upstreams.wayback = base.clone();
    config.upstreams.ip_api = base.clone();
    config.upstreams.isc = base.clone();
    config.upstreams.greynoise = base;
    config.proxies.subdomains.clear();
    config.proxies.wayback.clear();
    config.tls.poll_delay_ms = 10;
    config
}

async fn spawn(config: Config) -> Result<String> {
    let app = router(Arc::new(AppState::new(Recon::new(config)?)));
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

async fn get(base: &str, route: &str, query: &[(&str, &str)]) -> Result<(StatusCode, Value)> {
    let response = reqwest::Client::new()
        .get(format!("{base}{route}"))
        .query(query)
        .send()
        .await?;
    let status = response.status();
    Ok((status, response.json().await?))
}

#[tokio::test]
async fn health_reports_version() -> Result<()> {
    let upstream = MockServer::start().await;
    let base = spawn(config_for(&upstream)).await?;

    let (status, body) = get(&base, "/health", &[]).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    Ok(())
}

#[tokio::test]
async fn missing_parameters_are_400() -> Result<()> {
    let upstream = MockServer::start().await;
    let base = spawn(config_for(&upstream)).await?;

    let cases = [
        ("/api/subdomains", "domain"),
        ("/api/wayback", "url"),
        ("/api/dns", "name"),
        ("/api/headers", "url"),
        ("/api/ssllabs", "host"),
        ("/api/techstack", "url"),
        ("/api/robots", "url"),
        ("/api/content-discovery", "url"),
        ("/api/asn", "target"),
        ("/api/httpinfo", "url"),
        ("/api/ipreputation", "ip"),
    ];
    for (route, field) in cases {
        let (status, body) = get(&base, route, &[]).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{route}");
        assert_eq!(body, json!({ "error": format!("Missing {field}") }), "{route}");
    }

    let (status, body) = get(&base, "/api/subdomains", &[("domain", "   ")]).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing domain");
    Ok(())
}

#[tokio::test]
async fn subdomains_scenario() -> Result<()> {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("q", "example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[{"name_value":"a.example.com\nexample.com"},{"common_name":"*.example.com"}]"#,
        ))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(query_param("q", "%.example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&upstream)
        .await;
    let base = spawn(config_for(&upstream)).await?;

    let (status, body) = get(&base, "/api/subdomains", &[("domain", "example.com")]).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "domain": "example.com",
            "total": 2,
            "subdomains": ["a.example.com", "example.com"]
        })
    );
    Ok(())
}

#[tokio::test]
async fn empty_certificate_search_is_not_an_error() -> Result<()> {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&upstream)
        .await;
    let base = spawn(config_for(&upstream)).await?;

    let (status, body) = get(&base, "/api/subdomains", &[("domain", "nothing.test")]).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert_eq!(body["subdomains"], json!([]));
    Ok(())
}

#[tokio::test]
async fn header_audit_scenario_and_idempotence() -> Result<()> {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/site"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Strict-Transport-Security", "max-age=0")
                .insert_header("X-Frame-Options", "DENY"),
        )
        .mount(&upstream)
        .await;
    let base = spawn(config_for(&upstream)).await?;
    let target = format!("{}/site", upstream.uri());

    let (status, first) = get(&base, "/api/headers", &[("url", &target)]).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], 200);

    let headers = &first["headers"];
    assert_eq!(headers["strict-transport-security"]["present"], true);
    assert_eq!(headers["strict-transport-security"]["value"], "max-age=0");
    assert!(headers["strict-transport-security"].get("note").is_none());
    assert_eq!(
        headers["content-security-policy"],
        json!({ "present": false, "value": null, "note": "No CSP; consider a restrictive policy" })
    );
    assert_eq!(
        headers["x-content-type-options"]["note"],
        "Missing; MIME sniffing possible"
    );

    let (_, second) = get(&base, "/api/headers", &[("url", &target)]).await?;
    assert_eq!(first["headers"], second["headers"]);
    Ok(())
}

#[tokio::test]
async fn wayback_header_only_table_is_empty() -> Result<()> {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdx/search/cdx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[
            "timestamp", "original", "statuscode", "mimetype", "length"
        ]])))
        .mount(&upstream)
        .await;
    let base = spawn(config_for(&upstream)).await?;

    let (status, body) = get(&base, "/api/wayback", &[("url", "example.com")]).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["snapshots"], json!([]));
    assert!(body.get("blocked").is_none());
    Ok(())
}

#[tokio::test]
async fn wayback_snapshots_keep_cdx_order() -> Result<()> {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdx/search/cdx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            ["timestamp", "original", "statuscode", "mimetype", "length"],
            ["20230101000000", "https://example.com/", "200", "text/html", "10"],
            ["20200101000000", "https://example.com/", "301", "text/html", "20"]
        ])))
        .mount(&upstream)
        .await;
    let base = spawn(config_for(&upstream)).await?;

    let params = [("url", "example.com"), ("mode", "snapshots")];
    let (_, body) = get(&base, "/api/wayback", &params).await?;
    let snaps = body["snapshots"].as_array().unwrap();
    assert_eq!(snaps.len(), 2);
    assert_eq!(snaps[0]["timestamp"], "20230101000000");
    assert_eq!(
        snaps[1]["archiveUrl"],
        "https://web.archive.org/web/20200101000000/https://example.com/"
    );
    assert_eq!(snaps[1]["statusCode"], "301");
    Ok(())
}

#[tokio::test]
async fn wayback_blocked_is_451_with_empty_result() -> Result<()> {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdx/search/cdx"))
        .respond_with(ResponseTemplate::new(451))
        .mount(&upstream)
        .await;
    let base = spawn(config_for(&upstream)).await?;

    let (status, body) = get(&base, "/api/wayback", &[("url", "example.com")]).await?;
    assert_eq!(status, StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS);
    assert_eq!(body, json!({ "snapshots": [], "blocked": true }));
    Ok(())
}

#[tokio::test]
async fn wayback_exhausted_is_503() -> Result<()> {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdx/search/cdx"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/relay"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstream)
        .await;
    let mut config = config_for(&upstream);
    config.proxies.wayback = vec![format!("{}/relay?u={{url_encoded}}", upstream.uri())];
    let base = spawn(config).await?;

    let params = [("url", "example.com"), ("mode", "urls")];
    let (status, body) = get(&base, "/api/wayback", &params).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("2 attempted"));
    Ok(())
}

#[tokio::test]
async fn wayback_relay_recovers_wrapped_payload() -> Result<()> {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdx/search/cdx"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/relay"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "Title:\n\nMarkdown Content:\n[[\"original\"],[\"https://example.com/backup.zip\"]]",
        ))
        .mount(&upstream)
        .await;
    let mut config = config_for(&upstream);
    config.proxies.wayback = vec![format!("{}/relay?u={{url_encoded}}", upstream.uri())];
    let base = spawn(config).await?;

    let params = [("url", "example.com"), ("mode", "urls")];
    let (status, body) = get(&base, "/api/wayback", &params).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["urls"], json!(["https://example.com/backup.zip"]));
    assert_eq!(body["summary"]["archives"], json!(["https://example.com/backup.zip"]));
    assert_eq!(body["summary"]["interestingEndpoints"], json!(["https://example.com/backup.zip"]));
    Ok(())
}

#[tokio::test]
async fn tls_grade_polls_until_ready() -> Result<()> {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/analyze"))
        .and(query_param("host", "example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "DNS" })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "READY",
            "endpoints": [{ "grade": "A+" }]
        })))
        .expect(1)
        .mount(&upstream)
        .await;
    let base = spawn(config_for(&upstream)).await?;

    let (status, body) = get(&base, "/api/ssllabs", &[("host", "https://example.com/")]).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "READY");
    assert_eq!(body["endpoints"][0]["grade"], "A+");
    Ok(())
}

#[tokio::test]
async fn content_discovery_scenario() -> Result<()> {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *"))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/admin/"))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&upstream)
        .await;
    let base = spawn(config_for(&upstream)).await?;

    let (status, body) = get(&base, "/api/content-discovery", &[("url", &upstream.uri())]).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["origin"], upstream.uri());
    assert_eq!(
        body["hits"],
        json!([
            { "path": "/robots.txt", "status": 200 },
            { "path": "/admin", "status": 301 }
        ])
    );
    Ok(())
}

#[tokio::test]
async fn robots_parses_directives_and_sitemap() -> Result<()> {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "User-agent: *\nDisallow: /admin\nSitemap: https://example.com/sitemap.xml\n",
        ))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<urlset><url><loc>https://example.com/a</loc></url></urlset>",
        ))
        .mount(&upstream)
        .await;
    let base = spawn(config_for(&upstream)).await?;

    let (status, body) = get(&base, "/api/robots", &[("url", &upstream.uri())]).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["robotsUrl"], format!("{}/robots.txt", upstream.uri()));
    assert_eq!(body["sitemapUrl"], format!("{}/sitemap.xml", upstream.uri()));
    assert!(body["robots"].as_str().unwrap().contains("Disallow"));
    assert_eq!(body["parsed"]["robots"]["disallow"], json!(["/admin"]));
    assert_eq!(body["parsed"]["robots"]["sitemaps"], json!(["https://example.com/sitemap.xml"]));
    assert_eq!(body["parsed"]["sitemapUrls"], json!(["https://example.com/a"]));
    Ok(())
}

#[tokio::test]
async fn asn_upstream_failure_is_502() -> Result<()> {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json/8.8.8.8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "as": "AS15169 Google LLC"
        })))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/json/1.1.1.1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/json/9.9.9.9"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>quota exceeded</html>"))
        .mount(&upstream)
        .await;
    let base = spawn(config_for(&upstream)).await?;

    let (status, body) = get(&base, "/api/asn", &[("target", "8.8.8.8")]).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["as"], "AS15169 Google LLC");

    let (status, body) = get(&base, "/api/asn", &[("target", "1.1.1.1")]).await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].is_string());

    let (status, body) = get(&base, "/api/asn", &[("target", "9.9.9.9")]).await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["debug"], "<html>quota exceeded</html>");
    Ok(())
}

#[tokio::test]
async fn dns_fetch_error_is_500() -> Result<()> {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resolve"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstream)
        .await;
    let base = spawn(config_for(&upstream)).await?;

    let (status, body) = get(&base, "/api/dns", &[("name", "example.com")]).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("HTTP 500"));
    Ok(())
}

#[tokio::test]
async fn httpinfo_and_techstack() -> Result<()> {
    let upstream = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).insert_header("X-Powered-By", "Express"))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>hello</html>", "text/html"),
        )
        .mount(&upstream)
        .await;
    let base = spawn(config_for(&upstream)).await?;
    let target = format!("{}/page", upstream.uri());

    let (status, info) = get(&base, "/api/httpinfo", &[("url", &target)]).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["status"], 200);
    assert_eq!(info["headers"]["content-type"], "text/html");
    assert_eq!(info["bodySample"], "<html>hello</html>");

    let (status, tech) = get(&base, "/api/techstack", &[("url", &target)]).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tech["source"], "url+headers");
    assert_eq!(tech["total"], 1);
    assert_eq!(tech["technologies"][0]["name"], "Express");
    Ok(())
}

#[tokio::test]
async fn top_ports_feed() -> Result<()> {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/topports/records/10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "0": { "targetport": 23, "records": 100, "targets": 5, "sources": 4 },
            "1": { "targetport": 443, "records": 300, "targets": 9, "sources": 8 },
            "date": "2024-05-01"
        })))
        .mount(&upstream)
        .await;
    let base = spawn(config_for(&upstream)).await?;

    let (status, body) = get(&base, "/api/topports", &[]).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["ports"],
        json!([
            { "port": 443, "records": 300, "targets": 9, "sources": 8 },
            { "port": 23, "records": 100, "targets": 5, "sources": 4 }
        ])
    );
    Ok(())
}

#[tokio::test]
async fn options_and_cors() -> Result<()> {
    let upstream = MockServer::start().await;
    let base = spawn(config_for(&upstream)).await?;
    let client = reqwest::Client::new();

    let response = client
        .request(reqwest::Method::OPTIONS, format!("{base}/api/subdomains"))
        .header("Origin", "https://app.example")
        .header("Access-Control-Request-Method", "GET")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await?.is_empty());

    let response = client
        .get(format!("{base}/health"))
        .header("Origin", "https://app.example")
        .send()
        .await?;
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
    Ok(())
}
