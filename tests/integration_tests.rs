use admission_filter::clock::MockClock;
use admission_filter::config::Config;
use admission_filter::handlers::AppState;
use admission_filter::server::create_app;
use admission_filter::store::MemoryStore;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_app(config: Config) -> (Router, MockClock) {
    let clock = MockClock::default();
    let state = AppState::with_stores(
        &config,
        Arc::new(MemoryStore::with_clock(Arc::new(clock.clone()))),
        Arc::new(MemoryStore::with_clock(Arc::new(clock.clone()))),
    )
    .unwrap();
    (create_app(state), clock)
}

fn small_limits() -> Config {
    Config {
        api_max: 2,
        app_max: 3,
        ..Config::default()
    }
}

fn request(uri: &str, client: &str, content_type: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    let mut request = builder.body(Body::empty()).unwrap();

    let addr: SocketAddr = format!("{}:40000", client).parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_string(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_app_policy_admits_fifty_then_rejects() {
    let (app, _clock) = test_app(Config::default());

    for i in 1..=50 {
        let response = send(&app, request("/", "1.2.3.4", None)).await;
        assert_eq!(response.status(), StatusCode::OK, "request {} should pass", i);
    }

    let response = send(&app, request("/", "1.2.3.4", None)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_json_rejection_for_json_clients() {
    let (app, _clock) = test_app(small_limits());

    for _ in 0..2 {
        let response = send(&app, request("/api/status", "10.0.0.1", Some("application/json"))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = send(
        &app,
        request("/api/status?page=2", "10.0.0.1", Some("application/json")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "status": "fail",
            "request_url": "/api/status?page=2",
            "message": "Too many requests, please try again later?",
            "data": []
        })
    );
}

#[tokio::test]
async fn test_html_rejection_without_json_content_type() {
    let (app, _clock) = test_app(small_limits());

    for _ in 0..2 {
        send(&app, request("/api/status", "10.0.0.2", None)).await;
    }

    let response = send(&app, request("/api/status", "10.0.0.2", Some("text/plain"))).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/html"));

    let page = body_string(response).await;
    assert!(page.contains("Too Many Requests"));
    assert!(!page.contains("\"status\":\"fail\""));
}

#[tokio::test]
async fn test_health_check_is_never_throttled() {
    let (app, _clock) = test_app(small_limits());

    for _ in 0..3 {
        send(&app, request("/", "1.2.3.4", None)).await;
    }
    assert_eq!(
        send(&app, request("/", "1.2.3.4", None)).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    for _ in 0..20 {
        let response = send(&app, request("/health-check", "1.2.3.4", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key("ratelimit-limit"));
    }

    let response = send(&app, request("/health-check", "1.2.3.4", None)).await;
    let health: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_window_elapse_readmits_client() {
    let (app, clock) = test_app(small_limits());

    for _ in 0..3 {
        send(&app, request("/", "1.2.3.4", None)).await;
    }
    assert_eq!(
        send(&app, request("/", "1.2.3.4", None)).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    clock.advance(Duration::from_millis(3_600_000));

    let response = send(&app, request("/", "1.2.3.4", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["ratelimit-remaining"], "2");
}

#[tokio::test]
async fn test_standard_headers_disclosed_legacy_suppressed() {
    let (app, _clock) = test_app(small_limits());

    let response = send(&app, request("/api/status", "10.0.0.3", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers["ratelimit-policy"], "2;w=3600");
    assert_eq!(headers["ratelimit-limit"], "2");
    assert_eq!(headers["ratelimit-remaining"], "1");
    assert_eq!(headers["ratelimit-reset"], "3600");
    assert!(!headers.contains_key("x-ratelimit-limit"));
    assert!(!headers.contains_key("x-ratelimit-remaining"));
    assert!(!headers.contains_key("retry-after"));
}

#[tokio::test]
async fn test_rejection_carries_retry_after() {
    let (app, clock) = test_app(small_limits());

    for _ in 0..2 {
        send(&app, request("/api/status", "10.0.0.4", None)).await;
    }
    clock.advance(Duration::from_secs(600));

    let response = send(&app, request("/api/status", "10.0.0.4", None)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "3000");
    assert_eq!(response.headers()["ratelimit-remaining"], "0");
}

#[tokio::test]
async fn test_policies_and_clients_count_separately() {
    let (app, _clock) = test_app(small_limits());

    for _ in 0..3 {
        send(&app, request("/", "1.2.3.4", None)).await;
    }
    assert_eq!(
        send(&app, request("/", "1.2.3.4", None)).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    // Exhausting the app policy leaves the API quota untouched.
    let response = send(&app, request("/api/status", "1.2.3.4", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["ratelimit-remaining"], "1");

    let response = send(&app, request("/", "5.6.7.8", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_api_routes_are_counted() {
    let (app, _clock) = test_app(small_limits());

    let response = send(&app, request("/api/missing", "10.0.0.5", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["ratelimit-remaining"], "1");
}

#[tokio::test]
async fn test_api_trailing_slash_counts_against_api_policy() {
    let (app, _clock) = test_app(small_limits());

    let response = send(&app, request("/api/", "10.0.0.7", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["ratelimit-limit"], "2");
    assert_eq!(response.headers()["ratelimit-remaining"], "1");

    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["status"], "fail");
    assert_eq!(body["request_url"], "/api/");

    let response = send(&app, request("/api", "10.0.0.7", None)).await;
    assert_eq!(response.headers()["ratelimit-limit"], "2");
    assert_eq!(response.headers()["ratelimit-remaining"], "0");
}

#[tokio::test]
async fn test_lookalike_prefix_counts_against_app_policy() {
    let (app, _clock) = test_app(small_limits());

    let response = send(&app, request("/apiary", "10.0.0.8", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["ratelimit-limit"], "3");
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _clock) = test_app(small_limits());

    send(&app, request("/api/status", "10.0.0.6", None)).await;
    send(&app, request("/api/status", "10.0.0.6", None)).await;
    send(&app, request("/api/status", "10.0.0.6", None)).await;
    send(&app, request("/health-check", "10.0.0.6", None)).await;

    let response = send(&app, request("/metrics", "10.0.0.6", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["api"]["allowed_requests"], 2);
    assert_eq!(body["api"]["rejected_requests"], 1);
    assert_eq!(body["app"]["unmetered_requests"], 1);
    // The metrics request itself is counted by the app policy before the handler runs.
    assert_eq!(body["app"]["allowed_requests"], 1);
}

#[tokio::test]
async fn test_end_to_end_over_tcp() {
    let (app, _clock) = test_app(small_limits());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    let client = reqwest::Client::new();
    let url = format!("http://{}", addr);

    for _ in 0..3 {
        let response = client.get(format!("{}/", url)).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    let response = client
        .get(format!("{}/", url))
        .header("content-type", "application/json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 429);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "fail");
    assert_eq!(body["request_url"], "/");

    let response = client
        .get(format!("{}/health-check", url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}
