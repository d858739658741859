use docarchive_http::{HttpClient, HttpError, RequestOpts};
use reqwest::StatusCode;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> HttpClient {
    HttpClient::new(&server.uri())
        .expect("client")
        .with_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn fetches_and_decodes_declared_charset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/docs/en/overview"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"<p>caf\xE9</p>".to_vec(), "text/html; charset=iso-8859-1"),
        )
        .mount(&server)
        .await;

    let page = client_for(&server)
        .await
        .get_text("/docs/en/overview", RequestOpts::default())
        .await
        .expect("page");

    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.body, "<p>café</p>");
    assert_eq!(page.url.path(), "/docs/en/overview");
    assert!(page.content_type.unwrap().contains("iso-8859-1"));
}

#[tokio::test]
async fn sends_default_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header("user-agent", "docarchive-test"))
        .and(header("accept-language", "en-US,en;q=0.9"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server)
        .await
        .with_header("user-agent", "docarchive-test")
        .unwrap()
        .with_header("accept-language", "en-US,en;q=0.9")
        .unwrap();
    let page = client.get_text("/page", RequestOpts::default()).await.unwrap();
    assert_eq!(page.body, "ok");
}

#[tokio::test]
async fn absolute_urls_bypass_the_base() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/elsewhere"))
        .respond_with(ResponseTemplate::new(200).set_body_string("there"))
        .mount(&server)
        .await;

    let client = HttpClient::new("https://unused.invalid").unwrap();
    let abs = format!("{}/elsewhere", server.uri());
    let page = client
        .get_text(
            &abs,
            RequestOpts {
                allow_absolute: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.body, "there");
}

#[tokio::test]
async fn not_found_is_an_api_error_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .with_retries(2)
        .get_text("/missing", RequestOpts::default())
        .await
        .unwrap_err();

    match err {
        HttpError::Api { status, .. } => assert_eq!(status, StatusCode::NOT_FOUND),
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
        .mount(&server)
        .await;

    let page = client_for(&server)
        .await
        .get_text(
            "/flaky",
            RequestOpts {
                retries: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.body, "recovered");
}

#[tokio::test]
async fn unreachable_host_is_a_network_error() {
    let client = HttpClient::new("http://127.0.0.1:9").unwrap();
    let err = client
        .get_text("/", RequestOpts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Network(_)), "{err:?}");
}

#[tokio::test]
async fn binary_bodies_are_returned_untouched() {
    let server = MockServer::start().await;
    let bytes = vec![0xFF, 0xFB, 0x90, 0x00, 0xE9];
    Mock::given(method("GET"))
        .and(path("/media/clip.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(bytes.clone(), "audio/mpeg"))
        .mount(&server)
        .await;

    let resp = client_for(&server)
        .await
        .get_bytes("/media/clip.mp3", RequestOpts::default())
        .await
        .unwrap();
    assert_eq!(resp.body, bytes);
    assert_eq!(resp.content_type.as_deref(), Some("audio/mpeg"));
}

#[tokio::test]
async fn per_request_timeout_overrides_the_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .get_text(
            "/slow",
            RequestOpts {
                timeout: Some(Duration::from_millis(50)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Network(_)), "{err:?}");
}
