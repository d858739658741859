use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use docarchive_http::{HttpClient, RequestOpts};
use url::Url;

#[derive(Debug, Clone)]
pub struct PageCapture {
    /// Final URL after redirects.
    pub url: Url,
    pub html: String,
    pub status: u16,
    pub fetched_at: DateTime<Utc>,
}

/// Anything that can hand back the decoded HTML for a URL.
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    async fn capture(&self, url: &Url) -> Result<PageCapture>;

    /// Raw body, for binary assets such as audio files.
    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>>;
}

/// Concrete source backed by the shared HTTP client.
pub struct HttpPageSource {
    http: HttpClient,
}

impl HttpPageSource {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait::async_trait]
impl PageSource for HttpPageSource {
    async fn capture(&self, url: &Url) -> Result<PageCapture> {
        let opts = RequestOpts {
            allow_absolute: true,
            ..Default::default()
        };
        let resp = self
            .http
            .get_text(url.as_str(), opts)
            .await
            .with_context(|| format!("fetching {url}"))?;

        Ok(PageCapture {
            url: resp.url,
            html: resp.body,
            status: resp.status.as_u16(),
            fetched_at: Utc::now(),
        })
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        let opts = RequestOpts {
            allow_absolute: true,
            ..Default::default()
        };
        let resp = self
            .http
            .get_bytes(url.as_str(), opts)
            .await
            .with_context(|| format!("fetching {url}"))?;
        Ok(resp.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn captures_page_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/docs/en/quickstart"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<p>Quickstart</p>".as_bytes().to_vec(), "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let source = HttpPageSource::new(HttpClient::new(&server.uri()).unwrap());
        let url = Url::parse(&format!("{}/docs/en/quickstart", server.uri())).unwrap();
        let page = source.capture(&url).await.unwrap();

        assert_eq!(page.status, 200);
        assert_eq!(page.html, "<p>Quickstart</p>");
        assert_eq!(page.url.path(), "/docs/en/quickstart");
    }

    #[tokio::test]
    async fn http_errors_carry_the_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = HttpPageSource::new(HttpClient::new(&server.uri()).unwrap());
        let url = Url::parse(&format!("{}/gone", server.uri())).unwrap();
        let err = source.capture(&url).await.unwrap_err();
        assert!(format!("{err:#}").contains("/gone"));
        assert!(format!("{err:#}").contains("404"));
    }

    #[tokio::test]
    async fn fetches_binary_assets() {
        let server = MockServer::start().await;
        let audio = vec![0x49, 0x44, 0x33, 0x04, 0x00, 0xff];
        Mock::given(method("GET"))
            .and(path("/media/ep1.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(audio.clone(), "audio/mpeg"))
            .mount(&server)
            .await;

        let source = HttpPageSource::new(HttpClient::new(&server.uri()).unwrap());
        let url = Url::parse(&format!("{}/media/ep1.mp3", server.uri())).unwrap();
        assert_eq!(source.fetch_bytes(&url).await.unwrap(), audio);

        let missing = Url::parse(&format!("{}/media/ep2.mp3", server.uri())).unwrap();
        let err = source.fetch_bytes(&missing).await.unwrap_err();
        assert!(format!("{err:#}").contains("ep2.mp3"));
    }
}
