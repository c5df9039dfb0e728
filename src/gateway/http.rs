use super::{ContentGateway, GatewayError};
use crate::feed::FetchError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::time::Duration;
use url::Url;

const MAX_BUNDLE_SIZE: usize = 20 * 1024 * 1024; // 20MB

/// Content gateway reached over HTTP.
///
/// - fetch: `GET {bundle_server}/?url=<base64 item url>`, body is the bundle
/// - insert: `POST {bundle_inserter}/insert` with the blob as a JSON body
#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    bundle_server: Url,
    insert_url: Url,
    timeout: Duration,
}

impl HttpGateway {
    pub fn new(
        client: reqwest::Client,
        bundle_server: &str,
        bundle_inserter: &str,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let bundle_server = Url::parse(bundle_server)?;
        let mut inserter = Url::parse(bundle_inserter)?;
        // Without a trailing slash, join would replace the last path segment
        if !inserter.path().ends_with('/') {
            let base_path = format!("{}/", inserter.path());
            inserter.set_path(&base_path);
        }
        let insert_url = inserter.join("insert")?;
        Ok(Self {
            client,
            bundle_server,
            insert_url,
            timeout,
        })
    }

    fn lookup_url(&self, item_url: &str) -> Url {
        let mut lookup = self.bundle_server.clone();
        lookup
            .query_pairs_mut()
            .append_pair("url", &STANDARD.encode(item_url));
        lookup
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, GatewayError> {
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| GatewayError::Timeout)??;

        if !response.status().is_success() {
            return Err(GatewayError::HttpStatus(response.status().as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl ContentGateway for HttpGateway {
    async fn fetch(&self, url: &str) -> Result<String, GatewayError> {
        let response = self.send(self.client.get(self.lookup_url(url))).await?;

        let bytes = tokio::time::timeout(
            self.timeout,
            crate::feed::read_limited_bytes(response, MAX_BUNDLE_SIZE),
        )
        .await
        .map_err(|_| GatewayError::Timeout)?
        .map_err(|e| match e {
            FetchError::Network(e) => GatewayError::Network(e),
            FetchError::Timeout => GatewayError::Timeout,
            _ => GatewayError::ResponseTooLarge,
        })?;

        String::from_utf8(bytes).map_err(|_| GatewayError::InvalidUtf8)
    }

    async fn insert(&self, blob: &str) -> Result<(), GatewayError> {
        let request = self
            .client
            .post(self.insert_url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(blob.to_string());
        self.send(request).await?;
        tracing::debug!(bytes = blob.len(), "Bundle accepted by inserter");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(server: &MockServer, timeout: Duration) -> HttpGateway {
        HttpGateway::new(reqwest::Client::new(), &server.uri(), &server.uri(), timeout).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_sends_base64_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("url", STANDARD.encode("http://example.com/a?b=c")))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"bundle":"<html/>"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let blob = gateway(&server, Duration::from_secs(5))
            .fetch("http://example.com/a?b=c")
            .await
            .unwrap();
        assert_eq!(blob, r#"{"bundle":"<html/>"}"#);
    }

    #[tokio::test]
    async fn test_fetch_failure_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = gateway(&server, Duration::from_secs(5))
            .fetch("http://example.com/a")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::HttpStatus(502)));
    }

    #[tokio::test]
    async fn test_insert_posts_blob() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/insert"))
            .and(header("content-type", "application/json"))
            .and(body_string(r#"{"url":"u","created":"c","bundle":"b"}"#))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        gateway(&server, Duration::from_secs(5))
            .insert(r#"{"url":"u","created":"c","bundle":"b"}"#)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_insert_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/insert"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = gateway(&server, Duration::from_secs(5))
            .insert("{}")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::HttpStatus(500)));
    }

    #[tokio::test]
    async fn test_insert_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let err = gateway(&server, Duration::from_millis(200))
            .insert("{}")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Timeout));
    }

    #[test]
    fn test_inserter_base_with_path() {
        let gw = HttpGateway::new(
            reqwest::Client::new(),
            "http://127.0.0.1:3094",
            "http://127.0.0.1:3095/bridge/",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(gw.insert_url.as_str(), "http://127.0.0.1:3095/bridge/insert");
    }

    #[test]
    fn test_inserter_base_path_without_trailing_slash() {
        for base in ["http://127.0.0.1:3095/bridge", "http://127.0.0.1:3095"] {
            let gw = HttpGateway::new(
                reqwest::Client::new(),
                "http://127.0.0.1:3094",
                base,
                Duration::from_secs(1),
            )
            .unwrap();
            assert_eq!(gw.insert_url.as_str(), format!("{base}/insert"));
        }
    }
}
