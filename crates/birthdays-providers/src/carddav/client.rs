//! HTTP client for CardDAV requests.
//!
//! Requests go out unauthenticated first; a 401 challenge switches the
//! client to Digest or Basic, and later requests authenticate up front.

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, trace, warn};

use crate::error::{ProviderError, ProviderResult};

use super::auth::{DigestAuth, basic_auth};
use super::config::CardDavConfig;

#[derive(Debug, Clone)]
enum AuthScheme {
    Unknown,
    Basic,
    Digest(DigestAuth),
}

/// HTTP client for CardDAV operations.
pub struct CardDavClient {
    client: Client,
    config: CardDavConfig,
    scheme: AuthScheme,
}

impl CardDavClient {
    /// Creates a new CardDAV client with the given configuration.
    pub fn new(config: CardDavConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            config,
            scheme: AuthScheme::Unknown,
        })
    }

    /// Sends a REPORT with `Depth: 1` and returns the multistatus body.
    pub async fn report(&mut self, url: &str, body: &str) -> ProviderResult<String> {
        let response = self.execute("REPORT", url, Some(body), Some(1)).await?;
        self.handle_response(response).await
    }

    /// Sends a GET and returns the final status.
    ///
    /// Only authentication failures and server errors are treated as errors,
    /// since collections often answer GET with 405 or similar.
    pub async fn probe(&mut self, url: &str) -> ProviderResult<StatusCode> {
        let response = self.execute("GET", url, None, None).await?;
        let status = response.status();
        trace!(status = %status, "Probe response");

        match status {
            StatusCode::UNAUTHORIZED => Err(ProviderError::authentication(
                "Authentication failed: invalid credentials",
            )),
            s if s.is_server_error() => Err(ProviderError::server(format!("Server error ({})", s))),
            s => Ok(s),
        }
    }

    /// Sends a request, answering at most one 401 challenge.
    async fn execute(
        &mut self,
        method: &str,
        url: &str,
        body: Option<&str>,
        depth: Option<u8>,
    ) -> ProviderResult<Response> {
        let response = self.send(method, url, body, depth).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = response
            .headers()
            .get(reqwest::header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let Some(challenge) = challenge else {
            return Ok(response);
        };
        if !self.config.has_credentials() {
            return Err(ProviderError::authentication(
                "Server requires authentication but no credentials are configured",
            ));
        }

        let next = match DigestAuth::parse(&challenge) {
            Some(digest) => AuthScheme::Digest(digest),
            None if challenge.to_ascii_lowercase().starts_with("basic") => AuthScheme::Basic,
            None => {
                return Err(ProviderError::authentication(format!(
                    "Unsupported authentication challenge: {}",
                    challenge
                )));
            }
        };

        if matches!(self.scheme, AuthScheme::Unknown) {
            debug!("Received 401, retrying with credentials");
        } else {
            debug!("Credentials rejected or nonce stale, retrying with new challenge");
        }
        self.scheme = next;
        self.send(method, url, body, depth).await
    }

    async fn send(
        &mut self,
        method: &str,
        url: &str,
        body: Option<&str>,
        depth: Option<u8>,
    ) -> ProviderResult<Response> {
        let http_method = Method::from_bytes(method.as_bytes())
            .map_err(|_| ProviderError::internal(format!("Invalid HTTP method: {}", method)))?;

        let mut request = self.client.request(http_method, url);
        if let Some(d) = depth {
            request = request.header("Depth", d.to_string());
        }
        if let Some(b) = body {
            request = request
                .header("Content-Type", "application/xml; charset=utf-8")
                .body(b.to_string());
        }
        request = self.authorize(request, method, url);

        trace!(method = %method, url = %url, "Sending request");

        request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("Request timed out: {}", e)
            } else {
                format!("Request failed: {}", e)
            };
            ProviderError::network(message).with_source(e)
        })
    }

    fn authorize(&mut self, request: RequestBuilder, method: &str, url: &str) -> RequestBuilder {
        let (Some(username), Some(password)) = (&self.config.username, &self.config.password)
        else {
            return request;
        };

        match self.scheme {
            AuthScheme::Unknown => request,
            AuthScheme::Basic => request.header("Authorization", basic_auth(username, password)),
            AuthScheme::Digest(ref mut digest) => {
                let uri = request_uri(url);
                request.header(
                    "Authorization",
                    digest.authorize(method, &uri, username, password),
                )
            }
        }
    }

    async fn handle_response(&self, response: Response) -> ProviderResult<String> {
        let status = response.status();
        trace!(status = %status, "Received response");

        match status {
            StatusCode::OK | StatusCode::MULTI_STATUS => response
                .text()
                .await
                .map_err(|e| ProviderError::network(format!("Failed to read response: {}", e))),
            StatusCode::UNAUTHORIZED => Err(ProviderError::authentication(
                "Authentication failed: invalid credentials",
            )),
            StatusCode::FORBIDDEN => {
                Err(ProviderError::authorization("Access denied to address book"))
            }
            StatusCode::NOT_FOUND => Err(ProviderError::not_found("Address book not found")),
            StatusCode::TOO_MANY_REQUESTS => {
                Err(ProviderError::rate_limited("Too many requests to server"))
            }
            s if s.is_server_error() => {
                let body = response.text().await.unwrap_or_default();
                Err(ProviderError::server(format!("Server error ({}): {}", s, body)))
            }
            s => {
                let body = response.text().await.unwrap_or_default();
                warn!(status = %s, body = %body, "Unexpected response status");
                Err(ProviderError::invalid_response(format!(
                    "Unexpected status {}: {}",
                    s, body
                )))
            }
        }
    }
}

/// Path and query of a URL, as used in the Digest `uri` field.
fn request_uri(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(u) => match u.query() {
            Some(q) => format!("{}?{}", u.path(), q),
            None => u.path().to_string(),
        },
        Err(_) => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carddav::test_server::{Reply, closed_port_url, serve};
    use crate::error::ProviderErrorCode;
    use std::time::Duration;

    const MULTISTATUS: &str = r#"<?xml version="1.0"?><d:multistatus xmlns:d="DAV:"/>"#;
    const DIGEST_CHALLENGE: &str = r#"Digest realm="contacts", nonce="n0nce", qop="auth""#;

    fn client_for(url: &str) -> CardDavClient {
        let config = CardDavConfig::new(url)
            .unwrap()
            .with_credentials("alice", "s3cret")
            .with_timeout(Duration::from_secs(5));
        CardDavClient::new(config).unwrap()
    }

    #[test]
    fn client_creation() {
        let config = CardDavConfig::new("https://dav.example.com/ab/")
            .unwrap()
            .with_credentials("alice", "s3cret")
            .with_timeout(Duration::from_secs(10));

        let client = CardDavClient::new(config).unwrap();
        assert_eq!(client.config.timeout, Duration::from_secs(10));
        assert!(matches!(client.scheme, AuthScheme::Unknown));
    }

    #[test]
    fn digest_uri_keeps_query() {
        assert_eq!(request_uri("https://dav.example.com/ab/"), "/ab/");
        assert_eq!(request_uri("https://dav.example.com/ab/?x=1"), "/ab/?x=1");
    }

    #[test]
    fn basic_scheme_sets_header() {
        let config = CardDavConfig::new("https://dav.example.com/ab/")
            .unwrap()
            .with_credentials("alice", "s3cret");
        let mut client = CardDavClient::new(config).unwrap();
        client.scheme = AuthScheme::Basic;

        let request = client.client.get("https://dav.example.com/ab/");
        let request = client
            .authorize(request, "GET", "https://dav.example.com/ab/")
            .build()
            .unwrap();

        assert_eq!(
            request.headers()["Authorization"],
            "Basic YWxpY2U6czNjcmV0"
        );
    }

    #[tokio::test]
    async fn digest_challenge_is_answered_then_sent_up_front() {
        let (base, server) = serve(vec![
            Reply::status(401).header("WWW-Authenticate", DIGEST_CHALLENGE),
            Reply::status(207).body(MULTISTATUS),
            Reply::status(207).body(MULTISTATUS),
        ])
        .await;
        let url = format!("{}/addressbooks/alice/contacts/", base);
        let mut client = client_for(&url);

        assert_eq!(client.report(&url, "<query/>").await.unwrap(), MULTISTATUS);
        assert_eq!(client.report(&url, "<query/>").await.unwrap(), MULTISTATUS);

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 3);

        let first = &requests[0];
        assert_eq!(first.method, "REPORT");
        assert_eq!(first.path, "/addressbooks/alice/contacts/");
        assert_eq!(first.header("depth"), Some("1"));
        assert_eq!(first.body, "<query/>");
        assert!(first.header("authorization").is_none());

        let retry = requests[1].header("authorization").unwrap();
        assert!(retry.starts_with("Digest username=\"alice\""));
        assert!(retry.contains(r#"uri="/addressbooks/alice/contacts/""#));
        assert!(retry.contains("nc=00000001"));
        assert_eq!(requests[1].body, "<query/>");

        let preemptive = requests[2].header("authorization").unwrap();
        assert!(preemptive.contains("nc=00000002"));
    }

    #[tokio::test]
    async fn basic_challenge_is_answered() {
        let (base, server) = serve(vec![
            Reply::status(401).header("WWW-Authenticate", r#"Basic realm="contacts""#),
            Reply::status(207).body(MULTISTATUS),
        ])
        .await;
        let url = format!("{}/ab/", base);
        let mut client = client_for(&url);

        client.report(&url, "<query/>").await.unwrap();

        let requests = server.await.unwrap();
        assert_eq!(
            requests[1].header("authorization"),
            Some("Basic YWxpY2U6czNjcmV0")
        );
    }

    #[tokio::test]
    async fn unauthorized_without_challenge_is_auth_failure() {
        let (base, server) = serve(vec![Reply::status(401)]).await;
        let url = format!("{}/ab/", base);
        let mut client = client_for(&url);

        let err = client.report(&url, "<query/>").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert_eq!(server.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejected_credentials_are_retried_once() {
        let (base, server) = serve(vec![
            Reply::status(401).header("WWW-Authenticate", DIGEST_CHALLENGE),
            Reply::status(401).header("WWW-Authenticate", DIGEST_CHALLENGE),
        ])
        .await;
        let url = format!("{}/ab/", base);
        let mut client = client_for(&url);

        let err = client.report(&url, "<query/>").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert_eq!(err.code().check_reason(), "invalid_auth");
        assert_eq!(server.await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn challenge_without_credentials_is_auth_failure() {
        let (base, server) = serve(vec![
            Reply::status(401).header("WWW-Authenticate", DIGEST_CHALLENGE),
        ])
        .await;
        let url = format!("{}/ab/", base);
        let mut client = CardDavClient::new(CardDavConfig::new(&url).unwrap()).unwrap();

        let err = client.report(&url, "<query/>").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert_eq!(server.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn report_status_mapping() {
        let cases = [
            (403, ProviderErrorCode::AuthorizationFailed),
            (404, ProviderErrorCode::NotFound),
            (429, ProviderErrorCode::RateLimited),
            (503, ProviderErrorCode::ServerError),
            (400, ProviderErrorCode::InvalidResponse),
            (409, ProviderErrorCode::InvalidResponse),
        ];

        for (status, code) in cases {
            let (base, server) = serve(vec![Reply::status(status).body("nope")]).await;
            let url = format!("{}/ab/", base);
            let mut client = client_for(&url);

            let err = client.report(&url, "<query/>").await.unwrap_err();
            assert_eq!(err.code(), code, "status {}", status);
            server.await.unwrap();
        }
    }

    #[tokio::test]
    async fn report_returns_body_on_ok() {
        let (base, server) = serve(vec![Reply::status(200).body(MULTISTATUS)]).await;
        let url = format!("{}/ab/", base);
        let mut client = client_for(&url);

        assert_eq!(client.report(&url, "<query/>").await.unwrap(), MULTISTATUS);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn probe_tolerates_client_errors() {
        for status in [200, 207, 404, 405] {
            let (base, server) = serve(vec![Reply::status(status)]).await;
            let url = format!("{}/ab/", base);
            let mut client = client_for(&url);

            let got = client.probe(&url).await.unwrap();
            assert_eq!(got.as_u16(), status);
            assert_eq!(server.await.unwrap()[0].method, "GET");
        }
    }

    #[tokio::test]
    async fn probe_failures_map_to_check_reasons() {
        let (base, server) = serve(vec![Reply::status(401)]).await;
        let url = format!("{}/ab/", base);
        let err = client_for(&url).probe(&url).await.unwrap_err();
        assert_eq!(err.code().check_reason(), "invalid_auth");
        server.await.unwrap();

        let (base, server) = serve(vec![Reply::status(500)]).await;
        let url = format!("{}/ab/", base);
        let err = client_for(&url).probe(&url).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ServerError);
        assert_eq!(err.code().check_reason(), "cannot_connect");
        server.await.unwrap();

        let url = closed_port_url().await;
        let err = client_for(&url).probe(&url).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::NetworkError);
        assert_eq!(err.code().check_reason(), "cannot_connect");
    }
}
