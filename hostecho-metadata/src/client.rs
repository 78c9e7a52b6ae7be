use std::sync::Arc;

use reqwest::Response;

use crate::config::{MetadataConfig, RetrievalPolicy, validate_token_ttl};
use crate::error::MetadataError;
use crate::types::{MetadataToken, MetadataValue};

/// Attribute path holding the instance's primary private IPv4 address.
pub const PRIVATE_IPV4_ATTRIBUTE: &str = "local-ipv4";

const TOKEN_PATH: &str = "latest/api/token";
const METADATA_PATH: &str = "latest/meta-data";
const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";

/// Best-effort client for the link-local instance metadata service.
///
/// Every lookup is a single, time-bounded attempt. Transport faults, timeouts, and non-2xx
/// responses are logged at `warn` and reported as `None`, so callers on a request path never
/// fail because the metadata side-channel is unreachable.
///
/// # Retrieval Policies
/// - [`RetrievalPolicy::TokenRequired`]: `PUT /latest/api/token`, then read the attribute with
///   the token header. No attribute request is made when the token step fails.
/// - [`RetrievalPolicy::Direct`]: read the attribute with no token header.
///
/// # Examples
/// ```ignore
/// use hostecho_metadata::{MetadataClient, MetadataConfig};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let client = MetadataClient::new(MetadataConfig::default())?;
/// match client.private_ip().await {
///     Some(ip) => println!("private ip: {ip}"),
///     None => println!("private ip: unknown"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct MetadataClient {
    inner: Arc<MetadataClientInner>,
}

#[derive(Debug)]
struct MetadataClientInner {
    config: MetadataConfig,
    http: reqwest::Client,
}

impl MetadataClient {
    /// Builds a client for the configured metadata service.
    ///
    /// # Parameters
    /// * `config` - Endpoint, retrieval policy, token TTL, and per-call timeout.
    ///
    /// # Errors
    /// Returns [`MetadataError::Config`] when the token TTL is out of range and
    /// [`MetadataError::Client`] if the underlying HTTP client cannot be constructed.
    pub fn new(config: MetadataConfig) -> Result<Self, MetadataError> {
        validate_token_ttl(config.token_ttl)?;

        // Link-local traffic must never go through an HTTP proxy or follow redirects.
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .no_proxy()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(MetadataError::Client)?;

        Ok(Self {
            inner: Arc::new(MetadataClientInner { config, http }),
        })
    }

    /// Returns the configuration backing this client.
    pub fn config(&self) -> &MetadataConfig {
        &self.inner.config
    }

    /// Requests a session token valid for `ttl_seconds`.
    ///
    /// # Parameters
    /// * `ttl_seconds` - Requested lifetime, between 1 and
    ///   [`crate::MAX_TOKEN_TTL_SECS`].
    ///
    /// # Returns
    /// The token, or `None` when the TTL is out of range, the request fails or times out,
    /// the service answers with a non-2xx status, or the body is blank.
    pub async fn acquire_token(&self, ttl_seconds: u32) -> Option<MetadataToken> {
        tracing::trace!(ttl_seconds, "requesting metadata token");
        match self.request_token(ttl_seconds).await {
            Ok(token) => {
                tracing::debug!(ttl_seconds, "metadata token obtained");
                Some(token)
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    timed_out = err.is_timeout(),
                    "failed to fetch metadata token"
                );
                None
            }
        }
    }

    /// Reads a single metadata attribute such as `local-ipv4`.
    ///
    /// # Parameters
    /// * `token` - Session token to attach, if any.
    /// * `attribute_path` - Path below `/latest/meta-data/`; a leading `/` is ignored.
    ///
    /// # Returns
    /// The attribute value, or `None` on any transport error, timeout, or non-2xx status.
    pub async fn fetch_attribute(
        &self,
        token: Option<&MetadataToken>,
        attribute_path: &str,
    ) -> Option<MetadataValue> {
        tracing::trace!(
            attribute = attribute_path,
            with_token = token.is_some(),
            "requesting metadata attribute"
        );
        match self.request_attribute(token, attribute_path).await {
            Ok(value) => {
                tracing::debug!(attribute = attribute_path, "metadata attribute obtained");
                Some(value)
            }
            Err(err) => {
                tracing::warn!(
                    attribute = attribute_path,
                    error = %err,
                    timed_out = err.is_timeout(),
                    "failed to fetch metadata attribute"
                );
                None
            }
        }
    }

    /// Looks up an attribute according to the configured [`RetrievalPolicy`].
    pub async fn attribute(&self, attribute_path: &str) -> Option<MetadataValue> {
        match self.inner.config.policy {
            RetrievalPolicy::TokenRequired => {
                let Some(token) = self.acquire_token(self.inner.config.token_ttl).await else {
                    tracing::debug!(
                        attribute = attribute_path,
                        "no metadata token; skipping attribute lookup"
                    );
                    return None;
                };
                self.fetch_attribute(Some(&token), attribute_path).await
            }
            RetrievalPolicy::Direct => self.fetch_attribute(None, attribute_path).await,
        }
    }

    /// Returns the instance's private IPv4 address, or `None` when it can't be determined.
    pub async fn private_ip(&self) -> Option<MetadataValue> {
        self.attribute(PRIVATE_IPV4_ATTRIBUTE).await
    }

    async fn request_token(&self, ttl_seconds: u32) -> Result<MetadataToken, MetadataError> {
        validate_token_ttl(ttl_seconds)?;

        let response = self
            .inner
            .http
            .put(self.url(TOKEN_PATH))
            .header(TOKEN_TTL_HEADER, ttl_seconds.to_string())
            .send()
            .await?;
        let body = success_body(response).await?;

        MetadataToken::new(body).ok_or(MetadataError::EmptyToken)
    }

    async fn request_attribute(
        &self,
        token: Option<&MetadataToken>,
        attribute_path: &str,
    ) -> Result<MetadataValue, MetadataError> {
        let attribute_path = attribute_path.trim_start_matches('/');
        if attribute_path.is_empty() {
            return Err(MetadataError::EmptyPath);
        }

        let url = self.url(&format!("{METADATA_PATH}/{attribute_path}"));
        let mut request = self.inner.http.get(url);
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token.as_str());
        }

        let response = request.send().await?;
        let body = success_body(response).await?;
        Ok(MetadataValue::new(body))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.inner.config.endpoint, path)
    }
}

async fn success_body(response: Response) -> Result<String, MetadataError> {
    let status = response.status();
    if !status.is_success() {
        return Err(MetadataError::Upstream { status });
    }
    Ok(response.text().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const TEST_TIMEOUT: Duration = Duration::from_millis(200);

    fn client_for(endpoint: &str, policy: RetrievalPolicy) -> MetadataClient {
        let config = MetadataConfig::builder()
            .endpoint(endpoint)
            .policy(policy)
            .timeout(TEST_TIMEOUT)
            .build()
            .unwrap();
        MetadataClient::new(config).unwrap()
    }

    fn refused_endpoint() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    async fn mount_token(server: &MockServer, response: ResponseTemplate, calls: u64) {
        Mock::given(method("PUT"))
            .and(path("/latest/api/token"))
            .and(header(TOKEN_TTL_HEADER, "21600"))
            .respond_with(response)
            .expect(calls)
            .mount(server)
            .await;
    }

    async fn mount_private_ip(server: &MockServer, response: ResponseTemplate, calls: u64) {
        Mock::given(method("GET"))
            .and(path("/latest/meta-data/local-ipv4"))
            .respond_with(response)
            .expect(calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn resolves_private_ip_with_token() {
        let server = MockServer::start().await;
        mount_token(&server, ResponseTemplate::new(200).set_body_string("tok-123"), 1).await;
        Mock::given(method("GET"))
            .and(path("/latest/meta-data/local-ipv4"))
            .and(header(TOKEN_HEADER, "tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_string("10.0.0.5"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), RetrievalPolicy::TokenRequired);
        let ip = client.private_ip().await;

        assert_eq!(ip, Some(MetadataValue::new("10.0.0.5")));
    }

    #[tokio::test]
    async fn token_failure_skips_attribute_lookup() {
        let server = MockServer::start().await;
        mount_token(&server, ResponseTemplate::new(500), 1).await;
        mount_private_ip(&server, ResponseTemplate::new(200).set_body_string("10.0.0.5"), 0).await;

        let client = client_for(&server.uri(), RetrievalPolicy::TokenRequired);

        assert_eq!(client.private_ip().await, None);
    }

    #[tokio::test]
    async fn blank_token_is_treated_as_absent() {
        let server = MockServer::start().await;
        mount_token(&server, ResponseTemplate::new(200).set_body_string(""), 1).await;
        mount_private_ip(&server, ResponseTemplate::new(200).set_body_string("10.0.0.5"), 0).await;

        let client = client_for(&server.uri(), RetrievalPolicy::TokenRequired);

        assert_eq!(client.private_ip().await, None);
    }

    #[tokio::test]
    async fn token_timeout_returns_none() {
        let server = MockServer::start().await;
        mount_token(
            &server,
            ResponseTemplate::new(200)
                .set_body_string("tok-123")
                .set_delay(Duration::from_secs(5)),
            1,
        )
        .await;

        let client = client_for(&server.uri(), RetrievalPolicy::TokenRequired);

        assert!(client.acquire_token(21_600).await.is_none());
    }

    #[tokio::test]
    async fn token_connection_refused_returns_none() {
        let client = client_for(&refused_endpoint(), RetrievalPolicy::TokenRequired);

        assert!(client.acquire_token(21_600).await.is_none());
    }

    #[tokio::test]
    async fn out_of_range_ttl_never_hits_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/latest/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("tok-123"))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), RetrievalPolicy::TokenRequired);

        assert!(client.acquire_token(0).await.is_none());
        assert!(client.acquire_token(21_601).await.is_none());
    }

    #[tokio::test]
    async fn non_success_attribute_returns_none() {
        let server = MockServer::start().await;
        let token = MetadataToken::new("tok-123").unwrap();
        let client = client_for(&server.uri(), RetrievalPolicy::TokenRequired);

        for status in [301u16, 401, 404, 503] {
            server.reset().await;
            mount_private_ip(&server, ResponseTemplate::new(status), 1).await;

            assert_eq!(
                client.fetch_attribute(Some(&token), "local-ipv4").await,
                None,
                "status {status}"
            );
            server.verify().await;
        }
    }

    #[tokio::test]
    async fn fetch_attribute_ignores_leading_slash() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest/meta-data/placement/availability-zone"))
            .respond_with(ResponseTemplate::new(200).set_body_string("us-east-1a"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), RetrievalPolicy::Direct);
        let zone = client
            .fetch_attribute(None, "/placement/availability-zone")
            .await;

        assert_eq!(zone.as_ref().map(MetadataValue::as_str), Some("us-east-1a"));
        assert_eq!(client.fetch_attribute(None, "/").await, None);
    }

    #[tokio::test]
    async fn direct_policy_reads_without_token() {
        let server = MockServer::start().await;
        mount_token(&server, ResponseTemplate::new(200).set_body_string("tok-123"), 0).await;
        Mock::given(method("GET"))
            .and(path("/latest/meta-data/local-ipv4"))
            .and(|request: &Request| !request.headers.contains_key(TOKEN_HEADER))
            .respond_with(ResponseTemplate::new(200).set_body_string("172.31.4.20"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri(), RetrievalPolicy::Direct);

        assert_eq!(client.private_ip().await, Some(MetadataValue::new("172.31.4.20")));
    }

    #[tokio::test]
    async fn unreachable_service_gives_up_within_timeout_bound() {
        let server = MockServer::start().await;
        let slow = ResponseTemplate::new(200)
            .set_body_string("late")
            .set_delay(Duration::from_secs(5));
        mount_token(&server, slow.clone(), 1).await;
        mount_private_ip(&server, slow, 1).await;

        let bound = TEST_TIMEOUT * 2 + Duration::from_secs(1);

        let token_client = client_for(&server.uri(), RetrievalPolicy::TokenRequired);
        let started = Instant::now();
        assert_eq!(token_client.private_ip().await, None);
        assert!(started.elapsed() < bound);

        let direct_client = client_for(&server.uri(), RetrievalPolicy::Direct);
        let started = Instant::now();
        assert_eq!(direct_client.private_ip().await, None);
        assert!(started.elapsed() < bound);
    }

    #[tokio::test]
    async fn refused_service_yields_none_for_both_policies() {
        let endpoint = refused_endpoint();

        for policy in [RetrievalPolicy::TokenRequired, RetrievalPolicy::Direct] {
            let client = client_for(&endpoint, policy);
            assert_eq!(client.private_ip().await, None, "{policy}");
        }
    }

    #[tokio::test]
    async fn repeated_lookups_classify_the_same() {
        let server = MockServer::start().await;
        mount_token(&server, ResponseTemplate::new(200).set_body_string("tok-123"), 3).await;
        mount_private_ip(&server, ResponseTemplate::new(200).set_body_string("10.0.0.5"), 3).await;

        let client = client_for(&server.uri(), RetrievalPolicy::TokenRequired);
        for _ in 0..3 {
            assert_eq!(client.private_ip().await, Some(MetadataValue::new("10.0.0.5")));
        }

        let failing = client_for(&refused_endpoint(), RetrievalPolicy::TokenRequired);
        for _ in 0..3 {
            assert_eq!(failing.private_ip().await, None);
        }
    }
}
