//! HTTP fetch client with per-identity connection pools.
//!
//! Uses async reqwest internally, but presents a sync interface for
//! the worker threads via a shared tokio runtime and `block_on`.

use std::sync::{LazyLock, Mutex};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use crate::error::FetchError;
use crate::proxy::ProxyIdentity;

/// Shared tokio runtime backing all HTTP operations.
static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// One successful fetch: raw page body plus audit fields.
#[derive(Debug)]
pub struct FetchSuccess {
    pub body: String,
    /// Proxy identity the request went through
    pub identity: usize,
    pub latency: Duration,
}

/// Performs single fetch attempts through a chosen proxy identity.
///
/// One `reqwest::Client` is built lazily per identity and cached, so
/// every identity keeps its own connection pool. Retry/rotation policy
/// lives in the caller — `fetch` is exactly one attempt.
pub struct FetchClient {
    clients: Mutex<FxHashMap<usize, reqwest::Client>>,
    connect_timeout: Duration,
    request_timeout: Duration,
    user_agent: String,
}

impl std::fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchClient")
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl FetchClient {
    pub fn new(connect_timeout: Duration, request_timeout: Duration, user_agent: &str) -> Self {
        Self {
            clients: Mutex::new(FxHashMap::default()),
            connect_timeout,
            request_timeout,
            user_agent: user_agent.to_string(),
        }
    }

    /// Fetch `url` once through `identity`.
    ///
    /// Status classification and error mapping follow
    /// [`FetchError::from_status`]; the body is read fully (ANNO pages
    /// are small OCR text documents).
    pub fn fetch(&self, url: &str, identity: &ProxyIdentity) -> Result<FetchSuccess, FetchError> {
        let client = self.client_for(identity)?;
        let start = Instant::now();

        let body = SHARED_RUNTIME.handle().block_on(async {
            let response = client
                .get(url)
                .send()
                .await
                .map_err(|e| FetchError::from_reqwest(&e))?;

            let status = response.status();
            if !status.is_success() {
                let retry_after = parse_retry_after(response.headers());
                return Err(FetchError::from_status(status.as_u16(), retry_after));
            }

            response
                .text()
                .await
                .map_err(|e| FetchError::from_reqwest(&e))
        })?;

        Ok(FetchSuccess {
            body,
            identity: identity.id,
            latency: start.elapsed(),
        })
    }

    fn client_for(&self, identity: &ProxyIdentity) -> Result<reqwest::Client, FetchError> {
        let mut clients = self.clients.lock().expect("client cache lock poisoned");
        if let Some(client) = clients.get(&identity.id) {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .user_agent(&self.user_agent)
            .pool_max_idle_per_host(2);

        if let Some(url) = &identity.url {
            let mut proxy = reqwest::Proxy::all(url)
                .map_err(|e| FetchError::permanent(format!("invalid proxy url: {e}")))?;
            if let (Some(user), Some(pass)) = (&identity.username, &identity.password) {
                proxy = proxy.basic_auth(user, pass);
            }
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| FetchError::permanent(format!("cannot build HTTP client: {e}")))?;
        clients.insert(identity.id, client.clone());
        Ok(client)
    }
}

/// Parse a Retry-After header given in seconds (the only form the
/// archive sends). HTTP-date values are ignored.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    #[test]
    fn retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(12)));
    }

    #[test]
    fn retry_after_date_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn retry_after_absent() {
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn bad_proxy_url_is_permanent() {
        let client = FetchClient::new(
            Duration::from_secs(5),
            Duration::from_secs(5),
            "zeitline-test",
        );
        let identity = ProxyIdentity {
            id: 0,
            url: Some("::not a url::".to_string()),
            username: None,
            password: None,
        };
        let err = client
            .fetch("http://127.0.0.1:9/never", &identity)
            .unwrap_err();
        assert!(!err.is_retryable());
    }
}
