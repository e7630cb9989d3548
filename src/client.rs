use std::{
    fmt,
    sync::{Arc, Mutex},
    time::Duration,
};

use rand::{rngs::StdRng, SeedableRng};
use reqwest::{Response, Url};
use tokio::time::{sleep, Instant};

use crate::{
    backoff::backoff_delay,
    body::ReplayBody,
    request::CallGuard,
    ClientError, ClientOptions, FailureKind, HttpRequest, Outcome, RequestBody, Result,
};

#[derive(Clone)]
/// HTTP client that retries transient failures with backoff.
///
/// Clones share the connection pool and the jitter generator.
pub struct HttpClient {
    http: reqwest::Client,
    options: Arc<ClientOptions>,
    rng: Arc<Mutex<StdRng>>,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("options", &self.options)
            .finish()
    }
}

impl HttpClient {
    /// Creates a client with default options.
    pub fn new() -> Result<Self> {
        Self::with_options(ClientOptions::default())
    }

    /// Creates a client, filling zero-valued options with defaults.
    pub fn with_options(options: ClientOptions) -> Result<Self> {
        let options = options.normalized();
        let http = options
            .build_transport()
            .map_err(|err| ClientError::Config(format!("cannot build HTTP transport: {err}")))?;
        Ok(Self::with_transport(http, options))
    }

    /// Creates a client around an existing `reqwest::Client`.
    ///
    /// The transport settings in `options` (timeout, pool, compression) are
    /// not applied; only base URL and retry behavior are used.
    pub fn with_transport(http: reqwest::Client, options: ClientOptions) -> Self {
        let options = options.normalized();
        let rng = match options.jitter_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            http,
            options: Arc::new(options),
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    /// Options in effect, after normalization.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Sends a GET request and returns the final response.
    pub async fn get(&self, path: &str) -> Result<Response> {
        self.send(HttpRequest::get(path)).await
    }

    /// Sends a POST request and returns the final response.
    pub async fn post(&self, path: &str, body: impl Into<RequestBody>) -> Result<Response> {
        self.send(HttpRequest::post(path).body(body)).await
    }

    /// Sends a PUT request and returns the final response.
    pub async fn put(&self, path: &str, body: impl Into<RequestBody>) -> Result<Response> {
        self.send(HttpRequest::put(path).body(body)).await
    }

    /// Sends a DELETE request and returns the final response.
    pub async fn delete(&self, path: &str) -> Result<Response> {
        self.send(HttpRequest::delete(path)).await
    }

    /// Sends a PATCH request and returns the final response.
    pub async fn patch(&self, path: &str, body: impl Into<RequestBody>) -> Result<Response> {
        self.send(HttpRequest::patch(path).body(body)).await
    }

    /// Executes `request`, retrying as the retry policy directs.
    ///
    /// Any response the policy does not retry is returned as-is, including
    /// `4xx`. When retries run out on a retryable status, the last response
    /// is returned; when they run out on a transport failure,
    /// [`ClientError::MaxRetriesReached`] is returned.
    pub async fn send(&self, request: HttpRequest) -> Result<Response> {
        let (response, _) = self.execute(request).await?;
        Ok(response)
    }

    pub(crate) async fn execute(&self, request: HttpRequest) -> Result<(Response, CallGuard)> {
        let url = self.resolve_url(&request.path)?;
        let headers = match request.build_headers() {
            Ok(headers) => headers,
            Err(err) => {
                tracing::warn!(method = %request.method, url = %url, error = %err, "HTTP request rejected");
                return Err(err);
            }
        };
        let HttpRequest {
            method, body, guard, ..
        } = request;
        let mut body = ReplayBody::capture(body);
        let retry = &self.options.retry;
        let mut attempt: u32 = 0;

        tracing::info!(method = %method, url = %url, "HTTP request");

        loop {
            let mut builder = self
                .http
                .request(method.clone(), url.clone())
                .headers(headers.clone());
            if let Some(payload) = body.next_body()? {
                builder = builder.body(payload);
            }
            let outgoing = builder.build().map_err(|err| {
                tracing::warn!(method = %method, url = %url, error = %err, "HTTP request rejected");
                ClientError::InvalidRequest(err.to_string())
            })?;

            let started = Instant::now();
            let result = guard.run(self.http.execute(outgoing)).await?;
            let latency_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if !retry.policy.should_retry(&Outcome::Response(&response)) {
                        tracing::info!(
                            method = %method,
                            url = %url,
                            attempt,
                            status = status.as_u16(),
                            latency_ms,
                            "HTTP request succeeded"
                        );
                        return Ok((response, guard));
                    }
                    if attempt >= retry.max_retries {
                        tracing::warn!(
                            method = %method,
                            url = %url,
                            attempts = attempt + 1,
                            status = status.as_u16(),
                            latency_ms,
                            "HTTP request failed after retries"
                        );
                        return Ok((response, guard));
                    }
                    tracing::debug!(
                        method = %method,
                        url = %url,
                        attempt,
                        status = status.as_u16(),
                        latency_ms,
                        "retryable HTTP status"
                    );
                    let drained = guard.run(drain_capped(response)).await?;
                    tracing::trace!(drained, "discarded retryable response");
                }
                Err(err) => {
                    if !retry.policy.should_retry(&Outcome::Transport(&err)) {
                        tracing::warn!(
                            method = %method,
                            url = %url,
                            attempt,
                            latency_ms,
                            error = %err,
                            "HTTP request failed"
                        );
                        return Err(ClientError::Transport(err));
                    }
                    if attempt >= retry.max_retries {
                        tracing::error!(
                            method = %method,
                            url = %url,
                            attempts = attempt + 1,
                            latency_ms,
                            error = %err,
                            "HTTP request failed after retries"
                        );
                        return Err(ClientError::MaxRetriesReached {
                            attempts: attempt + 1,
                            source: err,
                        });
                    }
                    tracing::debug!(
                        method = %method,
                        url = %url,
                        attempt,
                        latency_ms,
                        kind = ?FailureKind::classify(&err),
                        error = %err,
                        "retryable transport failure"
                    );
                }
            }

            if !body.can_replay() {
                tracing::warn!(method = %method, url = %url, attempt, "request body is not replayable");
                return Err(ClientError::BodyNotReplayable);
            }

            attempt += 1;
            let delay = self.next_delay(attempt);
            tracing::info!(
                method = %method,
                url = %url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "retrying request"
            );
            guard.run(sleep(delay)).await?;
        }
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        // Poisoning cannot leave the generator in a torn state.
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        backoff_delay(attempt, &self.options.retry, &mut *rng)
    }

    fn resolve_url(&self, path: &str) -> Result<Url> {
        let full = if self.options.base_url.is_empty() {
            path.to_owned()
        } else {
            format!("{}{}", self.options.base_url, path)
        };
        Url::parse(&full).map_err(|err| {
            tracing::warn!(url = %full, error = %err, "HTTP request rejected");
            ClientError::InvalidRequest(format!("invalid URL '{full}': {err}"))
        })
    }
}

/// Upper bound on bytes read from a superseded response before dropping it.
pub(crate) const DRAIN_LIMIT: usize = 64 * 1024;

/// Reads up to [`DRAIN_LIMIT`] bytes of a superseded response, then drops it.
///
/// A short body is read to the end so its connection returns to the pool;
/// a longer one is abandoned along with its connection. Returns the bytes read.
pub(crate) async fn drain_capped(mut response: Response) -> usize {
    let mut drained = 0;
    while drained < DRAIN_LIMIT {
        match response.chunk().await {
            Ok(Some(chunk)) => drained += chunk.len(),
            Ok(None) | Err(_) => break,
        }
    }
    drained
}
