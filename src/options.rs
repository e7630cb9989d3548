use std::time::Duration;

use crate::RetryConfig;

/// Configures the transport, timeout and retry behavior of an
/// [`HttpClient`](crate::HttpClient).
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Prefix prepended to every request path. Empty means paths are absolute URLs.
    pub base_url: String,
    /// Per-attempt timeout, covering connect, send and reading the body.
    pub timeout: Duration,
    /// Retry count, backoff and policy.
    pub retry: RetryConfig,
    /// Accept gzip/brotli encoded responses.
    pub enable_compression: bool,
    /// Open a fresh connection for every attempt.
    pub disable_keep_alives: bool,
    /// Idle connections kept per host.
    pub pool_max_idle_per_host: usize,
    /// How long an idle pooled connection is kept.
    pub pool_idle_timeout: Duration,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
    /// Fixed seed for backoff jitter. `None` seeds from OS entropy.
    pub jitter_seed: Option<u64>,
}

impl ClientOptions {
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Sets the prefix prepended to every request path.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the timeout for each attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets retry count, backoff and policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Toggles gzip and brotli response decompression and the `Accept-Encoding` header.
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }

    /// Toggles connection reuse.
    pub fn with_keep_alives(mut self, enabled: bool) -> Self {
        self.disable_keep_alives = !enabled;
        self
    }

    /// Seeds backoff jitter for reproducible delays.
    pub fn with_jitter_seed(mut self, seed: u64) -> Self {
        self.jitter_seed = Some(seed);
        self
    }

    /// Replaces zero-valued durations with their defaults.
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        if self.timeout.is_zero() {
            self.timeout = defaults.timeout;
        }
        if self.pool_idle_timeout.is_zero() {
            self.pool_idle_timeout = defaults.pool_idle_timeout;
        }
        if self.connect_timeout.is_zero() {
            self.connect_timeout = defaults.connect_timeout;
        }
        self.retry = self.retry.normalized();
        self
    }

    pub(crate) fn build_transport(&self) -> reqwest::Result<reqwest::Client> {
        let max_idle = if self.disable_keep_alives {
            0
        } else {
            self.pool_max_idle_per_host
        };

        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .tcp_keepalive(Duration::from_secs(30))
            .pool_max_idle_per_host(max_idle)
            .pool_idle_timeout(self.pool_idle_timeout)
            .gzip(self.enable_compression)
            .brotli(self.enable_compression)
            .build()
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Self::DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
            enable_compression: true,
            disable_keep_alives: false,
            pool_max_idle_per_host: 100,
            pool_idle_timeout: Duration::from_secs(90),
            connect_timeout: Duration::from_secs(30),
            jitter_seed: None,
        }
    }
}
