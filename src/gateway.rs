use std::{
    fmt,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use rand::{rngs::OsRng, CryptoRng, Rng, RngCore};
use serde_json::{Map, Value};

use crate::{
    signature::sign_parameters,
    wire::{Envelope, GatewayResponse},
    ClientError, ClientOptions, HttpClient, HttpRequest, Result,
};

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const REQUEST_ID_SUFFIX_LEN: usize = 6;
const DEVICE_ID_LEN: usize = 16;

/// A call against the partner gateway.
pub trait GatewayRequest {
    /// Path appended to the gateway base URL; also part of the signed string.
    fn path(&self) -> &str;

    /// Request-specific fields sent as the nested `data` object.
    fn data(&self) -> Option<Map<String, Value>> {
        None
    }
}

/// Credentials and fixed envelope fields for the partner gateway.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Gateway origin, e.g. `https://gateway.example.com`.
    pub base_url: String,
    /// Partner application key.
    pub app_key: String,
    /// HMAC key; never logged.
    pub app_secret: String,
    /// Envelope `platform` field.
    pub platform: String,
    /// Envelope `version` field.
    pub version: String,
    /// Envelope `memberChannel` field, also the request id prefix.
    pub member_channel: String,
    /// Envelope `exchange` field.
    pub exchange: String,
    /// Transport and retry settings. `base_url` here is overwritten.
    pub http: ClientOptions,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("app_key", &self.app_key)
            .field("app_secret", &"<redacted>")
            .field("platform", &self.platform)
            .field("version", &self.version)
            .field("member_channel", &self.member_channel)
            .field("exchange", &self.exchange)
            .field("http", &self.http)
            .finish()
    }
}

impl GatewayConfig {
    /// Default `platform` value.
    pub const DEFAULT_PLATFORM: &'static str = "server";
    /// Default `version` value.
    pub const DEFAULT_VERSION: &'static str = "1.0.0.0";

    /// Creates a configuration with default platform, version and a 10s timeout.
    pub fn new(
        base_url: impl Into<String>,
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            platform: Self::DEFAULT_PLATFORM.to_owned(),
            version: Self::DEFAULT_VERSION.to_owned(),
            member_channel: String::new(),
            exchange: String::new(),
            http: ClientOptions::default().with_timeout(Duration::from_secs(10)),
        }
    }

    /// Sets the member channel.
    pub fn with_member_channel(mut self, member_channel: impl Into<String>) -> Self {
        self.member_channel = member_channel.into();
        self
    }

    /// Sets the exchange.
    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }

    /// Sets the platform.
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Sets the version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets transport and retry settings for gateway calls.
    pub fn with_http_options(mut self, http: ClientOptions) -> Self {
        self.http = http;
        self
    }

    /// Reads the gateway configuration from environment variables.
    ///
    /// Required: `GATEWAY_BASE_URL`, `GATEWAY_APP_KEY`, `GATEWAY_APP_SECRET`.
    /// Optional: `GATEWAY_MEMBER_CHANNEL`, `GATEWAY_EXCHANGE`,
    /// `GATEWAY_PLATFORM`, `GATEWAY_VERSION`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new(
            required_env("GATEWAY_BASE_URL")?,
            required_env("GATEWAY_APP_KEY")?,
            required_env("GATEWAY_APP_SECRET")?,
        );
        if let Some(value) = optional_env("GATEWAY_MEMBER_CHANNEL") {
            config.member_channel = value;
        }
        if let Some(value) = optional_env("GATEWAY_EXCHANGE") {
            config.exchange = value;
        }
        if let Some(value) = optional_env("GATEWAY_PLATFORM") {
            config.platform = value;
        }
        if let Some(value) = optional_env("GATEWAY_VERSION") {
            config.version = value;
        }
        Ok(config)
    }
}

fn required_env(name: &str) -> Result<String> {
    let value = std::env::var(name)
        .map_err(|_| ClientError::Config(format!("missing {name} environment variable")))?;
    if value.trim().is_empty() {
        return Err(ClientError::Config(format!("{name} is set but empty")));
    }
    Ok(value)
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

type SharedRng = Arc<Mutex<Box<dyn RngCore + Send>>>;

#[derive(Clone)]
/// Client that signs and posts envelopes to the partner gateway.
///
/// Clones share the HTTP connection pool and the id generator.
pub struct SigningClient {
    http: HttpClient,
    config: Arc<GatewayConfig>,
    access_token: Option<String>,
    rng: SharedRng,
    clock: fn() -> i64,
}

impl fmt::Debug for SigningClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningClient")
            .field("config", &self.config)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl SigningClient {
    /// Builds a dedicated [`HttpClient`] from `config.http` and `config.base_url`.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let options = config.http.clone().with_base_url(config.base_url.clone());
        let http = HttpClient::with_options(options)?;
        Ok(Self::with_http(http, config))
    }

    /// Uses an existing [`HttpClient`]; its base URL must point at the gateway.
    pub fn with_http(http: HttpClient, config: GatewayConfig) -> Self {
        Self {
            http,
            config: Arc::new(config),
            access_token: None,
            rng: Arc::new(Mutex::new(Box::new(OsRng))),
            clock: now_millis,
        }
    }

    /// Returns a client that sends `token` with every request. Blank tokens
    /// are not sent.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Replaces the generator used for request and device ids.
    pub fn with_rng<R>(mut self, rng: R) -> Self
    where
        R: RngCore + CryptoRng + Send + 'static,
    {
        self.rng = Arc::new(Mutex::new(Box::new(rng)));
        self
    }

    /// Replaces the millisecond clock used for `timestamp`.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Signs `request` and posts it to the gateway.
    ///
    /// HTTP failures are retried per the client's retry policy. A non-zero
    /// application `code` in the reply is returned, not treated as an error.
    pub async fn request<R>(&self, request: &R) -> Result<GatewayResponse>
    where
        R: GatewayRequest + ?Sized,
    {
        let envelope = self.build_envelope(request)?;
        tracing::debug!(
            path = request.path(),
            request_id = %envelope.request_id,
            "sending gateway request"
        );

        let response: GatewayResponse = self
            .http
            .send_json(HttpRequest::post(request.path()).json(&envelope)?)
            .await?;

        tracing::info!(
            path = request.path(),
            request_id = %envelope.request_id,
            code = response.code,
            "gateway request completed"
        );
        Ok(response)
    }

    /// Builds the signed envelope for `request` without sending it.
    pub fn build_envelope<R>(&self, request: &R) -> Result<Envelope>
    where
        R: GatewayRequest + ?Sized,
    {
        let timestamp = (self.clock)();
        let (suffix, device_id) = {
            let mut rng = self
                .rng
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            (
                random_string(&mut **rng, REQUEST_ID_SUFFIX_LEN),
                random_string(&mut **rng, DEVICE_ID_LEN),
            )
        };

        let config = &self.config;
        let mut envelope = Envelope {
            request_id: format!("{}-{}-{}", config.member_channel, timestamp, suffix),
            device_id,
            timestamp,
            platform: config.platform.clone(),
            app_key: config.app_key.clone(),
            version: config.version.clone(),
            member_channel: config.member_channel.clone(),
            exchange: config.exchange.clone(),
            access_token: self
                .access_token
                .clone()
                .filter(|token| !token.trim().is_empty()),
            data: request.data(),
            sign: None,
        };

        let params = envelope.to_params()?;
        envelope.sign = Some(sign_parameters(
            request.path(),
            &params,
            &config.app_secret,
        )?);
        Ok(envelope)
    }
}

fn random_string<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from(CHARSET[rng.gen_range(0..CHARSET.len())]))
        .collect()
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}
