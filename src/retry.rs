use std::{fmt, sync::Arc, time::Duration};

use reqwest::StatusCode;

/// Delay growth between retry attempts.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BackoffStrategy {
    /// Every retry waits `initial_delay`.
    Constant,
    /// `initial_delay * multiplier^(attempt - 1)`.
    Exponential,
    /// Exponential base plus a uniform random share of up to 100% of it.
    #[default]
    ExponentialWithJitter,
}

/// Coarse classification of a transport failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureKind {
    /// The attempt exceeded its timeout.
    Timeout,
    /// Connecting failed (refused, DNS, TLS handshake).
    Connect,
    /// The connection broke while sending the request or reading the body.
    Interrupted,
    /// Anything that will fail the same way again (builder, redirect loop, decode).
    Permanent,
}

impl FailureKind {
    /// Classifies a `reqwest` error.
    pub fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect
        } else if err.is_builder() || err.is_redirect() || err.is_decode() {
            Self::Permanent
        } else if err.is_request() || err.is_body() {
            Self::Interrupted
        } else {
            Self::Permanent
        }
    }

    /// Returns `true` for failures that may succeed on another attempt.
    pub fn is_transient(self) -> bool {
        !matches!(self, Self::Permanent)
    }
}

/// Result of one completed attempt, as seen by a [`RetryPolicy`].
///
/// Policies get the full response (status and headers, body unread) or the
/// full transport error, so they can classify beyond [`FailureKind`].
#[derive(Clone, Copy, Debug)]
pub enum Outcome<'a> {
    /// A response arrived.
    Response(&'a reqwest::Response),
    /// The attempt failed before a response arrived.
    Transport(&'a reqwest::Error),
}

impl Outcome<'_> {
    /// Status of the response, if one arrived.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Response(response) => Some(response.status()),
            Self::Transport(_) => None,
        }
    }

    /// Classification of the transport error, if the attempt failed.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Response(_) => None,
            Self::Transport(err) => Some(FailureKind::classify(err)),
        }
    }
}

/// Decides whether an attempt outcome warrants another attempt.
pub trait RetryPolicy: Send + Sync {
    /// Returns `true` to schedule another attempt, if any remain.
    fn should_retry(&self, outcome: &Outcome<'_>) -> bool;
}

impl<F> RetryPolicy for F
where
    F: Fn(&Outcome<'_>) -> bool + Send + Sync,
{
    fn should_retry(&self, outcome: &Outcome<'_>) -> bool {
        self(outcome)
    }
}

/// Retries transient transport failures, `5xx` and `429 Too Many Requests`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultRetryPolicy;

impl DefaultRetryPolicy {
    /// Decision for a response status.
    pub fn retries_status(status: StatusCode) -> bool {
        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
    }

    /// Decision for a classified transport failure.
    pub fn retries_failure(kind: FailureKind) -> bool {
        kind.is_transient()
    }
}

impl RetryPolicy for DefaultRetryPolicy {
    fn should_retry(&self, outcome: &Outcome<'_>) -> bool {
        match outcome {
            Outcome::Response(response) => Self::retries_status(response.status()),
            Outcome::Transport(err) => Self::retries_failure(FailureKind::classify(err)),
        }
    }
}

/// Configures how many times and how patiently a request is retried.
#[derive(Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// How delays grow between retries.
    pub strategy: BackoffStrategy,
    /// Growth factor for the exponential strategies.
    pub multiplier: f64,
    /// Decides which outcomes are retried.
    pub policy: Arc<dyn RetryPolicy>,
}

impl RetryConfig {
    pub(crate) const DEFAULT_MAX_RETRIES: u32 = 3;
    pub(crate) const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(100);
    pub(crate) const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
    pub(crate) const DEFAULT_MULTIPLIER: f64 = 2.0;

    /// Disables retries: every call issues exactly one attempt.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Sets the number of retries after the first attempt.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the first retry delay and the ceiling for every delay.
    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self
    }

    /// Sets how delays grow between retries.
    pub fn with_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the growth factor for the exponential strategies.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Replaces the retry decision, e.g. with a closure or a test double.
    pub fn with_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Replaces zero delays and a degenerate multiplier with defaults.
    pub(crate) fn normalized(mut self) -> Self {
        if self.initial_delay.is_zero() {
            self.initial_delay = Self::DEFAULT_INITIAL_DELAY;
        }
        if self.max_delay.is_zero() {
            self.max_delay = Self::DEFAULT_MAX_DELAY;
        }
        if !self.multiplier.is_finite() || self.multiplier <= 0.0 {
            self.multiplier = Self::DEFAULT_MULTIPLIER;
        }
        self
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: Self::DEFAULT_MAX_RETRIES,
            initial_delay: Self::DEFAULT_INITIAL_DELAY,
            max_delay: Self::DEFAULT_MAX_DELAY,
            strategy: BackoffStrategy::default(),
            multiplier: Self::DEFAULT_MULTIPLIER,
            policy: Arc::new(DefaultRetryPolicy),
        }
    }
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_retries", &self.max_retries)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("strategy", &self.strategy)
            .field("multiplier", &self.multiplier)
            .field("policy", &"<dyn RetryPolicy>")
            .finish()
    }
}
