use std::future::{pending, Future};

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE},
    Method,
};
use serde::Serialize;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::{ClientError, RequestBody, Result};

/// One logical call: method, path, headers, optional body and the
/// deadline/cancellation that bound every attempt and backoff sleep.
#[derive(Debug)]
pub struct HttpRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Option<RequestBody>,
    pub(crate) guard: CallGuard,
}

impl HttpRequest {
    /// Starts a request for `path`, relative to the client's base URL.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
            guard: CallGuard::default(),
        }
    }

    /// Starts a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Starts a POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Starts a PUT request.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Starts a DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Starts a PATCH request.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// Adds a header. Caller headers override the `Accept` and
    /// `Content-Type` defaults. Names and values are validated when sent.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the body, sent unchanged on every attempt.
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `value` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        self.body = Some(RequestBody::json(value)?);
        Ok(self)
    }

    /// Aborts the whole call, retries included, once `deadline` passes.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.guard.deadline = Some(deadline);
        self
    }

    /// Aborts the whole call when `token` is cancelled.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.guard.cancel = Some(token);
        self
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path as given, before the base URL is prepended.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| ClientError::InvalidRequest(format!("header name '{name}': {err}")))?;
            let value = HeaderValue::from_str(value).map_err(|err| {
                ClientError::InvalidRequest(format!("header value for '{name}': {err}"))
            })?;
            headers.insert(name, value);
        }

        if self.body.is_some() && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        Ok(headers)
    }
}

/// Caller-supplied bounds for one logical call.
#[derive(Clone, Debug, Default)]
pub(crate) struct CallGuard {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl CallGuard {
    /// Runs `future` unless the deadline passes or the token fires first.
    pub(crate) async fn run<F: Future>(&self, future: F) -> Result<F::Output> {
        let deadline = async {
            match self.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => pending::<()>().await,
            }
        };
        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(ClientError::Cancelled),
            _ = deadline => Err(ClientError::DeadlineExceeded),
            output = future => Ok(output),
        }
    }
}
