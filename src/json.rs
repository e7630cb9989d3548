use reqwest::Response;
use serde::de::DeserializeOwned;

use crate::{request::CallGuard, ClientError, HttpClient, HttpRequest, IntoJsonBody, Result};

impl HttpClient {
    /// Sends `request` and decodes a `2xx` JSON response into `T`.
    ///
    /// Non-`2xx` statuses become [`ClientError::InvalidResponse`] carrying the
    /// full body; malformed JSON becomes [`ClientError::Decode`].
    pub async fn send_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        let (response, guard) = self.execute(request).await?;
        decode_json_response(response, &guard).await
    }

    /// Sends `request`, checks for a `2xx` status and discards the body.
    pub async fn send_checked(&self, request: HttpRequest) -> Result<()> {
        let (response, guard) = self.execute(request).await?;
        let response = ensure_success(response, &guard).await?;
        guard
            .run(response.bytes())
            .await?
            .map_err(ClientError::Transport)?;
        Ok(())
    }

    /// Sends a GET and decodes the JSON response.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_json(HttpRequest::get(path)).await
    }

    /// Sends `body` with POST and decodes the JSON response.
    ///
    /// Strings and byte buffers are sent as-is; wrap values in [`crate::Json`].
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: impl IntoJsonBody,
    ) -> Result<T> {
        let body = body.into_json_body()?;
        self.send_json(HttpRequest::post(path).body(body)).await
    }

    /// Sends `body` with PUT and decodes the JSON response.
    ///
    /// Strings and byte buffers are sent as-is; wrap values in [`crate::Json`].
    pub async fn put_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: impl IntoJsonBody,
    ) -> Result<T> {
        let body = body.into_json_body()?;
        self.send_json(HttpRequest::put(path).body(body)).await
    }

    /// Sends a DELETE and decodes the JSON response.
    pub async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_json(HttpRequest::delete(path)).await
    }

    /// Sends `body` with PATCH and decodes the JSON response.
    ///
    /// Strings and byte buffers are sent as-is; wrap values in [`crate::Json`].
    pub async fn patch_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: impl IntoJsonBody,
    ) -> Result<T> {
        let body = body.into_json_body()?;
        self.send_json(HttpRequest::patch(path).body(body)).await
    }
}

async fn ensure_success(response: Response, guard: &CallGuard) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = guard
        .run(response.text())
        .await?
        .map_err(ClientError::Transport)?;
    Err(ClientError::InvalidResponse {
        status: status.as_u16(),
        body,
    })
}

async fn decode_json_response<T: DeserializeOwned>(
    response: Response,
    guard: &CallGuard,
) -> Result<T> {
    let response = ensure_success(response, guard).await?;
    let body = guard
        .run(response.text())
        .await?
        .map_err(ClientError::Transport)?;
    serde_json::from_str::<T>(&body).map_err(|err| {
        ClientError::Decode(format!("invalid response JSON: {err}; body: {body}"))
    })
}
