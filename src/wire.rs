use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ClientError, Result};

/// Outgoing gateway payload. `sign` is filled in after signing the rest.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// `{memberChannel}-{timestampMs}-{6 random}`.
    pub request_id: String,
    /// 16 random alphanumerics.
    pub device_id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Copied from [`crate::GatewayConfig`].
    pub platform: String,
    /// Copied from [`crate::GatewayConfig`].
    pub app_key: String,
    /// Copied from [`crate::GatewayConfig`].
    pub version: String,
    /// Copied from [`crate::GatewayConfig`].
    pub member_channel: String,
    /// Copied from [`crate::GatewayConfig`].
    pub exchange: String,
    /// Omitted when blank.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Request-specific parameters, serialized as `null` when absent.
    pub data: Option<Map<String, Value>>,
    /// Query-escaped base64 HMAC-SHA256 over the other fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign: Option<String>,
}

impl Envelope {
    pub(crate) fn to_params(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self).map_err(ClientError::Marshal)? {
            Value::Object(params) => Ok(params),
            other => Err(ClientError::Signature(format!(
                "envelope serialized to {other} instead of an object"
            ))),
        }
    }
}

/// Gateway reply. `code` is the partner's application status and is not
/// interpreted by this crate.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    /// Echo of the request id.
    #[serde(default)]
    pub request_id: String,
    /// Application status code.
    pub code: i64,
    /// Human-readable status message.
    #[serde(default)]
    pub message: String,
    /// Call-specific payload; see [`GatewayResponse::data_as`].
    #[serde(default)]
    pub data: Value,
}

impl GatewayResponse {
    /// Decodes the `data` member into `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.data)
            .map_err(|err| ClientError::Decode(format!("invalid gateway data: {err}")))
    }
}
