use bytes::Bytes;
use serde::Serialize;

use crate::{ClientError, Result};

/// Request payload handed to the executor.
///
/// Buffered payloads are replayed byte-for-byte on every retry. A streaming
/// `reqwest::Body` that is not already buffered can only be sent once.
#[derive(Debug)]
pub enum RequestBody {
    /// Buffered payload, replayable.
    Bytes(Bytes),
    /// Caller-provided body; replayable only if already buffered.
    Stream(reqwest::Body),
}

impl RequestBody {
    /// Serializes `value` to JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_vec(value)
            .map(|bytes| Self::Bytes(Bytes::from(bytes)))
            .map_err(ClientError::Marshal)
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Self::Bytes(Bytes::from(text))
    }
}

impl From<&'static str> for RequestBody {
    fn from(text: &'static str) -> Self {
        Self::Bytes(Bytes::from_static(text.as_bytes()))
    }
}

impl From<reqwest::Body> for RequestBody {
    fn from(body: reqwest::Body) -> Self {
        Self::Stream(body)
    }
}

/// Body accepted by the `*_json` shortcuts.
///
/// Strings, byte buffers and [`RequestBody`] already hold JSON text and are
/// sent unchanged. Wrap a value in [`Json`] to serialize it.
pub trait IntoJsonBody {
    /// Converts `self` into the request body.
    fn into_json_body(self) -> Result<RequestBody>;
}

/// Serializes the wrapped value as the JSON request body.
#[derive(Clone, Copy, Debug)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoJsonBody for Json<T> {
    fn into_json_body(self) -> Result<RequestBody> {
        RequestBody::json(&self.0)
    }
}

impl IntoJsonBody for RequestBody {
    fn into_json_body(self) -> Result<RequestBody> {
        Ok(self)
    }
}

impl IntoJsonBody for &str {
    fn into_json_body(self) -> Result<RequestBody> {
        Ok(RequestBody::Bytes(Bytes::copy_from_slice(self.as_bytes())))
    }
}

impl IntoJsonBody for &[u8] {
    fn into_json_body(self) -> Result<RequestBody> {
        Ok(RequestBody::Bytes(Bytes::copy_from_slice(self)))
    }
}

impl IntoJsonBody for String {
    fn into_json_body(self) -> Result<RequestBody> {
        Ok(self.into())
    }
}

impl IntoJsonBody for Vec<u8> {
    fn into_json_body(self) -> Result<RequestBody> {
        Ok(self.into())
    }
}

impl IntoJsonBody for Bytes {
    fn into_json_body(self) -> Result<RequestBody> {
        Ok(self.into())
    }
}

impl IntoJsonBody for reqwest::Body {
    fn into_json_body(self) -> Result<RequestBody> {
        Ok(self.into())
    }
}

/// Per-call body source that hands out one fresh `reqwest::Body` per attempt.
#[derive(Debug)]
pub(crate) enum ReplayBody {
    Empty,
    Buffered(Bytes),
    OneShot(Option<reqwest::Body>),
}

impl ReplayBody {
    pub(crate) fn capture(body: Option<RequestBody>) -> Self {
        match body {
            None => Self::Empty,
            Some(RequestBody::Bytes(bytes)) => Self::Buffered(bytes),
            Some(RequestBody::Stream(stream)) => match stream.as_bytes() {
                Some(bytes) => Self::Buffered(Bytes::copy_from_slice(bytes)),
                None => Self::OneShot(Some(stream)),
            },
        }
    }

    pub(crate) fn is_present(&self) -> bool {
        !matches!(self, Self::Empty)
    }

    /// Whether another attempt can be built after the current one.
    pub(crate) fn can_replay(&self) -> bool {
        !matches!(self, Self::OneShot(_))
    }

    pub(crate) fn next_body(&mut self) -> Result<Option<reqwest::Body>> {
        match self {
            Self::Empty => Ok(None),
            Self::Buffered(bytes) => Ok(Some(reqwest::Body::from(bytes.clone()))),
            Self::OneShot(stream) => stream
                .take()
                .map(Some)
                .ok_or(ClientError::BodyNotReplayable),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use serde_json::json;

    use super::{IntoJsonBody, Json, ReplayBody, RequestBody};
    use crate::ClientError;

    #[test]
    fn buffered_body_yields_identical_bytes_every_time() {
        let mut body = ReplayBody::capture(Some(RequestBody::from("payload")));
        assert!(body.can_replay());
        for _ in 0..3 {
            let next = body.next_body().expect("buffered body").expect("present");
            assert_eq!(next.as_bytes(), Some(&b"payload"[..]));
        }
    }

    #[test]
    fn buffered_reqwest_body_is_captured_as_bytes() {
        let body = ReplayBody::capture(Some(RequestBody::from(reqwest::Body::from("abc"))));
        assert!(matches!(body, ReplayBody::Buffered(ref b) if b == &Bytes::from_static(b"abc")));
    }

    #[test]
    fn streaming_body_is_sent_once() {
        let stream = futures_stream();
        let mut body = ReplayBody::capture(Some(RequestBody::from(stream)));
        assert!(!body.can_replay());
        assert!(body.next_body().expect("first attempt").is_some());
        assert!(matches!(
            body.next_body(),
            Err(ClientError::BodyNotReplayable)
        ));
    }

    #[test]
    fn json_body_serializes_value() {
        let body = RequestBody::json(&json!({"a": 1})).expect("serializable");
        match body {
            RequestBody::Bytes(bytes) => assert_eq!(&bytes[..], br#"{"a":1}"#),
            RequestBody::Stream(_) => panic!("expected buffered body"),
        }
    }

    fn json_bytes(body: impl IntoJsonBody) -> Bytes {
        match body.into_json_body().expect("valid body") {
            RequestBody::Bytes(bytes) => bytes,
            RequestBody::Stream(_) => panic!("expected buffered body"),
        }
    }

    #[test]
    fn raw_json_text_is_not_re_encoded() {
        assert_eq!(&json_bytes(r#"{"a":1}"#)[..], br#"{"a":1}"#);
        assert_eq!(&json_bytes(String::from("[1,2]"))[..], b"[1,2]");
        assert_eq!(&json_bytes(b"raw".to_vec())[..], b"raw");
        assert_eq!(&json_bytes(&b"raw"[..])[..], b"raw");
    }

    #[test]
    fn wrapped_values_are_serialized() {
        assert_eq!(&json_bytes(Json("text"))[..], br#""text""#);
        assert_eq!(&json_bytes(Json(&json!({"a": 1})))[..], br#"{"a":1}"#);
    }

    #[test]
    fn empty_body_has_nothing_to_send() {
        let mut body = ReplayBody::capture(None);
        assert!(!body.is_present());
        assert!(body.next_body().expect("empty").is_none());
    }

    fn futures_stream() -> reqwest::Body {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![Ok(Bytes::from_static(b"chunk"))];
        reqwest::Body::wrap_stream(futures::stream::iter(chunks))
    }
}
