//! Turning a `Response` into the bytes, status and headers the engine needs.
//!
//! # Design
//! The serializer is a collaborator behind `DataSerializer`; the bridge only
//! needs "value → text" and "text → value". `materialize` builds one
//! `ResponseInfo` per request. It is a plain owned value: the interception
//! adapter moves it into the transaction's single `complete` call and never
//! touches it again.

use std::io::Cursor;

use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CACHE_CONTROL, CONTENT_TYPE,
};
use serde_json::Value;

use crate::error::MaterializeError;
use crate::response::Response;

pub const JSON_MIME_TYPE: &str = "application/json";

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Value/text codec used for request bodies and response envelopes.
pub trait DataSerializer: Send + Sync {
    /// `None` means the value cannot be represented.
    fn serialize(&self, value: &Value) -> Option<String>;

    fn deserialize(&self, text: &str) -> Option<Value>;
}

/// `serde_json` codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl DataSerializer for JsonSerializer {
    fn serialize(&self, value: &Value) -> Option<String> {
        serde_json::to_string(value).ok()
    }

    fn deserialize(&self, text: &str) -> Option<Value> {
        serde_json::from_str(text).ok()
    }
}

/// Response metadata and body handed to the engine on success.
#[derive(Debug)]
pub struct ResponseInfo {
    pub status: u16,
    pub status_text: String,
    pub mime_type: String,
    pub headers: Vec<(String, String)>,
    pub length: u64,
    pub stream: Cursor<Vec<u8>>,
}

impl ResponseInfo {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The body as text, regardless of the stream position.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(self.stream.get_ref()).into_owned()
    }
}

/// Serialize the full response envelope to text.
pub fn serialize_response(serializer: &dyn DataSerializer, response: &Response) -> Option<String> {
    let value = serde_json::to_value(response).ok()?;
    serializer.serialize(&value).filter(|text| !text.is_empty())
}

/// Build the engine-facing form of a successful response.
pub fn materialize(
    serializer: &dyn DataSerializer,
    response: &Response,
) -> Result<ResponseInfo, MaterializeError> {
    if !response.is_success() {
        return Err(MaterializeError::Rejected(response.status));
    }
    let text = serialize_response(serializer, response).ok_or(MaterializeError::EmptyPayload)?;
    let bytes = text.into_bytes();
    Ok(ResponseInfo {
        status: response.status,
        status_text: response.status_text.clone(),
        mime_type: JSON_MIME_TYPE.to_string(),
        headers: default_headers(),
        length: bytes.len() as u64,
        stream: Cursor::new(bytes),
    })
}

fn default_headers() -> Vec<(String, String)> {
    [
        (CACHE_CONTROL, "private"),
        (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        (ACCESS_CONTROL_ALLOW_METHODS, "GET,POST"),
        (ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
        (CONTENT_TYPE, JSON_CONTENT_TYPE),
    ]
    .into_iter()
    .map(|(k, v)| (k.as_str().to_string(), v.to_string()))
    .collect()
}
