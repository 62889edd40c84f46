//! The status envelope returned to script.
//!
//! # Design
//! Both transports serialize the same envelope:
//! `{"requestId":…,"readyState":4,"status":200,"statusText":"OK","data":…}`.
//! Field order is fixed by declaration order, so serialization is
//! deterministic.

use http::StatusCode;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::DispatchError;

/// Progress of a logical request, serialized as its numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Loading = 1,
    HeadersReceived = 2,
    /// The second loading phase, `Loading2` in engine terms.
    Processing = 3,
    ResponseIsReady = 4,
}

impl TryFrom<u8> for ReadyState {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(ReadyState::Loading),
            2 => Ok(ReadyState::HeadersReceived),
            3 => Ok(ReadyState::Processing),
            4 => Ok(ReadyState::ResponseIsReady),
            other => Err(other),
        }
    }
}

impl Serialize for ReadyState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for ReadyState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = u8::deserialize(deserializer)?;
        ReadyState::try_from(v)
            .map_err(|v| serde::de::Error::custom(format!("invalid ready state {v}")))
    }
}

/// Result of one dispatched request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub request_id: String,
    pub ready_state: ReadyState,
    pub status: u16,
    pub status_text: String,
    pub data: Value,
}

impl Response {
    pub fn ok(request_id: &str, data: Value) -> Self {
        Self::with_status(request_id, StatusCode::OK, data)
    }

    pub fn error(request_id: &str, err: &DispatchError) -> Self {
        let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::BAD_REQUEST);
        Self::with_status(request_id, status, Value::String(err.public_message()))
    }

    pub fn from_outcome(request_id: &str, outcome: Result<Value, DispatchError>) -> Self {
        match outcome {
            Ok(data) => Self::ok(request_id, data),
            Err(err) => Self::error(request_id, &err),
        }
    }

    fn with_status(request_id: &str, status: StatusCode, data: Value) -> Self {
        Self {
            request_id: request_id.to_string(),
            ready_state: ReadyState::ResponseIsReady,
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            data,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use serde_json::json;

    #[test]
    fn ok_response_shape() {
        let resp = Response::ok("42", json!({"pong": true}));
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            v,
            json!({
                "requestId": "42",
                "readyState": 4,
                "status": 200,
                "statusText": "OK",
                "data": {"pong": true}
            })
        );
    }

    #[test]
    fn empty_path_is_bad_request() {
        let resp = Response::error("1", &DispatchError::EmptyPath);
        assert_eq!(resp.status, 400);
        assert_eq!(resp.status_text, "Bad Request");
        assert_eq!(resp.ready_state, ReadyState::ResponseIsReady);
        assert!(!resp.is_success());
    }

    #[test]
    fn no_route_is_not_found() {
        let resp = Response::error("1", &DispatchError::NoRoute("/missing".into()));
        assert_eq!(resp.status, 404);
        assert_eq!(resp.status_text, "Not Found");
        assert_eq!(resp.data, json!("Route not found: /missing"));
    }

    #[test]
    fn handler_error_uses_generic_message() {
        let outcome = Err(DispatchError::Handler(HandlerError::new("secret")));
        let resp = Response::from_outcome("1", outcome);
        assert_eq!(resp.status, 400);
        assert_eq!(resp.data, json!("An error occured."));
    }

    #[test]
    fn ready_state_rejects_unknown_values() {
        let err = serde_json::from_str::<ReadyState>("9").unwrap_err();
        assert!(err.to_string().contains("invalid ready state 9"));
        let state: ReadyState = serde_json::from_str("2").unwrap();
        assert_eq!(state, ReadyState::HeadersReceived);
    }

    #[test]
    fn second_loading_phase_is_three() {
        let state: ReadyState = serde_json::from_str("3").unwrap();
        assert_eq!(state, ReadyState::Processing);
        assert_eq!(serde_json::to_string(&ReadyState::Processing).unwrap(), "3");
    }
}
