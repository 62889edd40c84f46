//! Requests as seen by route handlers, and the engine's raw request form.
//!
//! # Design
//! `RequestDescriptor` is what the engine hands to the interception adapter:
//! a URL plus optional raw body bytes. `Request` is the read-only value route
//! handlers receive, built once per transaction from either transport. Query
//! parameters keep their order of occurrence.

use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::materialize::DataSerializer;

/// A browser-issued request as delivered by the engine.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// Engine-assigned identifier, unique per transaction.
    pub identifier: u64,
    pub url: String,
    pub method: String,
    pub post_data: Option<Vec<u8>>,
}

impl RequestDescriptor {
    pub fn get(identifier: u64, url: &str) -> Self {
        Self {
            identifier,
            url: url.to_string(),
            method: "GET".to_string(),
            post_data: None,
        }
    }

    pub fn post(identifier: u64, url: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            identifier,
            url: url.to_string(),
            method: "POST".to_string(),
            post_data: Some(body.into()),
        }
    }
}

/// A request routed to an application handler.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub id: String,
    pub path: String,
    pub parameters: Vec<(String, String)>,
    /// Body parsed as JSON, or the body text when it is not JSON.
    pub post_data: Option<Value>,
    pub raw_post_data: Option<Vec<u8>>,
    /// `post_data` re-serialized by the bridge serializer.
    pub post_data_json: Option<String>,
}

impl Request {
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Build a request from an intercepted engine request.
    ///
    /// `path` is the already-extracted URL path; parameters and body are
    /// pulled from the descriptor here.
    pub(crate) fn from_descriptor(
        descriptor: &RequestDescriptor,
        path: String,
        serializer: &dyn DataSerializer,
    ) -> Self {
        let parameters = Url::parse(&descriptor.url)
            .map(|url| query_parameters(&url))
            .unwrap_or_default();
        let post_data = descriptor.post_data.as_deref().and_then(parse_post_data);
        let post_data_json = post_data.as_ref().and_then(|v| serializer.serialize(v));
        Self {
            id: descriptor.identifier.to_string(),
            path,
            parameters,
            post_data,
            raw_post_data: descriptor.post_data.clone(),
            post_data_json,
        }
    }

    /// First value of the query parameter `name`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Deserialize the post body into `T`.
    pub fn post_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.post_data.clone().unwrap_or(Value::Null))
    }
}

/// Percent-decoded path of `url`, as used for route lookup.
pub fn url_path(url: &Url) -> String {
    percent_decode_str(url.path()).decode_utf8_lossy().into_owned()
}

/// Decoded query pairs in order of occurrence.
pub fn query_parameters(url: &Url) -> Vec<(String, String)> {
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Convert a script-supplied parameters object into query-style pairs.
///
/// Strings are kept verbatim, other values become their JSON text. Anything
/// but an object yields no parameters.
pub fn parameters_from_value(value: Option<&Value>) -> Vec<(String, String)> {
    let Some(Value::Object(map)) = value else {
        return Vec::new();
    };
    map.iter()
        .map(|(k, v)| {
            let text = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), text)
        })
        .collect()
}

fn parse_post_data(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => Some(value),
        Err(_) => Some(Value::String(String::from_utf8_lossy(bytes).into_owned())),
    }
}
