//! Request/response values exchanged with an [`ApiClient`].

use serde_json::{Map, Value};

use crate::error::TransportError;
use crate::operation::{BodyEncoding, HttpMethod};

/// Sends one fully built request. Implemented by the HTTP transport and by
/// test doubles.
pub trait ApiClient {
    fn send(&self, request: &Request) -> Result<Response, TransportError>;
}

/// A complete API request. `path` is relative to the client's base URL and
/// already has its placeholders substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Body>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub encoding: BodyEncoding,
    /// Fields in the order they are sent.
    pub fields: Vec<(String, Value)>,
}

impl Body {
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self.fields.iter().cloned().collect();
        Value::Object(map)
    }

    /// Form pairs. Arrays repeat their key; objects are sent as JSON text.
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.fields.len());
        for (key, value) in &self.fields {
            match value {
                Value::Array(items) => {
                    pairs.extend(items.iter().map(|item| (key.clone(), form_text(item))));
                }
                other => pairs.push((key.clone(), form_text(other))),
            }
        }
        pairs
    }
}

fn form_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
