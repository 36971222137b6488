use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

use crate::fields::{self, FieldName};
use crate::parser::ParserSink;

// ---------------------------------------------------------------------------
// RequestEnv
// ---------------------------------------------------------------------------

/// A parsed request head in CGI environment form.
///
/// This is the standard [`ParserSink`]: the request line lands under
/// `REQUEST_METHOD`, `REQUEST_URI`, `REQUEST_PATH`, `QUERY_STRING`,
/// `FRAGMENT` and `SERVER_PROTOCOL`, and each header under `HTTP_<NAME>`.
/// A header seen more than once keeps every value, joined with `", "`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestEnv {
    #[serde(flatten)]
    vars: BTreeMap<Cow<'static, str>, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body_start: Option<usize>,
    #[serde(serialize_with = "serialize_body", skip_serializing_if = "Vec::is_empty")]
    body: Vec<u8>,
}

/// Serialize body bytes as a UTF-8 string (lossy) for JSON output.
fn serialize_body<S: Serializer>(body: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&String::from_utf8_lossy(body))
}

impl RequestEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything, keeping allocations, so the env can be reused with
    /// a reset parser.
    pub fn clear(&mut self) {
        self.vars.clear();
        self.body_start = None;
        self.body.clear();
    }

    /// Look up a variable by its environment name, e.g. `HTTP_HOST`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Look up a header by its wire name, e.g. `Content-Type`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.get(&fields::env_key(name))
    }

    pub fn request_method(&self) -> Option<&str> {
        self.get(fields::REQUEST_METHOD)
    }

    pub fn request_uri(&self) -> Option<&str> {
        self.get(fields::REQUEST_URI)
    }

    pub fn request_path(&self) -> Option<&str> {
        self.get(fields::REQUEST_PATH)
    }

    pub fn query_string(&self) -> Option<&str> {
        self.get(fields::QUERY_STRING)
    }

    pub fn fragment(&self) -> Option<&str> {
        self.get(fields::FRAGMENT)
    }

    pub fn server_protocol(&self) -> Option<&str> {
        self.get(fields::SERVER_PROTOCOL)
    }

    /// The numeric part of `SERVER_PROTOCOL`, e.g. `1.1`.
    pub fn http_version(&self) -> Option<&str> {
        self.server_protocol()
            .and_then(|proto| proto.strip_prefix("HTTP/"))
    }

    /// Offset of the first body byte in the parsed buffer.
    pub fn body_start(&self) -> Option<usize> {
        self.body_start
    }

    /// Body bytes that arrived together with the header block.
    pub fn initial_body(&self) -> &[u8] {
        &self.body
    }

    /// All variables in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    /// Only the `HTTP_*` variables.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter()
            .filter(|(k, _)| k.starts_with(fields::HTTP_PREFIX))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    fn set(&mut self, key: &'static str, value: &[u8]) {
        self.vars
            .insert(Cow::Borrowed(key), String::from_utf8_lossy(value).into_owned());
    }
}

impl ParserSink for RequestEnv {
    fn request_method(&mut self, method: &[u8]) {
        self.set(fields::REQUEST_METHOD, method);
    }

    fn request_uri(&mut self, uri: &[u8]) {
        self.set(fields::REQUEST_URI, uri);
    }

    fn request_path(&mut self, path: &[u8]) {
        self.set(fields::REQUEST_PATH, path);
    }

    fn query_string(&mut self, query: &[u8]) {
        self.set(fields::QUERY_STRING, query);
    }

    fn fragment(&mut self, fragment: &[u8]) {
        self.set(fields::FRAGMENT, fragment);
    }

    fn server_protocol(&mut self, protocol: &[u8]) {
        self.set(fields::SERVER_PROTOCOL, protocol);
    }

    fn http_field(&mut self, name: FieldName<'_>, value: &[u8]) {
        let value = String::from_utf8_lossy(value);
        match self.vars.get_mut(name.as_str()) {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            None => {
                self.vars.insert(name.to_cow(), value.into_owned());
            }
        }
    }

    fn header_done(&mut self, body_start: usize, body: &[u8]) {
        self.body_start = Some(body_start);
        self.body.clear();
        self.body.extend_from_slice(body);
    }
}
