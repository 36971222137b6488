//! # Trellis
//!
//! The request-facing core of an HTTP/1.x server: a **resumable request
//! parser** and a **longest-prefix URI classifier**.
//!
//! The parser is a byte-driven state machine. It consumes the request line
//! and header block from a buffer that grows as data arrives, reports each
//! field to a [`ParserSink`], and enforces a size limit on every token as
//! soon as that token grows past it. Headers are reported in CGI form
//! (`HTTP_CONTENT_TYPE`, ...); [`RequestEnv`] is the ready-made sink that
//! collects them.
//!
//! The classifier maps request paths to handlers by the longest registered
//! prefix, splitting each path into `SCRIPT_NAME` and `PATH_INFO`.
//!
//! ## Quick start: one-shot parsing
//!
//! ```rust
//! use trellis::parse_request;
//!
//! let raw = b"GET /hello?name=x HTTP/1.1\r\nHost: example.com\r\n\r\n";
//! let env = parse_request(raw).expect("valid request");
//! assert_eq!(env.request_method(), Some("GET"));
//! assert_eq!(env.request_path(), Some("/hello"));
//! assert_eq!(env.query_string(), Some("name=x"));
//! assert_eq!(env.header("Host"), Some("example.com"));
//! ```
//!
//! ## Quick start: incremental parsing
//!
//! ```rust
//! use trellis::{ParseStatus, Parser, RequestEnv};
//!
//! let mut parser = Parser::new();
//! let mut env = RequestEnv::new();
//! let mut buf = b"GET / HTTP/1.1\r\n".to_vec();
//!
//! let nread = parser.execute(&mut env, &buf, 0).unwrap();
//! assert_eq!(parser.finish(), Ok(ParseStatus::Incomplete));
//!
//! buf.extend_from_slice(b"Host: example.com\r\n\r\n");
//! parser.execute(&mut env, &buf, nread).unwrap();
//! assert_eq!(parser.finish(), Ok(ParseStatus::Complete(buf.len())));
//! ```
//!
//! ## Routing
//!
//! ```rust
//! use trellis::UriClassifier;
//!
//! let mut routes = UriClassifier::new();
//! routes.register("/blog", "blog").unwrap();
//! let hit = routes.resolve("/blog/2024").unwrap();
//! assert_eq!((hit.script_name, hit.path_info), ("/blog", "/2024"));
//! ```

mod classifier;
mod error;
pub mod fields;
mod output;
mod parser;
mod scanner;
mod trie;
mod types;

// Re-export public API.
pub use classifier::{Resolution, UriClassifier};
pub use error::{ClassifierError, ParseError, SearchError};
pub use fields::FieldName;
pub use output::{format_debug, format_env, format_json, format_resolution};
pub use parser::{ParseStatus, Parser, ParserConfig, ParserSink};
pub use scanner::BoundarySearch;
pub use trie::{ArenaStats, Tst};
pub use types::RequestEnv;

/// Parse a **complete** request head from a byte slice in one call.
///
/// This is a convenience wrapper around [`Parser`] and [`RequestEnv`]. For
/// incremental / streaming use-cases, create a `Parser` directly.
///
/// # Errors
///
/// Returns [`ParseError`] if the data is malformed, or
/// [`ParseError::IncompleteRequest`] if it ends before the blank line that
/// closes the header block.
pub fn parse_request(data: &[u8]) -> Result<RequestEnv, ParseError> {
    parse_request_with_config(data, ParserConfig::default())
}

/// Parse a **complete** request head using custom [`ParserConfig`] limits.
///
/// # Errors
///
/// Returns [`ParseError`] if the data is malformed, incomplete, or
/// exceeds the configured limits.
pub fn parse_request_with_config(
    data: &[u8],
    config: ParserConfig,
) -> Result<RequestEnv, ParseError> {
    if data.is_empty() {
        return Err(ParseError::IncompleteRequest);
    }

    let mut parser = Parser::with_config(config);
    let mut env = RequestEnv::new();
    parser.execute(&mut env, data, 0)?;
    match parser.finish()? {
        ParseStatus::Complete(_) => Ok(env),
        ParseStatus::Incomplete => Err(ParseError::IncompleteRequest),
    }
}
