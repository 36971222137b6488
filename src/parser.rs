use serde::Deserialize;

use crate::error::ParseError;
use crate::fields::{self, FieldName};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configurable limits for the request parser.
///
/// All sizes are in bytes. Every limit is checked as soon as the token it
/// governs grows past it, not when the token ends.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Maximum length of a header field name (default: 256).
    pub max_field_name_len: usize,
    /// Maximum length of a header field value (default: 80 KiB).
    pub max_field_value_len: usize,
    /// Maximum length of the request target (default: 12 KiB).
    pub max_request_uri_len: usize,
    /// Maximum length of the path component (default: 8 KiB).
    pub max_request_path_len: usize,
    /// Maximum length of the query string (default: 10 KiB).
    pub max_query_string_len: usize,
    /// Maximum length of the fragment (default: 1 KiB).
    pub max_fragment_len: usize,
    /// Maximum size of the request line plus header block (default: 112 KiB).
    pub max_header_len: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_field_name_len: 256,
            max_field_value_len: 80 * 1024,
            max_request_uri_len: 12 * 1024,
            max_request_path_len: 8 * 1024,
            max_query_string_len: 10 * 1024,
            max_fragment_len: 1024,
            max_header_len: (80 + 32) * 1024,
        }
    }
}

impl ParserConfig {
    /// Load limits from a TOML document. Keys that are absent keep their
    /// defaults.
    ///
    /// ```rust
    /// let config = trellis::ParserConfig::from_toml_str("max_field_value_len = 16").unwrap();
    /// assert_eq!(config.max_field_value_len, 16);
    /// assert_eq!(config.max_field_name_len, 256);
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }
}

// ---------------------------------------------------------------------------
// Parse status
// ---------------------------------------------------------------------------

/// Outcome of [`Parser::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// The header block is complete. The contained value is the total number
    /// of bytes consumed, which is also the offset at which the body begins.
    Complete(usize),
    /// More bytes are needed before the header block is complete.
    Incomplete,
}

// ---------------------------------------------------------------------------
// Event sink
// ---------------------------------------------------------------------------

/// Receiver for the fields the parser recognises.
///
/// Every slice is a view into the buffer given to [`Parser::execute`]; a sink
/// that needs the data past the callback must copy it. All methods default to
/// doing nothing so a sink only implements what it cares about.
#[allow(unused_variables)]
pub trait ParserSink {
    /// `REQUEST_METHOD`, e.g. `GET`.
    fn request_method(&mut self, method: &[u8]) {}

    /// `REQUEST_URI`: the whole request target, without any fragment.
    fn request_uri(&mut self, uri: &[u8]) {}

    /// `REQUEST_PATH`: the path up to the first `;` or `?`.
    fn request_path(&mut self, path: &[u8]) {}

    /// `QUERY_STRING`: everything after the `?`, possibly empty.
    fn query_string(&mut self, query: &[u8]) {}

    /// `FRAGMENT`: everything after the `#`.
    fn fragment(&mut self, fragment: &[u8]) {}

    /// `SERVER_PROTOCOL`, e.g. `HTTP/1.1`.
    fn server_protocol(&mut self, protocol: &[u8]) {}

    /// One header line. The name is already normalised to `HTTP_<NAME>`
    /// and the value has surrounding blanks trimmed.
    fn http_field(&mut self, name: FieldName<'_>, value: &[u8]) {}

    /// The blank line closing the header block was seen. `body_start` is the
    /// offset of the first body byte in the buffer; `body` holds whatever of
    /// the body is already present.
    fn header_done(&mut self, body_start: usize, body: &[u8]) {}
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

/// Part of the request target an escape sequence returns to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UriPart {
    Path,
    Params,
    Query,
    Fragment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    // ---- Request line ----
    Start,
    Method,
    UriStart,
    Asterisk,
    Scheme,
    SchemeSlash,
    SchemeSlashSlash,
    HostStart,
    Host,
    PortStart,
    Port,
    Path,
    Params,
    Query,
    Fragment,
    /// `%` seen; waiting for the first hex digit.
    EscapeHigh(UriPart),
    /// First hex digit seen; waiting for the second.
    EscapeLow(UriPart),
    /// Index into the `HTTP/` literal.
    Protocol(u8),
    MajorStart,
    Major,
    MinorStart,
    Minor,
    RequestLineLf,

    // ---- Header section ----
    HeaderStart,
    FieldName,
    ValueOws,
    Value,
    HeaderLf,
    HeadersEndLf,

    // ---- Terminal ----
    Done,
    Error,
}

const PROTOCOL_PREFIX: &[u8] = b"HTTP/";
const MAX_METHOD_LEN: usize = 20;

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// A resumable, byte-driven HTTP/1.x request-line and header parser.
///
/// One instance serves one connection and is reused across requests with
/// [`Parser::reset`]. Bytes are fed through [`Parser::execute`] using a
/// single growing buffer: earlier bytes stay in place and `offset` points at
/// the first byte not yet consumed.
///
/// ```rust
/// use trellis::{Parser, RequestEnv};
///
/// let mut parser = Parser::new();
/// let mut env = RequestEnv::new();
/// let mut buf = b"GET /a/b?c=d HTTP/1.1\r\n".to_vec();
///
/// let nread = parser.execute(&mut env, &buf, 0).unwrap();
/// assert!(!parser.is_finished());
///
/// buf.extend_from_slice(b"Host: x\r\n\r\n");
/// parser.execute(&mut env, &buf, nread).unwrap();
/// assert!(parser.is_finished());
/// assert_eq!(env.request_path(), Some("/a/b"));
/// assert_eq!(env.get("HTTP_HOST"), Some("x"));
/// ```
#[derive(Debug)]
pub struct Parser {
    state: State,
    config: ParserConfig,
    nread: usize,

    // Token offsets into the caller's buffer.
    mark: usize,
    uri_start: usize,
    query_start: usize,
    field_start: usize,
    field_len: usize,

    body_start: Option<usize>,
    error: Option<ParseError>,

    // Reused for header names that are not in the common table.
    scratch: String,
}

impl Parser {
    /// Create a new parser with default limits.
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    /// Create a new parser with custom limits.
    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            state: State::Start,
            config,
            nread: 0,
            mark: 0,
            uri_start: 0,
            query_start: 0,
            field_start: 0,
            field_len: 0,
            body_start: None,
            error: None,
            scratch: String::with_capacity(64),
        }
    }

    /// Return the parser to its initial state without reallocating.
    pub fn reset(&mut self) {
        self.state = State::Start;
        self.nread = 0;
        self.mark = 0;
        self.uri_start = 0;
        self.query_start = 0;
        self.field_start = 0;
        self.field_len = 0;
        self.body_start = None;
        self.error = None;
        self.scratch.clear();
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Consume `buf[offset..]`, emitting fields to `sink`, and return the
    /// total number of bytes consumed since the last reset.
    ///
    /// Consumption stops right after the blank line ending the header block;
    /// any bytes past that point are body and are handed to
    /// [`ParserSink::header_done`] rather than consumed. Once the parser is
    /// finished further calls return the same count; once it has failed they
    /// return the same error.
    ///
    /// # Errors
    ///
    /// [`ParseError::InvalidOffset`] if `offset >= buf.len()` (parser state is
    /// left untouched). Any other error moves the parser into its terminal
    /// error state.
    pub fn execute<S>(
        &mut self,
        sink: &mut S,
        buf: &[u8],
        offset: usize,
    ) -> Result<usize, ParseError>
    where
        S: ParserSink + ?Sized,
    {
        if offset >= buf.len() {
            return Err(ParseError::InvalidOffset {
                offset,
                len: buf.len(),
            });
        }

        match self.state {
            State::Done => return Ok(self.nread),
            State::Error => return Err(self.error.clone().unwrap_or(ParseError::IncompleteRequest)),
            _ => {}
        }

        let mut p = offset;
        while p < buf.len() {
            self.nread += 1;
            if self.nread > self.config.max_header_len {
                return Err(self.fail(ParseError::HeaderTooLong {
                    max: self.config.max_header_len,
                }));
            }

            if let Err(err) = self.step(sink, buf, p) {
                return Err(self.fail(err));
            }
            if self.state == State::Done {
                break;
            }
            p += 1;
        }

        Ok(self.nread)
    }

    /// Evaluate the terminal status without feeding more bytes, e.g. when
    /// the peer closes the connection.
    ///
    /// # Errors
    ///
    /// Returns the stored error if the parser has failed.
    pub fn finish(&self) -> Result<ParseStatus, ParseError> {
        match self.state {
            State::Error => Err(self.error.clone().unwrap_or(ParseError::IncompleteRequest)),
            State::Done => Ok(ParseStatus::Complete(self.nread)),
            _ => Ok(ParseStatus::Incomplete),
        }
    }

    /// `true` once the header block has been fully parsed.
    pub fn is_finished(&self) -> bool {
        self.state == State::Done
    }

    /// `true` once the parser has rejected its input.
    pub fn has_error(&self) -> bool {
        self.state == State::Error
    }

    /// The error that stopped the parser, if any.
    pub fn error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    /// Total bytes consumed since the last reset.
    pub fn nread(&self) -> usize {
        self.nread
    }

    /// Offset of the first body byte, once the header block is complete.
    pub fn body_start(&self) -> Option<usize> {
        self.body_start
    }

    fn fail(&mut self, err: ParseError) -> ParseError {
        tracing::debug!(error = %err, nread = self.nread, "request parse failed");
        self.state = State::Error;
        self.error = Some(err.clone());
        err
    }

    // ----- state machine --------------------------------------------------

    /// Advance the machine by the byte at `buf[p]`.
    fn step<S>(&mut self, sink: &mut S, buf: &[u8], p: usize) -> Result<(), ParseError>
    where
        S: ParserSink + ?Sized,
    {
        let byte = buf[p];
        let unexpected = |expected: &'static str| ParseError::UnexpectedByte {
            expected,
            found: byte,
            offset: p,
        };

        match self.state {
            // ===================== REQUEST LINE =====================
            State::Start => {
                if !is_method_char(byte) {
                    return Err(unexpected("method character"));
                }
                self.mark = p;
                self.state = State::Method;
            }

            State::Method => {
                if byte == b' ' {
                    sink.request_method(&buf[self.mark..p]);
                    self.state = State::UriStart;
                } else if is_method_char(byte) && p - self.mark < MAX_METHOD_LEN {
                    // stay
                } else {
                    return Err(unexpected("method character or SP"));
                }
            }

            State::UriStart => {
                self.uri_start = p;
                self.mark = p;
                self.state = match byte {
                    b'*' => State::Asterisk,
                    b'/' => State::Path,
                    b if is_scheme_char(b) => State::Scheme,
                    _ => return Err(unexpected("'*', '/' or URI scheme")),
                };
                self.check_uri_len(p)?;
            }

            State::Asterisk => match byte {
                b' ' => {
                    sink.request_uri(&buf[self.uri_start..p]);
                    self.state = State::Protocol(0);
                }
                b'#' => {
                    sink.request_uri(&buf[self.uri_start..p]);
                    self.mark = p + 1;
                    self.state = State::Fragment;
                }
                _ => return Err(unexpected("SP or '#' after '*'")),
            },

            State::Scheme => {
                if byte == b':' {
                    self.state = State::SchemeSlash;
                } else if !is_scheme_char(byte) {
                    return Err(unexpected("URI scheme character or ':'"));
                }
                self.check_uri_len(p)?;
            }

            State::SchemeSlash | State::SchemeSlashSlash => {
                if byte != b'/' {
                    return Err(unexpected("'/' after URI scheme"));
                }
                self.state = if self.state == State::SchemeSlash {
                    State::SchemeSlashSlash
                } else {
                    State::HostStart
                };
                self.check_uri_len(p)?;
            }

            State::HostStart => {
                if !is_host_char(byte) {
                    return Err(unexpected("host character"));
                }
                self.state = State::Host;
                self.check_uri_len(p)?;
            }

            State::Host => {
                match byte {
                    b':' => self.state = State::PortStart,
                    b'/' => {
                        self.mark = p;
                        self.state = State::Path;
                    }
                    b if is_host_char(b) => {}
                    _ => return Err(unexpected("host character, ':' or '/'")),
                }
                self.check_uri_len(p)?;
            }

            State::PortStart => {
                if !byte.is_ascii_digit() {
                    return Err(unexpected("port digit"));
                }
                self.state = State::Port;
                self.check_uri_len(p)?;
            }

            State::Port => {
                match byte {
                    b'/' => {
                        self.mark = p;
                        self.state = State::Path;
                    }
                    b if b.is_ascii_digit() => {}
                    _ => return Err(unexpected("port digit or '/'")),
                }
                self.check_uri_len(p)?;
            }

            State::Path => match byte {
                b' ' | b'#' => {
                    sink.request_path(&buf[self.mark..p]);
                    self.end_uri(sink, buf, p);
                }
                b';' => {
                    sink.request_path(&buf[self.mark..p]);
                    self.state = State::Params;
                    self.check_uri_len(p)?;
                }
                b'?' => {
                    sink.request_path(&buf[self.mark..p]);
                    self.query_start = p + 1;
                    self.state = State::Query;
                    self.check_uri_len(p)?;
                }
                b'%' => {
                    self.state = State::EscapeHigh(UriPart::Path);
                    self.check_path_len(p)?;
                }
                b if b == b'/' || is_pchar(b) => self.check_path_len(p)?,
                _ => return Err(unexpected("path character")),
            },

            State::Params => {
                match byte {
                    b' ' | b'#' => {
                        self.end_uri(sink, buf, p);
                        return Ok(());
                    }
                    b'?' => {
                        self.query_start = p + 1;
                        self.state = State::Query;
                    }
                    b'%' => self.state = State::EscapeHigh(UriPart::Params),
                    b if b == b'/' || b == b';' || is_pchar(b) => {}
                    _ => return Err(unexpected("parameter character")),
                }
                self.check_uri_len(p)?;
            }

            State::Query => match byte {
                b' ' | b'#' => {
                    sink.query_string(&buf[self.query_start..p]);
                    self.end_uri(sink, buf, p);
                }
                b'%' => {
                    self.state = State::EscapeHigh(UriPart::Query);
                    self.check_query_len(p)?;
                }
                b if is_uri_char(b) => self.check_query_len(p)?,
                _ => return Err(unexpected("query character")),
            },

            State::Fragment => match byte {
                b' ' => {
                    sink.fragment(&buf[self.mark..p]);
                    self.state = State::Protocol(0);
                }
                b'%' => {
                    self.state = State::EscapeHigh(UriPart::Fragment);
                    self.check_fragment_len(p)?;
                }
                b if is_uri_char(b) => self.check_fragment_len(p)?,
                _ => return Err(unexpected("fragment character")),
            },

            State::EscapeHigh(part) | State::EscapeLow(part) => {
                if !byte.is_ascii_hexdigit() {
                    return Err(unexpected("hex digit in percent escape"));
                }
                self.state = match (self.state, part) {
                    (State::EscapeHigh(_), _) => State::EscapeLow(part),
                    (_, UriPart::Path) => State::Path,
                    (_, UriPart::Params) => State::Params,
                    (_, UriPart::Query) => State::Query,
                    (_, UriPart::Fragment) => State::Fragment,
                };
                match part {
                    UriPart::Path => self.check_path_len(p)?,
                    UriPart::Params => self.check_uri_len(p)?,
                    UriPart::Query => self.check_query_len(p)?,
                    UriPart::Fragment => self.check_fragment_len(p)?,
                }
            }

            State::Protocol(idx) => {
                let idx = usize::from(idx);
                if byte != PROTOCOL_PREFIX[idx] {
                    return Err(unexpected("\"HTTP/\""));
                }
                if idx == 0 {
                    self.mark = p;
                }
                self.state = if idx + 1 == PROTOCOL_PREFIX.len() {
                    State::MajorStart
                } else {
                    State::Protocol((idx + 1) as u8)
                };
            }

            State::MajorStart | State::MinorStart => {
                if !byte.is_ascii_digit() {
                    return Err(unexpected("version digit"));
                }
                self.state = if self.state == State::MajorStart {
                    State::Major
                } else {
                    State::Minor
                };
            }

            State::Major => match byte {
                b'.' => self.state = State::MinorStart,
                b if b.is_ascii_digit() => {}
                _ => return Err(unexpected("version digit or '.'")),
            },

            State::Minor => match byte {
                b'\r' => {
                    sink.server_protocol(&buf[self.mark..p]);
                    self.state = State::RequestLineLf;
                }
                b if b.is_ascii_digit() => {}
                _ => return Err(unexpected("version digit or CR")),
            },

            State::RequestLineLf => {
                if byte != b'\n' {
                    return Err(unexpected("LF after request line"));
                }
                self.state = State::HeaderStart;
            }

            // ===================== HEADERS =====================
            State::HeaderStart => {
                if byte == b'\r' {
                    self.state = State::HeadersEndLf;
                } else if is_token_char(byte) {
                    self.field_start = p;
                    self.state = State::FieldName;
                    self.check_field_name_len(p)?;
                } else {
                    return Err(unexpected("header name character or CR"));
                }
            }

            State::FieldName => {
                if byte == b':' {
                    self.field_len = p - self.field_start;
                    self.state = State::ValueOws;
                } else if is_token_char(byte) {
                    self.check_field_name_len(p)?;
                } else {
                    return Err(unexpected("header name character or ':'"));
                }
            }

            State::ValueOws => {
                if byte == b' ' {
                    // skip
                } else if byte == b'\r' {
                    self.emit_field(sink, buf, p, p);
                    self.state = State::HeaderLf;
                } else if is_field_value_char(byte) {
                    self.mark = p;
                    self.state = State::Value;
                    self.check_field_value_len(p)?;
                } else {
                    return Err(unexpected("header value character, SP or CR"));
                }
            }

            State::Value => {
                if byte == b'\r' {
                    self.emit_field(sink, buf, self.mark, p);
                    self.state = State::HeaderLf;
                } else if is_field_value_char(byte) {
                    self.check_field_value_len(p)?;
                } else {
                    return Err(unexpected("header value character or CR"));
                }
            }

            State::HeaderLf => {
                if byte != b'\n' {
                    return Err(unexpected("LF after header value"));
                }
                self.state = State::HeaderStart;
            }

            State::HeadersEndLf => {
                if byte != b'\n' {
                    return Err(unexpected("LF after header block"));
                }
                let body_start = p + 1;
                self.body_start = Some(body_start);
                self.state = State::Done;
                tracing::trace!(body_start, nread = self.nread, "request headers complete");
                sink.header_done(body_start, &buf[body_start..]);
            }

            State::Done | State::Error => unreachable!("terminal states are handled by execute"),
        }

        Ok(())
    }

    // ----- helpers --------------------------------------------------------

    /// Close the request target at `buf[p]`, which is either SP or `#`.
    fn end_uri<S>(&mut self, sink: &mut S, buf: &[u8], p: usize)
    where
        S: ParserSink + ?Sized,
    {
        sink.request_uri(&buf[self.uri_start..p]);
        if buf[p] == b'#' {
            self.mark = p + 1;
            self.state = State::Fragment;
        } else {
            self.state = State::Protocol(0);
        }
    }

    /// Normalise the pending field name and hand the trimmed value to `sink`.
    fn emit_field<S>(&mut self, sink: &mut S, buf: &[u8], value_start: usize, value_end: usize)
    where
        S: ParserSink + ?Sized,
    {
        let raw_name = &buf[self.field_start..self.field_start + self.field_len];
        fields::normalize_into(raw_name, &mut self.scratch);
        let name = FieldName::intern(&self.scratch);
        sink.http_field(name, trim_ows(&buf[value_start..value_end]));
    }

    fn check_uri_len(&self, p: usize) -> Result<(), ParseError> {
        let max = self.config.max_request_uri_len;
        if p + 1 - self.uri_start > max {
            return Err(ParseError::RequestUriTooLong { max });
        }
        Ok(())
    }

    fn check_path_len(&self, p: usize) -> Result<(), ParseError> {
        self.check_uri_len(p)?;
        let max = self.config.max_request_path_len;
        if p + 1 - self.mark > max {
            return Err(ParseError::RequestPathTooLong { max });
        }
        Ok(())
    }

    fn check_query_len(&self, p: usize) -> Result<(), ParseError> {
        self.check_uri_len(p)?;
        let max = self.config.max_query_string_len;
        if p + 1 - self.query_start > max {
            return Err(ParseError::QueryStringTooLong { max });
        }
        Ok(())
    }

    fn check_fragment_len(&self, p: usize) -> Result<(), ParseError> {
        let max = self.config.max_fragment_len;
        if p + 1 - self.mark > max {
            return Err(ParseError::FragmentTooLong { max });
        }
        Ok(())
    }

    fn check_field_name_len(&self, p: usize) -> Result<(), ParseError> {
        let max = self.config.max_field_name_len;
        if p + 1 - self.field_start > max {
            return Err(ParseError::FieldNameTooLong { max });
        }
        Ok(())
    }

    fn check_field_value_len(&self, p: usize) -> Result<(), ParseError> {
        let max = self.config.max_field_value_len;
        if p + 1 - self.mark > max {
            return Err(ParseError::FieldValueTooLong { max });
        }
        Ok(())
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip leading and trailing SP / HTAB.
fn trim_ows(mut value: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = value {
        value = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = value {
        value = rest;
    }
    value
}

// ---------------------------------------------------------------------------
// Character classification
// ---------------------------------------------------------------------------

#[inline]
fn is_ctl(b: u8) -> bool {
    b < 0x20 || b == 0x7F
}

/// Method = ( UPPER | DIGIT | "$" | "-" | "_" | "." ){1,20}
#[inline]
fn is_method_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'0'..=b'9' | b'$' | b'-' | b'_' | b'.')
}

#[inline]
fn is_scheme_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.')
}

#[inline]
fn is_host_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.')
}

/// `uchar | reserved`, minus the `%` that introduces an escape.
///
/// Everything except CTL, SP and `" # % < >`; bytes above 0x7F are allowed.
#[inline]
fn is_uri_char(b: u8) -> bool {
    !is_ctl(b) && !matches!(b, b' ' | b'"' | b'#' | b'%' | b'<' | b'>')
}

/// `pchar`: a URI character that does not split the path.
#[inline]
fn is_pchar(b: u8) -> bool {
    is_uri_char(b) && !matches!(b, b'/' | b';' | b'?')
}

/// `token` (RFC 9110 `tchar`), which also excludes `:`.
#[inline]
fn is_token_char(b: u8) -> bool {
    matches!(
        b,
        b'!' | b'#'
            | b'$'
            | b'%'
            | b'&'
            | b'\''
            | b'*'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~'
            | b'0'..=b'9'
            | b'a'..=b'z'
            | b'A'..=b'Z'
    )
}

/// Field values take any non-CTL byte plus HTAB.
#[inline]
fn is_field_value_char(b: u8) -> bool {
    b == b'\t' || !is_ctl(b)
}

// ---------------------------------------------------------------------------
// Tests (unit)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<(String, Vec<u8>)>,
    }

    impl ParserSink for Recorder {
        fn request_method(&mut self, method: &[u8]) {
            self.events.push(("method".into(), method.to_vec()));
        }
        fn request_uri(&mut self, uri: &[u8]) {
            self.events.push(("uri".into(), uri.to_vec()));
        }
        fn request_path(&mut self, path: &[u8]) {
            self.events.push(("path".into(), path.to_vec()));
        }
        fn http_field(&mut self, name: FieldName<'_>, value: &[u8]) {
            self.events.push((name.as_str().to_owned(), value.to_vec()));
        }
    }

    #[test]
    fn token_char_accepts_valid_bytes() {
        for &b in b"abcXYZ019!#$%&'*+-.^_`|~" {
            assert!(is_token_char(b), "expected token char for byte 0x{b:02X}");
        }
    }

    #[test]
    fn token_char_rejects_separators() {
        for &b in b" \t\r\n:@[]{}()\"/" {
            assert!(!is_token_char(b), "expected non-token for byte 0x{b:02X}");
        }
    }

    #[test]
    fn uri_chars_follow_the_unsafe_set() {
        for &b in b"azAZ09-_.!*'(),;/?:@&=+$[]\\^`{|}~" {
            assert!(is_uri_char(b), "0x{b:02X}");
        }
        for &b in b" \"#%<>\x00\x1F\x7F" {
            assert!(!is_uri_char(b), "0x{b:02X}");
        }
        assert!(is_uri_char(0x80));
        assert!(!is_pchar(b'/'));
        assert!(!is_pchar(b'?'));
        assert!(is_pchar(b':'));
    }

    #[test]
    fn trim_ows_strips_both_ends() {
        assert_eq!(trim_ows(b" \ta b\t "), b"a b");
        assert_eq!(trim_ows(b"   "), b"");
        assert_eq!(trim_ows(b""), b"");
    }

    #[test]
    fn method_longer_than_twenty_chars_is_rejected() {
        let mut parser = Parser::new();
        let mut sink = Recorder::default();
        let ok = b"ABCDEFGHIJKLMNOPQRST / HTTP/1.1\r\n\r\n";
        assert!(parser.execute(&mut sink, ok, 0).is_ok());

        parser.reset();
        let bad = b"ABCDEFGHIJKLMNOPQRSTU / HTTP/1.1\r\n\r\n";
        assert!(matches!(
            parser.execute(&mut sink, bad, 0),
            Err(ParseError::UnexpectedByte { offset: 20, .. })
        ));
    }

    #[test]
    fn events_arrive_in_wire_order() {
        let mut parser = Parser::new();
        let mut sink = Recorder::default();
        parser
            .execute(&mut sink, b"GET /x HTTP/1.0\r\nHost: h\r\n\r\n", 0)
            .unwrap();
        let names: Vec<&str> = sink.events.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["method", "path", "uri", "HTTP_HOST"]);
    }

    #[test]
    fn invalid_offset_leaves_state_untouched() {
        let mut parser = Parser::new();
        let mut sink = Recorder::default();
        let buf = b"GET";
        assert_eq!(parser.execute(&mut sink, buf, 0), Ok(3));
        assert_eq!(
            parser.execute(&mut sink, buf, 3),
            Err(ParseError::InvalidOffset { offset: 3, len: 3 })
        );
        assert!(!parser.has_error());
        assert_eq!(parser.nread(), 3);
    }
}
