use std::borrow::Cow;
use std::fmt;

/// Prefix put in front of every normalised header field name.
pub const HTTP_PREFIX: &str = "HTTP_";

pub const REQUEST_METHOD: &str = "REQUEST_METHOD";
pub const REQUEST_URI: &str = "REQUEST_URI";
pub const REQUEST_PATH: &str = "REQUEST_PATH";
pub const QUERY_STRING: &str = "QUERY_STRING";
pub const FRAGMENT: &str = "FRAGMENT";
pub const SERVER_PROTOCOL: &str = "SERVER_PROTOCOL";

/// Header names seen on nearly every request, already in their
/// environment form. Sorted so lookups can binary-search.
static COMMON_FIELDS: &[&str] = &[
    "HTTP_ACCEPT",
    "HTTP_ACCEPT_CHARSET",
    "HTTP_ACCEPT_ENCODING",
    "HTTP_ACCEPT_LANGUAGE",
    "HTTP_ALLOW",
    "HTTP_AUTHORIZATION",
    "HTTP_CACHE_CONTROL",
    "HTTP_CONNECTION",
    "HTTP_CONTENT_ENCODING",
    "HTTP_CONTENT_LENGTH",
    "HTTP_CONTENT_TYPE",
    "HTTP_COOKIE",
    "HTTP_DATE",
    "HTTP_EXPECT",
    "HTTP_FROM",
    "HTTP_HOST",
    "HTTP_IF_MATCH",
    "HTTP_IF_MODIFIED_SINCE",
    "HTTP_IF_NONE_MATCH",
    "HTTP_IF_RANGE",
    "HTTP_IF_UNMODIFIED_SINCE",
    "HTTP_KEEP_ALIVE",
    "HTTP_MAX_FORWARDS",
    "HTTP_PRAGMA",
    "HTTP_PROXY_AUTHORIZATION",
    "HTTP_RANGE",
    "HTTP_REFERER",
    "HTTP_TE",
    "HTTP_TRAILER",
    "HTTP_TRANSFER_ENCODING",
    "HTTP_UPGRADE",
    "HTTP_USER_AGENT",
    "HTTP_VIA",
    "HTTP_WARNING",
    "HTTP_X_FORWARDED_FOR",
    "HTTP_X_REAL_IP",
];

/// A normalised header field name handed to a [`ParserSink`](crate::ParserSink).
///
/// Well-known names come from a static table and can be stored without
/// allocating; anything else borrows the parser's scratch buffer for the
/// duration of the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldName<'a> {
    Common(&'static str),
    Custom(&'a str),
}

impl<'a> FieldName<'a> {
    /// Resolve an already-normalised name against the common table.
    pub fn intern(normalized: &'a str) -> Self {
        match COMMON_FIELDS.binary_search_by(|probe| (*probe).cmp(normalized)) {
            Ok(idx) => Self::Common(COMMON_FIELDS[idx]),
            Err(_) => Self::Custom(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Common(s) => s,
            Self::Custom(s) => s,
        }
    }

    /// Owned form; free for common names.
    pub fn to_cow(&self) -> Cow<'static, str> {
        match self {
            Self::Common(s) => Cow::Borrowed(*s),
            Self::Custom(s) => Cow::Owned((*s).to_owned()),
        }
    }

    pub fn is_common(&self) -> bool {
        matches!(self, Self::Common(_))
    }
}

impl fmt::Display for FieldName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upper-case ASCII letters and turn `-` into `_`.
#[inline]
pub fn normalize_byte(b: u8) -> u8 {
    match b {
        b'-' => b'_',
        _ => b.to_ascii_uppercase(),
    }
}

/// Write `HTTP_<NAME>` for a raw header name into `out`, replacing its
/// previous contents.
///
/// Header names are restricted to token characters, so the result is
/// always ASCII.
pub fn normalize_into(raw: &[u8], out: &mut String) {
    out.clear();
    out.reserve(HTTP_PREFIX.len() + raw.len());
    out.push_str(HTTP_PREFIX);
    out.extend(raw.iter().map(|&b| char::from(normalize_byte(b))));
}

/// Environment key for a raw header name, e.g. `Content-Type` ->
/// `HTTP_CONTENT_TYPE`.
pub fn env_key(raw_name: &str) -> Cow<'static, str> {
    let mut buf = String::new();
    normalize_into(raw_name.as_bytes(), &mut buf);
    if let FieldName::Common(s) = FieldName::intern(&buf) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_table_is_sorted_and_unique() {
        for pair in COMMON_FIELDS.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn known_names_are_interned() {
        let mut buf = String::new();
        normalize_into(b"user-agent", &mut buf);
        assert_eq!(buf, "HTTP_USER_AGENT");
        let name = FieldName::intern(&buf);
        assert!(name.is_common());
        assert_eq!(name.as_str(), "HTTP_USER_AGENT");
    }

    #[test]
    fn unknown_names_borrow_the_scratch_buffer() {
        let mut buf = String::new();
        normalize_into(b"X-Request-Id", &mut buf);
        let name = FieldName::intern(&buf);
        assert_eq!(name, FieldName::Custom("HTTP_X_REQUEST_ID"));
        assert!(matches!(name.to_cow(), Cow::Owned(_)));
    }

    #[test]
    fn env_key_matches_parser_normalisation() {
        assert_eq!(env_key("Host"), "HTTP_HOST");
        assert_eq!(env_key("x-foo"), "HTTP_X_FOO");
        assert!(matches!(env_key("Content-Type"), Cow::Borrowed(_)));
    }
}
