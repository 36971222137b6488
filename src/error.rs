use thiserror::Error;

/// Errors reported by the request [`Parser`](crate::Parser).
///
/// Every variant except [`ParseError::InvalidOffset`] and
/// [`ParseError::IncompleteRequest`] is terminal: the parser stays in its
/// error state until it is reset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A byte was rejected by the request grammar.
    #[error("unexpected byte 0x{found:02X} at offset {offset} (expected {expected})")]
    UnexpectedByte {
        /// Human-readable description of what was expected.
        expected: &'static str,
        /// The byte that was found.
        found: u8,
        /// Offset of the byte in the buffer handed to `execute`.
        offset: usize,
    },
    /// A header field name exceeds its configured maximum.
    #[error("HTTP element FIELD_NAME is longer than the {max} allowed length")]
    FieldNameTooLong { max: usize },
    /// A header field value exceeds its configured maximum.
    #[error("HTTP element FIELD_VALUE is longer than the {max} allowed length")]
    FieldValueTooLong { max: usize },
    /// The request target exceeds its configured maximum.
    #[error("HTTP element REQUEST_URI is longer than the {max} allowed length")]
    RequestUriTooLong { max: usize },
    /// The path component of the request target exceeds its maximum.
    #[error("HTTP element REQUEST_PATH is longer than the {max} allowed length")]
    RequestPathTooLong { max: usize },
    /// The query string exceeds its configured maximum.
    #[error("HTTP element QUERY_STRING is longer than the {max} allowed length")]
    QueryStringTooLong { max: usize },
    /// The fragment exceeds its configured maximum.
    #[error("HTTP element FRAGMENT is longer than the {max} allowed length")]
    FragmentTooLong { max: usize },
    /// The whole header block exceeds its configured maximum.
    #[error("HTTP element HEADER is longer than the {max} allowed length")]
    HeaderTooLong { max: usize },
    /// `execute` was asked to start at or past the end of the buffer.
    #[error("requested start {offset} is at or after data buffer end {len}")]
    InvalidOffset { offset: usize, len: usize },
    /// The input ended before the header block was complete.
    #[error("incomplete HTTP request")]
    IncompleteRequest,
}

impl ParseError {
    /// `true` for the size-limit family of errors (a host usually answers
    /// these with 413/414/431 rather than a plain 400).
    pub fn is_limit(&self) -> bool {
        matches!(
            self,
            Self::FieldNameTooLong { .. }
                | Self::FieldValueTooLong { .. }
                | Self::RequestUriTooLong { .. }
                | Self::RequestPathTooLong { .. }
                | Self::QueryStringTooLong { .. }
                | Self::FragmentTooLong { .. }
                | Self::HeaderTooLong { .. }
        )
    }
}

/// Errors reported when registering or removing classifier keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifierError {
    #[error("URI was empty")]
    NullKey,
    /// The key holds a NUL byte, or starts with a byte outside `1..=126`.
    #[error("invalid byte 0x{byte:02X} at index {index} in key")]
    InvalidKey { byte: u8, index: usize },
    #[error("handler already registered with that name")]
    DuplicateKey,
    #[error("memory error registering handler")]
    AllocationFailed,
}

/// Errors reported by the streaming [`BoundarySearch`](crate::BoundarySearch).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("needle must not be empty")]
    EmptyNeedle,
    /// More matches were found than fit before the next `pop`.
    #[error("more than {max} matches recorded before pop")]
    TooManyMatches { max: usize },
}
