use thiserror::Error;

pub type Result<T> = std::result::Result<T, RequestError>;

/// Caller input that prevents an operation from starting at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("host list is empty")]
    EmptyHostList,

    #[error("invalid port: {0}")]
    InvalidPort(u16),

    #[error("invalid host: {0:?}")]
    InvalidHost(String),

    #[error("max concurrency must be greater than zero")]
    InvalidConcurrency,
}

/// Why a single fetch against one host did not produce a body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchCause {
    #[error("connection refused")]
    ConnectionRefused,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("context canceled")]
    Cancelled,

    #[error("unexpected HTTP status: {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
}

/// A failed retrieval, attributed to exactly one host.
///
/// Display renders only the cause, so that the same failure on many hosts
/// groups under a single message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{cause}")]
pub struct FetchError {
    pub host: String,
    pub cause: FetchCause,
}

impl FetchError {
    pub fn new(host: impl Into<String>, cause: FetchCause) -> Self {
        Self {
            host: host.into(),
            cause,
        }
    }
}

/// Structurally invalid exposition text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("text format parsing error in line {line}: {reason}")]
pub struct ParseError {
    pub line: usize,
    pub reason: String,
}

impl ParseError {
    pub(crate) fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

/// Per-host failure value: either the fetch or the parse of that host's body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Summary of a response whose host error map is not empty.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{failed} {} had errors", host_noun(.failed))]
pub struct HostErrorsError {
    pub failed: usize,
}

fn host_noun(count: &usize) -> &'static str {
    if *count == 1 {
        "host"
    } else {
        "hosts"
    }
}
