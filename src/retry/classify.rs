// ABOUTME: Failure classification for retry decisions.
// ABOUTME: Network and temporary failures are retried; permanent ones never are.

use std::fmt;

/// How a failure is expected to behave if the operation is tried again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Connection reset, timeout, DNS failure, refused connection.
    Network,
    /// Server-side 5xx, rate limiting, or anything unrecognized.
    Temporary,
    /// Authentication, authorization, or missing resource. Will not self-resolve.
    Permanent,
}

impl ErrorClass {
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorClass::Permanent)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Network => "network",
            ErrorClass::Temporary => "temporary",
            ErrorClass::Permanent => "permanent",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that know their own retry class.
pub trait Classify {
    fn class(&self) -> ErrorClass;
}

const NETWORK_INDICATORS: &[&str] = &[
    "connection",
    "timeout",
    "timed out",
    "network",
    "dns",
    "resolve",
    "refused",
    "unreachable",
    "reset",
    "broken pipe",
    "no route to host",
    "temporary failure",
];

const SERVER_ERROR_CODES: &[&str] = &["500", "502", "503", "504"];

const RATE_LIMIT_INDICATORS: &[&str] = &["429", "rate limit", "too many requests"];

const AUTH_INDICATORS: &[&str] = &[
    "401",
    "403",
    "unauthorized",
    "forbidden",
    "authentication required",
    "denied",
];

const MISSING_INDICATORS: &[&str] = &["404", "not found", "manifest unknown", "name unknown"];

/// Classify a free-text error message, e.g. registry tool stderr.
///
/// Checked in order: network, 5xx, rate limiting, auth, not-found. Anything
/// else is treated as temporary so that unknown failures get retried.
pub fn classify_message(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    let contains_any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if contains_any(NETWORK_INDICATORS) {
        ErrorClass::Network
    } else if contains_any(SERVER_ERROR_CODES) || contains_any(RATE_LIMIT_INDICATORS) {
        ErrorClass::Temporary
    } else if contains_any(AUTH_INDICATORS) || contains_any(MISSING_INDICATORS) {
        ErrorClass::Permanent
    } else {
        ErrorClass::Temporary
    }
}

/// Classify an HTTP status code.
pub fn classify_status(status: u16) -> ErrorClass {
    match status {
        429 => ErrorClass::Temporary,
        401 | 403 | 404 => ErrorClass::Permanent,
        500..=599 => ErrorClass::Temporary,
        _ => ErrorClass::Temporary,
    }
}

impl Classify for std::io::Error {
    fn class(&self) -> ErrorClass {
        use std::io::ErrorKind;
        match self.kind() {
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::TimedOut
            | ErrorKind::HostUnreachable
            | ErrorKind::NetworkUnreachable => ErrorClass::Network,
            ErrorKind::PermissionDenied | ErrorKind::NotFound => ErrorClass::Permanent,
            _ => classify_message(&self.to_string()),
        }
    }
}
