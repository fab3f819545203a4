//! JSON-RPC 2.0 error codes returned by the Kodi server.
//!
//! Kodi reports failed requests with a standard JSON-RPC `error` object. The
//! numeric code is mapped onto [`ErrorCode`] so that log output and callers can
//! match on it without remembering the magic numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error codes carried in a JSON-RPC `error` object.
///
/// Codes outside the reserved JSON-RPC range are preserved in
/// [`ErrorCode::Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum ErrorCode {
    /// Invalid JSON was received by the server.
    ParseError,
    /// The JSON sent is not a valid request object.
    InvalidRequest,
    /// The method does not exist or is not available.
    MethodNotFound,
    /// Invalid method parameters.
    InvalidParams,
    /// Internal JSON-RPC error.
    InternalError,
    /// Implementation-defined server error code.
    Server(i64),
}

impl ErrorCode {
    /// Returns the numeric wire value of this code.
    pub fn code(self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::Server(code) => code,
        }
    }

    /// Returns a human-readable description of this error code.
    pub fn description(self) -> &'static str {
        match self {
            Self::ParseError => "The server could not parse the request JSON.",
            Self::InvalidRequest => "The request is not a valid JSON-RPC request object.",
            Self::MethodNotFound => "The requested method does not exist on the server.",
            Self::InvalidParams => "The request parameters were rejected by the server.",
            Self::InternalError => "The server hit an internal error handling the request.",
            Self::Server(_) => "The server reported an implementation-defined error.",
        }
    }
}

impl From<i64> for ErrorCode {
    fn from(code: i64) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            other => Self::Server(other),
        }
    }
}

impl From<ErrorCode> for i64 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParseError => f.write_str("PARSE_ERROR"),
            Self::InvalidRequest => f.write_str("INVALID_REQUEST"),
            Self::MethodNotFound => f.write_str("METHOD_NOT_FOUND"),
            Self::InvalidParams => f.write_str("INVALID_PARAMS"),
            Self::InternalError => f.write_str("INTERNAL_ERROR"),
            Self::Server(code) => write!(f, "SERVER_ERROR({code})"),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn reserved_codes_map_to_named_variants() {
        assert_eq!(ErrorCode::from(-32601), ErrorCode::MethodNotFound);
        assert_eq!(ErrorCode::from(-32602), ErrorCode::InvalidParams);
        assert_eq!(ErrorCode::MethodNotFound.code(), -32601);
    }

    #[test]
    fn unknown_codes_are_preserved() {
        let code: ErrorCode = serde_json::from_str("-32100").unwrap();
        assert_eq!(code, ErrorCode::Server(-32100));
        assert_eq!(serde_json::to_string(&code).unwrap(), "-32100");
    }

    #[test]
    fn display_uses_screaming_snake_case() {
        assert_eq!(ErrorCode::InvalidParams.to_string(), "INVALID_PARAMS");
        assert_eq!(ErrorCode::Server(7).to_string(), "SERVER_ERROR(7)");
    }

    #[test]
    fn every_code_has_a_description() {
        for code in [
            ErrorCode::ParseError,
            ErrorCode::InvalidRequest,
            ErrorCode::MethodNotFound,
            ErrorCode::InvalidParams,
            ErrorCode::InternalError,
            ErrorCode::Server(1),
        ] {
            assert!(!code.description().is_empty());
        }
    }
}
