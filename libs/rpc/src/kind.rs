// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use serde::{Deserialize, Serialize};

/// The error codes reserved by JSON-RPC 2.0.
///
/// Serializes as its numeric code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum ErrorKind {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
}

impl ErrorKind {
    pub const fn code(self) -> i32 {
        match self {
            ErrorKind::ParseError => -32700,
            ErrorKind::InvalidRequest => -32600,
            ErrorKind::MethodNotFound => -32601,
            ErrorKind::InvalidParams => -32602,
            ErrorKind::InternalError => -32603,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ParseError => "Parse error",
            ErrorKind::InvalidRequest => "Invalid request",
            ErrorKind::MethodNotFound => "Method not found",
            ErrorKind::InvalidParams => "Invalid params",
            ErrorKind::InternalError => "Internal error",
        }
    }

    /// Looks up the kind for a reserved code.
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            -32700 => Some(ErrorKind::ParseError),
            -32600 => Some(ErrorKind::InvalidRequest),
            -32601 => Some(ErrorKind::MethodNotFound),
            -32602 => Some(ErrorKind::InvalidParams),
            -32603 => Some(ErrorKind::InternalError),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl From<ErrorKind> for i32 {
    fn from(kind: ErrorKind) -> Self {
        kind.code()
    }
}

/// A code outside the reserved JSON-RPC range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnknownCode(pub i32);

impl fmt::Display for UnknownCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown JSON-RPC error code {}", self.0)
    }
}

impl core::error::Error for UnknownCode {}

impl TryFrom<i32> for ErrorKind {
    type Error = UnknownCode;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(UnknownCode(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ErrorKind; 5] = [
        ErrorKind::ParseError,
        ErrorKind::InvalidRequest,
        ErrorKind::MethodNotFound,
        ErrorKind::InvalidParams,
        ErrorKind::InternalError,
    ];

    #[test]
    fn codes_and_strings() {
        let table: Vec<_> = ALL.iter().map(|kind| (kind.code(), kind.as_str())).collect();
        assert_eq!(
            table,
            [
                (-32700, "Parse error"),
                (-32600, "Invalid request"),
                (-32601, "Method not found"),
                (-32602, "Invalid params"),
                (-32603, "Internal error"),
            ]
        );
    }

    #[test]
    fn lookup_by_code() {
        for kind in ALL {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code(-32000), None);
        assert_eq!(ErrorKind::try_from(0), Err(UnknownCode(0)));
    }

    #[test]
    fn serializes_as_code() {
        assert_eq!(
            serde_json::to_value(ErrorKind::MethodNotFound).unwrap(),
            serde_json::json!(-32601)
        );
        let kind: ErrorKind = serde_json::from_value(serde_json::json!(-32602)).unwrap();
        assert_eq!(kind, ErrorKind::InvalidParams);
        assert!(serde_json::from_value::<ErrorKind>(serde_json::json!(7)).is_err());
    }
}
