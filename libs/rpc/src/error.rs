// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::kind::ErrorKind;
use core::fmt;
use serde_json::Value;

/// A notification could not be handled. Notifications carry no id, so nothing is sent back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyError {
    kind: ErrorKind,
    detail: String,
}

impl NotifyError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.kind.as_str())
    }
}

impl core::error::Error for NotifyError {}

/// A request could not be handled, answered with an error response for `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestError {
    kind: ErrorKind,
    id: Value,
    detail: String,
}

impl RequestError {
    pub fn new(kind: ErrorKind, id: Value, detail: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn id(&self) -> &Value {
        &self.id
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// The error response to send back.
    pub fn to_response(&self) -> Value {
        crate::error_response(self.id.clone(), self.kind, &self.detail)
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.kind.as_str())
    }
}

impl core::error::Error for RequestError {}

/// The peer answered with an error, or with something that is not a valid response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseError {
    message: String,
    id: Option<i32>,
}

impl ResponseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            id: None,
        }
    }

    pub fn with_id(message: impl Into<String>, id: i32) -> Self {
        Self {
            message: message.into(),
            id: Some(id),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The id of the request the response belongs to, if it could be determined.
    pub fn id(&self) -> Option<i32> {
        self.id
    }
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{} (request {id})", self.message),
            None => f.pad(&self.message),
        }
    }
}

impl core::error::Error for ResponseError {}

/// Misuse of a client stub, e.g. calling a method that was never registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubError {
    message: String,
}

impl StubError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for StubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.message)
    }
}

impl core::error::Error for StubError {}
