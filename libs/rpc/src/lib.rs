// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! JSON-RPC 2.0 error kinds, error types and response envelopes.
//!
//! The error types implement [`core::error::Error`] so they can travel through the failure slot
//! of a future unchanged and be recovered by downcasting on the other side.

mod error;
mod kind;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub use error::{NotifyError, RequestError, ResponseError, StubError};
pub use kind::{ErrorKind, UnknownCode};

pub const JSONRPC_VERSION: &str = "2.0";

/// The `error` member of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn new(kind: ErrorKind, detail: &str) -> Self {
        Self {
            code: kind.code(),
            message: kind.as_str().to_string(),
            data: (!detail.is_empty()).then(|| Value::from(detail)),
        }
    }

    /// The reserved kind of this error, `None` for application defined codes.
    pub fn kind(&self) -> Option<ErrorKind> {
        ErrorKind::from_code(self.code)
    }
}

/// A successful response to request `id`.
pub fn response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result,
    })
}

/// An error response to request `id`. An empty `detail` is left out of the error object.
pub fn error_response(id: Value, kind: ErrorKind, detail: &str) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": ErrorObject::new(kind, detail),
    })
}

/// Validates a response received from a peer and returns its `result` member.
///
/// # Errors
///
/// Returns a [`ResponseError`] carrying the request id (when it is a valid `i32`) if the peer
/// answered with an error object, or if `response` is not a well-formed JSON-RPC 2.0 response.
pub fn check_response(response: &Value) -> Result<&Value, ResponseError> {
    let id = response
        .get("id")
        .and_then(Value::as_i64)
        .and_then(|id| i32::try_from(id).ok());
    let fail = |message: &str| match id {
        Some(id) => ResponseError::with_id(message, id),
        None => ResponseError::new(message),
    };

    if response.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(fail("missing or unsupported jsonrpc version"));
    }

    if let Some(error) = response.get("error") {
        return Err(match ErrorObject::deserialize(error) {
            Ok(error) => fail(&error.message),
            Err(_) => fail("malformed error object"),
        });
    }

    response
        .get("result")
        .ok_or_else(|| fail("response has neither result nor error"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{Failure, Future};

    #[test]
    fn success_envelope() {
        let resp = response(json!(1), json!({"sum": 3}));
        assert_eq!(
            resp,
            json!({"jsonrpc": "2.0", "id": 1, "result": {"sum": 3}})
        );
        assert_eq!(check_response(&resp), Ok(&json!({"sum": 3})));
    }

    #[test]
    fn error_envelope() {
        let resp = error_response(json!("abc"), ErrorKind::MethodNotFound, "no such method: add");
        assert_eq!(
            resp,
            json!({
                "jsonrpc": "2.0",
                "id": "abc",
                "error": {
                    "code": -32601,
                    "message": "Method not found",
                    "data": "no such method: add",
                },
            })
        );

        let resp = error_response(Value::Null, ErrorKind::ParseError, "");
        assert_eq!(resp["error"], json!({"code": -32700, "message": "Parse error"}));
    }

    #[test]
    fn request_error_answers_its_id() {
        let err = RequestError::new(ErrorKind::InvalidParams, json!(7), "expected two numbers");
        assert_eq!(err.to_string(), "Invalid params");
        assert_eq!(err.detail(), "expected two numbers");

        let resp = err.to_response();
        assert_eq!(resp["id"], json!(7));
        assert_eq!(resp["error"]["code"], json!(-32602));
    }

    #[test]
    fn checking_error_responses() {
        let resp = error_response(json!(4), ErrorKind::InternalError, "db down");
        let err = check_response(&resp).unwrap_err();
        assert_eq!(err, ResponseError::with_id("Internal error", 4));

        let err = check_response(&json!({"jsonrpc": "2.0"})).unwrap_err();
        assert_eq!(err.id(), None);
        assert_eq!(err.message(), "response has neither result nor error");

        let err = check_response(&json!({"id": 2, "result": 1})).unwrap_err();
        assert_eq!(err.id(), Some(2));

        let err = check_response(&json!({"jsonrpc": "2.0", "id": 3, "error": "oops"})).unwrap_err();
        assert_eq!(err.message(), "malformed error object");
    }

    #[test]
    fn errors_travel_through_futures() {
        let err = NotifyError::new(ErrorKind::InvalidRequest, "missing method");
        let future = Future::<Value>::failed(err.clone()).recover(|failure: Failure| {
            let err = failure.downcast_ref::<NotifyError>().unwrap();
            json!(err.kind().code())
        });
        assert_eq!(future.get(), Ok(json!(-32600)));

        let stub = Failure::new(StubError::new("method `add` is not registered"));
        assert!(stub.is::<StubError>());
        assert_eq!(stub.to_string(), "method `add` is not registered");
    }
}
