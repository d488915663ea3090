// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::failure::Failure;
use core::fmt;

/// Conditions reported by outcomes, promises and futures.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// An [`Outcome`](crate::Outcome) was read before a value or failure was stored in it.
    UninitializedAccess,
    /// [`Outcome::failure`](crate::Outcome::failure) was called on an outcome without a failure.
    WrongState,
    /// The future of a promise was already handed out, or its outcome already consumed.
    AlreadyRetrieved,
    /// The deadline passed without an outcome, or the future timed out through
    /// [`Future::on_timeout`](crate::Future::on_timeout).
    Timeout,
    /// The producing [`Promise`](crate::Promise) was dropped without completing.
    BrokenPromise,
    /// The outcome holds a failure, re-raised to the reader.
    Failed(Failure),
}

impl Error {
    /// Returns the captured failure if this error re-raises one.
    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            Error::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Converts the error into a [`Failure`] that can be stored in an outcome.
    ///
    /// A re-raised failure is handed back as is instead of being wrapped again.
    pub fn into_failure(self) -> Failure {
        match self {
            Error::Failed(failure) => failure,
            err => Failure::new(err),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UninitializedAccess => f.write_str("outcome read before it was set"),
            Error::WrongState => f.write_str("outcome does not hold a failure"),
            Error::AlreadyRetrieved => f.write_str("future already retrieved"),
            Error::Timeout => f.write_str("future timed out"),
            Error::BrokenPromise => f.write_str("promise dropped without completing"),
            Error::Failed(failure) => fmt::Display::fmt(failure, f),
        }
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Error::Failed(failure) => Some(failure.as_error()),
            _ => None,
        }
    }
}
