// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use std::io;

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The coroutine already returned from its body.
    CoroutineFinished,
    /// A payload was sent into a coroutine that has not started yet.
    InvalidArgument,
    /// The coroutine is on the current resume chain (it is running, or resumed the caller).
    AlreadyRunning,
    /// [`suspend`](crate::suspend) was called outside of any coroutine.
    NotInCoroutine,
    /// The stack for a new coroutine could not be allocated.
    Spawn(io::Error),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Spawn(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CoroutineFinished => f.write_str("coroutine already finished"),
            Error::InvalidArgument => {
                f.write_str("a coroutine that has not started can only be sent an empty payload")
            }
            Error::AlreadyRunning => f.write_str("coroutine is already running"),
            Error::NotInCoroutine => f.write_str("not running inside a coroutine"),
            Error::Spawn(_) => f.write_str("failed to allocate coroutine stack"),
        }
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Error::Spawn(err) => Some(err),
            _ => None,
        }
    }
}
