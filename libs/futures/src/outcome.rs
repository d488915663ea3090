// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::error::Error;
use crate::failure::Failure;
use core::mem;

/// The result of an asynchronous computation: nothing yet, a value, or a captured failure.
///
/// Outcomes are what flows through a chain of continuations. A continuation receives the outcome
/// of the previous stage by value, so each outcome is consumed at most once downstream.
///
/// For `Outcome<()>` the `Empty` state carries no meaning beyond "not set"; producers only ever
/// store `Value(())` or a `Failure`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// No value or failure was stored yet.
    Empty,
    Value(T),
    Failure(Failure),
}

impl<T> Outcome<T> {
    pub const fn empty() -> Self {
        Self::Empty
    }

    pub const fn from_value(value: T) -> Self {
        Self::Value(value)
    }

    pub fn from_failure(failure: impl Into<Failure>) -> Self {
        Self::Failure(failure.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn has_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    pub fn has_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Returns a reference to the value.
    ///
    /// # Errors
    ///
    /// Re-raises the captured failure as [`Error::Failed`], or returns
    /// [`Error::UninitializedAccess`] if the outcome is empty.
    pub fn value(&self) -> Result<&T, Error> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Failure(failure) => Err(Error::Failed(failure.clone())),
            Self::Empty => Err(Error::UninitializedAccess),
        }
    }

    /// Returns a mutable reference to the value.
    ///
    /// # Errors
    ///
    /// Same as [`Outcome::value`].
    pub fn value_mut(&mut self) -> Result<&mut T, Error> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Failure(failure) => Err(Error::Failed(failure.clone())),
            Self::Empty => Err(Error::UninitializedAccess),
        }
    }

    /// Consumes the outcome, returning the value.
    ///
    /// # Errors
    ///
    /// Same as [`Outcome::value`].
    pub fn into_value(self) -> Result<T, Error> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Failure(failure) => Err(Error::Failed(failure)),
            Self::Empty => Err(Error::UninitializedAccess),
        }
    }

    /// Converts the outcome into a `Result`, or `None` if it is still empty.
    pub fn into_result(self) -> Option<Result<T, Failure>> {
        match self {
            Self::Value(value) => Some(Ok(value)),
            Self::Failure(failure) => Some(Err(failure)),
            Self::Empty => None,
        }
    }

    /// Returns the captured failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongState`] unless the outcome holds a failure.
    pub fn failure(&self) -> Result<&Failure, Error> {
        match self {
            Self::Failure(failure) => Ok(failure),
            _ => Err(Error::WrongState),
        }
    }

    /// Moves the outcome out, leaving `Empty` behind.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Maps the value, passing failures and emptiness through untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Value(value) => Outcome::Value(f(value)),
            Self::Failure(failure) => Outcome::Failure(failure),
            Self::Empty => Outcome::Empty,
        }
    }

    pub fn as_ref(&self) -> Outcome<&T> {
        match self {
            Self::Value(value) => Outcome::Value(value),
            Self::Failure(failure) => Outcome::Failure(failure.clone()),
            Self::Empty => Outcome::Empty,
        }
    }
}

impl<T> Default for Outcome<T> {
    fn default() -> Self {
        Self::Empty
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T>
where
    E: Into<Failure>,
{
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Value(value),
            Err(err) => Self::Failure(err.into()),
        }
    }
}
