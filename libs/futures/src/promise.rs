// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::error::Error;
use crate::failure::Failure;
use crate::future::Future;
use crate::loom::sync::Arc;
use crate::outcome::Outcome;
use crate::state::{Progress, State};
use core::fmt;

/// The producing half of a [`Future`].
///
/// A promise is completed at most once. The first of [`set_value`](Promise::set_value),
/// [`set_failure`](Promise::set_failure) or [`set_outcome`](Promise::set_outcome) wins; later
/// calls are ignored, so several producers may race to complete the same promise.
///
/// Dropping a promise that was never completed completes it with [`Error::BrokenPromise`].
pub struct Promise<T> {
    state: Arc<State<T>>,
}

impl<T> Promise<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(State::new()),
        }
    }

    /// A promise together with its already claimed future.
    pub(crate) fn pair() -> (Self, Future<T>) {
        let promise = Self::new();
        let claimed = promise.state.claim_future();
        debug_assert!(claimed);
        let future = Future::from_state(promise.state.clone());
        (promise, future)
    }

    /// Returns the future of this promise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRetrieved`] if the future was already handed out.
    pub fn try_get_future(&self) -> Result<Future<T>, Error> {
        if self.state.claim_future() {
            Ok(Future::from_state(self.state.clone()))
        } else {
            Err(Error::AlreadyRetrieved)
        }
    }

    /// Returns the future of this promise.
    ///
    /// # Panics
    ///
    /// Panics if the future was already handed out. Use
    /// [`try_get_future`](Promise::try_get_future) for a fallible version.
    #[track_caller]
    pub fn get_future(&self) -> Future<T> {
        match self.try_get_future() {
            Ok(future) => future,
            Err(_) => panic!("`Promise::get_future` called more than once"),
        }
    }

    /// Completes the promise with `value`. Returns `false` if it was already completed.
    pub fn set_value(&self, value: T) -> bool {
        self.set_outcome(Outcome::Value(value))
    }

    /// Completes the promise with a failure. Returns `false` if it was already completed.
    pub fn set_failure(&self, failure: impl Into<Failure>) -> bool {
        self.set_outcome(Outcome::Failure(failure.into()))
    }

    /// Completes the promise with `outcome`, running the continuation of the future on this
    /// thread if one was attached.
    ///
    /// Returns `false` if the promise was already completed or its future timed out.
    pub fn set_outcome(&self, outcome: Outcome<T>) -> bool {
        self.state.complete(outcome)
    }

    /// Whether the promise was completed (or its future timed out).
    pub fn is_ready(&self) -> bool {
        self.state.progress() != Progress::Pending
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if self.state.progress() == Progress::Pending
            && self
                .state
                .complete(Outcome::Failure(Failure::new(Error::BrokenPromise)))
        {
            tracing::debug!("promise dropped before completion");
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.state)
            .finish()
    }
}
