// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The completion state shared between a [`Promise`](crate::Promise) and its
//! [`Future`](crate::Future).
//!
//! ```text
//! Pending --complete--> Completed --take/subscribe--> Retrieved
//!    |  \
//!    |   `--complete while subscribed--> Retrieved
//!    `--expire--> TimedOut
//! ```
//!
//! Every transition happens under the mutex. User code (continuations, and the drop glue of
//! continuations that will never run) is only ever invoked after the guard is released.

use crate::error::Error;
use crate::loom::sync::atomic::{AtomicBool, Ordering};
use crate::loom::sync::{Mutex, MutexGuard};
use crate::outcome::Outcome;
use core::fmt;
use std::sync::PoisonError;

pub(crate) type Continuation<T> = Box<dyn FnOnce(Outcome<T>) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Progress {
    /// No outcome yet.
    Pending,
    /// The timeout fired before an outcome arrived. Terminal.
    TimedOut,
    /// The outcome is stored and waits for a consumer.
    Completed,
    /// The outcome was handed to a consumer. Terminal.
    Retrieved,
}

pub(crate) struct State<T> {
    /// Claimed by the first `Promise::get_future`.
    future_claimed: AtomicBool,
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    progress: Progress,
    outcome: Outcome<T>,
    continuation: Option<Continuation<T>>,
}

/// Result of registering a continuation.
pub(crate) enum Subscribe<T> {
    /// Stored, it will be invoked by whoever completes the state.
    Stored,
    /// The outcome was already there, the caller must invoke the continuation.
    Ready(Continuation<T>, Outcome<T>),
    /// The state can never produce an outcome, the continuation is handed back to be dropped.
    Rejected(Continuation<T>, Error),
}

/// Result of taking the outcome directly.
pub(crate) enum Take<T> {
    Ready(Outcome<T>),
    Pending,
}

impl<T> State<T> {
    pub(crate) fn new() -> Self {
        Self {
            future_claimed: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                progress: Progress::Pending,
                outcome: Outcome::Empty,
                continuation: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        // user code never runs under the lock, a poisoned lock still holds a consistent state
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims the consumer side. Returns `false` if it was claimed before.
    pub(crate) fn claim_future(&self) -> bool {
        self.future_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn progress(&self) -> Progress {
        self.lock().progress
    }

    /// Moves the state from `Pending` to `Completed` (or straight to `Retrieved` when a
    /// continuation is waiting, which is then invoked on the calling thread).
    ///
    /// Returns `false` without touching anything if the state already left `Pending`.
    pub(crate) fn complete(&self, outcome: Outcome<T>) -> bool {
        let mut inner = self.lock();
        if inner.progress != Progress::Pending {
            tracing::trace!(progress = ?inner.progress, "ignoring repeated completion");
            return false;
        }

        if let Some(continuation) = inner.continuation.take() {
            inner.progress = Progress::Retrieved;
            drop(inner);

            tracing::trace!("completed, running continuation");
            continuation(outcome);
        } else {
            inner.progress = Progress::Completed;
            inner.outcome = outcome;
            tracing::trace!("completed");
        }

        true
    }

    /// Moves the state from `Pending` to `TimedOut`, dropping any registered continuation.
    ///
    /// Returns `false` if an outcome arrived first.
    pub(crate) fn expire(&self) -> bool {
        let mut inner = self.lock();
        if inner.progress != Progress::Pending {
            return false;
        }

        inner.progress = Progress::TimedOut;
        let continuation = inner.continuation.take();
        drop(inner);

        tracing::debug!(
            had_continuation = continuation.is_some(),
            "timed out before completion"
        );
        drop(continuation);

        true
    }

    /// Registers `continuation` to receive the outcome.
    pub(crate) fn subscribe(&self, continuation: Continuation<T>) -> Subscribe<T> {
        let mut inner = self.lock();
        match inner.progress {
            Progress::Pending => {
                debug_assert!(
                    inner.continuation.is_none(),
                    "a completion state only ever has one consumer"
                );
                inner.continuation = Some(continuation);
                Subscribe::Stored
            }
            Progress::Completed => {
                inner.progress = Progress::Retrieved;
                let outcome = inner.outcome.take();
                Subscribe::Ready(continuation, outcome)
            }
            Progress::TimedOut => Subscribe::Rejected(continuation, Error::Timeout),
            Progress::Retrieved => Subscribe::Rejected(continuation, Error::AlreadyRetrieved),
        }
    }

    /// Takes the outcome if it is available.
    pub(crate) fn take(&self) -> Result<Take<T>, Error> {
        let mut inner = self.lock();
        match inner.progress {
            Progress::Pending => Ok(Take::Pending),
            Progress::Completed => {
                inner.progress = Progress::Retrieved;
                Ok(Take::Ready(inner.outcome.take()))
            }
            Progress::TimedOut => Err(Error::Timeout),
            Progress::Retrieved => Err(Error::AlreadyRetrieved),
        }
    }
}

impl<T> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("State")
            .field(
                "future_claimed",
                &self.future_claimed.load(Ordering::Relaxed),
            )
            .field("progress", &inner.progress)
            .field("has_continuation", &inner.continuation.is_some())
            .finish_non_exhaustive()
    }
}
