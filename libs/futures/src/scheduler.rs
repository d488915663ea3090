// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::time::Duration;
use std::sync::Arc;

/// A unit of deferred work handed to a [`Scheduler`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs callbacks on behalf of futures.
///
/// This crate ships no implementation, event loops and thread pools are supplied by the embedder.
/// Implementations must uphold two guarantees:
///
/// - submitting never blocks the caller, and
/// - every submitted task eventually runs exactly once.
///
/// Nothing is assumed about *where* a task runs; it may be the submitting thread (on a later turn
/// of an event loop) or any other.
pub trait Scheduler: Send + Sync {
    /// Submits `task` for near-term execution.
    fn schedule(&self, task: Task);

    /// Submits `task` for execution no earlier than `delay` from now.
    fn schedule_after(&self, delay: Duration, task: Task);
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn schedule(&self, task: Task) {
        (**self).schedule(task);
    }

    fn schedule_after(&self, delay: Duration, task: Task) {
        (**self).schedule_after(delay, task);
    }
}

impl<S: Scheduler + ?Sized> Scheduler for &S {
    fn schedule(&self, task: Task) {
        (**self).schedule(task);
    }

    fn schedule_after(&self, delay: Duration, task: Task) {
        (**self).schedule_after(delay, task);
    }
}
