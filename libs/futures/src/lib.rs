// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Continuation-chaining completion channels.
//!
//! A [`Promise`] is the write-once producer half, its [`Future`] the consuming half. Consumers
//! either block on the future or attach continuations that run once the [`Outcome`] (a value or
//! a captured [`Failure`]) is available, optionally routed through a [`Scheduler`] supplied by
//! the embedder.
//!
//! ```
//! use futures::Promise;
//!
//! let promise = Promise::new();
//! let future = promise
//!     .get_future()
//!     .then(|outcome| outcome.map(|x: u32| x + 1))
//!     .then(|outcome| outcome.map(|x| x * 2));
//!
//! promise.set_value(5);
//! assert_eq!(future.get(), Ok(12));
//! ```
//!
//! The shared state is guarded by a mutex; continuations are never invoked while it is held, so
//! a continuation may freely touch the promise or future that triggered it.

mod combinator;
mod error;
mod failure;
mod future;
mod loom;
mod outcome;
mod promise;
mod scheduler;
mod state;
mod trampoline;
#[cfg(test)]
mod test_util;

use core::time::Duration;

pub use combinator::when_all;
pub use error::Error;
pub use failure::{Failure, Panicked};
pub use future::Future;
pub use outcome::Outcome;
pub use promise::Promise;
pub use scheduler::{Scheduler, Task};

/// How long [`Future::get`] blocks before giving up.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);
