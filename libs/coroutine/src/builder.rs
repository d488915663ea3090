// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::error::Error;
use crate::{Coroutine, DEFAULT_STACK_SIZE, MIN_STACK_SIZE};
use core::any::Any;
use core::panic::Location;

/// Configures a [`Coroutine`] before creating it.
///
/// ```
/// use coroutine::Builder;
///
/// let co = Builder::new()
///     .name("parser")
///     .stack_size(64 * 1024)
///     .spawn(|| 42)
///     .unwrap();
///
/// let answer = co.next().unwrap().unwrap();
/// assert_eq!(answer.downcast_ref::<i32>(), Some(&42));
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    name: Option<String>,
    stack_size: usize,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            name: None,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }

    /// Names the coroutine. The name shows up in its tracing span.
    ///
    /// By default, coroutines are unnamed.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Overrides the size of the coroutine stack, sizes below [`MIN_STACK_SIZE`] are rounded up.
    ///
    /// By default, stacks are [`DEFAULT_STACK_SIZE`] bytes.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size.max(MIN_STACK_SIZE);
        self
    }

    /// Creates a coroutine running `f`. Nothing runs until the first
    /// [`send`](Coroutine::send).
    ///
    /// A body returning `()` finishes with an empty payload, any other return value is handed to
    /// the final `send` boxed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if the stack could not be allocated.
    #[track_caller]
    pub fn spawn<F, R>(self, f: F) -> Result<Coroutine, Error>
    where
        F: FnOnce() -> R + 'static,
        R: Any,
    {
        let loc = Location::caller();
        Coroutine::build(self.name, self.stack_size, loc, f)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
