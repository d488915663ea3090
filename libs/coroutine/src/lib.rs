// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Stackful cooperative coroutines.
//!
//! A [`Coroutine`] runs its body on a call stack of its own. Control moves explicitly: the
//! resumer calls [`Coroutine::send`], the body hands control back with [`suspend`] (or by
//! returning), and every switch carries an optional type-erased payload both ways. All local
//! state of the body survives a suspension, so code that waits on something can be written
//! sequentially.
//!
//! ```
//! use coroutine::{Coroutine, suspend};
//!
//! let x = 21_i32;
//! let co = Coroutine::new(move || {
//!     suspend(Some(Box::new("first"))).unwrap();
//!     x * 2
//! })
//! .unwrap();
//!
//! let first = co.next().unwrap().unwrap();
//! assert_eq!(first.downcast_ref::<&str>(), Some(&"first"));
//!
//! let last = co.send(Some(Box::new("ignored"))).unwrap().unwrap();
//! assert_eq!(last.downcast_ref::<i32>(), Some(&42));
//!
//! assert!(co.next().is_err());
//! ```
//!
//! Coroutines are bound to the thread that created them. Each thread keeps its own resume chain
//! and its own implicit main coroutine ([`Id::MAIN`]).
//!
//! # Panics
//!
//! A panic that escapes the body is caught on the coroutine stack, the coroutine is marked
//! finished and the panic continues unwinding out of the `send` that resumed it.
//!
//! # Dropping
//!
//! Dropping a coroutine that is suspended mid-body resumes it one last time and unwinds its
//! stack, so the locals of the body are dropped before the stack is released.

mod builder;
mod current;
mod error;
mod id;

use crate::current::{ForcedUnwind, Resume, SuspendSlot, Suspender};
use core::any::Any;
use core::cell::{Cell, RefCell};
use core::fmt;
use core::panic::Location;
use core::ptr::NonNull;
use fiber::stack::{DefaultFiberStack, FiberStack};
use fiber::{Fiber, FiberResult};
use std::panic::{self, AssertUnwindSafe};

pub use builder::Builder;
pub use current::{current_id, suspend};
pub use error::Error;
pub use id::Id;

/// Payload carried by a switch between coroutines.
pub type Value = Box<dyn Any>;

/// Stack size of coroutines that don't ask for a specific one.
pub const DEFAULT_STACK_SIZE: usize = 256 * 1024;
/// Smallest stack a coroutine is created with.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    /// Created, the body has not started.
    Init,
    /// The body started and has not returned yet.
    Running,
    /// The body returned (or panicked). Terminal.
    Finished,
}

type Body = Result<Option<Value>, Box<dyn Any + Send>>;

pub struct Coroutine {
    id: Id,
    name: Option<String>,
    span: tracing::Span,
    state: Cell<State>,
    suspend: SuspendSlot,
    fiber: RefCell<CoroutineFiber>,
}

type CoroutineFiber = Fiber<Resume, Option<Value>, Body, DefaultFiberStack>;

impl Coroutine {
    /// Creates a coroutine with default settings, see [`Builder::spawn`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if the stack could not be allocated.
    #[track_caller]
    pub fn new<F, R>(f: F) -> Result<Self, Error>
    where
        F: FnOnce() -> R + 'static,
        R: Any,
    {
        Builder::new().spawn(f)
    }

    pub(crate) fn build<F, R>(
        name: Option<String>,
        stack_size: usize,
        loc: &Location<'_>,
        f: F,
    ) -> Result<Self, Error>
    where
        F: FnOnce() -> R + 'static,
        R: Any,
    {
        let stack = DefaultFiberStack::new(stack_size)?;
        let id = Id::next();

        let span = tracing::trace_span!(
            "coroutine",
            coroutine.id = id.as_u64(),
            coroutine.name = ?name,
            loc.file = loc.file(),
            loc.line = loc.line(),
            loc.col = loc.column(),
        );

        // the fiber stores its entry closure on the new stack, keep that a single pointer no
        // matter what the body captures
        let body: Box<dyn FnOnce() -> R> = Box::new(f);

        let suspend_slot = SuspendSlot::default();
        let slot = suspend_slot.clone();
        let fiber = Fiber::with_stack(stack, move |input: Resume, suspend: &Suspender| {
            debug_assert!(matches!(input, Resume::Send(None)));
            slot.set(Some(NonNull::from(suspend)));
            drop(slot);

            panic::catch_unwind(AssertUnwindSafe(body)).map(into_payload)
        });

        tracing::trace!(coroutine.id = id.as_u64(), stack_size, "created coroutine");

        Ok(Self {
            id,
            name,
            span,
            state: Cell::new(State::Init),
            suspend: suspend_slot,
            fiber: RefCell::new(fiber),
        })
    }

    /// Resumes the coroutine, delivering `value` as the return value of its pending
    /// [`suspend`] call.
    ///
    /// Returns the payload the coroutine hands back next, either through [`suspend`] or by
    /// returning from its body.
    ///
    /// # Errors
    ///
    /// - [`Error::CoroutineFinished`] if the body already returned.
    /// - [`Error::InvalidArgument`] if the coroutine has not started and `value` is not `None`;
    ///   the first `send` only launches the body.
    /// - [`Error::AlreadyRunning`] if the coroutine is executing or waits for a coroutine it
    ///   resumed, i.e. it is on the current resume chain.
    ///
    /// # Panics
    ///
    /// Resumes the panic of a body that panicked during this call.
    pub fn send(&self, value: Option<Value>) -> Result<Option<Value>, Error> {
        match self.state.get() {
            State::Finished => return Err(Error::CoroutineFinished),
            State::Init if value.is_some() => return Err(Error::InvalidArgument),
            State::Init | State::Running => {}
        }

        let mut fiber = self
            .fiber
            .try_borrow_mut()
            .map_err(|_| Error::AlreadyRunning)?;

        self.state.set(State::Running);
        match self.switch(&mut fiber, Resume::Send(value)) {
            FiberResult::Yield(value) => Ok(value),
            FiberResult::Return(res) => {
                self.state.set(State::Finished);
                drop(fiber);
                tracing::trace!(coroutine.id = self.id.as_u64(), "coroutine finished");

                match res {
                    Ok(value) => Ok(value),
                    Err(payload) => {
                        tracing::debug!(coroutine.id = self.id.as_u64(), "coroutine panicked");
                        panic::resume_unwind(payload)
                    }
                }
            }
        }
    }

    fn switch(
        &self,
        fiber: &mut CoroutineFiber,
        input: Resume,
    ) -> FiberResult<Option<Value>, Body> {
        let _span = self.span.enter();
        let _entered = current::enter(self.id, self.suspend.clone());
        fiber.resume(input)
    }

    /// Resumes the coroutine without a payload.
    ///
    /// # Errors
    ///
    /// See [`send`](Coroutine::send).
    pub fn next(&self) -> Result<Option<Value>, Error> {
        self.send(None)
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn state(&self) -> State {
        self.state.get()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Size of the coroutine stack in bytes, including its guard page.
    ///
    /// # Panics
    ///
    /// Panics if called from inside this coroutine.
    pub fn stack_size(&self) -> usize {
        self.fiber.borrow().stack().size()
    }
}

impl Drop for Coroutine {
    fn drop(&mut self) {
        if self.state.get() != State::Running {
            return;
        }
        let Ok(mut fiber) = self.fiber.try_borrow_mut() else {
            return;
        };

        if std::thread::panicking() {
            tracing::warn!(
                coroutine.id = self.id.as_u64(),
                "dropping a suspended coroutine while panicking, its stack is leaked"
            );
            return;
        }

        tracing::trace!(coroutine.id = self.id.as_u64(), "unwinding suspended coroutine");
        match self.switch(&mut fiber, Resume::Unwind) {
            FiberResult::Return(Err(payload)) if !payload.is::<ForcedUnwind>() => {
                self.state.set(State::Finished);
                tracing::debug!(
                    coroutine.id = self.id.as_u64(),
                    "coroutine panicked while unwinding"
                );
            }
            FiberResult::Return(_) => self.state.set(State::Finished),
            FiberResult::Yield(_) => {
                tracing::warn!(
                    coroutine.id = self.id.as_u64(),
                    "coroutine suspended while unwinding, its stack is leaked"
                );
            }
        }
    }
}

impl fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coroutine")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

fn into_payload<R: Any>(ret: R) -> Option<Value> {
    let value: Value = Box::new(ret);
    if value.is::<()>() { None } else { Some(value) }
}
