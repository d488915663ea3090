// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Per-thread resume chain.
//!
//! Every thread starts out in its implicit main coroutine. Each [`Coroutine::send`] pushes a
//! frame for the coroutine it resumes and pops it once control comes back, so the top of the
//! chain is the coroutine currently executing and the frame below it is the one that resumed it.
//!
//! [`Coroutine::send`]: crate::Coroutine::send

use crate::error::Error;
use crate::id::Id;
use crate::Value;
use core::cell::{Cell, RefCell};
use core::marker::PhantomData;
use core::ptr::NonNull;
use std::panic;
use std::rc::Rc;

/// What a coroutine is resumed with.
pub(crate) enum Resume {
    /// Answer to the pending `suspend`.
    Send(Option<Value>),
    /// The coroutine is being dropped, its body must unwind.
    Unwind,
}

/// Panic payload that unwinds the body of a dropped coroutine.
pub(crate) struct ForcedUnwind;

pub(crate) type Suspender = fiber::Suspend<Resume, Option<Value>>;

/// Filled in by the coroutine body on first entry, the `Suspend` lives on the coroutine stack.
pub(crate) type SuspendSlot = Rc<Cell<Option<NonNull<Suspender>>>>;

struct Frame {
    id: Id,
    suspend: SuspendSlot,
}

thread_local! {
    static FRAMES: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Removes the frame pushed by [`enter`] when dropped.
#[must_use]
pub(crate) struct Entered {
    id: Id,
    _not_send: PhantomData<*mut ()>,
}

pub(crate) fn enter(id: Id, suspend: SuspendSlot) -> Entered {
    FRAMES.with_borrow_mut(|frames| frames.push(Frame { id, suspend }));
    tracing::trace!(coroutine.id = id.as_u64(), "enter");
    Entered {
        id,
        _not_send: PhantomData,
    }
}

impl Drop for Entered {
    fn drop(&mut self) {
        let popped = FRAMES.with_borrow_mut(Vec::pop);
        debug_assert_eq!(popped.map(|frame| frame.id), Some(self.id));
        tracing::trace!(coroutine.id = self.id.as_u64(), "exit");
    }
}

/// Returns the id of the coroutine executing on this thread, [`Id::MAIN`] outside any coroutine.
pub fn current_id() -> Id {
    FRAMES.with_borrow(|frames| frames.last().map_or(Id::MAIN, |frame| frame.id))
}

/// Suspends the coroutine executing on this thread, handing `value` to the caller of
/// [`Coroutine::send`](crate::Coroutine::send) that resumed it.
///
/// Returns the payload of the `send` call that resumes this coroutine next.
///
/// # Errors
///
/// Returns [`Error::NotInCoroutine`] when called from a thread's main coroutine.
///
/// # Panics
///
/// When the suspended coroutine is dropped instead of resumed, this call unwinds so the body's
/// locals are dropped. The unwind is caught at the body boundary; catching it earlier and
/// suspending again leaks the coroutine stack.
pub fn suspend(value: Option<Value>) -> Result<Option<Value>, Error> {
    let suspend = FRAMES
        .with_borrow(|frames| frames.last().and_then(|frame| frame.suspend.get()))
        .ok_or(Error::NotInCoroutine)?;

    // Safety: the slot points at the `Suspend` on the stack of the coroutine on top of the resume
    // chain, which is the one executing this code, so its stack (and the `Suspend`) is alive
    let suspend = unsafe { suspend.as_ref() };
    match suspend.suspend(value) {
        Resume::Send(value) => Ok(value),
        Resume::Unwind => panic::resume_unwind(Box::new(ForcedUnwind)),
    }
}
