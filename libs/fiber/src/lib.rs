// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Stack switching for asuka.
//!
//! This crate provides [`Fiber`], a call stack separate from the one of the calling thread that
//! can be suspended and resumed. It is the execution-context primitive underneath
//! `asuka-coroutine`, which layers thread-local bookkeeping and type-erased payloads on top.
//!
//! The context switch itself is a handful of instructions per architecture (see the `arch`
//! module), modelled after [`corosensei`].
//!
//! # Unwinding
//!
//! Unwinding never crosses a stack boundary. The entry function of a fiber must not unwind; if it
//! does, the process aborts, because continuing on a stack whose parent link may be corrupted is
//! not recoverable. Callers that run user code catch panics on the fiber stack and hand them back
//! as ordinary return values.
//!
//! A fiber dropped while suspended cannot be unwound from here, its stack is leaked. Callers that
//! need the memory back drive the fiber to completion first, e.g. by resuming it with an input
//! that makes the entry function return.
//!
//! [`corosensei`]: https://github.com/Amanieu/corosensei

mod arch;
pub mod stack;
mod utils;

use crate::stack::{FiberStack, StackPointer};
use crate::utils::EncodedValue;
use core::cell::Cell;
use core::marker::PhantomData;
use core::mem::{ManuallyDrop, MaybeUninit};
use core::ptr;

/// Value returned from resuming a fiber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FiberResult<Yield, Return> {
    /// The fiber suspended itself through [`Suspend::suspend`].
    Yield(Yield),

    /// The fiber returned from its entry function.
    Return(Return),
}

impl<Yield, Return> FiberResult<Yield, Return> {
    /// Returns the `Yield` value as an `Option<Yield>`.
    pub fn into_yield(self) -> Option<Yield> {
        match self {
            FiberResult::Yield(val) => Some(val),
            FiberResult::Return(_) => None,
        }
    }

    /// Returns the `Return` value as an `Option<Return>`.
    pub fn into_return(self) -> Option<Return> {
        match self {
            FiberResult::Yield(_) => None,
            FiberResult::Return(val) => Some(val),
        }
    }
}

pub struct Fiber<Input, Yield, Return, S: FiberStack> {
    /// Stack the fiber executes on. Only released once nothing can run on it anymore.
    stack: ManuallyDrop<S>,
    /// Saved stack pointer of the suspended fiber, `None` once it returned.
    stack_ptr: Option<StackPointer>,
    /// Stack pointer set up by `init_stack`. A fiber that has run at least once can never be
    /// back at this value because suspending pushes onto the stack.
    initial_stack_ptr: StackPointer,
    /// Address of the entry closure on the fiber stack.
    initial_obj: StackPointer,
    /// Drops the entry closure of a fiber that never ran.
    drop_fn: unsafe fn(ptr: *mut u8),
    /// Covariant over Yield and Return, contravariant over Input.
    _m1: PhantomData<fn(Input) -> FiberResult<Yield, Return>>,
    /// Fibers are pinned to the thread that created them.
    /// ```compile_fail
    /// fn send<T: Send>() {}
    /// send::<fiber::Fiber<(), (), (), fiber::stack::DefaultFiberStack>>();
    /// ```
    _m2: PhantomData<*mut ()>,
}

impl<Input, Yield, Return, S: FiberStack> Fiber<Input, Yield, Return, S> {
    /// Creates a new fiber running `func` on `stack`. Nothing runs until the first
    /// [`resume`](Self::resume), whose input becomes the first argument of `func`.
    ///
    /// `func` must not unwind, see the [crate level docs](crate#unwinding).
    ///
    /// # Panics
    ///
    /// Panics if `func` is larger than 1 KiB. It is placed on the new stack by value, so box
    /// large captures.
    pub fn with_stack<F>(stack: S, func: F) -> Self
    where
        F: FnOnce(Input, &Suspend<Input, Yield>) -> Return,
        F: 'static,
        Input: 'static,
        Yield: 'static,
        Return: 'static,
    {
        /// Runs on the fiber stack, `extern "C"` turns an escaping panic into an abort.
        unsafe extern "C" fn fiber_func<Input, Yield, Return, F>(
            input: EncodedValue,
            parent_link: &mut StackPointer,
            obj: *mut MaybeUninit<F>,
        ) -> !
        where
            F: FnOnce(Input, &Suspend<Input, Yield>) -> Return,
        {
            // Safety: `Suspend` is a transparent wrapper around the parent link, `obj` is the
            // closure written by `init_stack` and is read exactly once, `input` was encoded by
            // `resume` for this very type
            unsafe {
                let suspend = &*(ptr::from_mut(parent_link).cast::<Suspend<Input, Yield>>());
                debug_assert_eq!(obj as usize % align_of::<F>(), 0);

                let func = (*obj).assume_init_read();
                let input: Input = utils::decode_val(input);

                let result = func(input, suspend);

                let mut result = ManuallyDrop::new(result);
                arch::switch_and_reset(utils::encode_val(&mut result), suspend.stack_ptr.as_ptr());
            }
        }

        unsafe fn drop_fn<F>(ptr: *mut u8) {
            // Safety: only called for a fiber that never ran, so the closure is still initialized
            unsafe { ptr::drop_in_place(ptr.cast::<F>()) }
        }

        // Safety: the stack is ours and unused, the trampoline reads back exactly the object we
        // place on it
        let (stack_ptr, initial_obj) = unsafe {
            arch::init_stack(
                &stack,
                fiber_func::<Input, Yield, Return, F>,
                MaybeUninit::new(func),
            )
        };

        Self {
            stack: ManuallyDrop::new(stack),
            stack_ptr: Some(stack_ptr),
            initial_stack_ptr: stack_ptr,
            initial_obj,
            drop_fn: drop_fn::<F>,
            _m1: PhantomData,
            _m2: PhantomData,
        }
    }

    /// Resumes the fiber, `input` becomes the return value of the pending [`Suspend::suspend`]
    /// (or the first argument of the entry function on the first resume).
    ///
    /// # Panics
    ///
    /// Panics if the fiber is already completed.
    pub fn resume(&mut self, input: Input) -> FiberResult<Yield, Return> {
        let Some(stack_ptr) = self.stack_ptr.take() else {
            panic!("attempt to resume a completed fiber");
        };

        let mut input = ManuallyDrop::new(input);

        // Safety: `stack_ptr` is the saved state of this fiber on its own stack, the encoded
        // input stays alive in this frame until the fiber decoded it
        unsafe {
            let (result, stack_ptr) =
                arch::switch_and_link(utils::encode_val(&mut input), stack_ptr, self.stack.top());

            self.stack_ptr = stack_ptr;

            if stack_ptr.is_some() {
                FiberResult::Yield(utils::decode_val(result))
            } else {
                FiberResult::Return(utils::decode_val(result))
            }
        }
    }

    /// Returns whether this fiber has been resumed at least once.
    pub fn started(&self) -> bool {
        self.stack_ptr != Some(self.initial_stack_ptr)
    }

    /// Returns whether this fiber returned from its entry function.
    ///
    /// A fiber that is done can no longer be resumed.
    pub fn done(&self) -> bool {
        self.stack_ptr.is_none()
    }

    /// The stack this fiber runs on.
    pub fn stack(&self) -> &S {
        &self.stack
    }
}

impl<Input, Yield, Return, S: FiberStack> Drop for Fiber<Input, Yield, Return, S> {
    fn drop(&mut self) {
        if !self.started() {
            // Safety: the fiber never ran so the entry closure was never moved out
            unsafe { (self.drop_fn)(self.initial_obj.get() as *mut u8) }
        } else if !self.done() {
            // frames are still live on the fiber stack, releasing it would pull the memory out from
            // under them
            tracing::warn!(
                stack.top = self.stack.top().get(),
                stack.size = self.stack.size(),
                "dropping a suspended fiber, its stack is leaked"
            );
            return;
        }

        // Safety: nothing runs on or points into the stack anymore
        unsafe { ManuallyDrop::drop(&mut self.stack) }
    }
}

/// Handle a running fiber uses to suspend itself.
#[repr(transparent)]
pub struct Suspend<Input, Yield> {
    // The parent link on the fiber stack, rewritten on every resume.
    stack_ptr: Cell<StackPointer>,
    marker: PhantomData<fn(Yield) -> Input>,
}

impl<Input, Yield> Suspend<Input, Yield> {
    /// Suspends the calling fiber.
    ///
    /// Control goes back to the caller of [`Fiber::resume`], which receives `val` as
    /// [`FiberResult::Yield`]. The next `resume` input is returned from this call.
    pub fn suspend(&self, val: Yield) -> Input {
        let mut val = ManuallyDrop::new(val);
        // Safety: a `Suspend` only exists on the stack of a running fiber, its parent link is
        // valid; `val` stays alive in this frame until the parent decoded it
        unsafe {
            let result = arch::switch_yield(utils::encode_val(&mut val), self.stack_ptr.as_ptr());
            utils::decode_val(result)
        }
    }
}
