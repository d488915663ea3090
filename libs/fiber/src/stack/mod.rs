// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Stacks that fibers execute on.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::DefaultFiberStack;
    } else {
        compile_error!("fiber stacks are only implemented for unix hosts");
    }
}

pub type StackPointer = core::num::NonZeroUsize;

/// Minimum size of a stack, excluding guard pages.
pub const MIN_STACK_SIZE: usize = 4096;

pub use crate::arch::STACK_ALIGNMENT;

/// A region of memory a [`Fiber`](crate::Fiber) can run on.
///
/// # Safety
///
/// `top` and `bottom` must describe a writable region that stays valid and does not move for as long
/// as the implementing value is alive. Both ends must be aligned to [`STACK_ALIGNMENT`].
pub unsafe trait FiberStack {
    /// Returns the highest address (start address) of the stack.
    fn top(&self) -> StackPointer;

    /// Returns the lowest address (maximum limit) of the stack, including any guard pages.
    fn bottom(&self) -> StackPointer;

    /// Size of the whole region in bytes, guard pages included.
    fn size(&self) -> usize {
        self.top().get() - self.bottom().get()
    }
}

/// Borrowing a stack lets one allocation back many short-lived fibers.
// Safety: forwards to an implementation that upholds the contract
unsafe impl<S: FiberStack> FiberStack for &mut S {
    #[inline]
    fn top(&self) -> StackPointer {
        (**self).top()
    }

    #[inline]
    fn bottom(&self) -> StackPointer {
        (**self).bottom()
    }
}
