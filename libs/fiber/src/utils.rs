// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::arch;
use core::mem::ManuallyDrop;
use core::ptr;

/// A value in transit between two stacks, squeezed into a single register.
pub type EncodedValue = usize;

/// Packs `val` into a register-sized word.
///
/// Values that fit are copied into the word directly, anything larger is passed by address.
/// Ownership moves into the word: the caller must not touch `val` afterwards, and the word must be
/// decoded exactly once, *before* the frame that holds `val` is popped.
pub unsafe fn encode_val<T>(val: &mut ManuallyDrop<T>) -> EncodedValue {
    if size_of::<T>() <= size_of::<EncodedValue>() {
        let mut word: EncodedValue = 0;
        // Safety: `word` has room for a `T` and the write is unaligned, `take` is sound because
        // the caller gave up ownership of `val`
        unsafe {
            ptr::write_unaligned(ptr::from_mut(&mut word).cast::<T>(), ManuallyDrop::take(val));
        }
        word
    } else {
        ptr::from_ref(val) as EncodedValue
    }
}

/// Inverse of [`encode_val`].
pub unsafe fn decode_val<T>(word: EncodedValue) -> T {
    if size_of::<T>() <= size_of::<EncodedValue>() {
        // Safety: the word was produced by `encode_val::<T>` which stored the value inline
        unsafe { ptr::read_unaligned(ptr::from_ref(&word).cast::<T>()) }
    } else {
        // Safety: the word is the address of a live `ManuallyDrop<T>` on the sending stack
        unsafe { ptr::read(word as *const T) }
    }
}

/// Pushes one word onto a downward-growing stack. `None` only reserves the slot.
#[inline]
pub unsafe fn push(sp: &mut usize, val: Option<usize>) {
    *sp -= size_of::<usize>();
    if let Some(val) = val {
        // Safety: the caller guarantees `sp` points into writable stack memory
        unsafe {
            (*sp as *mut usize).write(val);
        }
    }
}

/// Moves `obj` onto the stack below `sp`, keeping the stack pointer aligned to
/// [`arch::STACK_ALIGNMENT`] once `sp_offset` more bytes have been pushed above it.
#[inline]
pub unsafe fn allocate_obj_on_stack<T>(sp: &mut usize, sp_offset: usize, obj: T) {
    assert!(
        size_of::<T>() <= 1024,
        "fiber entry closure is too large, box its captures"
    );

    if align_of::<T>() > arch::STACK_ALIGNMENT {
        *sp -= size_of::<T>();
        *sp &= !(align_of::<T>() - 1);
    } else {
        let misalignment = (sp_offset + size_of::<T>()) % arch::STACK_ALIGNMENT;
        if misalignment != 0 {
            *sp -= arch::STACK_ALIGNMENT - misalignment;
        }
        *sp -= size_of::<T>();
    }

    // Safety: the caller guarantees the stack has room for `T` below the old `sp`
    unsafe {
        (*sp as *mut T).write(obj);
    }

    debug_assert_eq!(*sp % arch::STACK_ALIGNMENT, 0);
}
