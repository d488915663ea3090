// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! AAPCS64 backend.
//!
//! A freshly initialized fiber stack:
//!
//! ```text
//! +--------------+  <- stack top
//! | Entry fn     |
//! +--------------+
//! | Parent link  |
//! +--------------+
//! ~ Initial obj  ~
//! +--------------+
//! | Padding      |
//! +--------------+
//! | Trampoline   |
//! +--------------+
//! | Padding      |
//! +--------------+
//! | Padding      |
//! +--------------+  <- initial stack pointer
//! ```
//!
//! A suspended fiber stores X19, X29 and its resume PC in a 32 byte block at its stack pointer.
//! The parent stores X29, LR and X19 in the same shape on its own stack while the fiber runs.

use crate::stack::FiberStack;
use crate::stack::StackPointer;
use crate::utils::{EncodedValue, allocate_obj_on_stack, push};
use core::arch::{asm, naked_asm};

pub const STACK_ALIGNMENT: usize = 16;

/// Prepares `stack` so that the first [`switch_and_link`] enters `func` with `obj`.
///
/// Returns the initial stack pointer and the address of `obj` on the fiber stack.
#[inline]
pub unsafe fn init_stack<T>(
    stack: &dyn FiberStack,
    func: unsafe extern "C" fn(arg: EncodedValue, sp: &mut StackPointer, obj: *mut T) -> !,
    obj: T,
) -> (StackPointer, StackPointer) {
    let mut sp = stack.top().get();

    // Safety: the caller hands us a fresh stack that is large enough for the layout above
    unsafe {
        push(&mut sp, Some(func as usize));
        // filled in by every switch_and_link
        push(&mut sp, None);

        allocate_obj_on_stack(&mut sp, 16, obj);
        let init_obj = sp;

        push(&mut sp, None);
        // switch_and_link loads the resume PC from 16 bytes above the stack pointer
        push(&mut sp, Some(stack_init_trampoline as usize));
        push(&mut sp, None);
        push(&mut sp, None);

        (
            StackPointer::new_unchecked(sp),
            StackPointer::new_unchecked(init_obj),
        )
    }
}

/// First-resume landing pad.
///
/// Entered from `switch_and_link` with:
/// - SP on the parent stack, LR the parent return address, X19/X29 the parent's
/// - X2 at the initial stack pointer of the fiber
/// - X1 at the top of the fiber stack
/// - X0 holding the resume argument
#[unsafe(naked)]
pub unsafe extern "C" fn stack_init_trampoline() {
    naked_asm! {
        ".balign 4",
        ".cfi_startproc",
        // Save the parent frame record and X19 on the parent stack.
        "stp x29, lr, [sp, #-32]!",
        "str x19, [sp, #16]",
        // Publish the parent stack pointer and point X1 at the parent link.
        "mov x3, sp",
        "str x3, [x1, #-16]!",
        // Move onto the fiber stack, dropping the padding and trampoline slots.
        "add sp, x2, #32",
        // X29 points at the parent link so the CFA expression below can find the parent.
        "mov x29, x1",
        // CFA = *x29 + 32, skipping the block saved on the parent stack.
        ".cfi_escape 0x0f,  /* DW_CFA_def_cfa_expression */\
        5,                  /* the byte length of this expression */\
        0x8d, 0x00,         /* DW_OP_breg29 (x29 + 0) */\
        0x06,               /* DW_OP_deref */\
        0x23, 0x20          /* DW_OP_plus_uconst 32 */",
        ".cfi_offset x19, -16",
        ".cfi_offset lr, -24",
        ".cfi_offset x29, -32",
        // Third argument: the initial object.
        "mov x2, sp",
        // Branch instead of BL to keep the return predictor balanced.
        "adr lr, 0f",
        "ldr x3, [x1, #8]",
        "br x3",
        // The entry function diverges, nothing ever returns here.
        "0:",
        ".cfi_endproc",
    }
}

/// Resumes the fiber whose saved stack pointer is `sp`, passing `arg`.
///
/// Returns the value the fiber handed back and its new stack pointer, or `None` if the fiber
/// finished.
#[inline]
pub unsafe fn switch_and_link(
    arg: EncodedValue,
    sp: StackPointer,
    top_of_stack: StackPointer,
) -> (EncodedValue, Option<StackPointer>) {
    let (ret_val, ret_sp);

    // Safety: the caller guarantees `sp` is the saved stack pointer of a suspended fiber running
    // on the stack that ends at `top_of_stack`
    unsafe {
        asm! {
            // DW_CFA_GNU_args_size 0
            ".cfi_escape 0x2e, 0x00",
            // Call the resume PC saved on the fiber stack.
            "ldr x3, [x2, #16]",
            "blr x3",
            // Back from the fiber: X2 is our stack pointer minus the saved block, X1 the fiber
            // stack pointer (or 0), X0 the handed back value.
            "add sp, x2, #32",

            inlateout("x0") arg => ret_val,
            lateout("x1") ret_sp,
            in("x1") top_of_stack.get() as u64,
            in("x2") sp.get() as u64,
            // callee-saved registers the fiber may use freely, X18 is handled by clobber_abi
            lateout("x20") _, lateout("x21") _, lateout("x22") _, lateout("x23") _,
            lateout("x24") _, lateout("x25") _, lateout("x26") _, lateout("x27") _,
            lateout("x28") _,
            clobber_abi("C"),
        }
    }

    (ret_val, StackPointer::new(ret_sp))
}

/// Suspends the running fiber, handing `arg` to its parent, and returns the next resume argument.
#[inline(always)]
pub unsafe fn switch_yield(arg: EncodedValue, parent_link: *mut StackPointer) -> EncodedValue {
    let ret_val;

    // Safety: the caller guarantees `parent_link` is the parent link of the running fiber
    unsafe {
        asm! {
            // Save X19/X29 and reserve the slot for our resume PC.
            "stp x19, x29, [sp, #-32]!",
            "adr lr, 0f",
            "str lr, [sp, #16]",
            // Parent stack pointer from the parent link, ours goes back in X1.
            "ldr x2, [x2]",
            "mov x1, sp",
            // Restore the parent's X19, X29 and LR.
            "ldr x19, [x2, #16]",
            "ldp x29, lr, [x2]",
            // DW_CFA_GNU_args_size 0
            ".cfi_escape 0x2e, 0x00",
            "ret",

            // Resumed by switch_and_link: SP on the parent stack, X2 at our saved block, X1 at
            // our stack top, X0 holding the resume argument.
            "0:",
            "stp x29, lr, [sp, #-32]!",
            "str x19, [sp, #16]",
            "mov x3, sp",
            "str x3, [x1, #-16]",
            "ldp x19, x29, [x2]",
            "add sp, x2, #32",

            inlateout("x0") arg => ret_val,
            in("x2") parent_link as u64,
            lateout("x20") _, lateout("x21") _, lateout("x22") _, lateout("x23") _,
            lateout("x24") _, lateout("x25") _, lateout("x26") _, lateout("x27") _,
            lateout("x28") _,
            clobber_abi("C"),
        }
    }

    ret_val
}

/// Leaves a finished fiber for good, handing `arg` to the parent.
#[inline(always)]
pub unsafe fn switch_and_reset(arg: EncodedValue, parent_link: *mut StackPointer) -> ! {
    // Safety: the caller guarantees `parent_link` is the parent link of the running fiber and that
    // nothing on the fiber stack needs to run anymore
    unsafe {
        asm! {
            "ldr x2, [{parent_link}]",
            "ldr x19, [x2, #16]",
            "ldp x29, lr, [x2]",
            "ret",

            parent_link = in(reg) parent_link as u64,
            in("x0") arg,
            // a null stack pointer marks the fiber as done
            in("x1") 0,
            options(noreturn),
        }
    }
}
