// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! System V x86_64 backend.
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
//! | Trampoline   |
//! +--------------+  <- initial stack pointer
//! ```
//!
//! A suspended fiber keeps `RBP`, `RBX` and its resume address on its own stack; the parent keeps
//! `RBX`, its return address and `RBP` on the parent stack while the fiber runs. The parent link
//! always holds the parent's stack pointer. `Suspend` switches back through it, and the CFI of
//! the trampoline lets backtraces walk from the fiber stack into the parent.

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

        push(&mut sp, Some(stack_init_trampoline as usize));

        (
            StackPointer::new_unchecked(sp),
            StackPointer::new_unchecked(init_obj),
        )
    }
}

/// First-resume landing pad.
///
/// Entered from `switch_and_link` with:
/// - RSP on the parent stack, RBP still the parent's
/// - RDX at the trampoline slot of the fiber stack
/// - RSI at the top of the fiber stack
/// - RDI holding the resume argument
#[unsafe(naked)]
pub unsafe extern "C" fn stack_init_trampoline() {
    naked_asm! {
        ".balign 16",
        ".cfi_startproc",
        // The parent return address plus this RBP form a valid frame record.
        "push rbp",
        // Publish the parent stack pointer in the parent link.
        "mov [rsi - 16], rsp",
        // Second argument of the entry function: a pointer to the parent link.
        "sub rsi, 16",
        // Move onto the fiber stack, skipping the trampoline slot.
        "lea rsp, [rdx + 8]",
        // RBP points at the parent link so the CFA expression below can find the parent.
        "mov rbp, rsi",
        // CFA = *rbp + 24, skipping the three words pushed on the parent stack.
        ".cfi_escape 0x0f,  /* DW_CFA_def_cfa_expression */\
        5,                  /* the byte length of this expression */\
        0x76, 0x00,         /* DW_OP_breg6 (rbp + 0) */\
        0x06,               /* DW_OP_deref */\
        0x23, 0x18          /* DW_OP_plus_uconst 24 */",
        ".cfi_offset rbx, -8",
        ".cfi_offset rip, -16",
        ".cfi_offset rbp, -24",
        // Third argument: the initial object sits right at the stack pointer.
        "mov rdx, rsp",
        // Fake a call with JMP so the return stack buffer stays balanced with the RETs in
        // switch_yield and switch_and_reset.
        "lea rcx, [rip + 2f]",
        "push rcx",
        "jmp [rsi + 8]",
        // The entry function diverges, nothing ever returns here.
        "2:",
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
            // RBX is reserved by LLVM and cannot be declared as a clobber.
            "push rbx",
            // DW_CFA_GNU_args_size 0
            ".cfi_escape 0x2e, 0x00",
            // Jump to the resume address stored at the fiber's stack pointer.
            "call [rdx]",
            // Back from the fiber: RSI holds its stack pointer (or 0), RDI the handed back value.
            "pop rbx",

            inlateout("rdi") arg => ret_val,
            lateout("rsi") ret_sp,
            in("rsi") top_of_stack.get() as u64,
            in("rdx") sp.get() as u64,
            // callee-saved registers the fiber may use freely
            lateout("r12") _, lateout("r13") _, lateout("r14") _, lateout("r15") _,
            clobber_abi("sysv64"),
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
            "push rbp",
            "push rbx",
            // Resume address for the next switch_and_link.
            "lea rax, [rip + 2f]",
            "push rax",
            // Our stack pointer goes back to switch_and_link in RSI.
            "mov rsi, rsp",
            // Back onto the parent stack and restore its RBP.
            "mov rsp, [rdx]",
            "pop rbp",
            // DW_CFA_GNU_args_size 0
            ".cfi_escape 0x2e, 0x00",
            // Return to just after the CALL in switch_and_link.
            "ret",

            // Resumed by switch_and_link: RSP on the parent stack, RDX at our saved stack
            // pointer, RSI at our stack top, RDI holding the resume argument.
            "2:",
            "push rbp",
            "mov [rsi - 16], rsp",
            "lea rsp, [rdx + 8]",
            "pop rbx",
            "pop rbp",

            inlateout("rdi") arg => ret_val,
            in("rdx") parent_link as u64,
            lateout("r12") _, lateout("r13") _, lateout("r14") _, lateout("r15") _,
            clobber_abi("sysv64"),
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
            "mov rsp, [{parent_link}]",
            "pop rbp",
            "ret",

            parent_link = in(reg) parent_link as u64,
            in("rdi") arg,
            // a null stack pointer marks the fiber as done
            in("rsi") 0,
            options(noreturn),
        }
    }
}
