// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Per-architecture context switch.
//!
//! Every backend exposes the same items:
//!
//! - `STACK_ALIGNMENT`
//! - `init_stack`: lays out a fresh stack so the first switch lands in the entry function
//! - `switch_and_link`: parent -> fiber, records the parent stack pointer in the parent link
//! - `switch_yield`: fiber -> parent, resumable
//! - `switch_and_reset`: fiber -> parent, final; reports a null stack pointer

cfg_if::cfg_if! {
    if #[cfg(target_arch = "aarch64")] {
        mod aarch64;
        pub use aarch64::*;
    } else if #[cfg(all(target_arch = "x86_64", not(windows)))] {
        mod x86_64;
        pub use x86_64::*;
    } else {
        compile_error!("Unsupported target architecture");
    }
}
