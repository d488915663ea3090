// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::stack::{FiberStack, MIN_STACK_SIZE, StackPointer};
use std::io;
use std::ptr;

/// An `mmap`ed stack with a guard page at its lower end.
#[derive(Debug)]
pub struct DefaultFiberStack {
    top: StackPointer,
    mmap_len: usize,
}

impl DefaultFiberStack {
    /// Default usable size of a stack.
    pub const DEFAULT_SIZE: usize = 1024 * 1024;

    /// Maps a new stack with at least `size` usable bytes.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the mapping or the protection change fails, or
    /// [`io::ErrorKind::InvalidInput`] if the rounded size overflows.
    pub fn new(size: usize) -> io::Result<Self> {
        let size = size.max(MIN_STACK_SIZE);

        let page_size = page_size();
        // usable size rounded up to whole pages, plus the guard page
        let mmap_len = size
            .checked_add(2 * page_size - 1)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "stack size overflows"))?
            & !(page_size - 1);
        let usable = mmap_len - page_size;

        cfg_if::cfg_if! {
            if #[cfg(target_os = "openbsd")] {
                let map_flags = libc::MAP_ANONYMOUS | libc::MAP_PRIVATE | libc::MAP_STACK;
            } else {
                let map_flags = libc::MAP_ANONYMOUS | libc::MAP_PRIVATE;
            }
        }

        // Safety: anonymous mapping, no existing memory is affected
        let base = unsafe { libc::mmap(ptr::null_mut(), mmap_len, libc::PROT_NONE, map_flags, -1, 0) };
        if base == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        let top = StackPointer::new(base as usize + mmap_len)
            .ok_or_else(|| io::Error::other("mmap returned a mapping ending at address zero"))?;
        // constructed before mprotect so a failure below unmaps again
        let stack = Self { top, mmap_len };

        // Safety: the range lies inside the mapping created above, the lowest page stays PROT_NONE
        let res = unsafe {
            libc::mprotect(
                base.cast::<u8>().add(page_size).cast(),
                usable,
                libc::PROT_READ | libc::PROT_WRITE,
            )
        };
        if res != 0 {
            return Err(io::Error::last_os_error());
        }

        tracing::trace!(top = stack.top.get(), len = mmap_len, "mapped fiber stack");

        Ok(stack)
    }
}

impl Drop for DefaultFiberStack {
    fn drop(&mut self) {
        let base = self.top.get() - self.mmap_len;
        // Safety: we own the mapping and nothing runs on it anymore
        let ret = unsafe { libc::munmap(base as *mut libc::c_void, self.mmap_len) };
        debug_assert_eq!(ret, 0);
    }
}

// Safety: the mapping is private to this value, stays put and is page (thus 16 byte) aligned
unsafe impl FiberStack for DefaultFiberStack {
    fn top(&self) -> StackPointer {
        self.top
    }

    fn bottom(&self) -> StackPointer {
        // the mapping never starts at address zero, `top` is nonzero and `mmap_len` is at most `top`
        StackPointer::new(self.top.get() - self.mmap_len).unwrap_or(self.top)
    }
}

fn page_size() -> usize {
    // Safety: sysconf has no preconditions
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    let page_size = usize::try_from(page_size).unwrap_or(4096);
    debug_assert!(page_size.is_power_of_two());
    page_size
}
