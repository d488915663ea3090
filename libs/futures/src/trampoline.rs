// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Flattens continuation chains.
//!
//! A continuation usually completes the promise of the next stage, which releases the next
//! continuation, and so on. Run naively, every link of a chain adds frames to the completing
//! thread's stack. Instead, the outermost continuation on a thread drains a queue and everything
//! released while it runs is appended to that queue, keeping the stack depth constant no matter
//! how long the chain is.

use crate::loom::thread_local;
use core::cell::RefCell;
use std::collections::VecDeque;

type Job = Box<dyn FnOnce()>;

thread_local! {
    // `None` while no continuation runs on this thread
    static QUEUE: RefCell<Option<VecDeque<Job>>> = RefCell::new(None);
}

/// Runs `job` now, or after the continuation that is already running on this thread returns.
pub(crate) fn run(job: Job) {
    let job = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        match queue.as_mut() {
            Some(pending) => {
                pending.push_back(job);
                None
            }
            None => {
                *queue = Some(VecDeque::new());
                Some(job)
            }
        }
    });
    let Some(mut job) = job else {
        tracing::trace!("continuation deferred");
        return;
    };

    let _drain = Drain;
    loop {
        job();
        match QUEUE.with(|queue| queue.borrow_mut().as_mut().and_then(VecDeque::pop_front)) {
            Some(next) => job = next,
            None => break,
        }
    }
}

/// Ends the drain, also when a job unwinds. Jobs still queued at that point are dropped, which
/// breaks the promises they hold.
struct Drain;

impl Drop for Drain {
    fn drop(&mut self) {
        let rest = QUEUE.with(|queue| queue.borrow_mut().take()).unwrap_or_default();
        if !rest.is_empty() {
            tracing::debug!(dropped = rest.len(), "abandoning deferred continuations");
        }
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn nested_jobs_run_after_the_outer_one() {
        let log = Rc::new(RefCell::new(Vec::new()));

        let outer_log = log.clone();
        run(Box::new(move || {
            let inner_log = outer_log.clone();
            run(Box::new(move || inner_log.borrow_mut().push("inner")));
            outer_log.borrow_mut().push("outer");
        }));

        assert_eq!(*log.borrow(), ["outer", "inner"]);
    }

    #[test]
    fn depth_stays_flat() {
        fn step(remaining: u32, max_depth: Rc<Cell<usize>>, depth: Rc<Cell<usize>>) {
            depth.set(depth.get() + 1);
            max_depth.set(max_depth.get().max(depth.get()));
            if remaining > 0 {
                let (max_depth, inner_depth) = (max_depth.clone(), depth.clone());
                run(Box::new(move || step(remaining - 1, max_depth, inner_depth)));
            }
            depth.set(depth.get() - 1);
        }

        let max_depth = Rc::new(Cell::new(0));
        step(10_000, max_depth.clone(), Rc::new(Cell::new(0)));
        assert_eq!(max_depth.get(), 2);
    }

    #[test]
    fn panicking_job_ends_the_drain() {
        let dropped = Rc::new(Cell::new(false));

        let flag = dropped.clone();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            run(Box::new(move || {
                struct SetOnDrop(Rc<Cell<bool>>);
                impl Drop for SetOnDrop {
                    fn drop(&mut self) {
                        self.0.set(true);
                    }
                }
                let guard = SetOnDrop(flag);
                run(Box::new(move || drop(guard)));
                panic!("job failed");
            }));
        }));
        assert!(res.is_err());
        assert!(dropped.get());

        // the thread is idle again, jobs run right away
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        run(Box::new(move || flag.set(true)));
        assert!(ran.get());
    }
}
