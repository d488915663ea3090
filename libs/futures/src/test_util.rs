// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::scheduler::{Scheduler, Task};
use core::time::Duration;
use std::sync::Mutex;
use std::thread;

/// Runs every task on a fresh OS thread.
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn schedule(&self, task: Task) {
        thread::spawn(task);
    }

    fn schedule_after(&self, delay: Duration, task: Task) {
        thread::spawn(move || {
            thread::sleep(delay);
            task();
        });
    }
}

/// Queues tasks until the test drives them explicitly.
///
/// Timers ignore their delay, [`fire_timers`](ManualScheduler::fire_timers) runs all of them.
#[derive(Default)]
pub struct ManualScheduler {
    ready: Mutex<Vec<Task>>,
    timers: Mutex<Vec<(Duration, Task)>>,
}

impl ManualScheduler {
    /// Runs queued tasks (including ones queued while running) and returns how many ran.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        loop {
            let tasks = core::mem::take(&mut *self.ready.lock().unwrap());
            if tasks.is_empty() {
                return ran;
            }
            for task in tasks {
                tracing::trace!("running task");
                task();
                ran += 1;
            }
        }
    }

    /// Runs every pending timer in order of its delay and returns how many ran.
    pub fn fire_timers(&self) -> usize {
        let mut timers = core::mem::take(&mut *self.timers.lock().unwrap());
        timers.sort_by_key(|(delay, _)| *delay);

        let count = timers.len();
        for (delay, task) in timers {
            tracing::trace!(?delay, "firing timer");
            task();
        }
        count
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, task: Task) {
        self.ready.lock().unwrap().push(task);
    }

    fn schedule_after(&self, delay: Duration, task: Task) {
        self.timers.lock().unwrap().push((delay, task));
    }
}
