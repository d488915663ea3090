// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::future::Future;
use crate::loom::sync::{Arc, Mutex};
use crate::outcome::Outcome;
use crate::promise::Promise;
use std::sync::PoisonError;

/// Returns a future that completes once every one of `futures` completed.
///
/// The result holds the outcome of each input in input order; a failing input does not cut the
/// others short. If an input can never complete (its promise timed out), the combined future
/// fails with [`Error::BrokenPromise`](crate::Error::BrokenPromise) once the rest are done.
pub fn when_all<T, I>(futures: I) -> Future<Vec<Outcome<T>>>
where
    T: Send + 'static,
    I: IntoIterator<Item = Future<T>>,
{
    let futures: Vec<_> = futures.into_iter().collect();
    if futures.is_empty() {
        return Future::ready(Vec::new());
    }

    let (promise, future) = Promise::pair();
    let collect = Arc::new(Collect {
        slots: Mutex::new(Slots {
            outcomes: (0..futures.len()).map(|_| Outcome::Empty).collect(),
            remaining: futures.len(),
        }),
        promise,
    });

    for (idx, input) in futures.into_iter().enumerate() {
        let collect = collect.clone();
        input.on_complete(move |outcome| collect.fill(idx, outcome));
    }

    future
}

struct Collect<T> {
    slots: Mutex<Slots<T>>,
    promise: Promise<Vec<Outcome<T>>>,
}

struct Slots<T> {
    outcomes: Vec<Outcome<T>>,
    remaining: usize,
}

impl<T> Collect<T> {
    fn fill(&self, idx: usize, outcome: Outcome<T>) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.outcomes[idx] = outcome;
        slots.remaining -= 1;
        if slots.remaining > 0 {
            return;
        }

        let outcomes = core::mem::take(&mut slots.outcomes);
        drop(slots);
        tracing::trace!(count = outcomes.len(), "all inputs completed");
        self.promise.set_value(outcomes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Failure};

    #[test]
    fn keeps_input_order() {
        let first = Promise::new();
        let second = Promise::new();
        let all = when_all([first.get_future(), second.get_future(), Future::ready(3)]);

        second.set_value(2);
        assert!(!all.is_ready());
        first.set_value(1);

        let outcomes = all.get().unwrap();
        let values: Vec<_> = outcomes.into_iter().map(|o| o.into_value().unwrap()).collect();
        assert_eq!(values, [1, 2, 3]);
    }

    #[test]
    fn failures_stay_in_their_slot() {
        let boom = Failure::msg("boom");
        let all = when_all([Future::ready(1), Future::failed(boom.clone())]);

        let outcomes = all.get().unwrap();
        assert_eq!(outcomes[0], Outcome::Value(1));
        assert_eq!(outcomes[1], Outcome::Failure(boom));
    }

    #[test]
    fn empty_input() {
        let all = when_all(Vec::<Future<u32>>::new());
        assert_eq!(all.get(), Ok(Vec::new()));
    }

    #[test]
    fn broken_input() {
        let promise = Promise::<u32>::new();
        let all = when_all([promise.get_future()]);
        drop(promise);

        let outcomes = all.get().unwrap();
        let failure = outcomes[0].failure().unwrap();
        assert_eq!(failure.downcast_ref::<Error>(), Some(&Error::BrokenPromise));
    }
}
