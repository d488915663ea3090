// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::error::Error;
use crate::failure::Failure;
use crate::loom::sync::Arc;
use crate::outcome::Outcome;
use crate::promise::Promise;
use crate::scheduler::Scheduler;
use crate::state::{Continuation, Progress, State, Subscribe, Take};
use crate::trampoline;
use crate::DEFAULT_WAIT_TIMEOUT;
use core::fmt;
use core::time::Duration;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Condvar, Mutex, PoisonError};

/// The consuming half of a [`Promise`].
///
/// A future is consumed exactly once, either by blocking on it ([`wait`](Future::wait),
/// [`get`](Future::get)) or by attaching a continuation ([`then`](Future::then) and friends),
/// which yields a new future for the continuation's own result.
///
/// Continuations take the [`Outcome`] of the previous stage and return the outcome of their own.
/// A continuation runs on the thread that completes the previous stage, or on the attaching
/// thread if the outcome was already there, unless a [`Scheduler`] is given, in which case it is
/// always submitted to that scheduler. Panics inside continuations are caught and stored as a
/// [`Failure`].
pub struct Future<T> {
    state: Arc<State<T>>,
}

impl<T> Future<T> {
    pub(crate) fn from_state(state: Arc<State<T>>) -> Self {
        Self { state }
    }

    /// Whether the outcome is available and has not been consumed.
    pub fn is_ready(&self) -> bool {
        self.state.progress() == Progress::Completed
    }
}

impl<T: Send + 'static> Future<T> {
    /// A future that is already completed with `value`.
    pub fn ready(value: T) -> Self {
        let (promise, future) = Promise::pair();
        promise.set_value(value);
        future
    }

    /// A future that is already completed with `failure`.
    pub fn failed(failure: impl Into<Failure>) -> Self {
        let (promise, future) = Promise::pair();
        promise.set_failure(failure);
        future
    }

    /// Attaches a continuation, returning the future of its result.
    ///
    /// The continuation always runs, receiving either the value or the failure of this stage.
    pub fn then<U, F>(self, f: F) -> Future<U>
    where
        U: Send + 'static,
        F: FnOnce(Outcome<T>) -> Outcome<U> + Send + 'static,
    {
        let (promise, future) = Promise::pair();
        self.on_complete(move |outcome| {
            promise.set_outcome(run_continuation(f, outcome));
        });
        future
    }

    /// Like [`then`](Future::then), but the continuation is always submitted to `scheduler`.
    pub fn then_on<S, U, F>(self, scheduler: S, f: F) -> Future<U>
    where
        S: Scheduler + 'static,
        U: Send + 'static,
        F: FnOnce(Outcome<T>) -> Outcome<U> + Send + 'static,
    {
        let (promise, future) = Promise::pair();
        self.on_complete_via(scheduler, move |outcome| {
            promise.set_outcome(run_continuation(f, outcome));
        });
        future
    }

    /// Attaches a continuation that itself returns a future.
    ///
    /// The returned future completes when the continuation's future does, without blocking any
    /// thread in between.
    pub fn then_future<U, F>(self, f: F) -> Future<U>
    where
        U: Send + 'static,
        F: FnOnce(Outcome<T>) -> Future<U> + Send + 'static,
    {
        let (promise, future) = Promise::pair();
        self.on_complete(move |outcome| forward(run_future_continuation(f, outcome), promise));
        future
    }

    /// Like [`then_future`](Future::then_future), but the continuation is always submitted to
    /// `scheduler`.
    pub fn then_future_on<S, U, F>(self, scheduler: S, f: F) -> Future<U>
    where
        S: Scheduler + 'static,
        U: Send + 'static,
        F: FnOnce(Outcome<T>) -> Future<U> + Send + 'static,
    {
        let (promise, future) = Promise::pair();
        self.on_complete_via(scheduler, move |outcome| {
            forward(run_future_continuation(f, outcome), promise);
        });
        future
    }

    /// Maps the value of this future. Failures skip `f` and pass through unchanged.
    pub fn map<U, F>(self, f: F) -> Future<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.then(move |outcome| outcome.map(f))
    }

    /// Turns a failure back into a value. Values skip `f` and pass through unchanged.
    pub fn recover<F>(self, f: F) -> Future<T>
    where
        F: FnOnce(Failure) -> T + Send + 'static,
    {
        self.then(move |outcome| match outcome {
            Outcome::Failure(failure) => Outcome::Value(f(failure)),
            outcome => outcome,
        })
    }

    /// Arranges for the future to time out after `duration`.
    ///
    /// When the timer submitted to `scheduler` fires while the future is still pending, the
    /// future moves to the timed-out state and `callback` runs. Any continuation attached to it
    /// is dropped without running. If the outcome arrived first, the timer does nothing.
    ///
    /// Only this link is guarded: a timeout registered at the end of a chain does not reach the
    /// stages before it.
    pub fn on_timeout<S, F>(self, duration: Duration, callback: F, scheduler: &S) -> Future<T>
    where
        S: Scheduler + ?Sized,
        F: FnOnce() + Send + 'static,
    {
        let state = self.state.clone();
        scheduler.schedule_after(
            duration,
            Box::new(move || {
                if state.expire() {
                    tracing::debug!(?duration, "future timed out");
                    callback();
                }
            }),
        );
        self
    }

    /// Blocks the current thread until the outcome is available, then returns it.
    ///
    /// Must not be called on the thread that is going to complete the promise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if `timeout` elapses first (the future then moves to the
    /// timed-out state and a late completion is ignored) or if the future had already timed out.
    pub fn wait_outcome(self, timeout: Duration) -> Result<Outcome<T>, Error> {
        match self.state.take()? {
            Take::Ready(outcome) => return Ok(outcome),
            Take::Pending => {}
        }

        let rendezvous = std::sync::Arc::new(Rendezvous::new());
        let notify = Notify(Some(rendezvous.clone()));
        let state = self.state.clone();
        // only stores the outcome, no need to go through the trampoline
        self.subscribe(Box::new(move |outcome| notify.fulfill(outcome)));

        if let Some(res) = rendezvous.wait_for(timeout) {
            return res;
        }

        tracing::trace!(?timeout, "wait deadline passed");
        // either this drops the `Notify`, which reports the timeout, or a completion won the race
        // and is about to fulfill it
        state.expire();
        rendezvous.wait()
    }

    /// Blocks until the value is available, see [`wait_outcome`](Future::wait_outcome).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Failed`] with the captured failure if the future failed, in addition to
    /// the errors of [`wait_outcome`](Future::wait_outcome).
    pub fn wait(self, timeout: Duration) -> Result<T, Error> {
        self.wait_outcome(timeout)?.into_value()
    }

    /// [`wait`](Future::wait) with [`DEFAULT_WAIT_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// See [`wait`](Future::wait).
    pub fn get(self) -> Result<T, Error> {
        self.wait(DEFAULT_WAIT_TIMEOUT)
    }

    /// Registers `f` to run with the outcome. If a continuation is already running on the
    /// completing thread, `f` runs after it returned instead of nested inside it.
    pub(crate) fn on_complete<F>(self, f: F)
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        self.subscribe(Box::new(move |outcome| {
            trampoline::run(Box::new(move || f(outcome)));
        }));
    }

    fn subscribe(self, continuation: Continuation<T>) {
        match self.state.subscribe(continuation) {
            Subscribe::Stored => {}
            Subscribe::Ready(continuation, outcome) => continuation(outcome),
            Subscribe::Rejected(continuation, err) => {
                tracing::debug!(%err, "dropping continuation of a finished future");
                drop(continuation);
            }
        }
    }

    fn on_complete_via<S, F>(self, scheduler: S, f: F)
    where
        S: Scheduler + 'static,
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        self.on_complete(move |outcome| {
            tracing::trace!("submitting continuation to scheduler");
            scheduler.schedule(Box::new(move || f(outcome)));
        });
    }
}

impl<T: Send + 'static> Future<Future<T>> {
    /// Collapses one level of nesting.
    ///
    /// The returned future completes with the inner future's outcome, whether the inner future
    /// was already complete or completes later. A failure of the outer future is passed through.
    pub fn flatten(self) -> Future<T> {
        self.then_future(|outcome| match outcome {
            Outcome::Value(inner) => inner,
            Outcome::Failure(failure) => Future::failed(failure),
            Outcome::Empty => Future::failed(Error::UninitializedAccess),
        })
    }
}

impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("state", &self.state)
            .finish()
    }
}

fn run_continuation<T, U, F>(f: F, outcome: Outcome<T>) -> Outcome<U>
where
    F: FnOnce(Outcome<T>) -> Outcome<U>,
{
    panic::catch_unwind(AssertUnwindSafe(move || f(outcome))).unwrap_or_else(|payload| {
        let failure = Failure::from_panic(payload);
        tracing::debug!(%failure, "continuation panicked");
        Outcome::Failure(failure)
    })
}

fn run_future_continuation<T, U, F>(f: F, outcome: Outcome<T>) -> Future<U>
where
    U: Send + 'static,
    F: FnOnce(Outcome<T>) -> Future<U>,
{
    panic::catch_unwind(AssertUnwindSafe(move || f(outcome))).unwrap_or_else(|payload| {
        let failure = Failure::from_panic(payload);
        tracing::debug!(%failure, "continuation panicked");
        Future::failed(failure)
    })
}

/// Completes `promise` once `inner` completes.
fn forward<U: Send + 'static>(inner: Future<U>, promise: Promise<U>) {
    inner.on_complete(move |outcome| {
        promise.set_outcome(outcome);
    });
}

/// The slot a blocked [`Future::wait_outcome`] sleeps on.
struct Rendezvous<T> {
    res: Mutex<Option<Result<Outcome<T>, Error>>>,
    cond: Condvar,
}

impl<T> Rendezvous<T> {
    fn new() -> Self {
        Self {
            res: Mutex::new(None),
            cond: Condvar::new(),
        }
    }

    fn put(&self, res: Result<Outcome<T>, Error>) {
        *self.res.lock().unwrap_or_else(PoisonError::into_inner) = Some(res);
        self.cond.notify_one();
    }

    fn wait_for(&self, timeout: Duration) -> Option<Result<Outcome<T>, Error>> {
        let guard = self.res.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut guard, _) = self
            .cond
            .wait_timeout_while(guard, timeout, |res| res.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        guard.take()
    }

    fn wait(&self) -> Result<Outcome<T>, Error> {
        let guard = self.res.lock().unwrap_or_else(PoisonError::into_inner);
        let mut guard = self
            .cond
            .wait_while(guard, |res| res.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        guard.take().unwrap_or(Err(Error::Timeout))
    }
}

/// Fills a [`Rendezvous`] with the outcome, or with [`Error::Timeout`] if it is dropped first.
struct Notify<T>(Option<std::sync::Arc<Rendezvous<T>>>);

impl<T> Notify<T> {
    fn fulfill(mut self, outcome: Outcome<T>) {
        if let Some(rendezvous) = self.0.take() {
            rendezvous.put(Ok(outcome));
        }
    }
}

impl<T> Drop for Notify<T> {
    fn drop(&mut self) {
        if let Some(rendezvous) = self.0.take() {
            rendezvous.put(Err(Error::Timeout));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{ManualScheduler, ThreadScheduler};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::Instant;

    #[test]
    fn then_after_completion_runs_inline() {
        let promise = Promise::new();
        let future = promise.get_future();
        promise.set_value(20);

        let ran = std::sync::Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let next = future.then(move |outcome| {
            flag.store(true, Ordering::SeqCst);
            outcome.map(|x| x + 1)
        });

        assert!(ran.load(Ordering::SeqCst));
        assert!(next.is_ready());
        assert_eq!(next.get(), Ok(21));
    }

    #[test]
    fn then_before_completion_runs_on_completer() {
        let promise = Promise::new();
        let future = promise.get_future().map(|x: u32| x * 3);
        assert!(!future.is_ready());

        let producer = thread::spawn(move || {
            promise.set_value(4);
        });

        assert_eq!(future.get(), Ok(12));
        producer.join().unwrap();
    }

    #[test]
    fn failure_reaches_later_stages() {
        let promise = Promise::<u32>::new();
        let boom = Failure::msg("boom");

        let seen = std::sync::Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let future = promise
            .get_future()
            .then(|outcome| outcome.map(|x| x + 1))
            .then(move |outcome| {
                counter.fetch_add(1, Ordering::SeqCst);
                outcome
            });

        promise.set_failure(boom.clone());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(future.get(), Err(Error::Failed(boom)));
    }

    #[test]
    fn panic_is_captured() {
        let future = Future::ready(1_u32).then(|_| -> Outcome<u32> { panic!("kaboom") });
        let failure = future.get().unwrap_err().into_failure();
        assert!(failure.is_panic());
        assert_eq!(failure.to_string(), "continuation panicked: kaboom");
    }

    #[test]
    fn recover_replaces_failure() {
        let future = Future::<u32>::failed(Failure::msg("nope")).recover(|_| 0);
        assert_eq!(future.get(), Ok(0));

        let future = Future::ready(5_u32).recover(|_| 0);
        assert_eq!(future.get(), Ok(5));
    }

    #[test]
    fn then_future_flattens_without_blocking() {
        let inner = Promise::new();
        let inner_future = inner.get_future();

        let future = Future::ready(1_u32).then_future(move |_| inner_future);
        assert!(!future.is_ready());

        inner.set_value("inner");
        assert_eq!(future.get(), Ok("inner"));
    }

    #[test]
    fn flatten_pending_and_ready() {
        let outer = Promise::new();
        let inner = Promise::new();
        let nested = outer.get_future();

        outer.set_value(inner.get_future());
        let flat = nested.flatten();
        assert!(!flat.is_ready());
        inner.set_value(7);
        assert_eq!(flat.get(), Ok(7));

        let flat = Future::ready(Future::ready(7)).flatten();
        assert_eq!(flat.get(), Ok(7));
    }

    #[test]
    fn then_on_always_goes_through_scheduler() {
        let scheduler = std::sync::Arc::new(ManualScheduler::default());

        let future =
            Future::ready(2_u32).then_on(scheduler.clone(), |outcome| outcome.map(|x| x * 10));
        assert!(!future.is_ready());
        assert_eq!(scheduler.run_all(), 1);
        assert_eq!(future.get(), Ok(20));

        let future = Future::ready(2_u32).then_future_on(scheduler.clone(), |outcome| {
            Future::ready(outcome.into_value().unwrap() + 1)
        });
        assert_eq!(scheduler.run_all(), 1);
        assert_eq!(future.get(), Ok(3));
    }

    #[test]
    fn wait_times_out_at_deadline() {
        let promise = Promise::<u32>::new();
        let future = promise.get_future();

        let timeout = Duration::from_millis(50);
        let start = Instant::now();
        assert_eq!(future.wait(timeout), Err(Error::Timeout));
        let elapsed = start.elapsed();
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_secs(5));

        // the state timed out, completing it now has no effect
        assert!(!promise.set_value(1));
    }

    #[test]
    fn on_timeout_fires_when_pending() {
        let scheduler = ManualScheduler::default();
        let promise = Promise::<u32>::new();

        let fired = std::sync::Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let future = promise.get_future().on_timeout(
            Duration::from_secs(1),
            move || flag.store(true, Ordering::SeqCst),
            &scheduler,
        );

        assert_eq!(scheduler.fire_timers(), 1);
        assert!(fired.load(Ordering::SeqCst));
        assert!(!promise.set_value(3));
        assert_eq!(future.wait(Duration::ZERO), Err(Error::Timeout));
    }

    #[test]
    fn on_timeout_is_noop_after_completion() {
        let scheduler = ManualScheduler::default();
        let promise = Promise::<u32>::new();

        let fired = std::sync::Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let future = promise.get_future().on_timeout(
            Duration::from_secs(1),
            move || flag.store(true, Ordering::SeqCst),
            &scheduler,
        );

        promise.set_value(3);
        scheduler.fire_timers();
        assert!(!fired.load(Ordering::SeqCst));
        assert_eq!(future.get(), Ok(3));
    }

    #[test]
    fn timed_out_continuation_breaks_downstream() {
        let scheduler = ManualScheduler::default();
        let promise = Promise::<u32>::new();

        let next = promise
            .get_future()
            .on_timeout(Duration::from_secs(1), || {}, &scheduler)
            .map(|x| x + 1);
        scheduler.fire_timers();

        let failure = next.get().unwrap_err().into_failure();
        assert_eq!(failure.downcast_ref::<Error>(), Some(&Error::BrokenPromise));
    }

    #[test]
    fn long_pending_chains_complete_on_a_small_stack() {
        const STAGES: u32 = 20_000;

        let worker = thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(|| {
                let promise = Promise::new();
                let mut future = promise.get_future();
                for _ in 0..STAGES {
                    future = future.map(|x: u32| x + 1);
                }
                for _ in 0..STAGES {
                    future = future.then_future(|outcome| match outcome.into_value() {
                        Ok(x) => Future::ready(x + 1),
                        Err(err) => Future::failed(err),
                    });
                }

                promise.set_value(0);
                future.get()
            })
            .unwrap();

        assert_eq!(worker.join().unwrap(), Ok(2 * STAGES));
    }

    #[test]
    fn thread_scheduler_end_to_end() {
        let scheduler = std::sync::Arc::new(ThreadScheduler);
        let promise = Promise::new();

        let future = promise
            .get_future()
            .then_on(scheduler.clone(), |outcome| outcome.map(|x: u32| x + 1))
            .then_on(scheduler, |outcome| outcome.map(|x| x * 2));

        thread::spawn(move || promise.set_value(5));
        assert_eq!(future.get(), Ok(12));
    }
}
