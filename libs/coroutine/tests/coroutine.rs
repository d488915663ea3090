// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::thread;

use tracing_subscriber::util::SubscriberInitExt;

use coroutine::{Builder, Coroutine, Error, Id, State, Value, current_id, suspend};

fn init_tracing() -> tracing::subscriber::DefaultGuard {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .set_default()
}

fn unbox<T: Copy + 'static>(value: Option<Value>) -> T {
    *value
        .expect("expected a payload")
        .downcast::<T>()
        .expect("unexpected payload type")
}

#[test]
fn round_trip() {
    let _trace = init_tracing();

    for x in [0_i64, 1, -7, 1 << 40] {
        let co = Coroutine::new(move || {
            suspend(Some(Box::new("first"))).unwrap();
            x * 2
        })
        .unwrap();

        assert_eq!(unbox::<&str>(co.next().unwrap()), "first");
        // the payload only answers the pending `suspend`, it is not a new argument
        assert_eq!(unbox::<i64>(co.send(Some(Box::new(99_i64))).unwrap()), x * 2);
        assert!(matches!(co.next(), Err(Error::CoroutineFinished)));
    }
}

#[test]
fn payloads_flow_both_ways() {
    let co = Coroutine::new(|| {
        let mut total = 0_u32;
        while let Some(value) = suspend(Some(Box::new(total))).unwrap() {
            total += *value.downcast::<u32>().unwrap();
        }
        total
    })
    .unwrap();

    assert_eq!(unbox::<u32>(co.next().unwrap()), 0);
    assert_eq!(unbox::<u32>(co.send(Some(Box::new(3_u32))).unwrap()), 3);
    assert_eq!(unbox::<u32>(co.send(Some(Box::new(4_u32))).unwrap()), 7);
    assert_eq!(unbox::<u32>(co.next().unwrap()), 7);
    assert_eq!(co.state(), State::Finished);
}

#[test]
fn local_state_survives_suspension() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let body_log = log.clone();

    let co = Coroutine::new(move || {
        let mut local = String::from("a");
        for next in ["b", "c"] {
            body_log.borrow_mut().push(local.clone());
            suspend(None).unwrap();
            local.push_str(next);
        }
        body_log.borrow_mut().push(local);
    })
    .unwrap();

    while co.state() != State::Finished {
        co.next().unwrap();
    }
    assert_eq!(*log.borrow(), ["a", "ab", "abc"]);
}

#[test]
fn current_id_tracks_resume_chain() {
    assert_eq!(current_id(), Id::MAIN);

    let inner = Rc::new(
        Coroutine::new(|| {
            suspend(Some(Box::new(current_id()))).unwrap();
        })
        .unwrap(),
    );
    let inner_id = inner.id();

    let outer = {
        let inner = inner.clone();
        Coroutine::new(move || {
            let outer_id = current_id();
            let seen = unbox::<Id>(inner.next().unwrap());
            assert_eq!(current_id(), outer_id);
            (outer_id, seen)
        })
        .unwrap()
    };
    let outer_id = outer.id();

    let ret = outer.next().unwrap().unwrap();
    let (seen_outer, seen_inner) = *ret.downcast::<(Id, Id)>().unwrap();
    assert_eq!(seen_outer, outer_id);
    assert_eq!(seen_inner, inner_id);
    assert_eq!(current_id(), Id::MAIN);

    // the inner coroutine is still suspended and can be resumed from the main coroutine
    assert!(inner.next().unwrap().is_none());
    assert_eq!(inner.state(), State::Finished);
}

#[test]
fn suspend_in_main_is_rejected() {
    assert!(matches!(suspend(None), Err(Error::NotInCoroutine)));
}

#[test]
fn resuming_the_chain_is_rejected() {
    let slot: Rc<RefCell<Option<Rc<Coroutine>>>> = Rc::default();

    let co = {
        let slot = slot.clone();
        Rc::new(
            Coroutine::new(move || {
                let this = slot.borrow().clone().unwrap();
                matches!(this.next(), Err(Error::AlreadyRunning))
            })
            .unwrap(),
        )
    };
    *slot.borrow_mut() = Some(co.clone());

    assert!(unbox::<bool>(co.next().unwrap()));
    slot.borrow_mut().take();
}

#[test]
fn panic_reaches_resumer() {
    let co = Builder::new()
        .name("panicky")
        .spawn(|| {
            suspend(None).unwrap();
            panic!("inside coroutine");
        })
        .unwrap();

    co.next().unwrap();
    let payload = panic::catch_unwind(AssertUnwindSafe(|| co.next())).unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"inside coroutine"));

    assert_eq!(co.state(), State::Finished);
    assert!(matches!(co.next(), Err(Error::CoroutineFinished)));
    // the resume chain was unwound properly
    assert_eq!(current_id(), Id::MAIN);
}

#[test]
fn threads_have_their_own_main() {
    let handles: Vec<_> = (0..4)
        .map(|i| {
            thread::spawn(move || {
                assert_eq!(current_id(), Id::MAIN);
                let co = Coroutine::new(move || {
                    let id = current_id();
                    suspend(None).unwrap();
                    (id, i)
                })
                .unwrap();
                co.next().unwrap();
                let (id, n) = *co.next().unwrap().unwrap().downcast::<(Id, i32)>().unwrap();
                assert_eq!(id, co.id());
                n
            })
        })
        .collect();

    let mut seen: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    seen.sort_unstable();
    assert_eq!(seen, [0, 1, 2, 3]);
}

#[test]
fn deep_recursion_fits_default_stack() {
    fn depth(n: u32) -> u32 {
        if n == 0 { 0 } else { 1 + std::hint::black_box(depth(n - 1)) }
    }

    let co = Coroutine::new(|| depth(1000)).unwrap();
    assert_eq!(unbox::<u32>(co.next().unwrap()), 1000);
}

#[test]
fn large_captures() {
    let big = [7_u8; 4096];
    let co = Coroutine::new(move || {
        suspend(None).unwrap();
        big.iter().map(|&b| u32::from(b)).sum::<u32>()
    })
    .unwrap();

    co.next().unwrap();
    assert_eq!(unbox::<u32>(co.next().unwrap()), 7 * 4096);
}

#[test]
fn partially_drained_generator() {
    let live = Rc::new(RefCell::new(Vec::new()));

    let co = {
        let live = live.clone();
        Coroutine::new(move || {
            for i in 0_u32.. {
                let item = Rc::new(i);
                live.borrow_mut().push(Rc::downgrade(&item));
                suspend(Some(Box::new(i))).unwrap();
            }
        })
        .unwrap()
    };

    for expected in 0..3_u32 {
        assert_eq!(unbox::<u32>(co.next().unwrap()), expected);
    }
    assert!(live.borrow().last().unwrap().upgrade().is_some());

    drop(co);
    assert!(live.borrow().iter().all(|item| item.upgrade().is_none()));
}
