// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use criterion::{Criterion, criterion_group, criterion_main};
use fiber::stack::DefaultFiberStack;
use fiber::{Fiber, FiberResult};
use std::hint::black_box;

fn fiber_switch(c: &mut Criterion) {
    let stack = DefaultFiberStack::new(DefaultFiberStack::DEFAULT_SIZE).unwrap();
    // echoes every input until it receives `None`
    let mut echo = Fiber::with_stack(stack, |mut input: Option<usize>, suspend| {
        while let Some(val) = input {
            input = suspend.suspend(val);
        }
    });

    c.bench_function("fiber_switch", |b| {
        b.iter(|| echo.resume(black_box(Some(0usize))));
    });

    // let the fiber finish so its stack is released normally
    assert_eq!(echo.resume(None), FiberResult::Return(()));
}

fn fiber_call(c: &mut Criterion) {
    // don't count the time spent mapping a stack
    let mut stack = DefaultFiberStack::new(DefaultFiberStack::DEFAULT_SIZE).unwrap();

    c.bench_function("fiber_call", move |b| {
        b.iter(|| {
            let mut identity =
                Fiber::<usize, (), usize, _>::with_stack(&mut stack, |input, _suspend| input);
            identity.resume(black_box(0usize))
        });
    });
}

criterion_group!(benches, fiber_switch, fiber_call);
criterion_main!(benches);
