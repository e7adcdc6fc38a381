//! Walks through every primitive. Run with `RUST_LOG=compact_dispatch=trace`
//! to see the library's own events.

use std::{
    sync::{Arc, mpsc},
    thread,
    time::{Duration, Instant},
};

use compact_dispatch::{
    CancellableTask, GuardedStack, Inline, PermitPool, SerialQueue, SyncBridge, TaskGroup,
    ThreadExecutor, concurrent_perform,
};
use tracing_subscriber::EnvFilter;

const UNIT: Duration = Duration::from_millis(200);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    locked_numbers();
    counter();
    work_item()?;
    group_notify();
    batch();
    async_to_sync()?;
    Ok(())
}

fn locked_numbers() {
    let items = GuardedStack::new();
    for n in [1, 2, 5, 3] {
        items.append(n);
    }
    items.remove_last();
    items.remove_last();
    items.append(3);
    println!("locked numbers: {:?}", items.snapshot());
}

fn counter() {
    let started = Instant::now();
    let array = GuardedStack::new();
    concurrent_perform(1000, |_| {
        array.with_mut(|v| {
            let last = v.last().copied().unwrap_or(0);
            v.push(last + 1);
        });
    });
    println!(
        "safe loop took {:.3} seconds, count: {}",
        started.elapsed().as_secs_f64(),
        array.len()
    );
}

fn work_item() -> compact_dispatch::Result<()> {
    let main = SerialQueue::new("main");
    let task = CancellableTask::from_steps(1..6, |i| {
        thread::sleep(UNIT);
        println!("{i}");
    });
    let (done_tx, done_rx) = mpsc::channel();
    task.notify(main.clone(), move |outcome| {
        println!("done: {outcome:?}");
        let _ = done_tx.send(());
    })?;
    task.start(ThreadExecutor::new())?;

    let canceller = task.clone();
    thread::spawn(move || {
        thread::sleep(2 * UNIT);
        canceller.cancel();
    });
    let _ = done_rx.recv();
    Ok(())
}

fn group_notify() {
    let group = TaskGroup::new();
    for delay in 1..=3 {
        group.spawn(ThreadExecutor::new(), move || {
            thread::sleep(delay * UNIT);
            println!("{delay}");
        });
    }
    let (tx, rx) = mpsc::channel();
    group.notify(Inline, move || {
        let _ = tx.send(());
    });
    let _ = rx.recv();
    println!("done");
}

fn batch() {
    let pool = Arc::new(PermitPool::new(5));
    let group = TaskGroup::new();
    let started = Instant::now();
    for i in 0..10 {
        let pool = pool.clone();
        group.spawn(ThreadExecutor::new(), move || {
            pool.run(|| thread::sleep(2 * UNIT));
            println!("{i}");
        });
    }
    group.wait();
    println!("batch finished in {:?}", started.elapsed());
}

fn async_to_sync() -> compact_dispatch::Result<()> {
    let bridge = SyncBridge::new(ThreadExecutor::new());
    let response = bridge.call(|done| {
        thread::sleep(2 * UNIT);
        done.complete("done");
    })?;
    println!("{response}");
    Ok(())
}
