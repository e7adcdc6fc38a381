use crate::{
    Inline, TaskGroup,
    tests::utils::{Arc, Counter, SharedData, TESTING_THREADS, thread},
};

#[cfg_attr(not(loom), test)]
pub fn test_group_wait_when_empty() {
    let group = TaskGroup::new();
    assert!(group.is_empty());
    group.wait();
    assert_eq!(group.live(), 0);
}

#[cfg_attr(not(loom), test)]
pub fn test_group_notify_when_empty() {
    let fired = Arc::new(SharedData::new());
    let group = TaskGroup::new();
    let canary = fired.clone();
    group.notify(Inline, move || canary.store());
    assert!(fired.load());
}

#[cfg_attr(not(loom), test)]
pub fn test_group_notify_fires_once() {
    let fired = Arc::new(Counter::new());
    let group = TaskGroup::new();
    group.enter();
    group.enter();
    let canary = fired.clone();
    group.notify(Inline, move || {
        canary.bump();
    });
    group.leave();
    assert_eq!(fired.get(), 0);
    group.leave();
    assert_eq!(fired.get(), 1);

    group.enter();
    group.leave();
    assert_eq!(fired.get(), 1);
}

#[cfg_attr(not(loom), test)]
pub fn test_group_notify_consumed_per_transition() {
    let first = Arc::new(Counter::new());
    let second = Arc::new(Counter::new());
    let group = TaskGroup::new();

    group.enter();
    let canary = first.clone();
    group.notify(Inline, move || {
        canary.bump();
    });
    group.leave();

    group.enter();
    let canary = second.clone();
    group.notify(Inline, move || {
        canary.bump();
    });
    assert_eq!((first.get(), second.get()), (1, 0));
    group.leave();
    assert_eq!((first.get(), second.get()), (1, 1));
}

#[cfg_attr(not(loom), test)]
pub fn test_group_token_leaves_on_drop() {
    let group = TaskGroup::new();
    let token = group.token();
    assert_eq!(group.live(), 1);
    let (token_a, token_b) = token.scope(|token| (token.clone(), token));
    assert_eq!(token_a.live(), 2);
    token_b.release();
    assert_eq!(group.live(), 1);
    drop(token_a);
    assert!(group.is_empty());
}

#[cfg_attr(not(loom), test)]
pub fn test_group_wait_across_threads() {
    let group = TaskGroup::new();
    let done = Arc::new(Counter::new());
    let handles = (0..TESTING_THREADS)
        .map(|_| {
            group.enter();
            let member = group.clone();
            let done = done.clone();
            thread::spawn(move || {
                done.bump();
                member.leave();
            })
        })
        .collect::<Vec<_>>();
    group.wait();
    assert_eq!(done.get(), TESTING_THREADS);
    assert!(group.is_empty());
    for handle in handles {
        handle.join().unwrap();
    }
}

#[cfg_attr(not(loom), test)]
pub fn test_group_notify_observes_empty_group() {
    let observed = Arc::new(Counter::new());
    let fired = Arc::new(SharedData::new());
    let group = TaskGroup::new();
    let handles = (0..TESTING_THREADS)
        .map(|_| {
            let token = group.token();
            thread::spawn(move || token.release())
        })
        .collect::<Vec<_>>();
    let (canary, inspector) = (fired.clone(), group.clone());
    let live = observed.clone();
    group.notify(Inline, move || {
        for _ in 0..inspector.live() {
            live.bump();
        }
        canary.store();
    });
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(fired.load());
    assert_eq!(observed.get(), 0);
}

#[cfg_attr(not(loom), test)]
pub fn test_group_wait_and_notify_share_transition() {
    let fired = Arc::new(SharedData::new());
    let group = TaskGroup::new();
    let token = group.token();
    let canary = fired.clone();
    group.notify(Inline, move || canary.store());
    let member = thread::spawn(move || token.release());
    group.wait();
    member.join().unwrap();
    assert!(fired.load());
}
