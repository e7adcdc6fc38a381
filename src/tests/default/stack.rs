use crate::{
    GuardedStack,
    tests::utils::{Arc, Counter, OPS_PER_THREAD, TESTING_THREADS, thread},
};

#[cfg_attr(not(loom), test)]
pub fn test_stack_append_remove() {
    let items = GuardedStack::new();
    items.append(1);
    items.append(2);
    items.append(5);
    items.append(3);
    assert_eq!(items.remove_last(), Some(3));
    assert_eq!(items.remove_last(), Some(5));
    items.append(3);
    assert_eq!(items.snapshot(), [1, 2, 3]);
    assert_eq!(items.last(), Some(3));
    assert_eq!(items.len(), 3);
}

#[cfg_attr(not(loom), test)]
pub fn test_stack_remove_empty() {
    let items = GuardedStack::<u32>::new();
    assert_eq!(items.remove_last(), None);
    assert!(items.is_empty());
    items.append(7);
    assert_eq!(items.remove_last(), Some(7));
    assert_eq!(items.remove_last(), None);
    assert_eq!(items.into_inner(), []);
}

#[cfg_attr(not(loom), test)]
pub fn test_stack_snapshot_is_a_copy() {
    let items: GuardedStack<_> = [1, 2].into_iter().collect();
    let mut copy = items.snapshot();
    copy.push(3);
    items.append(4);
    assert_eq!(copy, [1, 2, 3]);
    assert_eq!(items.snapshot(), [1, 2, 4]);
}

#[cfg_attr(not(loom), test)]
pub fn test_stack_concurrent_append_remove() {
    let items = Arc::new(GuardedStack::new());
    let removed = Arc::new(Counter::new());
    let handles = (0..TESTING_THREADS)
        .map(|t| {
            let items = items.clone();
            let removed = removed.clone();
            thread::spawn(move || {
                for op in 0..OPS_PER_THREAD {
                    items.append(t * OPS_PER_THREAD + op);
                    if op % 2 == 1 && items.remove_last().is_some() {
                        removed.bump();
                    }
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(
        items.len(),
        TESTING_THREADS * OPS_PER_THREAD - removed.get()
    );
}

#[cfg_attr(not(loom), test)]
pub fn test_stack_with_mut_is_atomic() {
    let counter = Arc::new(GuardedStack::new());
    let handles = (0..TESTING_THREADS)
        .map(|_| {
            let counter = counter.clone();
            thread::spawn(move || {
                for _ in 0..OPS_PER_THREAD {
                    counter.with_mut(|v| {
                        let next = v.last().copied().unwrap_or(0) + 1;
                        v.push(next);
                    });
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }
    let expected = (1..=TESTING_THREADS * OPS_PER_THREAD).collect::<Vec<_>>();
    assert_eq!(counter.snapshot(), expected);
}
