use core::{
    pin::Pin,
    task::{Context, Poll},
};

use futures_test::task::new_count_waker;

use crate::{
    GroupTokenExt, TaskGroup,
    tests::utils::{Arc, FutureTestExt, SharedData, TESTING_THREADS},
};

#[cfg_attr(not(loom), test)]
pub fn test_group_wait_async_poll() {
    let (waker, counter) = new_count_waker();
    let mut cx = Context::from_waker(&waker);
    let group = TaskGroup::new();
    let token = group.token();
    let mut rx = core::pin::pin!(group.wait_async());
    assert_eq!(rx.as_mut().poll(&mut cx), Poll::Pending);
    assert_eq!(rx.as_mut().poll(&mut cx), Poll::Pending);
    token.release();
    assert_eq!(counter.get(), 1);
    assert_eq!(rx.as_mut().poll(&mut cx), Poll::Ready(()));
    assert!(rx.is_done());
    assert_eq!(rx.as_mut().poll(&mut cx), Poll::Ready(()));
    assert_eq!(counter.get(), 1);
}

#[cfg_attr(not(loom), test)]
pub fn test_group_wait_async_ready_when_empty() {
    let (waker, counter) = new_count_waker();
    let mut cx = Context::from_waker(&waker);
    let group = TaskGroup::new();
    let mut rx = core::pin::pin!(group.wait_async());
    assert_eq!(rx.as_mut().poll(&mut cx), Poll::Ready(()));
    assert_eq!(counter.get(), 0);
}

#[cfg_attr(not(loom), test)]
pub fn test_group_wait_async_created_before_enter() {
    let (waker, counter) = new_count_waker();
    let mut cx = Context::from_waker(&waker);
    let group = TaskGroup::new();
    let mut rx = core::pin::pin!(group.wait_async());
    let token = group.token();
    assert_eq!(rx.as_mut().poll(&mut cx), Poll::Pending);
    token.release();
    assert_eq!(counter.get(), 1);
    assert_eq!(rx.as_mut().poll(&mut cx), Poll::Ready(()));
}

#[cfg_attr(not(loom), test)]
pub fn test_group_wait_async_sees_missed_transition() {
    let (waker, _counter) = new_count_waker();
    let mut cx = Context::from_waker(&waker);
    let group = TaskGroup::new();
    let first = group.token();
    let mut rx = core::pin::pin!(group.wait_async());
    first.release();
    let _second = group.token();
    assert_eq!(rx.as_mut().poll(&mut cx), Poll::Ready(()));
}

#[cfg_attr(not(loom), test)]
pub fn test_group_wait_async_poll_by_others() {
    let (waker_a, counter_a) = new_count_waker();
    let (waker_b, counter_b) = new_count_waker();

    let group = TaskGroup::new();
    let token = group.token();
    let mut rx = core::pin::pin!(group.wait_async());

    let mut cx = Context::from_waker(&waker_a);
    assert_eq!(rx.as_mut().poll(&mut cx), Poll::Pending);

    let mut cx = Context::from_waker(&waker_b);
    assert_eq!(rx.as_mut().poll(&mut cx), Poll::Pending);

    token.release();

    assert_eq!(counter_a.get(), 0);
    assert_eq!(counter_b.get(), 1);
    assert_eq!(rx.as_mut().poll(&mut cx), Poll::Ready(()));
}

#[cfg_attr(not(loom), test)]
pub fn test_group_wait_async_drop_early() {
    let (waker, counter) = new_count_waker();
    let mut cx = Context::from_waker(&waker);

    let group = TaskGroup::new();
    let token = group.token();
    let mut rx = group.wait_async();
    assert_eq!(Pin::new(&mut rx).poll(&mut cx), Poll::Pending);
    drop(rx);

    token.release();
    assert_eq!(counter.get(), 0);
}

#[cfg_attr(not(loom), futures_test::test)]
pub async fn test_group_wait_async_background() {
    let canary = Arc::new(SharedData::new());
    let inspector = canary.clone();
    let bg = TaskGroup::new();
    let group = TaskGroup::new();
    let token = group.token();
    let rx = group.wait_async();
    async move {
        rx.await;
        canary.store();
    }
    .release_on_ready(bg.token())
    .run_in_background();
    assert!(!inspector.load());
    token.release();
    bg.wait_async().await;
    assert!(inspector.load());
}

#[cfg_attr(not(loom), futures_test::test)]
pub async fn test_group_wait_async_multiple_members() {
    let canary = Arc::new(SharedData::new());
    let inspector = canary.clone();
    let bg = TaskGroup::new();
    let group = TaskGroup::new();
    let factory = group.token();
    let rx = group.wait_async();
    async move {
        rx.await;
        canary.store();
    }
    .release_on_ready(bg.token())
    .run_in_background();

    let tokens = core::iter::repeat_n(factory, TESTING_THREADS)
        .map(|t| {
            let member = TaskGroup::new();
            let release = member.token();
            let rx = member.wait_async();
            async move {
                rx.await;
            }
            .release_on_ready(t)
            .run_in_background();
            release
        })
        .collect::<Box<[_]>>();

    assert!(!inspector.load());
    drop(tokens);

    let mut done = core::pin::pin!(bg.wait_async());
    done.as_mut().await;
    assert!(inspector.load());
    assert!(done.is_done());
    assert!(group.is_empty());
}
