use core::{
    ops::Deref,
    pin::Pin,
    task::{Context, Poll},
};

use pin_project_lite::pin_project;

use crate::GroupToken;

pin_project! {
    /// Future returned by [`GroupTokenExt::release_on_ready`].
    #[derive(Debug)]
    pub struct ReleaseOnReady<F> {
        #[pin]
        inner: F,
        token: Option<GroupToken>,
    }
}

impl<F> Deref for ReleaseOnReady<F> {
    type Target = F;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<F> ReleaseOnReady<F> {
    pub fn inner_pin(self: Pin<&mut Self>) -> Pin<&mut F> {
        self.project().inner
    }

    /// The token, until the inner future completes.
    pub fn token(&self) -> Option<&GroupToken> {
        self.token.as_ref()
    }
}

impl<F: Future> Future for ReleaseOnReady<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let output = core::task::ready!(this.inner.poll(cx));
        drop(this.token.take());
        Poll::Ready(output)
    }
}

pub trait GroupTokenExt: Sized {
    /// Keeps `token` alive until this future completes, then leaves the group.
    ///
    /// Dropping the future before completion also leaves the group.
    fn release_on_ready(self, token: GroupToken) -> ReleaseOnReady<Self>;
}

impl<F: Future> GroupTokenExt for F {
    fn release_on_ready(self, token: GroupToken) -> ReleaseOnReady<Self> {
        ReleaseOnReady {
            inner: self,
            token: Some(token),
        }
    }
}
