// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Cooperative scheduling helpers.

use std::{future::Future, pin::Pin, task};

use futures::{
    future::{Either, FusedFuture},
    FutureExt as _,
};

/// Wakes the current task and returns [`task::Poll::Pending`] once.
///
/// Used at runnable boundaries, so detached operations spawned by the
/// previous runnable get a chance to make progress (and possibly fail) before
/// the next one is entered.
pub(crate) const fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

/// [`Future`] returned by the [`yield_now()`] function.
#[derive(Clone, Copy, Debug)]
pub(crate) struct YieldNow {
    /// Whether the task has been woken already.
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Self::Output> {
        if self.yielded {
            return task::Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        task::Poll::Pending
    }
}

/// Races an invocation's capture against its completion.
///
/// The `capture` is always polled first, so an error raised while the
/// runnable was still executing wins over a completion observed at the same
/// wake-up.
pub(crate) const fn race_capture<C, F>(
    capture: C,
    completion: F,
) -> RaceCapture<C, F>
where
    C: Future + Unpin,
    F: Future + Unpin,
{
    RaceCapture { inner: Some((capture, completion)) }
}

/// [`Future`] returned by the [`race_capture()`] function.
pub(crate) struct RaceCapture<C, F> {
    /// Capture and completion, until one of them resolves.
    inner: Option<(C, F)>,
}

impl<C, F> Future for RaceCapture<C, F>
where
    C: Future + Unpin,
    F: Future + Unpin,
{
    type Output = Either<C::Output, F::Output>;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Self::Output> {
        let Some((mut capture, mut completion)) = self.inner.take() else {
            return task::Poll::Pending;
        };

        if let task::Poll::Ready(failure) = capture.poll_unpin(cx) {
            return task::Poll::Ready(Either::Left(failure));
        }
        if let task::Poll::Ready(outcome) = completion.poll_unpin(cx) {
            return task::Poll::Ready(Either::Right(outcome));
        }

        self.inner = Some((capture, completion));
        task::Poll::Pending
    }
}

impl<C, F> FusedFuture for RaceCapture<C, F>
where
    C: Future + Unpin,
    F: Future + Unpin,
{
    fn is_terminated(&self) -> bool {
        self.inner.is_none()
    }
}

#[cfg(test)]
mod tests {
    use futures::{future, FutureExt as _};

    use super::*;

    #[test]
    fn test_yield_now_resolves_on_second_poll() {
        let mut fut = yield_now();
        assert!((&mut fut).now_or_never().is_none());
        assert_eq!((&mut fut).now_or_never(), Some(()));
    }

    #[tokio::test]
    async fn test_capture_wins_when_both_are_ready() {
        let res = race_capture(future::ready(1), future::ready(2)).await;
        assert!(matches!(res, Either::Left(1)));

        let res =
            race_capture(future::pending::<u8>(), future::ready(2)).await;
        assert!(matches!(res, Either::Right(2)));
    }
}
