// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Waiting for a single invocation of a runnable.

use std::time::Duration;

use futures::{
    future::{Either, LocalBoxFuture},
    FutureExt as _,
};

use crate::{
    error::Failure,
    future::{race_capture, yield_now},
    interceptor::CaptureGuard,
    runnable::Outcome,
};

/// Waits for the `completion` of an invocation bound to the given `guard`.
///
/// An error captured by the `guard` before the completion is recorded wins
/// over whatever the completion resolves with, so a single logical error is
/// never counted twice. Elapsing the `timeout` only stops waiting: the
/// abandoned operation keeps its [`UncaughtHandle`], whose errors become late
/// once the `guard` is completed here.
///
/// Yields once before returning, letting detached operations progress.
///
/// [`UncaughtHandle`]: crate::UncaughtHandle
pub(super) async fn await_completion(
    guard: &mut CaptureGuard,
    completion: LocalBoxFuture<'static, Outcome>,
    timeout: Option<Duration>,
) -> Outcome {
    let outcome = {
        let raced =
            race_capture(guard.captured().boxed_local(), completion).map(
                |res| match res {
                    Either::Left(failure) => Outcome::Fail(failure),
                    Either::Right(outcome) => outcome,
                },
            );

        match timeout {
            Some(dur) => tokio::time::timeout(dur, raced)
                .await
                .unwrap_or_else(|_| Outcome::Fail(Failure::timeout(dur))),
            None => raced.await,
        }
    };

    let outcome = match guard.complete() {
        Some(failure) => Outcome::Fail(failure),
        None => outcome,
    };
    yield_now().await;
    outcome
}

/// Resolves the effective timeout: [`Duration::ZERO`] disables it.
pub(super) fn effective_timeout(timeout: Duration) -> Option<Duration> {
    (!timeout.is_zero()).then_some(timeout)
}

#[cfg(test)]
mod tests {
    use futures::channel::oneshot;

    use super::*;
    use crate::interceptor::Interceptor;

    fn guard(interceptor: &Interceptor) -> CaptureGuard {
        interceptor.install("t".into(), "suite t".into())
    }

    #[tokio::test]
    async fn test_completion_outcome_is_kept() {
        let interceptor = Interceptor::new();
        let mut g = guard(&interceptor);

        let outcome = await_completion(
            &mut g,
            futures::future::ready(Outcome::Skip).boxed_local(),
            None,
        )
        .await;

        assert_eq!(outcome, Outcome::Skip);
        assert!(!interceptor.is_installed());
    }

    #[tokio::test]
    async fn test_captured_error_wins_over_completion() {
        let interceptor = Interceptor::new();
        let mut g = guard(&interceptor);
        g.handle().raise("sync error");

        let outcome = await_completion(
            &mut g,
            futures::future::ready(Outcome::fail("done error")).boxed_local(),
            None,
        )
        .await;

        assert_eq!(outcome, Outcome::Fail(Failure::uncaught("sync error")));
        assert!(interceptor.drain_late().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_abandons_the_wait() {
        let interceptor = Interceptor::new();
        let mut g = guard(&interceptor);
        let handle = g.handle();
        let (_tx, rx) = oneshot::channel::<Outcome>();

        let outcome = await_completion(
            &mut g,
            rx.map(|r| r.unwrap_or(Outcome::Continue)).boxed_local(),
            Some(Duration::from_millis(10)),
        )
        .await;

        assert_eq!(
            outcome,
            Outcome::Fail(Failure::timeout(Duration::from_millis(10))),
        );

        handle.raise("stray");
        assert_eq!(interceptor.drain_late().len(), 1);
    }

    #[test]
    fn test_zero_timeout_disables() {
        assert_eq!(effective_timeout(Duration::ZERO), None);
        assert_eq!(
            effective_timeout(Duration::from_secs(2)),
            Some(Duration::from_secs(2)),
        );
    }
}
