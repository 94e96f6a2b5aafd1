//! Lock-aware backoff scheduler.
//!
//! Turns an operation that may fail while the engine holds the advisory lock
//! flag into a retrying future. Two independent backoff loops run in order:
//!
//! 1. poll the lock flag until it reads clear (exhausting this loop is not an
//!    error, it only means the operation is attempted anyway);
//! 2. run the operation, retrying every failure until it succeeds or the
//!    attempt budget is spent, then surface the operation's last error.
//!
//! Concurrently scheduled operations race; no ordering is implied between
//! them. An in-flight retry loop cannot be cancelled individually, only by
//! dropping its future.

mod backoff;


pub(crate) use backoff::*;

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use crate::BackoffPolicy;
use crate::Engine;

/// Zero-sized error used while the lock flag reads held
#[derive(Debug)]
struct LockHeld;

#[derive(Clone)]
pub struct LockAwareScheduler {
    engine: Arc<dyn Engine>,
    policy: BackoffPolicy,
}

impl std::fmt::Debug for LockAwareScheduler {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("LockAwareScheduler").field("policy", &self.policy).finish()
    }
}

impl LockAwareScheduler {
    pub fn new(
        engine: Arc<dyn Engine>,
        policy: BackoffPolicy,
    ) -> Self {
        Self { engine, policy }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Polls the lock flag with backoff. Returns whether it was observed clear.
    pub async fn wait_for_lock(&self) -> bool {
        let engine = &self.engine;
        let cleared = task_with_exponential_backoff(
            "lock",
            &self.policy,
            || async move {
                if engine.lock_is_held() {
                    Err(LockHeld)
                } else {
                    Ok(())
                }
            },
            |_, _| true,
        )
        .await
        .is_ok();

        if !cleared {
            debug!("lock flag still held after backoff, attempting operation anyway");
        }
        cleared
    }

    /// Waits for the lock flag, then runs `op` retrying every failure.
    pub async fn run<F, Fut, T, E>(
        &self,
        op: F,
    ) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Debug,
    {
        self.run_if(op, |_| true).await
    }

    /// Like [`run`](Self::run) but only retries errors accepted by `is_contention`;
    /// any other error is returned immediately.
    pub async fn run_if<F, Fut, T, E, P>(
        &self,
        op: F,
        is_contention: P,
    ) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Debug,
        P: Fn(&E) -> bool,
    {
        self.wait_for_lock().await;
        task_with_exponential_backoff("operation", &self.policy, op, |e, _| is_contention(e)).await
    }

    /// Wraps a synchronous-style operation into an async one scheduled by `self`.
    ///
    /// The returned closure clones its argument for every attempt.
    pub fn wrap<A, F, T, E>(
        &self,
        op: F,
    ) -> impl Fn(A) -> BoxFuture<'static, std::result::Result<T, E>>
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(A) -> std::result::Result<T, E> + Send + Sync + 'static,
        T: Send + 'static,
        E: Debug + Send + 'static,
    {
        let scheduler = self.clone();
        let op = Arc::new(op);
        move |args: A| {
            let scheduler = scheduler.clone();
            let op = op.clone();
            Box::pin(async move {
                scheduler
                    .run(|| {
                        let result = op(args.clone());
                        async move { result }
                    })
                    .await
            })
        }
    }
}
