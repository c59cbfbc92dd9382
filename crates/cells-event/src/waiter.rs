//! Single-use rendezvous carrying one [`Payload`].
//!
//! A [`PayloadWaiter`] lets a caller outside the mesh block on a result that
//! a cell produces asynchronously:
//!
//! ```text
//! caller                               cell loop
//!   │ waiter = PayloadWaiter::new()       │
//!   │ emit(request{waiter}) ─────────────►│
//!   │ waiter.wait(ctx) ...                │ waiter.set(result)
//!   │◄────────────────────────────────────┘
//! ```
//!
//! The first `set` wins; later calls are dropped and report `false`.
//! Every handle and every concurrent `wait` observes the same value.

use crate::context::CancelContext;
use crate::error::EventError;
use crate::payload::Payload;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// One-shot, cancellable payload slot.
///
/// Clones share the slot.
#[derive(Clone)]
pub struct PayloadWaiter {
    slot: Arc<watch::Sender<Option<Payload>>>,
}

impl PayloadWaiter {
    #[must_use]
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            slot: Arc::new(slot),
        }
    }

    /// Stores `payload` if the slot is still empty.
    ///
    /// Never blocks. Returns `true` for the single caller that filled the
    /// slot and `false` for every other call.
    pub fn set(&self, payload: Payload) -> bool {
        self.slot.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(payload);
            true
        })
    }

    /// Waits for the payload.
    ///
    /// `None` waits without limit. A context that is already done yields
    /// its error immediately, even if a value is present.
    ///
    /// # Errors
    ///
    /// [`EventError::Cancelled`] or [`EventError::DeadlineExceeded`] when
    /// `ctx` ends first.
    pub async fn wait(&self, ctx: Option<&CancelContext>) -> Result<Payload, EventError> {
        let background = CancelContext::background();
        let ctx = ctx.unwrap_or(&background);
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        let mut rx = self.slot.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(payload) = current {
                return Ok(payload);
            }
            tokio::select! {
                biased;
                changed = rx.changed() => {
                    // The sender lives as long as `self`.
                    if changed.is_err() {
                        return Err(EventError::Cancelled);
                    }
                }
                err = ctx.done() => return Err(err),
            }
        }
    }

    /// Returns the payload if it has been set.
    #[must_use]
    pub fn try_get(&self) -> Option<Payload> {
        self.slot.borrow().clone()
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Returns `true` if both handles share the same slot.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl Default for PayloadWaiter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PayloadWaiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadWaiter")
            .field("set", &self.is_set())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test]
    async fn set_then_wait() {
        let waiter = PayloadWaiter::new();
        assert!(!waiter.is_set());
        assert!(waiter.set(Payload::new(1_i64)));
        assert!(waiter.is_set());

        let got = waiter.wait(None).await.unwrap();
        assert_eq!(got, Payload::new(1_i64));
        assert_eq!(waiter.try_get(), Some(got));
    }

    #[tokio::test]
    async fn first_set_wins() {
        let waiter = PayloadWaiter::new();
        assert!(waiter.set(Payload::new("first")));
        assert!(!waiter.set(Payload::new("second")));
        let got = waiter.wait(None).await.unwrap();
        assert_eq!(got.get_string(crate::KEY_DEFAULT), Some("first"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sets_deliver_once() {
        let waiter = PayloadWaiter::new();
        let winners = Arc::new(AtomicUsize::new(0));

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let w = waiter.clone();
                tokio::spawn(async move { w.wait(None).await })
            })
            .collect();

        let setters: Vec<_> = (0..16_i64)
            .map(|n| {
                let w = waiter.clone();
                let winners = Arc::clone(&winners);
                tokio::spawn(async move {
                    if w.set(Payload::new(n)) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for s in setters {
            s.await.unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);

        let expected = waiter.try_get().unwrap();
        for r in readers {
            assert_eq!(r.await.unwrap().unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn wait_blocks_until_set() {
        let waiter = PayloadWaiter::new();
        let w = waiter.clone();
        let task = tokio::spawn(async move { w.wait(None).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!task.is_finished());

        waiter.set(Payload::new(true));
        let got = task.await.unwrap().unwrap();
        assert_eq!(got.get_bool(crate::KEY_DEFAULT), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_after_deadline() {
        let waiter = PayloadWaiter::new();
        let ctx = CancelContext::background().with_timeout(Duration::from_millis(50));

        let start = Instant::now();
        let err = waiter.wait(Some(&ctx)).await.unwrap_err();
        assert_eq!(err, EventError::DeadlineExceeded);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn wait_returns_on_cancel() {
        let waiter = PayloadWaiter::new();
        let (ctx, handle) = CancelContext::background().with_cancel();

        let w = waiter.clone();
        let task = tokio::spawn(async move { w.wait(Some(&ctx)).await });
        tokio::task::yield_now().await;
        handle.cancel();

        assert_eq!(task.await.unwrap(), Err(EventError::Cancelled));

        // A late set is accepted by the slot but nobody is listening.
        assert!(waiter.set(Payload::empty()));
    }

    #[tokio::test]
    async fn done_context_wins_over_present_value() {
        let waiter = PayloadWaiter::new();
        waiter.set(Payload::new(1_i64));

        let (ctx, handle) = CancelContext::background().with_cancel();
        handle.cancel();

        assert_eq!(waiter.wait(Some(&ctx)).await, Err(EventError::Cancelled));
    }

    #[test]
    fn clones_share_slot() {
        let a = PayloadWaiter::new();
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&PayloadWaiter::new()));
        b.set(Payload::empty());
        assert!(a.is_set());
        assert!(format!("{a:?}").contains("set: true"));
    }
}
