//! Cancellation contexts.
//!
//! A [`CancelContext`] bounds how long a caller is willing to block in
//! [`PayloadWaiter::wait`](crate::PayloadWaiter::wait) or
//! [`Scene::wait_flag`](crate::Scene::wait_flag).
//!
//! ```text
//! background ──with_cancel()──► ctx A ──with_timeout(d)──► ctx B
//!                                 │                          │
//!                          handle.cancel() ─────────────────►│ done (Cancelled)
//!                                                   deadline ─► done (DeadlineExceeded)
//! ```
//!
//! Cancelling a context cancels every context derived from it. A derived
//! deadline never extends the parent's: the earlier of the two wins.

use crate::error::EventError;
use parking_lot::Mutex;
use std::fmt;
use std::future::pending;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

struct CancelNode {
    cancelled: watch::Sender<bool>,
    children: Mutex<Vec<Weak<CancelNode>>>,
}

impl CancelNode {
    fn new() -> Arc<Self> {
        let (cancelled, _) = watch::channel(false);
        Arc::new(Self {
            cancelled,
            children: Mutex::new(Vec::new()),
        })
    }

    fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    fn cancel(&self) {
        let first = self.cancelled.send_if_modified(|flag| {
            if *flag {
                false
            } else {
                *flag = true;
                true
            }
        });
        if !first {
            return;
        }

        let children = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }

    fn adopt(self: &Arc<Self>, child: &Arc<CancelNode>) {
        {
            let mut children = self.children.lock();
            children.retain(|c| c.strong_count() > 0);
            children.push(Arc::downgrade(child));
        }
        // Cancel may have drained the list before the push.
        if self.is_cancelled() {
            child.cancel();
        }
    }
}

/// Cancellation scope for blocking waits.
///
/// Cloning yields another view of the same scope.
///
/// # Example
///
/// ```
/// use cells_event::{CancelContext, EventError};
///
/// let (ctx, handle) = CancelContext::background().with_cancel();
/// assert!(ctx.err().is_none());
///
/// handle.cancel();
/// assert_eq!(ctx.err(), Some(EventError::Cancelled));
/// ```
#[derive(Clone, Default)]
pub struct CancelContext {
    node: Option<Arc<CancelNode>>,
    deadline: Option<Instant>,
}

impl CancelContext {
    /// Returns a context that is never done.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Derives a context that ends when the returned handle is cancelled
    /// or when this context ends.
    #[must_use]
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let node = CancelNode::new();
        if let Some(parent) = &self.node {
            parent.adopt(&node);
        }
        let ctx = Self {
            node: Some(Arc::clone(&node)),
            deadline: self.deadline,
        };
        (ctx, CancelHandle { node })
    }

    /// Derives a context that ends `timeout` from now.
    ///
    /// A timeout too large to represent adds no deadline; the derived
    /// context keeps this context's own deadline, if any.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.clone(),
        }
    }

    /// Derives a context that ends at `deadline` or at this context's own
    /// deadline, whichever comes first.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        };
        Self {
            node: self.node.clone(),
            deadline: Some(deadline),
        }
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns why the context ended, or `None` while it is still live.
    ///
    /// Explicit cancellation is reported ahead of an expired deadline.
    #[must_use]
    pub fn err(&self) -> Option<EventError> {
        if self.node.as_ref().is_some_and(|n| n.is_cancelled()) {
            return Some(EventError::Cancelled);
        }
        match self.deadline {
            Some(at) if Instant::now() >= at => Some(EventError::DeadlineExceeded),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once the context ends and returns the reason.
    ///
    /// Never resolves for a background context.
    pub async fn done(&self) -> EventError {
        let cancelled = async {
            if let Some(node) = &self.node {
                let mut rx = node.cancelled.subscribe();
                if rx.wait_for(|flag| *flag).await.is_ok() {
                    return;
                }
            }
            pending::<()>().await;
        };
        let expired = async {
            match self.deadline {
                Some(at) => sleep_until(at).await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = cancelled => EventError::Cancelled,
            () = expired => EventError::DeadlineExceeded,
        }
    }
}

impl fmt::Debug for CancelContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelContext")
            .field("cancellable", &self.node.is_some())
            .field("deadline", &self.deadline)
            .field("err", &self.err())
            .finish()
    }
}

/// Cancels the context it was created with, and everything derived from it.
///
/// Dropping the handle does not cancel.
#[derive(Clone)]
pub struct CancelHandle {
    node: Arc<CancelNode>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.node.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.node.is_cancelled()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
