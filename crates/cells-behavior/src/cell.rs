//! The handle a behavior uses to talk to the mesh.
//!
//! The concrete implementation lives in `cells-runtime`; tests use the
//! recording cell from [`testing`](crate::testing).

use crate::error::BehaviorError;
use cells_event::Event;
use cells_types::CellId;
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

/// A behavior's view of the cell it runs in.
///
/// | Method | Delivers to |
/// |--------|-------------|
/// | `emit` | every subscriber of this cell |
/// | `emit_to` | one named cell |
/// | `emit_after` | this cell, once, after a delay |
///
/// Emission never blocks. Events a single cell emits to the same target
/// arrive in emission order.
pub trait Cell: Send + Sync + Debug {
    fn id(&self) -> &CellId;

    /// Sends `event` to every subscriber of this cell.
    ///
    /// # Errors
    ///
    /// [`BehaviorError::EmitFailed`] when the mesh is shutting down.
    fn emit(&self, event: Event) -> Result<(), BehaviorError>;

    /// Sends `event` to `target`.
    ///
    /// # Errors
    ///
    /// [`BehaviorError::EmitFailed`] when `target` is not running.
    fn emit_to(&self, target: &CellId, event: Event) -> Result<(), BehaviorError>;

    /// Delivers `event` to this cell once `delay` has elapsed.
    ///
    /// The scheduled side never touches behavior state; it only enqueues
    /// the event.
    fn emit_after(&self, delay: Duration, event: Event) -> Reminder;
}

/// Handle to a scheduled self-addressed event.
///
/// Clones refer to the same schedule. Dropping a reminder does not cancel
/// it.
#[derive(Clone, Debug, Default)]
pub struct Reminder {
    inner: Arc<ReminderInner>,
}

#[derive(Debug, Default)]
struct ReminderInner {
    cancelled: AtomicBool,
    task: Mutex<Option<AbortHandle>>,
}

impl Reminder {
    /// Creates an unattached reminder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the task that will deliver the event, so that
    /// [`cancel`](Self::cancel) can abort it.
    pub fn attach(&self, task: AbortHandle) {
        if self.is_cancelled() {
            debug!("reminder cancelled before attach");
            task.abort();
            return;
        }
        *self.inner.task.lock() = Some(task);
    }

    /// Prevents the event from being delivered if it has not been yet.
    pub fn cancel(&self) {
        let already = self.inner.cancelled.swap(true, Ordering::SeqCst);
        match self.inner.task.lock().take() {
            Some(task) => {
                debug!("reminder cancelled, task aborted");
                task.abort();
            }
            None if already => trace!("reminder already cancelled"),
            None => trace!("reminder cancelled before scheduling"),
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `true` if both handles refer to the same schedule.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_shared_between_clones() {
        let a = Reminder::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Reminder::new()));
    }

    #[tokio::test]
    async fn cancel_aborts_attached_task() {
        let reminder = Reminder::new();
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        reminder.attach(task.abort_handle());
        reminder.cancel();
        assert!(task.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn attach_after_cancel_aborts_immediately() {
        let reminder = Reminder::new();
        reminder.cancel();
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        reminder.attach(task.abort_handle());
        assert!(task.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn cancel_twice_is_harmless() {
        let reminder = Reminder::new();
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        reminder.attach(task.abort_handle());
        reminder.cancel();
        reminder.clone().cancel();
        assert!(reminder.is_cancelled());
        assert!(task.await.unwrap_err().is_cancelled());
    }
}
