//! Environment - the mesh host.
//!
//! An [`Environment`] owns the registry of running cells and the
//! subscription graph that [`Cell::emit`] follows.
//!
//! ```text
//! ┌───────────────────────── Environment ─────────────────────────┐
//! │  cells:          CellId ──► CellHandle (mpsc sender)          │
//! │  subscriptions:  emitter ──► [subscriber, ...]                │
//! └───────────────────────────────────────────────────────────────┘
//!        │ emit(target)            │ Cell::emit
//!        ▼                         ▼
//!   ┌──────────┐  subscribers  ┌──────────┐
//!   │ cell A   │ ────────────► │ cell B   │   each: CellRunner task
//!   └──────────┘               └──────────┘
//! ```
//!
//! Emission never blocks. Requests block only the caller, inside
//! [`PayloadWaiter::wait`](cells_event::PayloadWaiter::wait).

use crate::config::CellsConfig;
use crate::error::RuntimeError;
use crate::runner::{CellHandle, CellRunner};
use cells_behavior::{Behavior, BehaviorError, Cell, Reminder};
use cells_event::{CancelContext, Event, Payload, PayloadSource, PayloadWaiter, KEY_WAITER};
use cells_types::CellId;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub(crate) struct EnvInner {
    id: String,
    cells: RwLock<HashMap<CellId, CellHandle>>,
    subscriptions: RwLock<HashMap<CellId, Vec<CellId>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutting_down: AtomicBool,
    next_generation: AtomicU64,
    request_timeout: Duration,
}

impl EnvInner {
    fn ensure_running(&self) -> Result<(), RuntimeError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(RuntimeError::ShuttingDown);
        }
        Ok(())
    }

    fn ensure_cell(&self, id: &CellId) -> Result<(), RuntimeError> {
        if self.cells.read().contains_key(id) {
            Ok(())
        } else {
            Err(RuntimeError::CellNotFound(id.clone()))
        }
    }

    fn deliver(&self, target: &CellId, event: Event) -> Result<(), RuntimeError> {
        self.ensure_running()?;
        let handle = self
            .cells
            .read()
            .get(target)
            .cloned()
            .ok_or_else(|| RuntimeError::CellNotFound(target.clone()))?;
        Self::inject(&handle, event)
    }

    fn inject(handle: &CellHandle, event: Event) -> Result<(), RuntimeError> {
        handle.inject(event).map_err(|event| {
            debug!(
                cell = %handle.id(),
                generation = handle.generation(),
                topic = event.topic(),
                "queue closed"
            );
            RuntimeError::CellNotFound(handle.id().clone())
        })
    }

    /// Delivers to `target` only while it is still the same incarnation.
    fn deliver_to_generation(
        &self,
        target: &CellId,
        generation: u64,
        event: Event,
    ) -> Result<(), RuntimeError> {
        self.ensure_running()?;
        let handle = self
            .cells
            .read()
            .get(target)
            .filter(|h| h.generation() == generation)
            .cloned()
            .ok_or_else(|| RuntimeError::CellNotFound(target.clone()))?;
        Self::inject(&handle, event)
    }

    /// Sends `event` to every subscriber of `emitter`; returns how many
    /// accepted it.
    fn publish(&self, emitter: &CellId, event: &Event) -> Result<usize, RuntimeError> {
        self.ensure_running()?;
        let subscribers = self
            .subscriptions
            .read()
            .get(emitter)
            .cloned()
            .unwrap_or_default();

        let mut delivered = 0;
        for subscriber in &subscribers {
            match self.deliver(subscriber, event.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!(
                        cell = %emitter,
                        subscriber = %subscriber,
                        error = %e,
                        "subscriber skipped"
                    );
                }
            }
        }
        if subscribers.is_empty() {
            debug!(cell = %emitter, topic = event.topic(), "no subscribers");
        }
        Ok(delivered)
    }

    fn drop_subscriptions(&self, id: &CellId) {
        let mut subscriptions = self.subscriptions.write();
        subscriptions.remove(id);
        for list in subscriptions.values_mut() {
            list.retain(|s| s != id);
        }
    }

    /// Called by a runner on exit.
    pub(crate) fn deregister(&self, id: &CellId, generation: u64) {
        let removed = {
            let mut cells = self.cells.write();
            if cells.get(id).is_some_and(|h| h.generation() == generation) {
                cells.remove(id);
                true
            } else {
                false
            }
        };
        if removed {
            self.drop_subscriptions(id);
            debug!(cell = %id, generation, "cell deregistered");
        }
    }
}

/// The [`Cell`] handed to behaviors running in an [`Environment`].
struct MeshCell {
    id: CellId,
    generation: u64,
    env: Weak<EnvInner>,
}

impl MeshCell {
    fn env(&self) -> Result<Arc<EnvInner>, BehaviorError> {
        self.env
            .upgrade()
            .ok_or_else(|| BehaviorError::EmitFailed("environment dropped".into()))
    }
}

impl fmt::Debug for MeshCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshCell")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .finish()
    }
}

impl Cell for MeshCell {
    fn id(&self) -> &CellId {
        &self.id
    }

    fn emit(&self, event: Event) -> Result<(), BehaviorError> {
        self.env()?
            .publish(&self.id, &event)
            .map(|_| ())
            .map_err(|e| BehaviorError::EmitFailed(e.to_string()))
    }

    fn emit_to(&self, target: &CellId, event: Event) -> Result<(), BehaviorError> {
        self.env()?
            .deliver(target, event)
            .map_err(|e| BehaviorError::EmitFailed(e.to_string()))
    }

    fn emit_after(&self, delay: Duration, event: Event) -> Reminder {
        let reminder = Reminder::new();
        let guard = reminder.clone();
        let env = self.env.clone();
        let id = self.id.clone();
        let generation = self.generation;

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if guard.is_cancelled() {
                return;
            }
            let Some(env) = env.upgrade() else { return };
            if let Err(e) = env.deliver_to_generation(&id, generation, event) {
                debug!(cell = %id, error = %e, "reminder dropped");
            }
        });
        reminder.attach(task.abort_handle());
        reminder
    }
}

/// Host of a set of cells.
///
/// Cloning yields another handle to the same environment. Must be used
/// from within a tokio runtime.
///
/// # Example
///
/// ```
/// use cells_runtime::{CounterBehavior, Environment};
/// use cells_event::CancelContext;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), cells_runtime::RuntimeError> {
/// let env = Environment::new("doc");
/// env.start_cell("counter", CounterBehavior::by_topic())?;
/// env.emit_new(&"counter".into(), "hello", ())?;
///
/// let ctx = CancelContext::background();
/// let counter = "counter".into();
/// let counts =
///     cells_runtime::request_counter_results(&ctx, &env, &counter, env.request_timeout()).await?;
/// assert_eq!(counts.get("hello"), Some(&1));
///
/// env.stop().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Environment {
    inner: Arc<EnvInner>,
}

impl Environment {
    /// Creates an empty environment with the default request timeout.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_request_timeout(id, CellsConfig::default().timeouts.request())
    }

    /// Creates an environment from loaded configuration.
    pub fn from_config(config: &CellsConfig) -> Self {
        Self::with_request_timeout(config.environment.id.clone(), config.timeouts.request())
    }

    fn with_request_timeout(id: impl Into<String>, request_timeout: Duration) -> Self {
        let id = id.into();
        info!(env = %id, "environment created");
        Self {
            inner: Arc::new(EnvInner {
                id,
                cells: RwLock::new(HashMap::new()),
                subscriptions: RwLock::new(HashMap::new()),
                tasks: Mutex::new(Vec::new()),
                shutting_down: AtomicBool::new(false),
                next_generation: AtomicU64::new(1),
                request_timeout,
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Default wait for [`request`](Self::request) callers.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.inner.request_timeout
    }

    /// Initialises `behavior` and starts its event loop under `id`.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::DuplicateCell`] if `id` is running
    /// - [`RuntimeError::ShuttingDown`] after [`stop`](Self::stop)
    /// - [`RuntimeError::Behavior`] if `init` fails
    pub fn start_cell<B>(&self, id: impl Into<CellId>, behavior: B) -> Result<(), RuntimeError>
    where
        B: Behavior + 'static,
    {
        let id = id.into();
        self.inner.ensure_running()?;
        if self.inner.cells.read().contains_key(&id) {
            return Err(RuntimeError::DuplicateCell(id));
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
        let mut behavior: Box<dyn Behavior> = Box::new(behavior);
        let cell = Arc::new(MeshCell {
            id: id.clone(),
            generation,
            env: Arc::downgrade(&self.inner),
        });
        behavior.init(cell)?;

        let (runner, handle) = CellRunner::new(
            id.clone(),
            generation,
            behavior,
            Arc::downgrade(&self.inner),
        );
        // Held until the task is recorded: `stop` either joins this task or
        // this call sees the shutdown flag.
        let mut cells = self.inner.cells.write();
        self.inner.ensure_running()?;
        if cells.contains_key(&id) {
            return Err(RuntimeError::DuplicateCell(id));
        }
        cells.insert(id.clone(), handle);

        let task = tokio::spawn(runner.run());
        {
            let mut tasks = self.inner.tasks.lock();
            tasks.retain(|t| !t.is_finished());
            tasks.push(task);
        }
        drop(cells);
        debug!(env = %self.inner.id, cell = %id, "cell registered");
        Ok(())
    }

    /// Closes the queue of `id`. Already queued events are still handled,
    /// then the behavior is terminated.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::CellNotFound`] if `id` is not running.
    pub fn stop_cell(&self, id: &CellId) -> Result<(), RuntimeError> {
        let removed = self.inner.cells.write().remove(id);
        if removed.is_none() {
            return Err(RuntimeError::CellNotFound(id.clone()));
        }
        self.inner.drop_subscriptions(id);
        info!(env = %self.inner.id, cell = %id, "cell stopping");
        Ok(())
    }

    #[must_use]
    pub fn has_cell(&self, id: &CellId) -> bool {
        self.inner.cells.read().contains_key(id)
    }

    /// Running cell ids, sorted.
    #[must_use]
    pub fn cell_ids(&self) -> Vec<CellId> {
        let mut ids: Vec<CellId> = self.inner.cells.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Routes future [`Cell::emit`] calls of `emitter` to `subscribers`.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::CellNotFound`] if any id is not running; nothing is
    /// changed in that case.
    pub fn subscribe(
        &self,
        emitter: &CellId,
        subscribers: &[CellId],
    ) -> Result<(), RuntimeError> {
        self.inner.ensure_cell(emitter)?;
        for s in subscribers {
            self.inner.ensure_cell(s)?;
        }

        let mut subscriptions = self.inner.subscriptions.write();
        let list = subscriptions.entry(emitter.clone()).or_default();
        for s in subscribers {
            if !list.contains(s) {
                list.push(s.clone());
            }
        }
        Ok(())
    }

    /// Removes `subscribers` from the routing list of `emitter`.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::CellNotFound`] if `emitter` is not running.
    pub fn unsubscribe(
        &self,
        emitter: &CellId,
        subscribers: &[CellId],
    ) -> Result<(), RuntimeError> {
        self.inner.ensure_cell(emitter)?;
        if let Some(list) = self.inner.subscriptions.write().get_mut(emitter) {
            list.retain(|s| !subscribers.contains(s));
        }
        Ok(())
    }

    /// Current subscribers of `emitter`, in subscription order.
    #[must_use]
    pub fn subscribers(&self, emitter: &CellId) -> Vec<CellId> {
        self.inner
            .subscriptions
            .read()
            .get(emitter)
            .cloned()
            .unwrap_or_default()
    }

    /// Enqueues `event` for `target`. Never blocks.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::CellNotFound`] or [`RuntimeError::ShuttingDown`].
    pub fn emit(&self, target: &CellId, event: Event) -> Result<(), RuntimeError> {
        debug!(env = %self.inner.id, cell = %target, topic = event.topic(), "emit");
        self.inner.deliver(target, event)
    }

    /// Builds an event from `topic` and `values` and enqueues it for `target`.
    ///
    /// # Errors
    ///
    /// As [`emit`](Self::emit).
    pub fn emit_new(
        &self,
        target: &CellId,
        topic: &str,
        values: impl Into<PayloadSource>,
    ) -> Result<(), RuntimeError> {
        self.emit(target, Event::new(topic, values))
    }

    /// Sends a request to `target` and waits for the reply.
    ///
    /// A fresh [`PayloadWaiter`] is added to the payload under
    /// [`KEY_WAITER`]; the target answers by setting it.
    ///
    /// # Errors
    ///
    /// - routing errors as [`emit`](Self::emit)
    /// - [`RuntimeError::Request`] when `ctx` ends before the reply
    pub async fn request(
        &self,
        ctx: &CancelContext,
        target: &CellId,
        topic: &str,
        values: impl Into<PayloadSource>,
    ) -> Result<Payload, RuntimeError> {
        let waiter = PayloadWaiter::new();
        let payload = Payload::new(values).apply([(KEY_WAITER, waiter.clone())]);
        self.emit(target, Event::new(topic, payload))?;

        match waiter.wait(Some(ctx)).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                warn!(env = %self.inner.id, cell = %target, topic, error = %e, "request failed");
                Err(e.into())
            }
        }
    }

    /// Rejects new work, closes every queue and waits for all cell loops
    /// to finish.
    pub async fn stop(&self) {
        if self.inner.shutting_down.swap(true, Ordering::SeqCst) {
            debug!(env = %self.inner.id, "environment already stopping");
        }
        self.inner.cells.write().clear();
        self.inner.subscriptions.write().clear();

        let tasks = std::mem::take(&mut *self.inner.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(env = %self.inner.id, error = %e, "cell task failed");
            }
        }
        info!(env = %self.inner.id, "environment stopped");
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("id", &self.inner.id)
            .field("cells", &self.cell_ids())
            .finish()
    }
}
