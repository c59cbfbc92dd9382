//! CellRunner - the serialized event loop of one cell.
//!
//! Each [`CellRunner`] runs in its own tokio task and owns its behavior.
//! Events arrive over an unbounded mpsc queue, so senders never block and
//! events from one sender keep their order.
//!
//! ```text
//!                       ┌──────────────────────────┐
//!                       │        CellRunner        │
//! Environment::emit ──► │  event_rx ◄── mpsc       │
//! Cell::emit_to ──────► │         │                │
//! reminder ───────────► │         ▼                │
//!                       │  behavior.process_event  │
//!                       │         │ panic          │
//!                       │         ▼                │
//!                       │  behavior.recover        │
//!                       └──────────────────────────┘
//! ```
//!
//! # Lifecycle
//!
//! 1. `init` is called by [`Environment::start_cell`](crate::Environment::start_cell)
//!    before the runner exists
//! 2. [`CellRunner::run`] handles events one at a time until the queue
//!    closes or recovery fails
//! 3. `terminate` is called once on the way out

use crate::environment::EnvInner;
use cells_behavior::{Behavior, BehaviorError};
use cells_event::Event;
use cells_types::{CellId, ErrorCode};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Weak;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Sending side of a cell's queue.
///
/// `generation` tells apart two cells started under the same id one after
/// the other.
#[derive(Clone, Debug)]
pub(crate) struct CellHandle {
    id: CellId,
    generation: u64,
    event_tx: mpsc::UnboundedSender<Event>,
}

impl CellHandle {
    pub(crate) fn id(&self) -> &CellId {
        &self.id
    }

    /// Enqueues `event`; fails only if the runner has exited.
    pub(crate) fn inject(&self, event: Event) -> Result<(), Event> {
        self.event_tx.send(event).map_err(|e| e.0)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

/// Execution context for a single cell.
pub(crate) struct CellRunner {
    id: CellId,
    event_rx: mpsc::UnboundedReceiver<Event>,
    behavior: Box<dyn Behavior>,
    env: Weak<EnvInner>,
    generation: u64,
}

impl CellRunner {
    pub(crate) fn new(
        id: CellId,
        generation: u64,
        behavior: Box<dyn Behavior>,
        env: Weak<EnvInner>,
    ) -> (Self, CellHandle) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let handle = CellHandle {
            id: id.clone(),
            generation,
            event_tx,
        };
        let runner = Self {
            id,
            event_rx,
            behavior,
            env,
            generation,
        };
        (runner, handle)
    }

    /// Runs the cell's event loop.
    ///
    /// Returns when every sender is gone (the cell was stopped) or when
    /// `recover` fails after a panic.
    pub(crate) async fn run(mut self) {
        info!(cell = %self.id, generation = self.generation, "cell started");

        while let Some(event) = self.event_rx.recv().await {
            if !self.handle_event(&event) {
                break;
            }
        }

        self.event_rx.close();
        if let Some(env) = self.env.upgrade() {
            env.deregister(&self.id, self.generation);
        }

        if let Err(e) = self.behavior.terminate() {
            warn!(cell = %self.id, code = e.code(), error = %e, "terminate failed");
        }
        info!(cell = %self.id, "cell stopped");
    }

    /// Delivers one event. Returns `false` if the cell must stop.
    fn handle_event(&mut self, event: &Event) -> bool {
        debug!(cell = %self.id, topic = event.topic(), event = %event.id(), "processing event");

        let outcome = catch_unwind(AssertUnwindSafe(|| self.behavior.process_event(event)));
        match outcome {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(
                    cell = %self.id,
                    topic = event.topic(),
                    code = e.code(),
                    error = %e,
                    "behavior failed to process event"
                );
                true
            }
            Err(panic) => {
                let fault = BehaviorError::Panicked(panic_message(panic.as_ref()));
                warn!(cell = %self.id, topic = event.topic(), error = %fault, "behavior panicked");
                match self.behavior.recover(&fault) {
                    Ok(()) => {
                        info!(cell = %self.id, "behavior recovered");
                        true
                    }
                    Err(e) => {
                        warn!(cell = %self.id, error = %e, "recovery failed, stopping cell");
                        false
                    }
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_messages() {
        let p: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(p.as_ref()), "static");
        let p: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(p.as_ref()), "owned");
        let p: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(p.as_ref()), "unknown panic");
    }

    #[test]
    fn handle_injects_until_runner_gone() {
        struct Idle;
        impl Behavior for Idle {
            fn init(
                &mut self,
                _cell: std::sync::Arc<dyn cells_behavior::Cell>,
            ) -> Result<(), BehaviorError> {
                Ok(())
            }
            fn process_event(&mut self, _event: &Event) -> Result<(), BehaviorError> {
                Ok(())
            }
        }

        let (runner, handle) =
            CellRunner::new(CellId::new("idle"), 3, Box::new(Idle), Weak::new());
        assert_eq!(handle.id().as_str(), "idle");
        assert_eq!(handle.generation(), 3);
        assert!(handle.inject(Event::new("x", ())).is_ok());

        drop(runner);
        let rejected = handle.inject(Event::new("y", ())).unwrap_err();
        assert_eq!(rejected.topic(), "y");
    }
}
