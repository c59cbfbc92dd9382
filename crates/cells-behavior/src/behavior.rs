//! The behavior contract.

use crate::cell::Cell;
use crate::error::BehaviorError;
use cells_event::Event;
use std::sync::Arc;

/// Stateful event handler run by a cell.
///
/// A cell calls the methods in this order:
///
/// ```text
/// init(cell) ──► process_event(e1) ──► process_event(e2) ──► ... ──► terminate()
///                        │
///                        └─ panic ──► recover(Panicked) ──► continue / stop
/// ```
///
/// Calls are strictly sequential, so a behavior owns its state without
/// locking. Anything that runs outside those calls, such as a reminder,
/// must only emit events.
///
/// # Example
///
/// ```
/// use cells_behavior::{Behavior, BehaviorError, Cell};
/// use cells_behavior::testing::BehaviorTestHarness;
/// use cells_event::Event;
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Echo {
///     cell: Option<Arc<dyn Cell>>,
/// }
///
/// impl Behavior for Echo {
///     fn init(&mut self, cell: Arc<dyn Cell>) -> Result<(), BehaviorError> {
///         self.cell = Some(cell);
///         Ok(())
///     }
///
///     fn process_event(&mut self, event: &Event) -> Result<(), BehaviorError> {
///         let cell = self.cell.as_ref().ok_or_else(|| {
///             BehaviorError::ExecutionFailed("not initialised".into())
///         })?;
///         cell.emit(event.clone())
///     }
/// }
///
/// let mut harness = BehaviorTestHarness::new("echo", Echo::default());
/// harness.init().unwrap();
/// harness.send_new("ping", ()).unwrap();
/// assert_eq!(harness.emitted()[0].topic(), "ping");
/// ```
pub trait Behavior: Send {
    /// Receives the cell handle before the first event.
    ///
    /// # Errors
    ///
    /// An error keeps the cell from starting.
    fn init(&mut self, cell: Arc<dyn Cell>) -> Result<(), BehaviorError>;

    /// Handles one event.
    ///
    /// # Errors
    ///
    /// Errors are logged by the runner; the cell keeps running.
    fn process_event(&mut self, event: &Event) -> Result<(), BehaviorError>;

    /// Called once after the last event.
    ///
    /// # Errors
    ///
    /// Errors are logged.
    fn terminate(&mut self) -> Result<(), BehaviorError> {
        Ok(())
    }

    /// Called after `process_event` panicked.
    ///
    /// # Errors
    ///
    /// An error stops the cell.
    fn recover(&mut self, _fault: &BehaviorError) -> Result<(), BehaviorError> {
        Ok(())
    }
}

impl<B: Behavior + ?Sized> Behavior for Box<B> {
    fn init(&mut self, cell: Arc<dyn Cell>) -> Result<(), BehaviorError> {
        (**self).init(cell)
    }

    fn process_event(&mut self, event: &Event) -> Result<(), BehaviorError> {
        (**self).process_event(event)
    }

    fn terminate(&mut self) -> Result<(), BehaviorError> {
        (**self).terminate()
    }

    fn recover(&mut self, fault: &BehaviorError) -> Result<(), BehaviorError> {
        (**self).recover(fault)
    }
}
