//! Test harness for [`Behavior`] implementations.
//!
//! Drives a behavior synchronously without a running mesh. The harness
//! hands the behavior a [`RecordingCell`] that captures everything the
//! behavior emits and every reminder it schedules. Reminders never fire on
//! their own; tests fire them explicitly, which makes timer races
//! reproducible.
//!
//! # Features
//!
//! - Mesh-independent behavior testing
//! - Event log with per-event result
//! - Captured emissions (`emit`, `emit_to`) and reminders (`emit_after`)
//! - Manual reminder delivery, including stale and cancelled ones
//!
//! # Example
//!
//! ```
//! use cells_behavior::testing::BehaviorTestHarness;
//! use cells_behavior::{Behavior, BehaviorError, Cell};
//! use cells_event::Event;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[derive(Default)]
//! struct Snooze {
//!     cell: Option<Arc<dyn Cell>>,
//! }
//!
//! impl Behavior for Snooze {
//!     fn init(&mut self, cell: Arc<dyn Cell>) -> Result<(), BehaviorError> {
//!         self.cell = Some(cell);
//!         Ok(())
//!     }
//!
//!     fn process_event(&mut self, event: &Event) -> Result<(), BehaviorError> {
//!         let Some(cell) = &self.cell else { return Ok(()) };
//!         match event.topic() {
//!             "alarm" => {
//!                 cell.emit_after(Duration::from_secs(5), Event::new("wake", ()));
//!                 Ok(())
//!             }
//!             "wake" => cell.emit(Event::new("awake", ())),
//!             _ => Ok(()),
//!         }
//!     }
//! }
//!
//! let mut harness = BehaviorTestHarness::new("snooze", Snooze::default());
//! harness.init().unwrap();
//! harness.send_new("alarm", ()).unwrap();
//! assert_eq!(harness.pending_reminders().len(), 1);
//!
//! harness.fire_next_reminder().unwrap().unwrap();
//! assert_eq!(harness.emitted()[0].topic(), "awake");
//! ```

use crate::{Behavior, BehaviorError, Cell, Reminder};
use cells_event::{Event, PayloadSource};
use cells_types::CellId;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// A reminder captured by the [`RecordingCell`].
#[derive(Debug, Clone)]
pub struct ScheduledReminder {
    pub delay: Duration,
    pub event: Event,
    pub reminder: Reminder,
}

/// Record of one event delivered to the behavior under test.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub topic: String,
    pub result: Result<(), BehaviorError>,
}

/// [`Cell`] implementation that records instead of routing.
#[derive(Debug)]
pub struct RecordingCell {
    id: CellId,
    emitted: Mutex<Vec<Event>>,
    sent: Mutex<Vec<(CellId, Event)>>,
    reminders: Mutex<Vec<ScheduledReminder>>,
    fail_emits: Mutex<bool>,
}

impl RecordingCell {
    #[must_use]
    pub fn new(id: impl Into<CellId>) -> Self {
        Self {
            id: id.into(),
            emitted: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            reminders: Mutex::new(Vec::new()),
            fail_emits: Mutex::new(false),
        }
    }

    /// Makes every subsequent `emit` / `emit_to` fail.
    pub fn set_fail_emits(&self, fail: bool) {
        *self.fail_emits.lock() = fail;
    }

    fn check_emit(&self) -> Result<(), BehaviorError> {
        if *self.fail_emits.lock() {
            return Err(BehaviorError::EmitFailed(
                "recording cell rejects emits".into(),
            ));
        }
        Ok(())
    }
}

impl Cell for RecordingCell {
    fn id(&self) -> &CellId {
        &self.id
    }

    fn emit(&self, event: Event) -> Result<(), BehaviorError> {
        self.check_emit()?;
        self.emitted.lock().push(event);
        Ok(())
    }

    fn emit_to(&self, target: &CellId, event: Event) -> Result<(), BehaviorError> {
        self.check_emit()?;
        self.sent.lock().push((target.clone(), event));
        Ok(())
    }

    fn emit_after(&self, delay: Duration, event: Event) -> Reminder {
        let reminder = Reminder::new();
        self.reminders.lock().push(ScheduledReminder {
            delay,
            event,
            reminder: reminder.clone(),
        });
        reminder
    }
}

/// Test harness for [`Behavior`] implementations.
pub struct BehaviorTestHarness<B: Behavior> {
    behavior: B,
    cell: Arc<RecordingCell>,
    event_log: Vec<EventRecord>,
}

impl<B: Behavior> BehaviorTestHarness<B> {
    /// Creates a harness whose recording cell carries `id`.
    pub fn new(id: impl Into<CellId>, behavior: B) -> Self {
        Self {
            behavior,
            cell: Arc::new(RecordingCell::new(id)),
            event_log: Vec::new(),
        }
    }

    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    pub fn behavior_mut(&mut self) -> &mut B {
        &mut self.behavior
    }

    /// The recording cell handed to the behavior.
    pub fn cell(&self) -> &Arc<RecordingCell> {
        &self.cell
    }

    /// Calls `init` with the recording cell.
    ///
    /// # Errors
    ///
    /// The behavior's init error.
    pub fn init(&mut self) -> Result<(), BehaviorError> {
        let cell: Arc<dyn Cell> = Arc::clone(&self.cell) as Arc<dyn Cell>;
        self.behavior.init(cell)
    }

    /// Delivers `event` and logs the result.
    ///
    /// # Errors
    ///
    /// The behavior's `process_event` error.
    pub fn send(&mut self, event: Event) -> Result<(), BehaviorError> {
        let result = self.behavior.process_event(&event);
        self.event_log.push(EventRecord {
            topic: event.topic().to_string(),
            result: result.clone(),
        });
        result
    }

    /// Builds an event from `topic` and `values` and delivers it.
    ///
    /// # Errors
    ///
    /// The behavior's `process_event` error.
    pub fn send_new(
        &mut self,
        topic: &str,
        values: impl Into<PayloadSource>,
    ) -> Result<(), BehaviorError> {
        self.send(Event::new(topic, values))
    }

    /// Delivers the oldest reminder that has not been cancelled.
    ///
    /// Returns `None` when nothing is pending. The reminder is removed
    /// whether or not delivery succeeds.
    pub fn fire_next_reminder(&mut self) -> Option<Result<(), BehaviorError>> {
        let next = {
            let mut reminders = self.cell.reminders.lock();
            let pos = reminders.iter().position(|r| !r.reminder.is_cancelled())?;
            reminders.remove(pos)
        };
        Some(self.send(next.event))
    }

    /// Delivers a reminder's event even if it was cancelled.
    ///
    /// Models a timer that had already fired and was queued when the
    /// behavior tried to cancel it.
    ///
    /// # Errors
    ///
    /// The behavior's `process_event` error.
    pub fn fire_stale(&mut self, scheduled: &ScheduledReminder) -> Result<(), BehaviorError> {
        self.send(scheduled.event.clone())
    }

    /// Calls `terminate`.
    ///
    /// # Errors
    ///
    /// The behavior's terminate error.
    pub fn terminate(&mut self) -> Result<(), BehaviorError> {
        self.behavior.terminate()
    }

    /// Calls `recover` with `fault`.
    ///
    /// # Errors
    ///
    /// The behavior's recover error.
    pub fn recover(&mut self, fault: &BehaviorError) -> Result<(), BehaviorError> {
        self.behavior.recover(fault)
    }

    /// Events passed to `emit`, in order.
    pub fn emitted(&self) -> Vec<Event> {
        self.cell.emitted.lock().clone()
    }

    /// Drains and returns the events passed to `emit`.
    pub fn take_emitted(&mut self) -> Vec<Event> {
        std::mem::take(&mut *self.cell.emitted.lock())
    }

    /// Events passed to `emit_to`, with their targets.
    pub fn sent(&self) -> Vec<(CellId, Event)> {
        self.cell.sent.lock().clone()
    }

    /// Every reminder scheduled so far that was neither fired nor
    /// cancelled.
    pub fn pending_reminders(&self) -> Vec<ScheduledReminder> {
        self.cell
            .reminders
            .lock()
            .iter()
            .filter(|r| !r.reminder.is_cancelled())
            .cloned()
            .collect()
    }

    /// Every reminder scheduled so far and not yet fired, cancelled or not.
    pub fn all_reminders(&self) -> Vec<ScheduledReminder> {
        self.cell.reminders.lock().clone()
    }

    pub fn event_log(&self) -> &[EventRecord] {
        &self.event_log
    }

    pub fn clear_logs(&mut self) {
        self.event_log.clear();
        self.cell.emitted.lock().clear();
        self.cell.sent.lock().clear();
    }
}
