//! Pair behavior: detects two matching events within a time window.
//!
//! ```text
//!            hit                         hit (≤ window)
//!  Idle ────────────► Pending ─────────────────────────► emit "pair" ──► Idle
//!                        │
//!                        │ own "pair:timeout:check" (same first time)
//!                        │ or hit after the window
//!                        └─────────────────────────────► emit "pair:timeout" ──► Idle
//! ```
//!
//! Only one hit is pending at a time. The reminder scheduled on the first
//! hit carries the hit time; a check whose time differs from the current
//! hit belongs to an earlier, already resolved hit and is dropped.
//!
//! Reported times come from the wall clock. The window itself is measured
//! on the monotonic clock.

use crate::config::PairConfig;
use cells_behavior::{Behavior, BehaviorError, Cell, Reminder};
use cells_event::{
    Event, PayloadValue, PayloadValues, Scene, KEY_PAIR_FIRST_DATA, KEY_PAIR_FIRST_TIME,
    KEY_PAIR_SECOND_DATA, KEY_PAIR_SECOND_TIME, KEY_PAIR_TIMEOUT, TOPIC_PAIR, TOPIC_PAIR_TIMEOUT,
    TOPIC_PAIR_TIMEOUT_CHECK,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Result of a [`PairCriterion`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum PairMatch {
    Miss,
    /// The event matches; the optional data travels with the pair.
    Hit(Option<PayloadValue>),
}

/// Decides whether an event counts as a hit.
///
/// The second argument is the data returned for the pending first hit, if
/// there is one.
pub type PairCriterion = Box<dyn Fn(&Event, Option<&PayloadValue>) -> PairMatch + Send + Sync>;

/// Emits [`TOPIC_PAIR`] when two events match within `duration`, or
/// [`TOPIC_PAIR_TIMEOUT`] when the second one is late or missing.
///
/// | Emitted topic | Payload keys |
/// |---------------|--------------|
/// | `pair` | first time, first data, second time, second data |
/// | `pair:timeout` | first time, first data, timeout time |
///
/// Data keys are omitted when the criterion returned no data. Emitted
/// events carry the scene of the first matching event.
pub struct PairBehavior {
    cell: Option<Arc<dyn Cell>>,
    matches: PairCriterion,
    duration: Duration,
    hit: Option<DateTime<Utc>>,
    hit_at: Option<Instant>,
    hit_data: Option<PayloadValue>,
    hit_scene: Option<Arc<Scene>>,
    pending: Option<Reminder>,
}

impl PairBehavior {
    pub fn new<F>(matches: F, duration: Duration) -> Self
    where
        F: Fn(&Event, Option<&PayloadValue>) -> PairMatch + Send + Sync + 'static,
    {
        Self {
            cell: None,
            matches: Box::new(matches),
            duration,
            hit: None,
            hit_at: None,
            hit_data: None,
            hit_scene: None,
            pending: None,
        }
    }

    /// Uses the configured window.
    pub fn from_config<F>(matches: F, config: &PairConfig) -> Self
    where
        F: Fn(&Event, Option<&PayloadValue>) -> PairMatch + Send + Sync + 'static,
    {
        Self::new(matches, config.window())
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Returns `true` while a first hit waits for its partner.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.hit.is_some()
    }

    fn cell(&self) -> Result<&Arc<dyn Cell>, BehaviorError> {
        self.cell.as_ref().ok_or_else(|| {
            BehaviorError::ExecutionFailed("pair behavior not initialised".into())
        })
    }

    fn check_timeout(&mut self, event: &Event) -> Result<(), BehaviorError> {
        let Some(hit) = self.hit else {
            debug!("timeout check without pending hit");
            return Ok(());
        };
        if event.payload().get_time(KEY_PAIR_FIRST_TIME) != Some(hit) {
            debug!(%hit, "stale timeout check");
            return Ok(());
        }
        self.pending = None;
        self.emit_timeout()
    }

    fn first_hit(
        &mut self,
        event: &Event,
        data: Option<PayloadValue>,
    ) -> Result<(), BehaviorError> {
        let now = Utc::now();
        let check = Event::new(TOPIC_PAIR_TIMEOUT_CHECK, [(KEY_PAIR_FIRST_TIME, now)]);
        let reminder = self.cell()?.emit_after(self.duration, check);

        self.hit = Some(now);
        self.hit_at = Some(Instant::now());
        self.hit_data = data;
        self.hit_scene = event.scene().cloned();
        self.pending = Some(reminder);
        debug!(hit = %now, "first hit");
        Ok(())
    }

    fn second_hit(&mut self, data: Option<PayloadValue>) -> Result<(), BehaviorError> {
        if let Some(reminder) = self.pending.take() {
            reminder.cancel();
        }
        let elapsed = self.hit_at.map_or(Duration::ZERO, |at| at.elapsed());
        if elapsed > self.duration {
            debug!(?elapsed, "second hit after window");
            self.emit_timeout()
        } else {
            self.emit_pair(Utc::now(), data)
        }
    }

    /// Clears the pending hit and returns it.
    fn resolve(&mut self) -> Option<(DateTime<Utc>, Option<PayloadValue>, Option<Arc<Scene>>)> {
        let hit = self.hit.take()?;
        self.hit_at = None;
        Some((hit, self.hit_data.take(), self.hit_scene.take()))
    }

    fn emit_pair(
        &mut self,
        second: DateTime<Utc>,
        second_data: Option<PayloadValue>,
    ) -> Result<(), BehaviorError> {
        let Some((first, first_data, scene)) = self.resolve() else {
            return Ok(());
        };
        let mut values = PayloadValues::new();
        values.insert(KEY_PAIR_FIRST_TIME.into(), first.into());
        values.insert(KEY_PAIR_SECOND_TIME.into(), second.into());
        if let Some(data) = first_data {
            values.insert(KEY_PAIR_FIRST_DATA.into(), data);
        }
        if let Some(data) = second_data {
            values.insert(KEY_PAIR_SECOND_DATA.into(), data);
        }
        self.cell()?
            .emit(Event::new(TOPIC_PAIR, values).with_scene_opt(scene))
    }

    fn emit_timeout(&mut self) -> Result<(), BehaviorError> {
        let Some((first, first_data, scene)) = self.resolve() else {
            return Ok(());
        };
        let mut values = PayloadValues::new();
        values.insert(KEY_PAIR_FIRST_TIME.into(), first.into());
        values.insert(KEY_PAIR_TIMEOUT.into(), Utc::now().into());
        if let Some(data) = first_data {
            values.insert(KEY_PAIR_FIRST_DATA.into(), data);
        }
        self.cell()?
            .emit(Event::new(TOPIC_PAIR_TIMEOUT, values).with_scene_opt(scene))
    }
}

impl Behavior for PairBehavior {
    fn init(&mut self, cell: Arc<dyn Cell>) -> Result<(), BehaviorError> {
        self.cell = Some(cell);
        Ok(())
    }

    fn process_event(&mut self, event: &Event) -> Result<(), BehaviorError> {
        if event.is_topic(TOPIC_PAIR_TIMEOUT_CHECK) {
            return self.check_timeout(event);
        }

        let PairMatch::Hit(data) = (self.matches)(event, self.hit_data.as_ref()) else {
            return Ok(());
        };
        if self.is_pending() {
            self.second_hit(data)
        } else {
            self.first_hit(event, data)
        }
    }

    fn terminate(&mut self) -> Result<(), BehaviorError> {
        if let Some(reminder) = self.pending.take() {
            reminder.cancel();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cells_behavior::testing::BehaviorTestHarness;
    use cells_event::KEY_DEFAULT;

    const WINDOW: Duration = Duration::from_millis(50);

    fn criterion(event: &Event, _first: Option<&PayloadValue>) -> PairMatch {
        if event.is_topic("match") {
            PairMatch::Hit(event.payload().get_default().cloned())
        } else {
            PairMatch::Miss
        }
    }

    fn harness() -> BehaviorTestHarness<PairBehavior> {
        let mut h = BehaviorTestHarness::new("pair", PairBehavior::new(criterion, WINDOW));
        h.init().unwrap();
        h
    }

    #[test]
    fn pair_within_window() {
        let mut h = harness();
        h.send_new("match", "first").unwrap();
        assert!(h.behavior().is_pending());
        assert_eq!(h.pending_reminders().len(), 1);

        h.send_new("match", "second").unwrap();
        assert!(!h.behavior().is_pending());
        assert!(h.pending_reminders().is_empty());

        let emitted = h.emitted();
        assert_eq!(emitted.len(), 1);
        let pair = &emitted[0];
        assert!(pair.is_topic(TOPIC_PAIR));

        let p = pair.payload();
        let first = p.get_time(KEY_PAIR_FIRST_TIME).unwrap();
        let second = p.get_time(KEY_PAIR_SECOND_TIME).unwrap();
        assert!(first <= second);
        assert!((second - first).to_std().unwrap() <= WINDOW);
        assert_eq!(p.get_string(KEY_PAIR_FIRST_DATA), Some("first"));
        assert_eq!(p.get_string(KEY_PAIR_SECOND_DATA), Some("second"));
    }

    #[test]
    fn reminder_carries_hit_time() {
        let mut h = harness();
        h.send_new("match", ()).unwrap();

        let scheduled = &h.pending_reminders()[0];
        assert_eq!(scheduled.delay, WINDOW);
        assert!(scheduled.event.is_topic(TOPIC_PAIR_TIMEOUT_CHECK));
        let first_time = scheduled.event.payload().get_time(KEY_PAIR_FIRST_TIME);
        assert!(first_time.is_some());
    }

    #[test]
    fn timeout_when_reminder_fires() {
        let mut h = harness();
        h.send_new("match", 7_i64).unwrap();
        h.fire_next_reminder().unwrap().unwrap();

        assert!(!h.behavior().is_pending());
        let emitted = h.emitted();
        assert_eq!(emitted.len(), 1);
        let p = emitted[0].payload();
        assert!(emitted[0].is_topic(TOPIC_PAIR_TIMEOUT));
        assert_eq!(p.get_int(KEY_PAIR_FIRST_DATA), Some(7));
        let first = p.get_time(KEY_PAIR_FIRST_TIME).unwrap();
        assert!(p.get_time(KEY_PAIR_TIMEOUT).unwrap() >= first);
        assert!(!p.contains_key(KEY_PAIR_SECOND_TIME));
    }

    #[test]
    fn late_second_hit_is_a_timeout() {
        let mut h = harness();
        h.send_new("match", ()).unwrap();
        std::thread::sleep(WINDOW + Duration::from_millis(20));
        h.send_new("match", ()).unwrap();

        let emitted = h.emitted();
        assert_eq!(emitted.len(), 1);
        assert!(emitted[0].is_topic(TOPIC_PAIR_TIMEOUT));
        assert!(h.pending_reminders().is_empty());
    }

    #[test]
    fn wall_clock_jump_keeps_window_open() {
        let mut h = harness();
        h.send_new("match", "first").unwrap();
        let shifted = Utc::now() - chrono::Duration::hours(1);
        h.behavior_mut().hit = Some(shifted);
        h.send_new("match", "second").unwrap();

        let emitted = h.emitted();
        assert_eq!(emitted.len(), 1);
        assert!(emitted[0].is_topic(TOPIC_PAIR));
        let first = emitted[0].payload().get_time(KEY_PAIR_FIRST_TIME);
        assert_eq!(first, Some(shifted));
    }

    #[test]
    fn stale_check_is_ignored() {
        let mut h = harness();
        h.send_new("match", "a").unwrap();
        let stale = h.pending_reminders()[0].clone();
        h.send_new("match", "b").unwrap();
        h.take_emitted();

        std::thread::sleep(Duration::from_millis(1));
        h.send_new("match", "c").unwrap();
        h.fire_stale(&stale).unwrap();
        assert!(h.behavior().is_pending());
        assert!(h.emitted().is_empty());

        h.fire_next_reminder().unwrap().unwrap();
        let emitted = h.emitted();
        assert_eq!(emitted.len(), 1);
        assert!(emitted[0].is_topic(TOPIC_PAIR_TIMEOUT));
        let data = emitted[0].payload().get_string(KEY_PAIR_FIRST_DATA);
        assert_eq!(data, Some("c"));
    }

    #[test]
    fn idle_check_and_misses_are_ignored() {
        let mut h = harness();
        let check = [(KEY_PAIR_FIRST_TIME, Utc::now())];
        h.send_new(TOPIC_PAIR_TIMEOUT_CHECK, check).unwrap();
        h.send_new("other", ()).unwrap();
        assert!(h.emitted().is_empty());
        assert!(!h.behavior().is_pending());
    }

    #[test]
    fn criterion_sees_first_hit_data() {
        let mut h = BehaviorTestHarness::new(
            "pair",
            PairBehavior::new(
                |event: &Event, first: Option<&PayloadValue>| {
                    let value = event.payload().get_int(KEY_DEFAULT);
                    match (first, value) {
                        (None, Some(v)) => PairMatch::Hit(Some(PayloadValue::Int(v))),
                        (Some(PayloadValue::Int(f)), Some(v)) if v == f + 1 => {
                            PairMatch::Hit(Some(PayloadValue::Int(v)))
                        }
                        _ => PairMatch::Miss,
                    }
                },
                WINDOW,
            ),
        );
        h.init().unwrap();

        h.send_new("n", 1_i64).unwrap();
        h.send_new("n", 5_i64).unwrap();
        assert!(h.emitted().is_empty());

        h.send_new("n", 2_i64).unwrap();
        let p = h.emitted()[0].payload().clone();
        assert_eq!(p.get_int(KEY_PAIR_FIRST_DATA), Some(1));
        assert_eq!(p.get_int(KEY_PAIR_SECOND_DATA), Some(2));
    }

    #[test]
    fn scene_follows_first_hit() {
        let mut h = harness();
        let scene = Arc::new(Scene::new());
        h.send(Event::new("match", ()).with_scene(Arc::clone(&scene)))
            .unwrap();
        h.send_new("match", ()).unwrap();

        let emitted = h.emitted();
        assert!(Arc::ptr_eq(emitted[0].scene().unwrap(), &scene));
    }

    #[test]
    fn uninitialised_behavior_fails() {
        let mut b = PairBehavior::new(criterion, WINDOW);
        let err = b.process_event(&Event::new("match", ())).unwrap_err();
        assert!(matches!(err, BehaviorError::ExecutionFailed(_)));
        assert!(!b.is_pending());
    }

    #[test]
    fn terminate_cancels_pending_reminder() {
        let mut h = harness();
        h.send_new("match", ()).unwrap();
        h.terminate().unwrap();
        assert!(h.pending_reminders().is_empty());
    }

    #[test]
    fn window_from_config() {
        let b = PairBehavior::from_config(criterion, &PairConfig { window_ms: 250 });
        assert_eq!(b.duration(), Duration::from_millis(250));
    }
}
