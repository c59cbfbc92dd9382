//! Counter behavior: counts keys derived from events.
//!
//! | Topic | Effect |
//! |-------|--------|
//! | [`TOPIC_RESET`] | all counters cleared |
//! | [`TOPIC_COUNTER_RESULTS`] | snapshot set on the waiter under [`KEY_WAITER`] |
//! | anything else | each key returned by the counter function incremented |

use crate::environment::Environment;
use crate::error::RuntimeError;
use cells_behavior::{Behavior, BehaviorError, Cell};
use cells_event::{
    CancelContext, Event, Payload, PayloadValue, PayloadValues, KEY_DEFAULT, KEY_WAITER,
    TOPIC_COUNTER_RESULTS, TOPIC_RESET,
};
use cells_types::CellId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Maps an event to the keys it counts for. A key returned twice is
/// counted twice.
pub type CounterFunc = Box<dyn Fn(&CellId, &Event) -> Vec<String> + Send + Sync>;

/// Counts keys and answers snapshot requests.
pub struct CounterBehavior {
    cell: Option<Arc<dyn Cell>>,
    counter: CounterFunc,
    counters: HashMap<String, i64>,
}

impl CounterBehavior {
    pub fn new<F>(counter: F) -> Self
    where
        F: Fn(&CellId, &Event) -> Vec<String> + Send + Sync + 'static,
    {
        Self {
            cell: None,
            counter: Box::new(counter),
            counters: HashMap::new(),
        }
    }

    /// Counts event topics.
    #[must_use]
    pub fn by_topic() -> Self {
        Self::new(|_, event| vec![event.topic().to_string()])
    }

    /// Counts the strings stored under [`KEY_DEFAULT`]; other events count
    /// nothing.
    #[must_use]
    pub fn by_default_strings() -> Self {
        Self::new(|_, event| {
            event
                .payload()
                .get_strings(KEY_DEFAULT)
                .map(<[String]>::to_vec)
                .unwrap_or_default()
        })
    }

    /// Current counters.
    #[must_use]
    pub fn counters(&self) -> &HashMap<String, i64> {
        &self.counters
    }

    fn snapshot(&self) -> Payload {
        let values: PayloadValues = self
            .counters
            .iter()
            .map(|(k, v)| (k.clone(), PayloadValue::Int(*v)))
            .collect();
        Payload::new(values)
    }

    fn answer(&self, event: &Event) -> Result<(), BehaviorError> {
        let waiter = event.payload().get_waiter(KEY_WAITER).ok_or_else(|| {
            BehaviorError::InvalidPayload(format!("{TOPIC_COUNTER_RESULTS} without waiter"))
        })?;
        if !waiter.set(self.snapshot()) {
            debug!("counter results already delivered");
        }
        Ok(())
    }

    fn count(&mut self, event: &Event) -> Result<(), BehaviorError> {
        let cell = self.cell.as_ref().ok_or_else(|| {
            BehaviorError::ExecutionFailed("counter behavior not initialised".into())
        })?;
        for key in (self.counter)(cell.id(), event) {
            *self.counters.entry(key).or_insert(0) += 1;
        }
        Ok(())
    }
}

impl Behavior for CounterBehavior {
    fn init(&mut self, cell: Arc<dyn Cell>) -> Result<(), BehaviorError> {
        self.cell = Some(cell);
        Ok(())
    }

    fn process_event(&mut self, event: &Event) -> Result<(), BehaviorError> {
        match event.topic() {
            TOPIC_RESET => {
                self.counters.clear();
                Ok(())
            }
            TOPIC_COUNTER_RESULTS => self.answer(event),
            _ => self.count(event),
        }
    }
}

/// Asks the counter cell `id` for its counters and waits up to `timeout`
/// (or until `ctx` ends) for the answer.
///
/// # Errors
///
/// - routing errors from [`Environment::emit`]
/// - [`RuntimeError::Request`] when no answer arrives in time
/// - [`RuntimeError::InvalidResponse`] when a counter is not an integer
pub async fn request_counter_results(
    ctx: &CancelContext,
    env: &Environment,
    id: &CellId,
    timeout: Duration,
) -> Result<HashMap<String, i64>, RuntimeError> {
    let ctx = ctx.with_timeout(timeout);
    let reply = env.request(&ctx, id, TOPIC_COUNTER_RESULTS, ()).await?;

    let mut counters = HashMap::with_capacity(reply.len());
    reply.do_each(|key, value| match value {
        PayloadValue::Int(n) => {
            counters.insert(key.to_string(), *n);
            Ok(())
        }
        other => Err(RuntimeError::InvalidResponse(format!(
            "counter {key:?} holds {}",
            other.kind()
        ))),
    })?;
    Ok(counters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cells_behavior::testing::BehaviorTestHarness;
    use cells_event::PayloadWaiter;

    fn harness() -> BehaviorTestHarness<CounterBehavior> {
        let mut h = BehaviorTestHarness::new("counter", CounterBehavior::by_default_strings());
        h.init().unwrap();
        h
    }

    fn results(h: &mut BehaviorTestHarness<CounterBehavior>) -> Payload {
        let waiter = PayloadWaiter::new();
        h.send_new(TOPIC_COUNTER_RESULTS, [(KEY_WAITER, waiter.clone())])
            .unwrap();
        waiter.try_get().unwrap()
    }

    #[test]
    fn counts_and_snapshots() {
        let mut h = harness();
        h.send_new("count", &["a", "b"][..]).unwrap();
        h.send_new("count", &["a", "c", "d"][..]).unwrap();
        h.send_new("count", &["a", "d"][..]).unwrap();

        let snapshot = results(&mut h);
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot.get_int("a"), Some(3));
        assert_eq!(snapshot.get_int("b"), Some(1));
        assert_eq!(snapshot.get_int("c"), Some(1));
        assert_eq!(snapshot.get_int("d"), Some(2));
    }

    #[test]
    fn reset_clears() {
        let mut h = harness();
        h.send_new("count", &["a"][..]).unwrap();
        h.send_new(TOPIC_RESET, ()).unwrap();
        assert!(h.behavior().counters().is_empty());
        assert!(results(&mut h).is_empty());
    }

    #[test]
    fn duplicate_keys_count_twice() {
        let mut h = harness();
        h.send_new("count", &["x", "x"][..]).unwrap();
        assert_eq!(h.behavior().counters().get("x"), Some(&2));
    }

    #[test]
    fn results_without_waiter_fail() {
        let mut h = harness();
        let err = h.send_new(TOPIC_COUNTER_RESULTS, ()).unwrap_err();
        assert!(matches!(err, BehaviorError::InvalidPayload(_)));
    }

    #[test]
    fn snapshot_is_detached_from_state() {
        let mut h = harness();
        h.send_new("count", &["a"][..]).unwrap();
        let before = results(&mut h);
        h.send_new("count", &["a"][..]).unwrap();
        assert_eq!(before.get_int("a"), Some(1));
        assert_eq!(h.behavior().counters().get("a"), Some(&2));
    }

    #[test]
    fn counter_function_sees_cell_id() {
        let mut h = BehaviorTestHarness::new(
            "tally",
            CounterBehavior::new(|id: &CellId, event: &Event| {
                vec![format!("{id}/{}", event.topic())]
            }),
        );
        h.init().unwrap();
        h.send_new("ping", ()).unwrap();
        assert_eq!(h.behavior().counters().get("tally/ping"), Some(&1));
    }

    #[test]
    fn by_topic_counts_topics() {
        let mut h = BehaviorTestHarness::new("t", CounterBehavior::by_topic());
        h.init().unwrap();
        h.send_new("a", ()).unwrap();
        h.send_new("a", ()).unwrap();
        assert_eq!(h.behavior().counters().get("a"), Some(&2));
    }
}
