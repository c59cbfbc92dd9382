//! Reserved topics and payload keys.
//!
//! Topics are compared exactly; there is no hierarchy implied by `:`.

/// Clears a counter cell.
pub const TOPIC_RESET: &str = "reset";

/// Asks a counter cell for a snapshot; the request carries a waiter under
/// [`KEY_WAITER`].
pub const TOPIC_COUNTER_RESULTS: &str = "counter:results";

/// Emitted by a pair cell when two matching events arrive within the window.
pub const TOPIC_PAIR: &str = "pair";

/// Emitted by a pair cell when the second matching event did not arrive in time.
pub const TOPIC_PAIR_TIMEOUT: &str = "pair:timeout";

/// Self-addressed reminder a pair cell schedules for its pending hit.
pub const TOPIC_PAIR_TIMEOUT_CHECK: &str = "pair:timeout:check";

/// Key for single values passed to [`Payload::new`](crate::Payload::new).
pub const KEY_DEFAULT: &str = "default";

/// Key of the reply waiter in request payloads.
pub const KEY_WAITER: &str = "waiter";

pub const KEY_PAIR_FIRST_TIME: &str = "pair:first:time";
pub const KEY_PAIR_FIRST_DATA: &str = "pair:first:data";
pub const KEY_PAIR_SECOND_TIME: &str = "pair:second:time";
pub const KEY_PAIR_SECOND_DATA: &str = "pair:second:data";
pub const KEY_PAIR_TIMEOUT: &str = "pair:timeout";
