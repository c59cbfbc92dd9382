//! Builtin behaviors.
//!
//! | Behavior | Purpose |
//! |----------|---------|
//! | [`PairBehavior`] | Two matching events within a window, or a timeout |
//! | [`CounterBehavior`] | Resettable key counts with snapshot requests |
//! | [`SceneBehavior`] | Stores event payloads in the event's scene |

mod counter;
mod pair;
mod scene;

pub use counter::{request_counter_results, CounterBehavior, CounterFunc};
pub use pair::{PairBehavior, PairCriterion, PairMatch};
pub use scene::SceneBehavior;
