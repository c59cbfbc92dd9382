//! Payload, waiter, event and scene types for the cells event mesh.
//!
//! # Overview
//!
//! Every [`Event`] carries an immutable [`Payload`]. Cells that need to
//! answer a blocked caller put the answer into a [`PayloadWaiter`] the
//! caller sent along in the request payload.
//!
//! ```text
//! ┌──────────────┐  Event{topic, Payload, Scene?}  ┌──────────────┐
//! │   caller     │ ──────────────────────────────► │    cell      │
//! │              │                                  │              │
//! │ waiter.wait  │ ◄──────── waiter.set(result) ─── │              │
//! └──────────────┘                                  └──────────────┘
//! ```
//!
//! # Main Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Payload`] | Immutable key/value container, derived with [`Payload::apply`] |
//! | [`PayloadValue`] | Closed set of value kinds |
//! | [`PayloadSource`] | Closed set of shapes a payload is built from |
//! | [`PayloadWaiter`] | Single-assignment, cancellable reply slot |
//! | [`CancelContext`] | Cancellation scope for waits |
//! | [`Event`] | Topic + payload + optional scene |
//! | [`Scene`] | Write-once store with flags |
//!
//! Reserved topics and keys live in this crate as plain constants
//! ([`TOPIC_RESET`], [`KEY_WAITER`], ...).

mod context;
mod error;
mod event;
mod payload;
mod scene;
mod topics;
mod value;
mod waiter;

pub use context::{CancelContext, CancelHandle};
pub use error::EventError;
pub use event::Event;
pub use payload::{Payload, PayloadValues};
pub use scene::Scene;
pub use topics::*;
pub use value::{OpaqueValue, PayloadSource, PayloadValue};
pub use waiter::PayloadWaiter;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn request_reply_through_payload() {
        let reply = PayloadWaiter::new();
        let request = Event::new(TOPIC_COUNTER_RESULTS, [(KEY_WAITER, reply.clone())]);

        let responder = tokio::spawn(async move {
            let waiter = request.payload().get_waiter(KEY_WAITER).unwrap();
            waiter.set(Payload::new([("a", 3_i64)]))
        });
        assert!(responder.await.unwrap());

        let ctx = CancelContext::background().with_timeout(Duration::from_secs(1));
        let result = reply.wait(Some(&ctx)).await.unwrap();
        assert_eq!(result.get_int("a"), Some(3));
    }

    #[test]
    fn reserved_names_are_distinct() {
        let topics = [
            TOPIC_RESET,
            TOPIC_COUNTER_RESULTS,
            TOPIC_PAIR,
            TOPIC_PAIR_TIMEOUT,
            TOPIC_PAIR_TIMEOUT_CHECK,
        ];
        for (i, a) in topics.iter().enumerate() {
            for b in &topics[i + 1..] {
                assert_ne!(a, b);
            }
        }
        let keys = [
            KEY_DEFAULT,
            KEY_WAITER,
            KEY_PAIR_FIRST_TIME,
            KEY_PAIR_FIRST_DATA,
            KEY_PAIR_SECOND_TIME,
            KEY_PAIR_SECOND_DATA,
            KEY_PAIR_TIMEOUT,
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
