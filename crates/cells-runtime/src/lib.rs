//! Cells Runtime - the event mesh host.
//!
//! Runs behaviors as cells, routes their events and provides the builtin
//! behaviors.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Contract Layer                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  cells-types    : CellId, EventId, ErrorCode                │
//! │  cells-event    : Payload, Waiter, Event, Scene, Context    │
//! │  cells-behavior : Behavior, Cell, Reminder, test harness    │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Runtime Layer (THIS CRATE)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Environment : cell registry, subscriptions, requests       │
//! │  runner      : one serialized event loop per cell           │
//! │  behaviors   : Pair, Counter, Scene                         │
//! │  config      : layered TOML + CELLS_* configuration         │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Frontend Layer (cells-cli)                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Delivery
//!
//! - Events from one emitter reach one cell in emission order.
//! - A cell handles one event at a time.
//! - A panicking behavior gets `recover`; if that fails the cell stops.
//! - Emitting never blocks; [`Environment::request`] blocks the caller
//!   until the reply or the end of its [`CancelContext`](cells_event::CancelContext).

mod behaviors;
pub mod config;
mod environment;
mod error;
mod runner;

pub use behaviors::{
    request_counter_results, CounterBehavior, CounterFunc, PairBehavior, PairCriterion, PairMatch,
    SceneBehavior,
};
pub use environment::Environment;
pub use error::RuntimeError;
