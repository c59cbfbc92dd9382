//! Behavior and cell contracts for the cells event mesh.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Behavior SDK Layer                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  cells-types    : CellId, EventId, ErrorCode                │
//! │  cells-event    : Payload, PayloadWaiter, Event, Scene      │
//! │  cells-behavior : Behavior / Cell traits  ◄── HERE          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A [`Behavior`] holds the state of one cell and handles its events one
//! at a time. It reaches the rest of the mesh only through the [`Cell`]
//! handle passed to [`Behavior::init`].
//!
//! ```text
//!              ┌───────── Cell ─────────┐
//!  queue ────► │ process_event(&Event)  │ ──emit──────► subscribers
//!              │        Behavior        │ ──emit_to───► target cell
//!              └────────────────────────┘ ──emit_after─► own queue
//! ```
//!
//! # Testing
//!
//! [`testing::BehaviorTestHarness`] runs a behavior against a recording
//! cell; see its module docs.

mod behavior;
mod cell;
mod error;
pub mod testing;

pub use behavior::Behavior;
pub use cell::{Cell, Reminder};
pub use error::BehaviorError;
