//! Core types for the cells event mesh.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Behavior SDK Layer                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  cells-types    : CellId, EventId, ErrorCode  ◄── HERE       │
//! │  cells-event    : Payload, PayloadWaiter, Event, Scene      │
//! │  cells-behavior : Behavior / Cell traits, test harness      │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Runtime Layer                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  cells-runtime  : Environment, cell runner, config,         │
//! │                   pair / counter / scene behaviors          │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Frontend Layer                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  cells-cli      : `cells` demonstration binary              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use cells_types::{CellId, EventId};
//!
//! let counter = CellId::new("counter");
//! assert_eq!(counter.to_string(), "counter");
//!
//! let a = EventId::new();
//! let b = EventId::new();
//! assert_ne!(a, b);
//! ```

mod error;
mod id;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use id::{CellId, EventId};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn cell_id_equality_is_exact() {
        assert_eq!(CellId::new("pair"), CellId::from("pair"));
        assert_ne!(CellId::new("pair"), CellId::new("Pair"));
        assert_ne!(CellId::new("pair"), CellId::new("pair "));
    }

    #[test]
    fn cell_id_display() {
        let id = CellId::from(String::from("scene"));
        assert_eq!(format!("{id}"), "scene");
        assert_eq!(id.as_str(), "scene");
    }

    #[test]
    fn cell_id_map_lookup_by_str() {
        let mut cells = HashMap::new();
        cells.insert(CellId::new("counter"), 1);
        assert_eq!(cells.get("counter"), Some(&1));
        assert_eq!(cells.get("missing"), None);
    }

    #[test]
    fn cell_id_serde_transparent() {
        let id = CellId::new("counter");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"counter\"");
        let back: CellId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn event_id_display_and_uniqueness() {
        let id = EventId::new();
        let display = format!("{id}");
        assert!(display.starts_with("evt:"));
        assert!(display.contains(&id.uuid().to_string()));
        assert_ne!(EventId::default(), EventId::default());
    }
}
