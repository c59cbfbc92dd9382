//! Scene behavior: stores each event's payload in the event's scene.
//!
//! The topic is the key, so code sharing the scene can wait for a topic
//! with [`Scene::wait_flag`](cells_event::Scene::wait_flag). Mostly useful
//! for observing what other cells emit.

use cells_behavior::{Behavior, BehaviorError, Cell};
use cells_event::Event;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct SceneBehavior;

impl SceneBehavior {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Behavior for SceneBehavior {
    fn init(&mut self, _cell: Arc<dyn Cell>) -> Result<(), BehaviorError> {
        Ok(())
    }

    fn process_event(&mut self, event: &Event) -> Result<(), BehaviorError> {
        if let Some(scene) = event.scene() {
            scene.store_and_flag(event.topic(), event.payload().clone())?;
        }
        Ok(())
    }
}
