//! Events exchanged between cells.

use crate::payload::Payload;
use crate::scene::Scene;
use crate::value::PayloadSource;
use cells_types::EventId;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// An immutable `(topic, payload, scene)` triple.
///
/// The id and creation time exist for logging only.
///
/// # Example
///
/// ```
/// use cells_event::{Event, TOPIC_RESET};
///
/// let reset = Event::new(TOPIC_RESET, ());
/// assert!(reset.is_topic(TOPIC_RESET));
/// assert!(reset.payload().is_empty());
/// assert!(reset.scene().is_none());
/// ```
#[derive(Clone, Debug)]
pub struct Event {
    id: EventId,
    topic: String,
    payload: Payload,
    scene: Option<Arc<Scene>>,
    created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: impl Into<PayloadSource>) -> Self {
        Self {
            id: EventId::new(),
            topic: topic.into(),
            payload: Payload::new(payload),
            scene: None,
            created_at: Utc::now(),
        }
    }

    /// Attaches a scene.
    #[must_use]
    pub fn with_scene(mut self, scene: Arc<Scene>) -> Self {
        self.scene = Some(scene);
        self
    }

    /// Attaches a scene if there is one; used when propagating a scene from
    /// an incoming event to an outgoing one.
    #[must_use]
    pub fn with_scene_opt(mut self, scene: Option<Arc<Scene>>) -> Self {
        self.scene = scene;
        self
    }

    #[must_use]
    pub fn id(&self) -> EventId {
        self.id
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn is_topic(&self, topic: &str) -> bool {
        self.topic == topic
    }

    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    #[must_use]
    pub fn scene(&self) -> Option<&Arc<Scene>> {
        self.scene.as_ref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<event {:?}: {}>", self.topic, self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KEY_DEFAULT;

    #[test]
    fn new_builds_payload_from_source() {
        let e = Event::new("tick", 3_i64);
        assert_eq!(e.topic(), "tick");
        assert_eq!(e.payload().get_int(KEY_DEFAULT), Some(3));
    }

    #[test]
    fn topics_are_case_sensitive() {
        let e = Event::new("Pair", ());
        assert!(e.is_topic("Pair"));
        assert!(!e.is_topic("pair"));
    }

    #[test]
    fn scene_attachment() {
        let scene = Arc::new(Scene::new());
        let e = Event::new("a", ()).with_scene(Arc::clone(&scene));
        assert!(Arc::ptr_eq(e.scene().unwrap(), &scene));

        let carried = Event::new("b", ()).with_scene_opt(e.scene().cloned());
        assert!(Arc::ptr_eq(carried.scene().unwrap(), &scene));
        assert!(Event::new("c", ()).with_scene_opt(None).scene().is_none());
    }

    #[test]
    fn display_and_ids() {
        let a = Event::new("x", [("k", 1_i64)]);
        let b = a.clone();
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), Event::new("x", ()).id());
        assert_eq!(a.to_string(), r#"<event "x": <"k": 1>>"#);
        assert!(a.created_at() <= Utc::now());
    }
}
