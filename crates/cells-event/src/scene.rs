//! Shared store-and-flag scratchpad.
//!
//! A [`Scene`] travels with a chain of related events. Cells store a
//! payload under a key exactly once; storing also raises a flag that
//! anyone can wait on.
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | `store_and_flag(k, p)` | store `p` under `k`, raise flag `k` (fails if `k` exists) |
//! | `fetch(k)` | stored payload, if any |
//! | `wait_flag(k, ctx)` | block until flag `k` is raised |
//!
//! A flag for a key that was never stored lives only while someone waits
//! on it.

use crate::context::CancelContext;
use crate::error::EventError;
use crate::payload::Payload;
use crate::waiter::PayloadWaiter;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
struct Flag {
    waiter: PayloadWaiter,
    waiting: usize,
}

#[derive(Debug, Default)]
struct SceneInner {
    props: HashMap<String, Payload>,
    flags: HashMap<String, Flag>,
}

impl SceneInner {
    fn flag(&mut self, key: &str) -> &mut Flag {
        self.flags.entry(key.to_string()).or_default()
    }
}

/// Releases one waiter's hold on a flag, including when the wait is
/// dropped before it completes.
struct FlagHold<'a> {
    scene: &'a Scene,
    key: &'a str,
}

impl Drop for FlagHold<'_> {
    fn drop(&mut self) {
        let mut inner = self.scene.inner.lock();
        let stored = inner.props.contains_key(self.key);
        let unused = match inner.flags.get_mut(self.key) {
            Some(flag) => {
                flag.waiting = flag.waiting.saturating_sub(1);
                flag.waiting == 0 && !stored
            }
            None => false,
        };
        if unused {
            inner.flags.remove(self.key);
            debug!(key = self.key, "unused scene flag released");
        }
    }
}

/// Write-once key/value store with per-key flags.
#[derive(Debug, Default)]
pub struct Scene {
    inner: Mutex<SceneInner>,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `payload` under `key` and raises the flag for `key`.
    ///
    /// # Errors
    ///
    /// [`EventError::SceneKeyExists`] if `key` was stored before.
    pub fn store_and_flag(&self, key: &str, payload: Payload) -> Result<(), EventError> {
        let flag = {
            let mut inner = self.inner.lock();
            if inner.props.contains_key(key) {
                return Err(EventError::SceneKeyExists(key.to_string()));
            }
            inner.props.insert(key.to_string(), payload.clone());
            inner.flag(key).waiter.clone()
        };
        flag.set(payload);
        debug!(key, "scene flag raised");
        Ok(())
    }

    #[must_use]
    pub fn fetch(&self, key: &str) -> Option<Payload> {
        self.inner.lock().props.get(key).cloned()
    }

    /// Waits until `key` has been stored and returns its payload.
    ///
    /// # Errors
    ///
    /// Cancellation errors from `ctx`.
    pub async fn wait_flag(
        &self,
        key: &str,
        ctx: Option<&CancelContext>,
    ) -> Result<Payload, EventError> {
        let waiter = {
            let mut inner = self.inner.lock();
            let flag = inner.flag(key);
            flag.waiting += 1;
            flag.waiter.clone()
        };
        let _hold = FlagHold { scene: self, key };
        waiter.wait(ctx).await
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().props.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn flag_count(&self) -> usize {
        self.inner.lock().flags.len()
    }
}
