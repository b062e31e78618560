//! Rendered state shared between the poll loop and user actions.

use std::collections::BTreeSet;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::reconcile::{DeviceLink, Reconciliation};

/// What the presentation layer currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderSnapshot {
    /// Every raw link id seen on the last pass, ALSA or not
    pub observed: BTreeSet<String>,
    /// The device links last handed to the presentation layer
    pub rendered: Reconciliation,
    /// Incremented on every render
    pub generation: u64,
}

/// Thread-safe rendered state.
///
/// Writers replace the whole snapshot; concurrent passes resolve
/// last-writer-wins.
#[derive(Clone)]
pub struct RenderedState {
    inner: Arc<ArcSwap<RenderSnapshot>>,
}

impl Default for RenderedState {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderedState {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Arc::new(ArcSwap::from_pointee(RenderSnapshot::default())) }
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RenderSnapshot> {
        self.inner.load_full()
    }

    /// Link ids currently rendered.
    #[must_use]
    pub fn rendered_ids(&self) -> BTreeSet<String> {
        self.inner.load().rendered.link_ids.clone()
    }

    /// Device links currently rendered.
    #[must_use]
    pub fn device_links(&self) -> Vec<DeviceLink> {
        self.inner.load().rendered.links.clone()
    }

    /// Check whether the raw link ids match the last observed set.
    #[must_use]
    pub fn is_unchanged(&self, observed: &BTreeSet<String>) -> bool {
        self.inner.load().observed == *observed
    }

    /// Record a pass that did not need a render.
    ///
    /// Only `observed` changes; a render that lands concurrently is kept.
    pub fn record_observed(&self, observed: BTreeSet<String>) {
        self.inner.rcu(|current| RenderSnapshot {
            observed: observed.clone(),
            rendered: current.rendered.clone(),
            generation: current.generation,
        });
    }

    /// Replace the rendered links after a render.
    ///
    /// Returns the new generation, unique across concurrent callers.
    pub fn replace(&self, rendered: Reconciliation, observed: BTreeSet<String>) -> u64 {
        let previous = self.inner.rcu(|current| RenderSnapshot {
            observed: observed.clone(),
            rendered: rendered.clone(),
            generation: current.generation + 1,
        });
        previous.generation + 1
    }
}
