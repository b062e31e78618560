//! One reconciliation pass from tool output to the presentation layer.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};
use whisper_core::{RenderedState, needs_render, reconcile};
use whisper_pipewire::{PwLink, PwResult};

use crate::error::{DaemonResult, run_blocking};
use crate::presenter::Presenter;

/// What a refresh pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Nothing changed; the presenter was not called
    Unchanged,
    /// The presenter received this many device links
    Rendered(usize),
}

/// Runs refresh passes against the shared rendered state.
#[derive(Clone)]
pub struct RefreshService {
    pw: PwLink,
    state: RenderedState,
    presenter: Arc<dyn Presenter>,
}

impl RefreshService {
    #[must_use]
    pub fn new(pw: PwLink, state: RenderedState, presenter: Arc<dyn Presenter>) -> Self {
        Self { pw, state, presenter }
    }

    #[must_use]
    pub fn state(&self) -> &RenderedState {
        &self.state
    }

    /// Run a pass on the blocking pool.
    ///
    /// On failure the previous rendered state is kept.
    pub async fn refresh(&self, force: bool) -> DaemonResult<RefreshOutcome> {
        let service = self.clone();
        let outcome = run_blocking(move || service.refresh_blocking(force)).await;
        if let Err(e) = &outcome {
            warn!(force, error = %e, "Refresh failed, keeping previous connections");
        }
        outcome
    }

    /// Run a pass on the current thread.
    pub fn refresh_blocking(&self, force: bool) -> PwResult<RefreshOutcome> {
        let links = self.pw.list_links()?;
        let observed = links.connection_ids();

        if !force && self.state.is_unchanged(&observed) {
            trace!(links = observed.len(), "Link ids unchanged, skipping port listing");
            return Ok(RefreshOutcome::Unchanged);
        }

        let inputs = self.pw.list_inputs()?;
        let outputs = self.pw.list_outputs()?;
        let fresh = reconcile(&inputs, &outputs, &links);

        if !needs_render(&self.state.rendered_ids(), &fresh.link_ids, force) {
            debug!(links = observed.len(), "Device links unchanged");
            self.state.record_observed(observed);
            return Ok(RefreshOutcome::Unchanged);
        }

        let count = fresh.links.len();
        let published = fresh.links.clone();
        let generation = self.state.replace(fresh, observed);
        self.presenter.on_connections_changed(&published, generation);

        info!(count, generation, force, "Device links rendered");
        Ok(RefreshOutcome::Rendered(count))
    }
}
