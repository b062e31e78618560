//! User-driven link creation and removal.

use tracing::{info, warn};

use crate::error::{PwError, PwResult};
use crate::pwlink::PwLink;

/// Issues link and unlink commands on behalf of the user.
#[derive(Clone)]
pub struct LinkController {
    pw: PwLink,
}

impl LinkController {
    #[must_use]
    pub fn new(pw: PwLink) -> Self {
        Self { pw }
    }

    /// Link an input device port (the audio source, e.g. a microphone) to
    /// an output device port (the audio destination, e.g. speakers).
    ///
    /// Linking ports that are already linked is left to the tool.
    ///
    /// # Errors
    /// Returns an error if the tool rejects the link.
    pub fn connect(&self, input: &str, output: &str) -> PwResult<()> {
        info!(input, output, "Creating link");
        self.pw.link(input, output)
    }

    /// Remove links one id at a time.
    ///
    /// Stops at the first failure. Links removed before it stay removed.
    ///
    /// # Errors
    /// Returns [`PwError::DisconnectFailed`] naming the id that failed.
    pub fn disconnect<S: AsRef<str>>(&self, link_ids: &[S]) -> PwResult<usize> {
        for (done, link_id) in link_ids.iter().enumerate() {
            let link_id = link_id.as_ref();
            if let Err(e) = self.pw.unlink(link_id) {
                warn!(link_id, removed = done, error = %e, "Disconnect failed");
                return Err(PwError::DisconnectFailed {
                    link_id: link_id.to_string(),
                    source: Box::new(e),
                });
            }
            info!(link_id, "Link removed");
        }
        Ok(link_ids.len())
    }
}
