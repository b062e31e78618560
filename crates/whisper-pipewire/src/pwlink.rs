//! `pw-link` / `pw-cli` client.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use whisper_core::{LinkList, PortDirection, PortList, parse_link_list, parse_port_list};

use crate::error::{PwError, PwResult};
use crate::runner::{CommandRunner, args};

/// Names of the external tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    pub pw_link: String,
    pub pw_cli: String,
    pub pactl: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            pw_link: "pw-link".to_string(),
            pw_cli: "pw-cli".to_string(),
            pactl: "pactl".to_string(),
        }
    }
}

/// Thin client over the link tool.
#[derive(Clone)]
pub struct PwLink {
    runner: Arc<dyn CommandRunner>,
    tools: ToolPaths,
}

impl PwLink {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, tools: ToolPaths) -> Self {
        Self { runner, tools }
    }

    fn pw_link(&self, list: &[&str]) -> PwResult<String> {
        self.runner.run(&self.tools.pw_link, &args(list))
    }

    /// List ports in one direction.
    ///
    /// # Errors
    /// Returns an error if the tool fails or its output cannot be parsed.
    pub fn list_ports(&self, direction: PortDirection) -> PwResult<PortList> {
        let flag = match direction {
            PortDirection::Input => "--input",
            PortDirection::Output => "--output",
        };
        let output = self.pw_link(&[flag, "--verbose", "--id"])?;
        Ok(parse_port_list(&output)?)
    }

    /// List input ports.
    ///
    /// # Errors
    /// Returns an error if the tool fails or its output cannot be parsed.
    pub fn list_inputs(&self) -> PwResult<PortList> {
        self.list_ports(PortDirection::Input)
    }

    /// List output ports.
    ///
    /// # Errors
    /// Returns an error if the tool fails or its output cannot be parsed.
    pub fn list_outputs(&self) -> PwResult<PortList> {
        self.list_ports(PortDirection::Output)
    }

    /// List active links.
    ///
    /// # Errors
    /// Returns an error if the tool fails or its output cannot be parsed.
    pub fn list_links(&self) -> PwResult<LinkList> {
        let output = self.pw_link(&["--links", "--id"])?;
        Ok(parse_link_list(&output)?)
    }

    /// Create a lingering link from `source` to `destination`.
    ///
    /// # Errors
    /// Returns an error if the tool rejects the link.
    pub fn link(&self, source: &str, destination: &str) -> PwResult<()> {
        self.pw_link(&["--linger", source, destination]).map(drop)
    }

    /// Destroy a link by id.
    ///
    /// # Errors
    /// Returns an error if the tool fails.
    pub fn unlink(&self, link_id: &str) -> PwResult<()> {
        self.pw_link(&["--disconnect", link_id]).map(drop)
    }

    /// Raw `pw-cli info 0` output.
    ///
    /// # Errors
    /// Returns an error if the server does not answer.
    pub fn server_info(&self) -> PwResult<String> {
        self.runner.run(&self.tools.pw_cli, &args(&["info", "0"]))
    }

    /// Check that the tools are installed and the server answers.
    ///
    /// # Errors
    /// Returns [`PwError::PrerequisiteMissing`] naming the failed check.
    pub fn check_installed(&self) -> PwResult<()> {
        let which = |tool: &str| -> PwResult<()> {
            match self.runner.run("which", &args(&[tool])) {
                Ok(path) if !path.trim().is_empty() => {
                    debug!(tool, path = %path.trim(), "Tool found");
                    Ok(())
                }
                Ok(_) | Err(_) => Err(PwError::PrerequisiteMissing(format!("{tool} not found"))),
            }
        };

        which(&self.tools.pw_cli)?;
        which(&self.tools.pw_link)?;

        match self.server_info() {
            Ok(info) if !info.trim().is_empty() => {
                info!("PipeWire server answered");
                Ok(())
            }
            Ok(_) => Err(PwError::PrerequisiteMissing("PipeWire server info is empty".to_string())),
            Err(e) => {
                warn!(error = %e, "PipeWire server did not answer");
                Err(PwError::PrerequisiteMissing(format!("PipeWire server unreachable: {e}")))
            }
        }
    }
}
