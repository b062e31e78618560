//! Per-device volume through the PulseAudio compatibility layer.
//!
//! Every read or write is one `pactl` invocation; no connection is held
//! between calls.

use std::sync::Arc;

use tracing::{debug, info};
use whisper_core::DeviceKind;

use crate::error::{PwError, PwResult};
use crate::runner::{CommandRunner, args};

/// Convert a 0-100 slider value into a normalized volume.
#[must_use]
pub fn from_percent(percent: f64) -> f32 {
    (percent / 100.0) as f32
}

/// Entry point for audio-server volume control.
#[derive(Clone)]
pub struct AudioControl {
    runner: Arc<dyn CommandRunner>,
    pactl: String,
}

impl AudioControl {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, pactl: impl Into<String>) -> Self {
        Self { runner, pactl: pactl.into() }
    }

    /// Name the audio server reports in `pactl info`.
    ///
    /// # Errors
    /// Returns an error if the audio server is unreachable.
    pub fn server_name(&self) -> PwResult<String> {
        let info = self.runner.run(&self.pactl, &args(&["info"]))?;
        Ok(info
            .lines()
            .find_map(|l| l.strip_prefix("Server Name:"))
            .map(|s| s.trim().to_string())
            .unwrap_or_default())
    }

    /// Check that the audio server answers.
    ///
    /// # Errors
    /// Returns [`PwError::PrerequisiteMissing`] if it does not.
    pub fn probe(&self) -> PwResult<()> {
        match self.server_name() {
            Ok(server) => {
                info!(%server, "Audio control server answered");
                Ok(())
            }
            Err(e) => Err(PwError::PrerequisiteMissing(format!("audio control unavailable: {e}"))),
        }
    }

    /// Read the flat volume of a device (0.0 - 1.0).
    ///
    /// # Errors
    /// Returns an error if the device is unknown or the output is unexpected.
    pub fn volume(&self, kind: DeviceKind, resource_name: &str) -> PwResult<f32> {
        let command = format!("get-{}-volume", kind.noun());
        let output = self.runner.run(&self.pactl, &args(&[command.as_str(), resource_name]))?;
        parse_flat_volume(&output)
    }

    /// Set every channel of a device to `volume` (0.0 - 1.0).
    ///
    /// # Errors
    /// Returns an error if the value is out of range or the server refuses.
    pub fn set_volume(&self, kind: DeviceKind, resource_name: &str, volume: f32) -> PwResult<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(whisper_core::Error::InvalidVolume(volume).into());
        }
        let command = format!("set-{}-volume", kind.noun());
        let percent = format!("{}%", (volume * 100.0).round() as u32);
        self.runner.run(&self.pactl, &args(&[command.as_str(), resource_name, percent.as_str()]))?;
        debug!(?kind, resource_name, volume, "Volume applied");
        Ok(())
    }
}

/// Average the per-channel percentages printed by `pactl get-*-volume`.
fn parse_flat_volume(output: &str) -> PwResult<f32> {
    let first = output.lines().next().unwrap_or_default();
    let percents: Vec<f32> = first
        .split_whitespace()
        .filter_map(|token| token.strip_suffix('%'))
        .filter_map(|n| n.parse::<f32>().ok())
        .collect();

    if percents.is_empty() {
        return Err(PwError::VolumeParse(output.to_string()));
    }
    Ok(percents.iter().sum::<f32>() / percents.len() as f32 / 100.0)
}
