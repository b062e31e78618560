//! Scripted tool runner for daemon tests.

use std::collections::HashMap;

use parking_lot::Mutex;
use whisper_pipewire::{CommandRunner, PwError, PwResult};

pub const INPUTS: &str = "  52 alsa_output.pci-0000_00_1f.3.analog-stereo:playback_FL
      alsa:pcm:0:front:0:playback:playback_0
      Built-in Audio Analog Stereo:playback_FL
  53 alsa_output.pci-0000_00_1f.3.analog-stereo:playback_FR
      alsa:pcm:0:front:0:playback:playback_1
      Built-in Audio Analog Stereo:playback_FR
  90 obs:input_FR
      obs
      obs:input_FR
";

pub const OUTPUTS: &str = "  61 alsa_input.usb-Blue_Yeti-00.analog-stereo:capture_FL
      alsa:pcm:2:front:2:capture:capture_0
      Yeti Stereo Microphone:capture_FL
  62 alsa_input.usb-Blue_Yeti-00.analog-stereo:capture_FR
      alsa:pcm:2:front:2:capture:capture_1
      Yeti Stereo Microphone:capture_FR
";

pub const LINKS: &str = "  61 alsa_input.usb-Blue_Yeti-00.analog-stereo:capture_FL
 104   |->   52 alsa_output.pci-0000_00_1f.3.analog-stereo:playback_FL
  62 alsa_input.usb-Blue_Yeti-00.analog-stereo:capture_FR
 105   |->   53 alsa_output.pci-0000_00_1f.3.analog-stereo:playback_FR
 130   |->   90 obs:input_FR
";

/// Answers commands from a table keyed by the full command line.
#[derive(Default)]
pub struct ScriptedRunner {
    replies: Mutex<HashMap<String, Result<String, String>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    /// A runner that knows the standard listings above.
    pub fn with_graph() -> Self {
        let runner = Self::default();
        runner.reply("pw-link --input --verbose --id", INPUTS);
        runner.reply("pw-link --output --verbose --id", OUTPUTS);
        runner.reply("pw-link --links --id", LINKS);
        runner
    }

    pub fn reply(&self, command: &str, output: &str) {
        self.replies.lock().insert(command.to_string(), Ok(output.to_string()));
    }

    pub fn fail(&self, command: &str, stderr: &str) {
        self.replies.lock().insert(command.to_string(), Err(stderr.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == command).count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[String]) -> PwResult<String> {
        let command = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().push(command.clone());

        match self.replies.lock().get(&command) {
            Some(Ok(output)) => Ok(output.clone()),
            Some(Err(stderr)) => Err(PwError::Execution {
                program: program.to_string(),
                exit_code: Some(1),
                stderr: stderr.clone(),
            }),
            None => Err(PwError::Execution {
                program: program.to_string(),
                exit_code: Some(127),
                stderr: format!("unscripted command: {command}"),
            }),
        }
    }
}
