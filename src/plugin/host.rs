//! JSON-lines host protocol
//!
//! The host writes one command object per line, for example:
//!
//! ```text
//! {"command":"start"}
//! {"command":"say","text":"Hello world!"}
//! {"command":"interrupt"}
//! {"command":"continue"}
//! {"command":"stop"}
//! ```
//!
//! Nothing is written back; malformed lines are logged and skipped.

use super::TtsPlugin;
use crate::Result;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::io::BufRead;

/// One lifecycle call from the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum HostCommand {
    Start,
    Stop,
    #[serde(alias = "sayText")]
    Say { text: String },
    #[serde(alias = "interruptExecution")]
    Interrupt,
    #[serde(alias = "continueExecution")]
    Continue,
}

impl HostCommand {
    /// Parse a single protocol line
    pub fn parse(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }

    /// Forward this command to the plugin
    pub fn dispatch(self, plugin: &mut dyn TtsPlugin) {
        match self {
            HostCommand::Start => plugin.start(),
            HostCommand::Stop => plugin.stop(),
            HostCommand::Say { text } => plugin.say_text(&text),
            HostCommand::Interrupt => plugin.interrupt_execution(),
            HostCommand::Continue => plugin.continue_execution(),
        }
    }
}

/// Read commands until EOF and dispatch them in order
///
/// Returns the number of commands dispatched. Only I/O errors on the
/// reader end the loop early.
pub fn serve<R: BufRead>(reader: R, plugin: &mut dyn TtsPlugin) -> Result<usize> {
    let mut dispatched = 0;

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match HostCommand::parse(&line) {
            Ok(command) => {
                debug!("Host command: {:?}", command);
                command.dispatch(plugin);
                dispatched += 1;
            }
            Err(e) => error!("Skipping malformed host command on line {}: {}", number + 1, e),
        }
    }

    Ok(dispatched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            HostCommand::parse(r#"{"command":"start"}"#).unwrap(),
            HostCommand::Start
        );
        assert_eq!(
            HostCommand::parse(r#" {"command":"say","text":"Hello world!"} "#).unwrap(),
            HostCommand::Say {
                text: "Hello world!".to_string()
            }
        );
        assert_eq!(
            HostCommand::parse(r#"{"command":"sayText","text":""}"#).unwrap(),
            HostCommand::Say {
                text: String::new()
            }
        );
        assert_eq!(
            HostCommand::parse(r#"{"command":"continueExecution"}"#).unwrap(),
            HostCommand::Continue
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(HostCommand::parse(r#"{"command":"pause"}"#).is_err());
        assert!(HostCommand::parse(r#"{"command":"say"}"#).is_err());
        assert!(HostCommand::parse("say hello").is_err());
    }

    #[test]
    fn test_serialize_round_trip_shape() {
        let json = serde_json::to_string(&HostCommand::Interrupt).unwrap();
        assert_eq!(json, r#"{"command":"interrupt"}"#);
    }
}
