//! Rendering of server lines for the terminal

use log::warn;
use shared::{Message, Wire, ACTION_UPDATE_PLAYERS, ACTION_WHOAMI};
use std::collections::BTreeMap;

/// Converts received lines into printable text
#[derive(Debug)]
pub struct Display {
    wire: Wire,
    me: Option<String>,
}

impl Display {
    pub fn new(wire: Wire) -> Self {
        Self { wire, me: None }
    }

    /// Own display name, once the server told us
    pub fn me(&self) -> Option<&str> {
        self.me.as_deref()
    }

    /// Returns the text to print for a received line, if any
    pub fn render(&mut self, line: &str) -> Option<String> {
        let Some(message) = self.wire.decode_outbound(line) else {
            warn!("Unreadable message from server: {}", line);
            return Some(line.to_string());
        };

        if message.is_control() {
            return self.handle_control(message);
        }
        Some(message.text)
    }

    fn handle_control(&mut self, message: Message) -> Option<String> {
        match message.action.as_str() {
            ACTION_WHOAMI => {
                let changed = self.me.as_deref() != Some(message.name.as_str());
                self.me = Some(message.name);
                if changed {
                    self.me.as_ref().map(|name| format!("* You are {}", name))
                } else {
                    None
                }
            }
            ACTION_UPDATE_PLAYERS => {
                let players: BTreeMap<String, bool> = serde_json::from_str(&message.text).ok()?;
                let summary: Vec<String> = players
                    .iter()
                    .map(|(name, ready)| {
                        let mark = if *ready { "ready" } else { "out" };
                        format!("{} ({})", name, mark)
                    })
                    .collect();
                Some(format!("* [{}] {}", message.state, summary.join(", ")))
            }
            _ => None,
        }
    }
}
