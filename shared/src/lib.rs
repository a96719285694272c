use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9999;
pub const DEFAULT_ROUND_TIMEOUT: u64 = 7;
pub const WARNING_SECONDS: u64 = 5;
pub const BOT_NAME: &str = "BrainBot";

pub const ACTION_WHOAMI: &str = "whoami";
pub const ACTION_UPDATE_PLAYERS: &str = "updatePlayers";

/// Current state of the game state machine, as seen on the wire.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    #[serde(rename = "chat")]
    Chat,
    #[serde(rename = "game")]
    Game,
    #[serde(rename = "answer")]
    Answering,
    #[serde(rename = "5sec")]
    FiveSecondWarning,
    #[serde(rename = "timeout")]
    TimedOut,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Chat => "chat",
            Phase::Game => "game",
            Phase::Answering => "answer",
            Phase::FiveSecondWarning => "5sec",
            Phase::TimedOut => "timeout",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Plain,
    Control,
}

/// A logical outbound message.
///
/// Plain messages carry chat and game text; control messages carry a
/// directive in `action` for the presentation layer (`whoami`,
/// `updatePlayers`) with its payload in `text`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Message {
    #[serde(rename = "Type")]
    pub kind: MessageKind,
    pub name: String,
    pub text: String,
    pub state: Phase,
    pub master_name: String,
    pub action: String,
}

impl Message {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Plain,
            name: BOT_NAME.to_string(),
            text: text.into(),
            state: Phase::default(),
            master_name: String::new(),
            action: String::new(),
        }
    }

    pub fn control(action: &str, text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Control,
            action: action.to_string(),
            ..Self::plain(text)
        }
    }

    pub fn from_sender(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Stamps the game context a client needs to render the message.
    pub fn in_context(mut self, state: Phase, master_name: impl Into<String>) -> Self {
        self.state = state;
        self.master_name = master_name.into();
        self
    }

    pub fn is_control(&self) -> bool {
        self.kind == MessageKind::Control
    }
}

/// Inbound structured payload. Only the text matters to the server.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InboundMessage {
    text: String,
}

/// Line encoding used between server and client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Wire {
    /// Raw text lines; control messages are not sent.
    #[default]
    Plain,
    /// One JSON object per line.
    Json,
}

impl Wire {
    /// Encodes an outbound message as a single line without the terminator.
    /// Returns `None` for messages this encoding does not carry.
    pub fn encode(&self, message: &Message) -> Option<String> {
        match self {
            Wire::Plain if message.is_control() => None,
            Wire::Plain => Some(message.text.clone()),
            Wire::Json => serde_json::to_string(message).ok(),
        }
    }

    /// Extracts the text of an inbound line. Malformed JSON falls back to
    /// the raw line so it is still treated as chat.
    pub fn decode_inbound(&self, line: &str) -> String {
        match self {
            Wire::Plain => line.to_string(),
            Wire::Json => match serde_json::from_str::<InboundMessage>(line) {
                Ok(inbound) => inbound.text,
                Err(_) => line.to_string(),
            },
        }
    }

    /// Parses an outbound line back into a message (client side).
    pub fn decode_outbound(&self, line: &str) -> Option<Message> {
        match self {
            Wire::Plain => Some(Message::plain(line)),
            Wire::Json => serde_json::from_str(line).ok(),
        }
    }
}

impl FromStr for Wire {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" | "text" => Ok(Wire::Plain),
            "json" => Ok(Wire::Json),
            other => Err(format!("unknown wire format '{}'", other)),
        }
    }
}

impl fmt::Display for Wire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Wire::Plain => f.write_str("plain"),
            Wire::Json => f.write_str("json"),
        }
    }
}

/// Strips a trailing line terminator (`\n` or `\r\n`).
pub fn trim_eol(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_wire_names() {
        assert_eq!(Phase::Chat.to_string(), "chat");
        assert_eq!(Phase::Game.to_string(), "game");
        assert_eq!(Phase::Answering.to_string(), "answer");
        assert_eq!(Phase::FiveSecondWarning.to_string(), "5sec");
        assert_eq!(Phase::TimedOut.to_string(), "timeout");
        assert_eq!(Phase::default(), Phase::Chat);
    }

    #[test]
    fn test_plain_message_defaults_to_bot() {
        let message = Message::plain("hello");
        assert_eq!(message.name, BOT_NAME);
        assert_eq!(message.kind, MessageKind::Plain);
        assert!(message.action.is_empty());
        assert!(!message.is_control());
    }

    #[test]
    fn test_json_field_names() {
        let message = Message::control(ACTION_WHOAMI, "")
            .from_sender("anonymous player 1")
            .in_context(Phase::FiveSecondWarning, "(master) quizmaster");
        let encoded = Wire::Json.encode(&message).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(value["Type"], "control");
        assert_eq!(value["Name"], "anonymous player 1");
        assert_eq!(value["State"], "5sec");
        assert_eq!(value["MasterName"], "(master) quizmaster");
        assert_eq!(value["Action"], "whoami");
        assert!(!encoded.contains('\n'));
    }

    #[test]
    fn test_plain_wire_skips_control() {
        assert_eq!(Wire::Plain.encode(&Message::control(ACTION_UPDATE_PLAYERS, "{}")), None);
        assert_eq!(
            Wire::Plain.encode(&Message::plain("5 seconds left")),
            Some("5 seconds left".to_string())
        );
    }

    #[test]
    fn test_decode_inbound_json() {
        assert_eq!(Wire::Json.decode_inbound(r#"{"Text": ":master"}"#), ":master");
        assert_eq!(Wire::Json.decode_inbound(r#"{"Text": ""}"#), "");
    }

    #[test]
    fn test_decode_inbound_malformed_falls_back() {
        assert_eq!(Wire::Json.decode_inbound("{not json"), "{not json");
        assert_eq!(Wire::Json.decode_inbound(r#"{"Other": 1}"#), r#"{"Other": 1}"#);
        assert_eq!(Wire::Plain.decode_inbound(r#"{"Text": "x"}"#), r#"{"Text": "x"}"#);
    }

    #[test]
    fn test_decode_outbound() {
        let message = Message::plain("[bob] 42").from_sender("bob");
        let line = Wire::Json.encode(&message).unwrap();
        assert_eq!(Wire::Json.decode_outbound(&line), Some(message));
        assert_eq!(Wire::Json.decode_outbound("garbage"), None);
        assert_eq!(Wire::Plain.decode_outbound("hi").unwrap().text, "hi");
    }

    #[test]
    fn test_wire_from_str() {
        assert_eq!("json".parse::<Wire>(), Ok(Wire::Json));
        assert_eq!("PLAIN".parse::<Wire>(), Ok(Wire::Plain));
        assert!("xml".parse::<Wire>().is_err());
    }

    #[test]
    fn test_trim_eol() {
        assert_eq!(trim_eol("abc\n"), "abc");
        assert_eq!(trim_eol("abc\r\n"), "abc");
        assert_eq!(trim_eol("\n"), "");
        assert_eq!(trim_eol("abc"), "abc");
    }
}
