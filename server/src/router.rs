//! Message routing to player mailboxes and the audit channel
//!
//! Every delivery is tagged with a [`Visibility`] class. When an audit
//! channel is attached, a copy of the text goes there as
//! `(broadcast) …`, `(whisper) …` or `(system) …`, which is what tests and
//! UI relays observe.

use crate::player::{Player, Roster};
use log::{debug, info, warn};
use shared::Message;
use std::fmt;
use tokio::sync::mpsc;

/// One-way stream of tagged strings for an external listener
pub type AuditSender = mpsc::UnboundedSender<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Broadcast,
    Whisper,
    System,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Broadcast => f.write_str("broadcast"),
            Visibility::Whisper => f.write_str("whisper"),
            Visibility::System => f.write_str("system"),
        }
    }
}

#[derive(Debug, Default)]
pub struct Router {
    audit: Option<AuditSender>,
}

impl Router {
    pub fn new(audit: Option<AuditSender>) -> Self {
        Self { audit }
    }

    /// Delivers to every online player and audits as a broadcast
    pub fn broadcast(&self, roster: &Roster, message: Message) {
        debug!("broadcast: {}", message.text);
        for player in roster.online() {
            Self::deliver(player, message.clone());
        }
        self.notify(Visibility::Broadcast, &message.text);
    }

    /// Delivers to a single player and audits as a whisper
    pub fn inform(&self, player: &Player, message: Message) {
        debug!("whisper to {}: {}", player.id, message.text);
        Self::deliver(player, message.clone());
        self.notify(Visibility::Whisper, &message.text);
    }

    /// Sends a control message to one player without auditing it
    pub fn control(&self, player: &Player, message: Message) {
        Self::deliver(player, message);
    }

    /// Operational event; never reaches players
    pub fn system(&self, text: &str, notify: bool) {
        info!("{}", text);
        if notify {
            self.notify(Visibility::System, text);
        }
    }

    fn deliver(player: &Player, message: Message) {
        if !player.send(message) {
            warn!("Mailbox of player {} is closed, message dropped", player.id);
        }
    }

    fn notify(&self, visibility: Visibility, text: &str) {
        if let Some(audit) = &self.audit {
            if audit.send(format!("({}) {}", visibility, text)).is_err() {
                debug!("Audit listener is gone");
            }
        }
    }
}
