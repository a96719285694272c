//! Player records and the roster that owns them
//!
//! The roster is an append-only list: a player keeps its slot after
//! disconnecting so join order and placeholder numbering stay stable.
//! Sessions refer to players through the opaque [`PlayerId`] handed out on
//! join; the engine resolves it against the roster on every event.

use log::info;
use shared::Message;
use std::fmt;
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// Opaque handle of a player inside one game's roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(usize);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0 + 1)
    }
}

/// Sending half of a player's private outbound mailbox
pub type Mailbox = mpsc::UnboundedSender<Message>;

/// One participant, created when a connection is accepted
#[derive(Debug)]
pub struct Player {
    pub id: PlayerId,
    pub addr: SocketAddr,
    pub name: String,
    pub is_master: bool,
    pub can_answer: bool,
    pub disconnected: bool,
    /// Dropped on exit, which ends the session's write loop
    mailbox: Option<Mailbox>,
}

impl Player {
    pub fn new(id: PlayerId, addr: SocketAddr, name: String, mailbox: Mailbox) -> Self {
        Self {
            id,
            addr,
            name,
            is_master: false,
            can_answer: true,
            disconnected: false,
            mailbox: Some(mailbox),
        }
    }

    /// Name as shown to other players
    pub fn display_name(&self) -> String {
        if self.is_master {
            format!("(master) {}", self.name)
        } else {
            self.name.clone()
        }
    }

    pub fn is_online(&self) -> bool {
        !self.disconnected
    }

    /// Queues a message on the player's mailbox. Returns false when the
    /// session is gone.
    pub fn send(&self, message: Message) -> bool {
        match &self.mailbox {
            Some(mailbox) => mailbox.send(message).is_ok(),
            None => false,
        }
    }

    /// Marks the player disconnected and closes its mailbox.
    ///
    /// Returns false if the player had already left, so callers can keep
    /// teardown side effects to exactly once.
    pub fn exit(&mut self) -> bool {
        if self.disconnected {
            return false;
        }
        self.disconnected = true;
        self.is_master = false;
        self.can_answer = false;
        self.mailbox = None;
        true
    }
}

/// Append-only list of every player that ever joined this game
#[derive(Debug, Default)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new player with a placeholder name and returns its handle
    pub fn join(&mut self, addr: SocketAddr, mailbox: Mailbox) -> PlayerId {
        let id = PlayerId(self.players.len());
        let name = format!("anonymous player {}", self.players.len() + 1);
        info!("Player {} ({}) joined as '{}'", id, addr, name);
        self.players.push(Player::new(id, addr, name, mailbox));
        id
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id.0)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id.0)
    }

    /// Online players in join order
    pub fn online(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|player| player.is_online())
    }

    pub fn online_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut().filter(|player| player.is_online())
    }

    pub fn online_ids(&self) -> Vec<PlayerId> {
        self.online().map(|player| player.id).collect()
    }

    pub fn online_count(&self) -> usize {
        self.online().count()
    }

    /// Total number of players ever joined, including disconnected ones
    pub fn len(&self) -> usize {
        self.players.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    #[test]
    fn test_join_assigns_placeholder_names() {
        let mut roster = Roster::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let first = roster.join(test_addr(), tx.clone());
        let second = roster.join(test_addr(), tx);

        assert_eq!(roster.get(first).unwrap().name, "anonymous player 1");
        assert_eq!(roster.get(second).unwrap().name, "anonymous player 2");
        assert!(roster.get(first).unwrap().can_answer);
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_numbering_counts_disconnected_players() {
        let mut roster = Roster::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let first = roster.join(test_addr(), tx.clone());
        roster.get_mut(first).unwrap().exit();
        let second = roster.join(test_addr(), tx);

        assert_eq!(roster.get(second).unwrap().name, "anonymous player 2");
        assert_eq!(roster.online_count(), 1);
        assert_eq!(roster.online_ids(), vec![second]);
    }

    #[test]
    fn test_display_name_marks_master() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut player = Player::new(PlayerId(0), test_addr(), "Ford".to_string(), tx);

        assert_eq!(player.display_name(), "Ford");
        player.is_master = true;
        assert_eq!(player.display_name(), "(master) Ford");
    }

    #[test]
    fn test_exit_is_idempotent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut player = Player::new(PlayerId(0), test_addr(), "Arthur".to_string(), tx);

        assert!(player.send(Message::plain("before")));
        assert!(player.exit());
        assert!(!player.exit());
        assert!(player.disconnected);
        assert!(!player.send(Message::plain("after")));

        assert_eq!(rx.try_recv().unwrap().text, "before");
        // Mailbox sender was dropped on exit
        assert!(rx.try_recv().is_err());
    }
}
