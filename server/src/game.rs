//! Game engine: the single serialized owner of all game state
//!
//! Sessions and round timers never mutate the game directly. They post
//! [`GameEvent`]s into one unbounded queue and [`Game::run`] applies them one
//! at a time, each to completion, before looking at the next.

use crate::command::{is_command, Command};
use crate::player::{Mailbox, Player, PlayerId, Roster};
use crate::router::{AuditSender, Router};
use crate::timer::{RoundTimer, TimerTick};
use log::{debug, info, warn};
use shared::{Message, Phase, ACTION_UPDATE_PLAYERS, ACTION_WHOAMI, DEFAULT_ROUND_TIMEOUT};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Everything that can change game state
#[derive(Debug)]
pub enum GameEvent {
    /// A connection was accepted; the engine replies with the new player's id
    Join {
        addr: SocketAddr,
        mailbox: Mailbox,
        reply: oneshot::Sender<PlayerId>,
    },
    /// A decoded line of text from a player
    Line { player: PlayerId, text: String },
    /// The player's connection was closed or failed
    Disconnected { player: PlayerId },
    /// Phase change from the countdown armed for `round`
    Timer { round: u64, tick: TimerTick },
    /// Tear the game down (Ctrl+C or listener shutdown)
    Shutdown,
}

/// Whether the event loop keeps running after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Countdown state of the current round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    /// No countdown armed; a buzz is a false start
    Idle,
    /// Countdown armed; the first eligible buzz takes the floor
    Running,
    /// Somebody already took the floor this round
    Claimed,
}

#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Default `:time` length in seconds
    pub round_timeout: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_timeout: DEFAULT_ROUND_TIMEOUT,
        }
    }
}

pub struct Game {
    config: GameConfig,
    roster: Roster,
    phase: Phase,
    master: Option<PlayerId>,
    button_pressed: Option<PlayerId>,
    countdown: Countdown,
    /// Bumped whenever a countdown is armed or the round is reset
    round: u64,
    timer: Option<RoundTimer>,
    router: Router,
    events: mpsc::UnboundedSender<GameEvent>,
}

impl Game {
    pub fn new(
        config: GameConfig,
        audit: Option<AuditSender>,
        events: mpsc::UnboundedSender<GameEvent>,
    ) -> Self {
        Self {
            config,
            roster: Roster::new(),
            phase: Phase::Chat,
            master: None,
            button_pressed: None,
            countdown: Countdown::Idle,
            round: 0,
            timer: None,
            router: Router::new(audit),
            events,
        }
    }

    /// Creates a game and runs its event loop on a new task.
    /// Returns the queue to post events into and the loop's handle.
    pub fn spawn(
        config: GameConfig,
        audit: Option<AuditSender>,
    ) -> (mpsc::UnboundedSender<GameEvent>, JoinHandle<()>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let game = Game::new(config, audit, events_tx.clone());
        let handle = tokio::spawn(game.run(events_rx));
        (events_tx, handle)
    }

    /// Main event loop
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<GameEvent>) {
        info!("Game engine started");
        while let Some(event) = events.recv().await {
            if self.handle_event(event) == Flow::Stop {
                break;
            }
        }
        info!("Game engine stopped");
    }

    pub fn handle_event(&mut self, event: GameEvent) -> Flow {
        match event {
            GameEvent::Join {
                addr,
                mailbox,
                reply,
            } => {
                let id = self.join(addr, mailbox);
                if reply.send(id).is_err() {
                    warn!("Session for player {} vanished before joining", id);
                    self.exit_player(id);
                }
                Flow::Continue
            }
            GameEvent::Line { player, text } => self.handle_line(player, &text),
            GameEvent::Disconnected { player } => {
                self.disconnect(player);
                Flow::Continue
            }
            GameEvent::Timer { round, tick } => {
                self.handle_timer(round, tick);
                Flow::Continue
            }
            GameEvent::Shutdown => {
                self.teardown();
                Flow::Stop
            }
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn master(&self) -> Option<PlayerId> {
        self.master
    }

    pub fn button_pressed(&self) -> Option<PlayerId> {
        self.button_pressed
    }

    pub fn countdown(&self) -> Countdown {
        self.countdown
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.roster.get(id)
    }

    /// Display name of the current master, empty when there is none
    pub fn master_name(&self) -> String {
        self.master
            .and_then(|id| self.roster.get(id))
            .map(Player::display_name)
            .unwrap_or_default()
    }

    pub fn join(&mut self, addr: SocketAddr, mailbox: Mailbox) -> PlayerId {
        let id = self.roster.join(addr, mailbox);
        let name = self.display_name(id);
        self.router.system(
            &format!(
                "'{}' has joined ({}). Total clients: {}",
                name,
                addr,
                self.roster.online_count()
            ),
            true,
        );
        self.update_players();
        self.broadcast(format!("'{}' has joined us!", name));
        id
    }

    /// Player's connection went away
    pub fn disconnect(&mut self, id: PlayerId) {
        let Some(addr) = self.roster.get(id).map(|player| player.addr) else {
            return;
        };
        if self.exit_player(id) {
            self.router
                .system(&format!("Player {} disconnected", addr), true);
            self.send_players_state();
        }
    }

    /// Takes a player out of the game. Returns false if it had already left.
    pub fn exit_player(&mut self, id: PlayerId) -> bool {
        let Some(player) = self.roster.get_mut(id) else {
            return false;
        };
        if !player.exit() {
            return false;
        }

        if self.master == Some(id) {
            info!("Master {} left, the game has no master now", id);
            self.master = None;
        }
        if self.button_pressed == Some(id) {
            self.button_pressed = None;
            self.phase = Phase::Game;
        }
        true
    }

    fn handle_line(&mut self, id: PlayerId, text: &str) -> Flow {
        if !self.is_online(id) {
            debug!("Dropping line from disconnected player {}", id);
            return Flow::Continue;
        }

        if is_command(text) {
            return self.process_command(id, text);
        }

        if text.is_empty() {
            self.press_button(id);
        } else {
            self.chat_or_answer(id, text);
        }
        Flow::Continue
    }

    fn process_command(&mut self, id: PlayerId, line: &str) -> Flow {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                self.inform(id, e.to_string());
                return Flow::Continue;
            }
        };
        debug!("Player {} issued {:?}", id, command);

        match command {
            Command::Rename(name) => self.rename(id, name),
            Command::Master => self.claim_master(id),
            Command::Time(seconds) => {
                if self.phase == Phase::Chat {
                    self.inform(id, "Enter game mode first!");
                } else if !self.is_master(id) {
                    self.inform(id, "Only master can launch countdown!");
                } else {
                    self.start_countdown(seconds.unwrap_or(self.config.round_timeout));
                }
            }
            Command::Reset => {
                if !self.is_master(id) {
                    self.inform(id, "Only master can reset the game!");
                } else if self.phase == Phase::Chat {
                    self.inform(id, "Enter game mode first!");
                } else {
                    self.reset_round();
                    self.phase = Phase::Game;
                    self.inform(id, "======Game reset======");
                    self.send_players_state();
                }
            }
            Command::Game => {
                if !self.is_master(id) {
                    self.inform(id, "Only master can switch to game mode!");
                } else {
                    self.reset_round();
                    self.phase = Phase::Game;
                    self.broadcast("===========Game Mode On===========");
                }
            }
            Command::Chat => {
                if !self.is_master(id) {
                    self.inform(id, "Only master can switch to chat mode!");
                } else {
                    self.reset_round();
                    self.phase = Phase::Chat;
                    self.broadcast("===========Chat Mode On===========");
                }
            }
            Command::Exit => {
                if !self.is_master(id) {
                    self.inform(id, "Only master can shutdown server!");
                } else {
                    self.broadcast("Server will be shutdown!");
                    self.teardown();
                    return Flow::Stop;
                }
            }
            Command::Unknown(tokens) => {
                self.inform(id, format!("Unknown command: '{}'", tokens));
            }
        }
        Flow::Continue
    }

    fn rename(&mut self, id: PlayerId, name: String) {
        let old_name = self.display_name(id);
        if let Some(player) = self.roster.get_mut(id) {
            player.name = name.clone();
        }
        self.update_players();
        self.broadcast(format!("{} is now known as {}", old_name, name));
    }

    fn claim_master(&mut self, id: PlayerId) {
        if self.master.is_some() && self.master != Some(id) {
            self.router.system(
                &format!("{} attempted to seize the crown!", self.display_name(id)),
                false,
            );
            self.inform(id, "The game has a master already");
            return;
        }

        self.set_master(id);
        self.update_players();
        self.broadcast(format!(
            "{} is now the master of the game",
            self.display_name(id)
        ));
    }

    /// Moves the master flag to `id`, clearing it on any previous holder
    fn set_master(&mut self, id: PlayerId) {
        if let Some(previous) = self.master.take() {
            if let Some(player) = self.roster.get_mut(previous) {
                player.is_master = false;
            }
        }
        if let Some(player) = self.roster.get_mut(id) {
            player.is_master = true;
            self.master = Some(id);
        }
    }

    /// Arms a fresh countdown, replacing (and so canceling) any pending one
    fn start_countdown(&mut self, seconds: u64) {
        self.button_pressed = None;
        self.phase = Phase::Game;
        self.countdown = Countdown::Running;
        self.round += 1;
        self.timer = Some(RoundTimer::arm(seconds, self.round, self.events.clone()));
        self.broadcast(format!("==========={} seconds===========", seconds));
    }

    /// Clears the buzzer and the countdown and lets every online player
    /// answer again
    fn reset_round(&mut self) {
        self.button_pressed = None;
        self.countdown = Countdown::Idle;
        self.timer = None;
        self.round += 1;
        for player in self.roster.online_mut() {
            player.can_answer = true;
        }
    }

    /// An empty line: the player hits the buzzer
    fn press_button(&mut self, id: PlayerId) {
        if self.phase == Phase::Chat {
            return;
        }

        let can_answer = self
            .roster
            .get(id)
            .map(|player| player.can_answer)
            .unwrap_or(false);
        if !can_answer || self.countdown == Countdown::Claimed {
            self.inform(id, "You can't press button now");
            return;
        }

        let name = self.display_name(id);
        if self.countdown == Countdown::Idle {
            if let Some(player) = self.roster.get_mut(id) {
                player.can_answer = false;
            }
            self.broadcast(format!("{} has a false start!", name));
            self.send_players_state();
            return;
        }

        self.button_pressed = Some(id);
        self.countdown = Countdown::Claimed;
        self.timer = None;
        self.phase = Phase::Answering;
        self.broadcast(format!("{}, your answer?", name));
        self.send_players_state();
    }

    fn chat_or_answer(&mut self, id: PlayerId, text: &str) {
        let name = self.display_name(id);
        let holds_floor = self.phase == Phase::Answering
            && self.button_pressed == Some(id)
            && self.roster.get(id).map_or(false, |player| player.can_answer);

        if holds_floor {
            if let Some(player) = self.roster.get_mut(id) {
                player.can_answer = false;
            }
            self.button_pressed = None;
            self.phase = Phase::Game;
            self.broadcast_from(&name, format!("[{}] {}", name, text));
        } else if self.phase == Phase::Chat {
            self.broadcast_from(&name, format!("[{}] {}", name, text));
        } else {
            self.inform(id, "You can't chat right now!");
        }
        self.send_players_state();
    }

    fn handle_timer(&mut self, round: u64, tick: TimerTick) {
        if round != self.round {
            debug!("Ignoring {:?} from stale round {}", tick, round);
            return;
        }

        match tick {
            TimerTick::Warning => {
                if self.countdown == Countdown::Running && self.button_pressed.is_none() {
                    self.phase = Phase::FiveSecondWarning;
                    self.broadcast("5 seconds left");
                }
            }
            TimerTick::Expired => {
                self.timer = None;
                if self.countdown == Countdown::Running && self.button_pressed.is_none() {
                    self.countdown = Countdown::Idle;
                    self.phase = Phase::TimedOut;
                    self.broadcast("===========Time is Out===========");
                    for player in self.roster.online_mut() {
                        player.can_answer = false;
                    }
                    self.send_players_state();
                }
            }
        }
    }

    /// Closes every session; the caller stops the event loop afterwards
    fn teardown(&mut self) {
        self.timer = None;
        self.router.system("Closing client connections..", false);
        for id in self.roster.online_ids() {
            if let Some(player) = self.roster.get(id) {
                self.router
                    .system(&format!("Disconnecting client {}", player.addr), false);
            }
            self.exit_player(id);
        }
        self.router.system(
            &format!("Done! Players left: {}", self.roster.online_count()),
            true,
        );
        self.router.system("Shutting down server..", false);
    }

    fn is_online(&self, id: PlayerId) -> bool {
        self.roster.get(id).map_or(false, Player::is_online)
    }

    fn is_master(&self, id: PlayerId) -> bool {
        self.master == Some(id)
    }

    fn display_name(&self, id: PlayerId) -> String {
        self.roster
            .get(id)
            .map(Player::display_name)
            .unwrap_or_default()
    }

    /// Stamps a message with the current phase and master
    fn message(&self, text: impl Into<String>) -> Message {
        Message::plain(text).in_context(self.phase, self.master_name())
    }

    fn broadcast(&self, text: impl Into<String>) {
        self.router.broadcast(&self.roster, self.message(text));
    }

    fn broadcast_from(&self, sender: &str, text: String) {
        self.router
            .broadcast(&self.roster, self.message(text).from_sender(sender));
    }

    fn inform(&self, id: PlayerId, text: impl Into<String>) {
        if let Some(player) = self.roster.get(id) {
            self.router.inform(player, self.message(text));
        }
    }

    /// Tells every online player who they are
    fn update_players(&self) {
        for player in self.roster.online() {
            let message = Message::control(ACTION_WHOAMI, "")
                .from_sender(player.display_name())
                .in_context(self.phase, self.master_name());
            self.router.control(player, message);
        }
    }

    /// Sends the master a `{name: canAnswer}` map of online players
    fn send_players_state(&self) {
        let Some(master) = self.master.and_then(|id| self.roster.get(id)) else {
            return;
        };
        let states: BTreeMap<&str, bool> = self
            .roster
            .online()
            .map(|player| (player.name.as_str(), player.can_answer))
            .collect();

        match serde_json::to_string(&states) {
            Ok(json) => {
                let message = Message::control(ACTION_UPDATE_PLAYERS, json)
                    .in_context(self.phase, self.master_name());
                self.router.control(master, message);
            }
            Err(e) => warn!("Failed to encode player states: {}", e),
        }
    }
}
