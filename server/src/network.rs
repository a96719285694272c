//! Server network layer: TCP listener, accept loop and engine wiring

use crate::game::{Game, GameConfig, GameEvent};
use crate::router::{AuditSender, Router};
use crate::session::Session;
use log::{debug, error, info, warn};
use shared::Wire;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{timeout, Duration};

/// How long a stopping server waits for sessions to flush and close
const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },
    #[error("game engine is not running")]
    EngineGone,
    #[error("game engine task failed: {0}")]
    EngineFailed(#[from] tokio::task::JoinError),
}

/// Listens for connections and feeds them into a single game
pub struct Server {
    listener: TcpListener,
    wire: Wire,
    game_config: GameConfig,
    audit: Option<AuditSender>,
}

impl Server {
    pub async fn bind(
        addr: &str,
        wire: Wire,
        game_config: GameConfig,
        audit: Option<AuditSender>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        info!("Server listening on {} ({} wire)", addr, wire);

        Ok(Server {
            listener,
            wire,
            game_config,
            audit,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the game ends (`:exit`) or `shutdown`
    /// resolves, in which case the game is torn down first.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let router = Router::new(self.audit.clone());
        let (events, mut engine) = Game::spawn(self.game_config.clone(), self.audit.clone());
        router.system("server started", true);
        info!("Server started successfully");

        let mut sessions = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            if let Err(e) = stream.set_nodelay(true) {
                                warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                            }
                            Self::spawn_session(
                                &mut sessions,
                                stream,
                                addr,
                                self.wire,
                                events.clone(),
                            );
                        }
                        Err(e) => {
                            error!("Error accepting connection: {}", e);
                        }
                    }
                },

                Some(_) = sessions.join_next(), if !sessions.is_empty() => {},

                result = &mut engine => {
                    info!("Game ended, stopping listener");
                    result?;
                    break;
                },

                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    if events.send(GameEvent::Shutdown).is_err() {
                        warn!("Game engine already stopped");
                    }
                    (&mut engine).await?;
                    break;
                },
            }
        }

        drop(events);
        Self::drain_sessions(&mut sessions).await;
        router.system("server shutdown", true);
        Ok(())
    }

    /// Waits for every session to close its transport, giving up after
    /// `SESSION_DRAIN_TIMEOUT`
    async fn drain_sessions(sessions: &mut JoinSet<()>) {
        let drained = timeout(SESSION_DRAIN_TIMEOUT, async {
            while sessions.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("{} sessions did not close in time, aborting", sessions.len());
            sessions.abort_all();
        }
    }

    /// Registers the connection with the engine without blocking the
    /// accept loop
    fn spawn_session(
        sessions: &mut JoinSet<()>,
        stream: tokio::net::TcpStream,
        addr: SocketAddr,
        wire: Wire,
        events: mpsc::UnboundedSender<GameEvent>,
    ) {
        sessions.spawn(async move {
            match Session::start(stream, addr, wire, events).await {
                Ok(session) => {
                    let id = session.id;
                    session.closed().await;
                    debug!("Connection of player {} ({}) closed", id, addr);
                }
                Err(e) => error!("Failed to start session for {}: {}", addr, e),
            }
        });
    }
}
