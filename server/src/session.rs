//! Per-connection session actor
//!
//! Each accepted connection runs two independent tasks:
//! - a read loop turning received lines into [`GameEvent::Line`] events
//! - a write loop draining the player's mailbox onto the connection
//!
//! The engine ends a session by dropping the player's mailbox. The write
//! loop then stops the read loop and closes the transport. When the remote
//! side goes away first, the read loop reports [`GameEvent::Disconnected`]
//! and the engine takes it from there.

use crate::game::GameEvent;
use crate::network::ServerError;
use crate::player::PlayerId;
use log::{debug, info, warn};
use shared::{Message, Wire};
use std::net::SocketAddr;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
    BufWriter,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};

/// Longest accepted inbound line in bytes
pub const MAX_LINE_BYTES: u64 = 4096;

/// Handles to a running session
#[derive(Debug)]
pub struct Session {
    pub id: PlayerId,
    pub addr: SocketAddr,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Session {
    /// Registers a new player with the engine and starts both loops
    pub async fn start<S>(
        stream: S,
        addr: SocketAddr,
        wire: Wire,
        events: mpsc::UnboundedSender<GameEvent>,
    ) -> Result<Self, ServerError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mailbox_tx, mailbox_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = oneshot::channel();

        events
            .send(GameEvent::Join {
                addr,
                mailbox: mailbox_tx,
                reply: reply_tx,
            })
            .map_err(|_| ServerError::EngineGone)?;
        let id = reply_rx.await.map_err(|_| ServerError::EngineGone)?;

        let (read_half, write_half) = tokio::io::split(stream);
        let reader = tokio::spawn(read_loop(id, read_half, wire, events.clone()));
        let writer = tokio::spawn(write_loop(
            id,
            write_half,
            wire,
            mailbox_rx,
            reader.abort_handle(),
            events,
        ));

        info!("Session {} started for {}", id, addr);
        Ok(Self {
            id,
            addr,
            reader,
            writer,
        })
    }

    /// Waits until the transport has been closed
    pub async fn closed(self) {
        let _ = self.writer.await;
        let _ = self.reader.await;
    }
}

async fn read_loop<R>(
    id: PlayerId,
    reader: R,
    wire: Wire,
    events: mpsc::UnboundedSender<GameEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        match next_line(&mut reader, &mut buf).await {
            Ok(Some(line)) => {
                let text = wire.decode_inbound(shared::trim_eol(&line));
                if events.send(GameEvent::Line { player: id, text }).is_err() {
                    debug!("Engine stopped, ending read loop of {}", id);
                    return;
                }
            }
            Ok(None) => {
                info!("Player {} closed the connection", id);
                break;
            }
            Err(e) => {
                warn!("Error reading from player {}: {}", id, e);
                break;
            }
        }
    }

    let _ = events.send(GameEvent::Disconnected { player: id });
}

/// Reads one line of at most `MAX_LINE_BYTES`, terminator included.
///
/// Invalid UTF-8 is replaced rather than rejected. Longer lines are
/// discarded up to their terminator. Returns `None` at end of stream.
async fn next_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        buf.clear();
        let read = (&mut *reader)
            .take(MAX_LINE_BYTES)
            .read_until(b'\n', buf)
            .await?;
        if read == 0 {
            return Ok(None);
        }
        if buf.ends_with(b"\n") || (read as u64) < MAX_LINE_BYTES {
            return Ok(Some(String::from_utf8_lossy(buf).into_owned()));
        }

        warn!("Dropping line longer than {} bytes", MAX_LINE_BYTES);
        loop {
            buf.clear();
            let read = (&mut *reader)
                .take(MAX_LINE_BYTES)
                .read_until(b'\n', buf)
                .await?;
            if read == 0 {
                return Ok(None);
            }
            if buf.ends_with(b"\n") {
                break;
            }
        }
    }
}

async fn write_loop<W>(
    id: PlayerId,
    writer: W,
    wire: Wire,
    mut mailbox: mpsc::UnboundedReceiver<Message>,
    reader: AbortHandle,
    events: mpsc::UnboundedSender<GameEvent>,
) where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(writer);

    while let Some(message) = mailbox.recv().await {
        let Some(line) = wire.encode(&message) else {
            continue;
        };
        if let Err(e) = write_line(&mut writer, &line).await {
            warn!("Error writing to player {}: {}", id, e);
            let _ = events.send(GameEvent::Disconnected { player: id });
            break;
        }
    }

    reader.abort();
    if let Err(e) = writer.shutdown().await {
        debug!("Error closing connection of {}: {}", id, e);
    }
    debug!("Session {} closed", id);
}

async fn write_line<W>(writer: &mut BufWriter<W>, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Game, GameConfig};
    use tokio::io::{duplex, AsyncBufReadExt, DuplexStream, Lines};
    use tokio_test::assert_ok;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:7000".parse().unwrap()
    }

    async fn next_audit(audit: &mut mpsc::UnboundedReceiver<String>) -> String {
        loop {
            let line = audit.recv().await.expect("audit channel closed");
            if !line.starts_with("(system)") {
                return line;
            }
        }
    }

    async fn connect(
        wire: Wire,
    ) -> (
        Session,
        Lines<BufReader<tokio::io::ReadHalf<DuplexStream>>>,
        tokio::io::WriteHalf<DuplexStream>,
        mpsc::UnboundedSender<GameEvent>,
        mpsc::UnboundedReceiver<String>,
    ) {
        let (audit_tx, audit_rx) = mpsc::unbounded_channel();
        let (events, _engine) = Game::spawn(GameConfig::default(), Some(audit_tx));
        let (client, server) = duplex(4096);
        let session = assert_ok!(Session::start(server, test_addr(), wire, events.clone()).await);
        let (read_half, write_half) = tokio::io::split(client);
        (
            session,
            BufReader::new(read_half).lines(),
            write_half,
            events,
            audit_rx,
        )
    }

    #[tokio::test]
    async fn test_lines_reach_the_engine_in_order() {
        let (_session, mut lines, mut client, _events, mut audit) = connect(Wire::Plain).await;
        assert_eq!(
            next_audit(&mut audit).await,
            "(broadcast) 'anonymous player 1' has joined us!"
        );

        client.write_all(b":rename Zaphod\nfirst\r\nsecond\n").await.unwrap();
        assert_eq!(
            next_audit(&mut audit).await,
            "(broadcast) anonymous player 1 is now known as Zaphod"
        );
        assert_eq!(next_audit(&mut audit).await, "(broadcast) [Zaphod] first");
        assert_eq!(next_audit(&mut audit).await, "(broadcast) [Zaphod] second");

        // Plain wire writes text lines and skips control messages
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "'anonymous player 1' has joined us!"
        );
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "anonymous player 1 is now known as Zaphod"
        );
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_chat_not_a_disconnect() {
        let (_session, _lines, mut client, _events, mut audit) = connect(Wire::Plain).await;
        next_audit(&mut audit).await;

        client.write_all(b"caf\xe9\nstill here\n").await.unwrap();
        assert_eq!(
            next_audit(&mut audit).await,
            "(broadcast) [anonymous player 1] caf\u{FFFD}"
        );
        assert_eq!(
            next_audit(&mut audit).await,
            "(broadcast) [anonymous player 1] still here"
        );
    }

    #[tokio::test]
    async fn test_oversized_line_is_dropped() {
        let (_session, _lines, mut client, _events, mut audit) = connect(Wire::Plain).await;
        next_audit(&mut audit).await;

        let mut flood = vec![b'a'; MAX_LINE_BYTES as usize * 3];
        flood.extend_from_slice(b"\nafter\n");
        client.write_all(&flood).await.unwrap();
        assert_eq!(
            next_audit(&mut audit).await,
            "(broadcast) [anonymous player 1] after"
        );
    }

    #[tokio::test]
    async fn test_remote_close_disconnects_player() {
        let (session, lines, client, _events, mut audit) = connect(Wire::Plain).await;
        next_audit(&mut audit).await;

        drop(client);
        drop(lines);
        loop {
            let line = audit.recv().await.unwrap();
            if line == "(system) Player 127.0.0.1:7000 disconnected" {
                break;
            }
        }
        session.closed().await;
    }

    #[tokio::test]
    async fn test_engine_shutdown_closes_transport() {
        let (session, mut lines, _client, events, _audit) = connect(Wire::Plain).await;
        events.send(GameEvent::Shutdown).unwrap();

        while let Ok(Some(_)) = lines.next_line().await {}
        session.closed().await;
    }

    #[tokio::test]
    async fn test_json_wire_round_trip() {
        let (_session, mut lines, mut client, _events, mut audit) = connect(Wire::Json).await;
        next_audit(&mut audit).await;

        client.write_all(b"{\"Text\": \":master\"}\n").await.unwrap();
        assert_eq!(
            next_audit(&mut audit).await,
            "(broadcast) (master) anonymous player 1 is now the master of the game"
        );

        // Malformed payloads are treated as chat
        client.write_all(b"{oops\n").await.unwrap();
        assert_eq!(
            next_audit(&mut audit).await,
            "(broadcast) [(master) anonymous player 1] {oops"
        );

        // First line on the wire is the whoami control for the new player
        let first = lines.next_line().await.unwrap().unwrap();
        let message = Wire::Json.decode_outbound(&first).unwrap();
        assert_eq!(message.action, shared::ACTION_WHOAMI);
        assert_eq!(message.name, "anonymous player 1");
    }
}
