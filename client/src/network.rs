//! Client network layer: one TCP connection, stdin in, stdout out

use crate::display::Display;
use log::{error, info};
use shared::Wire;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;

#[derive(Debug)]
pub struct Client {
    stream: Option<TcpStream>,
    wire: Wire,
    display: Display,
}

/// Encodes a typed line for the wire
pub fn encode_input(wire: Wire, line: &str) -> String {
    match wire {
        Wire::Plain => line.to_string(),
        Wire::Json => serde_json::json!({ "Text": line }).to_string(),
    }
}

impl Client {
    pub async fn connect(addr: &str, wire: Wire) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Connecting to {}...", addr);
        let stream = TcpStream::connect(addr).await?;
        info!("Connected ({} wire)", wire);

        Ok(Client {
            stream: Some(stream),
            wire,
            display: Display::new(wire),
        })
    }

    async fn send_line(
        &self,
        writer: &mut OwnedWriteHalf,
        line: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = encode_input(self.wire, line);
        writer.write_all(data.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        Ok(())
    }

    /// Runs until the server closes the connection or stdin ends
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let stream = self.stream.take().ok_or("client is not connected")?;
        let (read_half, mut writer) = stream.into_split();
        let mut server_lines = BufReader::new(read_half).lines();
        let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = server_lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if let Some(text) = self.display.render(&line) {
                                println!("{}", text);
                            }
                        }
                        Ok(None) => {
                            info!("Server closed the connection");
                            break;
                        }
                        Err(e) => {
                            error!("Error receiving from server: {}", e);
                            break;
                        }
                    }
                },

                line = stdin_lines.next_line() => {
                    match line? {
                        Some(line) => self.send_line(&mut writer, &line).await?,
                        None => {
                            info!("Input closed, leaving the game");
                            break;
                        }
                    }
                },
            }
        }

        if let Some(me) = self.display.me() {
            info!("Left the game as {}", me);
        }
        writer.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;

    #[test]
    fn test_encode_input() {
        assert_eq!(encode_input(Wire::Plain, ":master"), ":master");
        assert_eq!(encode_input(Wire::Plain, ""), "");
        assert_eq!(encode_input(Wire::Json, ""), r#"{"Text":""}"#);
        assert_eq!(
            Wire::Json.decode_inbound(&encode_input(Wire::Json, "42")),
            "42"
        );
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        assert_err!(Client::connect(&addr, Wire::Plain).await);
    }
}
