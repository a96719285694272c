//! Command grammar
//!
//! A command is a line starting with `:`. It is split on spaces (empty
//! tokens are dropped) and the first token selects the command.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `:rename <name…>`
    Rename(String),
    /// `:master`
    Master,
    /// `:game`
    Game,
    /// `:chat`
    Chat,
    /// `:reset`
    Reset,
    /// `:time [seconds]`, `None` means the configured round timeout
    Time(Option<u64>),
    /// `:exit`
    Exit,
    /// Anything else; holds the normalized tokens for the notice
    Unknown(String),
}

/// Errors produced while parsing a recognized command.
/// `Display` is the text whispered back to the sender.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Argument of time should be an integer, not '{0}'")]
    InvalidSeconds(String),
}

pub fn is_command(line: &str) -> bool {
    line.starts_with(':')
}

fn tokenize(line: &str) -> Vec<&str> {
    line.split(' ').filter(|token| !token.is_empty()).collect()
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, CommandError> {
        let tokens = tokenize(shared::trim_eol(line));
        let Some((&keyword, args)) = tokens.split_first() else {
            return Ok(Command::Unknown(String::new()));
        };

        let command = match keyword {
            ":rename" if !args.is_empty() => Command::Rename(args.join(" ")),
            ":master" => Command::Master,
            ":game" => Command::Game,
            ":chat" => Command::Chat,
            ":reset" => Command::Reset,
            ":time" => match args.first() {
                Some(arg) => {
                    let seconds = arg
                        .parse::<u64>()
                        .map_err(|_| CommandError::InvalidSeconds(arg.to_string()))?;
                    Command::Time(Some(seconds))
                }
                None => Command::Time(None),
            },
            ":exit" => Command::Exit,
            _ => Command::Unknown(tokens.join(" ")),
        };

        Ok(command)
    }
}
