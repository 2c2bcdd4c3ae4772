//! Command parsing for the line-oriented shell.
//!
//! This module parses input lines into structured [`Command`] values.

use std::path::PathBuf;

/// Parsed command from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Log in and connect to a peer.
    Login {
        /// Our identifier.
        local_id: String,
        /// Peer identifier.
        peer_id: String,
        /// Secure code to use instead of a generated one.
        secure_code: Option<String>,
    },

    /// Submit the code the peer read out.
    SecureCode {
        /// Peer's code.
        code: String,
    },

    /// Send a file.
    SendFile {
        /// Path on disk.
        path: PathBuf,
    },

    /// Start a call.
    Call,

    /// End the call.
    HangUp,

    /// Flip the microphone.
    ToggleAudio,

    /// Flip the camera.
    ToggleVideo,

    /// Start or stop the peer counter.
    Counter {
        /// Start when `true`, stop when `false`.
        running: bool,
    },

    /// Show session state.
    Status,

    /// Close the session.
    Disconnect,

    /// List commands.
    Help,

    /// Quit the application.
    Quit,

    /// Send a text message.
    Message {
        /// Message content.
        content: String,
    },

    /// Unknown or invalid command.
    Unknown {
        /// The original input.
        input: String,
    },

    /// Command with missing or invalid arguments.
    InvalidArgs {
        /// Command name.
        command: String,
        /// Error message.
        error: String,
    },
}

/// Usage summary shown by `/help`.
pub const HELP: &str = "\
/login <id> <peer> [code]  connect to a peer
/code <code>               submit the peer's secure code
/file <path>               send a file
/call, /hangup             start or end a call
/audio, /video             toggle local tracks
/count [on|off]            start or stop the peer counter
/status                    show session state
/disconnect                close the session
/quit                      leave
anything else              send as a message";

/// Parse a user input string into a command.
///
/// Commands start with `/`. Anything else is treated as a message.
pub fn parse(input: &str) -> Command {
    let input = input.trim();

    if input.is_empty() {
        return Command::Message { content: String::new() };
    }

    let Some(cmd_str) = input.strip_prefix('/') else {
        return Command::Message { content: input.to_string() };
    };

    let parts: Vec<&str> = cmd_str.split_whitespace().collect();
    let command = parts.first().copied().unwrap_or("");

    match command {
        "login" => match parts.as_slice() {
            [_, local_id, peer_id] => Command::Login {
                local_id: (*local_id).to_string(),
                peer_id: (*peer_id).to_string(),
                secure_code: None,
            },
            [_, local_id, peer_id, code] => Command::Login {
                local_id: (*local_id).to_string(),
                peer_id: (*peer_id).to_string(),
                secure_code: Some((*code).to_string()),
            },
            _ => Command::InvalidArgs {
                command: "login".into(),
                error: "Usage: /login <id> <peer> [code]".into(),
            },
        },

        "code" => match parts.get(1) {
            Some(code) => Command::SecureCode { code: (*code).to_string() },
            None => Command::InvalidArgs {
                command: "code".into(),
                error: "Usage: /code <code>".into(),
            },
        },

        "file" => match cmd_str.split_once(char::is_whitespace) {
            Some((_, path)) if !path.trim().is_empty() => {
                Command::SendFile { path: PathBuf::from(path.trim()) }
            },
            _ => Command::InvalidArgs {
                command: "file".into(),
                error: "Usage: /file <path>".into(),
            },
        },

        "call" => Command::Call,

        "hangup" => Command::HangUp,

        "audio" => Command::ToggleAudio,

        "video" => Command::ToggleVideo,

        "count" => match parts.get(1).copied() {
            None | Some("on") => Command::Counter { running: true },
            Some("off") => Command::Counter { running: false },
            Some(_) => Command::InvalidArgs {
                command: "count".into(),
                error: "Usage: /count [on|off]".into(),
            },
        },

        "status" => Command::Status,

        "disconnect" => Command::Disconnect,

        "help" | "h" => Command::Help,

        "quit" | "q" => Command::Quit,

        _ => Command::Unknown { input: input.to_string() },
    }
}
