//! Command execution and notification rendering.

use std::path::Path;

use bytes::Bytes;
use peerlink_app::{OrchestratorEvent, Runtime, TransferDirection};
use peerlink_core::{
    env::Environment,
    message::{Message, MessagePayload, Origin},
    transport::{MediaDevices, OutgoingFile, TransportEngine},
};

use crate::{CliError, commands::Command};

/// What the shell loop should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading input, optionally printing a reply.
    Continue(Option<String>),
    /// Leave the loop.
    Quit,
}

/// Run one parsed command against `runtime`.
///
/// # Errors
/// Session errors returned by the operation, or file read failures.
pub async fn execute<E, T, D>(runtime: &mut Runtime<E, T, D>, command: Command) -> Result<Flow, CliError>
where
    E: Environment,
    T: TransportEngine,
    D: MediaDevices,
{
    match command {
        Command::Login { local_id, peer_id, secure_code } => {
            runtime.login(&local_id, &peer_id, secure_code).await?;
        },
        Command::SecureCode { code } => runtime.submit_secure_code(&code).await?,
        Command::SendFile { path } => {
            let file = read_file(&path).await?;
            runtime.send_file(file).await?;
        },
        Command::Call => runtime.start_call().await?,
        Command::HangUp => runtime.hang_up().await?,
        Command::ToggleAudio => runtime.toggle_audio().await?,
        Command::ToggleVideo => runtime.toggle_video().await?,
        Command::Counter { running: true } => runtime.start_counter()?,
        Command::Counter { running: false } => {
            if !runtime.stop_counter() {
                return Ok(Flow::Continue(Some("counter is not running".into())));
            }
        },
        Command::Status => return Ok(Flow::Continue(Some(status(runtime)))),
        Command::Disconnect => runtime.disconnect().await?,
        Command::Help => return Ok(Flow::Continue(Some(crate::commands::HELP.into()))),
        Command::Quit => return Ok(Flow::Quit),
        Command::Message { content } if content.is_empty() => {},
        Command::Message { content } => runtime.send_message(&content).await?,
        Command::Unknown { input } => {
            return Ok(Flow::Continue(Some(format!("unknown command: {input} (try /help)"))));
        },
        Command::InvalidArgs { error, .. } => return Ok(Flow::Continue(Some(error))),
    }
    Ok(Flow::Continue(None))
}

fn status<E, T, D>(runtime: &Runtime<E, T, D>) -> String
where
    E: Environment,
    T: TransportEngine,
    D: MediaDevices,
{
    let orchestrator = runtime.orchestrator();
    let session = orchestrator.session();
    let mut line = format!("{} ({})", session.state(), session.connectivity());
    if let Some(peer) = session.peer_id() {
        line.push_str(&format!(" with {peer}"));
    }
    if let Some(code) = orchestrator.secure_code() {
        line.push_str(&format!(", code {code}"));
    }
    if let Some(reason) = session.failure_reason() {
        line.push_str(&format!(", failed: {reason}"));
    }
    let (local, remote) = orchestrator.counters();
    line.push_str(&format!(
        ", {} messages, {} transfers, counter {local}/{remote}",
        orchestrator.messages().len(),
        orchestrator.pending_transfers()
    ));
    line
}

async fn read_file(path: &Path) -> Result<OutgoingFile, CliError> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|source| CliError::ReadFile { path: path.to_path_buf(), source })?;
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
    Ok(OutgoingFile { mime_type: mime_type(&name).to_string(), name, data: Bytes::from(data) })
}

/// Content type guessed from the file extension.
pub fn mime_type(file_name: &str) -> &'static str {
    let extension = file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("txt") => "text/plain",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// One line describing a notification, or `None` for events not worth
/// showing.
pub fn describe(event: &OrchestratorEvent) -> Option<String> {
    let line = match event {
        OrchestratorEvent::StateChanged { from, to } => format!("* {from} -> {to}"),
        OrchestratorEvent::ConnectivityChanged(level) => format!("* connectivity {level}"),
        OrchestratorEvent::MessageAppended(message) => describe_message(message),
        OrchestratorEvent::SecureCode(code) => format!("* your secure code: {code}"),
        OrchestratorEvent::TransferProgress { file_name, percentage, direction } => {
            let arrow = match direction {
                TransferDirection::Incoming => "<-",
                TransferDirection::Outgoing => "->",
            };
            format!("* {arrow} {file_name} {percentage}%")
        },
        OrchestratorEvent::FileReceived { file_name, mime_type } => {
            format!("* received {file_name} ({mime_type}), not shown")
        },
        OrchestratorEvent::DuplicateFile { file_name } => {
            format!("* {file_name} reported complete again, ignored")
        },
        OrchestratorEvent::RemoteStreamChanged(Some(stream)) => {
            format!("* peer media stream {}", stream.0)
        },
        OrchestratorEvent::RemoteStreamChanged(None) => "* peer media stopped".to_string(),
        OrchestratorEvent::TrackToggled { kind, enabled } => {
            format!("* {kind} {}", if *enabled { "on" } else { "off" })
        },
        OrchestratorEvent::CounterChanged { local, remote } => {
            format!("* counter {local}/{remote}")
        },
        OrchestratorEvent::Error(error) => format!("! {error}"),
        OrchestratorEvent::HostStream(_) => return None,
    };
    Some(line)
}

fn describe_message(message: &Message) -> String {
    let who = match message.origin() {
        Origin::Local => "me",
        Origin::Remote => "peer",
    };
    match message.payload() {
        MessagePayload::Text(text) => format!("[{}] {who}: {text}", message.sequence()),
        MessagePayload::Image(image) => format!(
            "[{}] {who}: <image {} {}, {} bytes>",
            message.sequence(),
            image.file_name,
            image.mime_type,
            image.data.len()
        ),
    }
}
