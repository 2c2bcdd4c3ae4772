//! Shell commands driven end to end over the loopback engine.

use std::time::Duration;

use peerlink_app::event_channel;
use peerlink_cli::{
    CliError, Flow, LoopbackDevices, LoopbackEngine, OrchestratorConfig, Runtime, SystemEnv,
    commands::parse, execute,
};
use peerlink_core::{
    SessionError,
    media::MediaKind,
    message::{MessagePayload, Origin},
    session::{PeerId, SessionState},
    transport::EngineConfig,
};

type Shell = Runtime<SystemEnv, LoopbackEngine, LoopbackDevices>;

fn shell(config: OrchestratorConfig) -> Shell {
    let (sink, events) = event_channel();
    let engine_config = EngineConfig {
        local_id: PeerId::parse("A", config.max_id_len).unwrap(),
        peer_id: None,
        signaling_url: "wss://localhost:8443".into(),
        secure: config.secure_mode,
        auth_key: None,
    };
    let engine = LoopbackEngine::new(engine_config, sink);
    Runtime::new(SystemEnv, config, engine, LoopbackDevices::new(), events)
}

async fn run(shell: &mut Shell, line: &str) -> Result<Flow, CliError> {
    let flow = execute(shell, parse(line)).await;
    let errors = shell.drain().await;
    assert!(errors.is_empty(), "engine events failed: {errors:?}");
    flow
}

async fn logged_in(config: OrchestratorConfig) -> Shell {
    let mut shell = shell(config);
    run(&mut shell, "/login A B").await.unwrap();
    assert_eq!(shell.orchestrator().state(), SessionState::Connected);
    shell
}

fn texts(shell: &Shell) -> Vec<(Origin, String)> {
    shell
        .orchestrator()
        .messages()
        .iter()
        .filter_map(|m| match m.payload() {
            MessagePayload::Text(text) => Some((m.origin(), text.clone())),
            MessagePayload::Image(_) => None,
        })
        .collect()
}

#[tokio::test]
async fn message_is_echoed_by_loopback_peer() {
    let mut shell = logged_in(OrchestratorConfig::default()).await;

    run(&mut shell, "hello").await.unwrap();

    assert_eq!(texts(&shell), vec![
        (Origin::Local, "hello".to_string()),
        (Origin::Remote, "echo: hello".to_string()),
    ]);
}

#[tokio::test]
async fn secure_login_verifies_against_loopback() {
    let mut shell = shell(OrchestratorConfig::secure());

    run(&mut shell, "/login A B K7P2QX").await.unwrap();

    assert_eq!(shell.orchestrator().state(), SessionState::Connected);
    assert_eq!(shell.orchestrator().secure_code(), Some("K7P2QX"));
}

#[tokio::test]
async fn self_login_returns_to_idle() {
    let mut shell = shell(OrchestratorConfig::default());

    let result = run(&mut shell, "/login A A").await;

    assert!(matches!(result, Err(CliError::Session(SessionError::Connection { .. }))));
    assert_eq!(shell.orchestrator().state(), SessionState::Idle);
    assert!(shell.engine().peer().is_none());
}

#[tokio::test]
async fn message_before_login_is_rejected() {
    let mut shell = shell(OrchestratorConfig::default());

    let result = run(&mut shell, "hello").await;

    assert!(matches!(result, Err(CliError::Session(SessionError::InvalidState { .. }))));
    assert!(result.is_err_and(|err| err.is_recoverable()));
}

#[tokio::test]
async fn empty_line_does_nothing() {
    let mut shell = logged_in(OrchestratorConfig::default()).await;

    assert_eq!(run(&mut shell, "   ").await.unwrap(), Flow::Continue(None));
    assert!(shell.orchestrator().messages().is_empty());
}

#[tokio::test]
async fn sent_image_is_logged_and_echoed() {
    let mut shell = logged_in(OrchestratorConfig::default()).await;
    let path = std::env::temp_dir().join(format!("peerlink-shell-{}.png", std::process::id()));
    tokio::fs::write(&path, b"\x89PNG").await.unwrap();

    run(&mut shell, &format!("/file {}", path.display())).await.unwrap();
    tokio::fs::remove_file(&path).await.unwrap();

    let images: Vec<_> = shell
        .orchestrator()
        .messages()
        .iter()
        .filter_map(|m| match m.payload() {
            MessagePayload::Image(image) => Some((m.origin(), image.clone())),
            MessagePayload::Text(_) => None,
        })
        .collect();
    let origins: Vec<Origin> = images.iter().map(|(origin, _)| *origin).collect();
    assert_eq!(origins, vec![Origin::Local, Origin::Remote]);
    let (_, received) = &images[1];
    assert_eq!(received.mime_type, "image/png");
    assert_eq!(&received.data[..], b"\x89PNG");
    assert_eq!(shell.orchestrator().pending_transfers(), 0);
}

#[tokio::test]
async fn missing_file_is_reported() {
    let mut shell = logged_in(OrchestratorConfig::default()).await;

    let result = run(&mut shell, "/file /nonexistent/peerlink.png").await;

    assert!(matches!(result, Err(CliError::ReadFile { .. })));
}

#[tokio::test]
async fn call_mirrors_tracks_and_hang_up_clears_them() {
    let mut shell = logged_in(OrchestratorConfig::default()).await;

    run(&mut shell, "/call").await.unwrap();
    assert_eq!(shell.orchestrator().state(), SessionState::InCall);
    assert!(shell.orchestrator().remote_stream().is_some());

    run(&mut shell, "/audio").await.unwrap();
    let mut tracks: Vec<(MediaKind, bool)> = shell
        .orchestrator()
        .local_tracks()
        .into_iter()
        .map(|track| (track.kind, track.enabled))
        .collect();
    tracks.sort();
    assert_eq!(tracks, vec![(MediaKind::Audio, false), (MediaKind::Video, true)]);

    run(&mut shell, "/hangup").await.unwrap();
    assert_eq!(shell.orchestrator().state(), SessionState::Connected);
    assert!(shell.orchestrator().local_stream().is_none());
}

#[tokio::test(start_paused = true)]
async fn counter_ticks_against_loopback() {
    let mut config = OrchestratorConfig::default();
    config.counter_interval = Duration::from_millis(100);
    let mut shell = logged_in(config).await;

    run(&mut shell, "/count").await.unwrap();
    for _ in 0..2 {
        assert!(shell.pump().await.unwrap());
        assert!(shell.pump().await.unwrap());
    }
    assert_eq!(shell.orchestrator().counters(), (2, 2));

    assert_eq!(run(&mut shell, "/count off").await.unwrap(), Flow::Continue(None));
    assert!(matches!(run(&mut shell, "/count off").await.unwrap(), Flow::Continue(Some(_))));
}

#[tokio::test]
async fn status_and_quit() {
    let mut shell = logged_in(OrchestratorConfig::default()).await;

    let Flow::Continue(Some(status)) = run(&mut shell, "/status").await.unwrap() else {
        panic!("status prints a line");
    };
    assert!(status.contains("with B"));
    assert_eq!(run(&mut shell, "/quit").await.unwrap(), Flow::Quit);
}

#[tokio::test]
async fn disconnect_returns_to_idle() {
    let mut shell = logged_in(OrchestratorConfig::default()).await;
    run(&mut shell, "hello").await.unwrap();

    run(&mut shell, "/disconnect").await.unwrap();

    assert_eq!(shell.orchestrator().state(), SessionState::Idle);
    assert!(shell.orchestrator().messages().is_empty());
    assert!(shell.engine().peer().is_none());
}
