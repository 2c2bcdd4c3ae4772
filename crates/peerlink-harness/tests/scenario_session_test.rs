//! Scenario tests for complete session flows.
//!
//! Each scenario drives the real runtime over the simulated engine and checks
//! the resulting world with an oracle.

use std::time::Duration;

use peerlink_app::{OrchestratorConfig, OrchestratorEvent, TransferDirection};
use peerlink_core::{
    SessionError,
    event::RawEngineEvent,
    message::{DataPayload, MessageKind, Origin},
    session::SessionState,
};
use peerlink_harness::{
    EngineCall,
    scenario::{
        Scenario, ScenarioStep, expect_fresh_idle, expect_no_live_capture, expect_state,
        expect_step_ok,
    },
};

#[tokio::test]
async fn scenario_secure_login_and_message() {
    let result = Scenario::new("secure login then message")
        .secure()
        .seed(7)
        .login("A", "B")
        .connectivity("weak")
        .submit_matching_code()
        .send_message("  hi  ")
        .oracle(Box::new(|world| {
            for step in 0..4 {
                expect_step_ok(world, step)?;
            }
            expect_state(world, SessionState::Connected)?;

            let history = world.state_history();
            let expected = [
                SessionState::Connecting,
                SessionState::AwaitingSecureCode,
                SessionState::Connected,
            ];
            if history != expected {
                return Err(format!("unexpected transitions: {history:?}"));
            }

            let code = world
                .notifications()
                .into_iter()
                .find_map(|event| match event {
                    OrchestratorEvent::SecureCode(code) => Some(code),
                    _ => None,
                })
                .ok_or("secure code was never shown")?;
            let start = EngineCall::StartConnection {
                peer_id: "B".to_string(),
                secure_code: Some(code),
            };
            if world.engine_calls().first() != Some(&start) {
                return Err(format!("first engine call: {:?}", world.engine_calls().first()));
            }

            let messages = world.orchestrator().messages();
            match messages {
                [message] if message.text() == Some("hi") && message.origin() == Origin::Local => {},
                _ => return Err(format!("unexpected log: {messages:?}")),
            }

            let sent = world.engine().sent_payloads();
            if sent != [DataPayload::Text { message: "hi".to_string() }] {
                return Err(format!("unexpected payloads: {sent:?}"));
            }
            Ok(())
        }))
        .run()
        .await;

    assert!(result.is_ok(), "scenario failed: {:?}", result);
}

#[tokio::test]
async fn scenario_code_entered_before_connectivity() {
    let result = Scenario::new("early secure code")
        .secure()
        .login("A", "B")
        .submit_matching_code()
        .connectivity("full")
        .oracle(Box::new(|world| {
            expect_step_ok(world, 1)?;
            expect_step_ok(world, 2)?;
            expect_state(world, SessionState::Connected)
        }))
        .run()
        .await;

    assert!(result.is_ok(), "scenario failed: {:?}", result);
}

#[tokio::test]
async fn scenario_secure_code_mismatch_fails_session() {
    let result = Scenario::new("secure code mismatch")
        .secure()
        .login("A", "B")
        .connectivity("weak")
        .submit_code("WRONG1")
        .send_message("hi")
        .oracle(Box::new(|world| {
            expect_state(world, SessionState::Failed)?;

            match world.outcome(2) {
                Some(Err(SessionError::Connection { .. })) => {},
                other => return Err(format!("mismatch returned {other:?}")),
            }
            match world.outcome(3) {
                Some(Err(SessionError::InvalidState { .. })) => {},
                other => return Err(format!("send after failure returned {other:?}")),
            }

            if world.engine_calls().last() != Some(&EngineCall::CloseConnection) {
                return Err("engine connection was not closed".to_string());
            }
            let published = world.published_errors();
            if !published.iter().any(|e| matches!(e, SessionError::Connection { .. })) {
                return Err(format!("no connection error published: {published:?}"));
            }
            Ok(())
        }))
        .run()
        .await;

    assert!(result.is_ok(), "scenario failed: {:?}", result);
}

#[tokio::test]
async fn scenario_image_transfer_completes_once() {
    let result = Scenario::new("image transfer")
        .login("A", "B")
        .connectivity("full")
        .file_progress("f.png", 40.0, None)
        .file_progress("f.png", 100.0, Some(("image/png", &b"\x89PNG"[..])))
        .file_progress("f.png", 100.0, Some(("image/png", &b"\x89PNG"[..])))
        .oracle(Box::new(|world| {
            for step in 0..5 {
                expect_step_ok(world, step)?;
            }

            let messages = world.orchestrator().messages();
            match messages {
                [message] if message.kind() == MessageKind::Image
                    && message.origin() == Origin::Remote => {},
                _ => return Err(format!("expected one image message, got {messages:?}")),
            }
            if world.orchestrator().pending_transfers() != 0 {
                return Err("transfer still pending".to_string());
            }

            let progress = world.notifications().into_iter().any(|event| {
                event
                    == OrchestratorEvent::TransferProgress {
                        file_name: "f.png".to_string(),
                        percentage: 40,
                        direction: TransferDirection::Incoming,
                    }
            });
            if !progress {
                return Err("40% progress was not published".to_string());
            }
            Ok(())
        }))
        .run()
        .await;

    assert!(result.is_ok(), "scenario failed: {:?}", result);
}

#[tokio::test]
async fn scenario_regressing_transfer_is_rejected() {
    let result = Scenario::new("non-monotonic transfer")
        .login("A", "B")
        .connectivity("full")
        .file_progress("f.png", 60.0, None)
        .file_progress("f.png", 30.0, None)
        .peer_message("still here")
        .oracle(Box::new(|world| {
            match world.outcome(3) {
                Some(Err(SessionError::TransferProtocol { file_name, .. }))
                    if file_name == "f.png" => {},
                other => return Err(format!("regression returned {other:?}")),
            }
            expect_step_ok(world, 4)?;
            expect_state(world, SessionState::Connected)?;

            let kinds: Vec<MessageKind> =
                world.orchestrator().messages().iter().map(|m| m.kind()).collect();
            if kinds != [MessageKind::Text] {
                return Err(format!("unexpected log: {kinds:?}"));
            }
            if world.orchestrator().pending_transfers() != 0 {
                return Err("aborted transfer still pending".to_string());
            }
            Ok(())
        }))
        .run()
        .await;

    assert!(result.is_ok(), "scenario failed: {:?}", result);
}

#[tokio::test]
async fn scenario_non_image_file_is_not_logged() {
    let result = Scenario::new("document transfer")
        .login("A", "B")
        .connectivity("weak")
        .file_progress("notes.pdf", 100.0, Some(("application/pdf", &b"%PDF"[..])))
        .oracle(Box::new(|world| {
            expect_step_ok(world, 2)?;
            if !world.orchestrator().messages().is_empty() {
                return Err("document was logged".to_string());
            }
            let received = world.notifications().into_iter().any(|event| {
                matches!(event, OrchestratorEvent::FileReceived { file_name, .. } if file_name == "notes.pdf")
            });
            if received { Ok(()) } else { Err("file receipt not published".to_string()) }
        }))
        .run()
        .await;

    assert!(result.is_ok(), "scenario failed: {:?}", result);
}

#[tokio::test]
async fn scenario_media_denied_keeps_connection() {
    let result = Scenario::new("media denied")
        .login("A", "B")
        .connectivity("full")
        .step(ScenarioStep::DenyMedia("permission denied".to_string()))
        .start_call()
        .send_message("still texting")
        .oracle(Box::new(|world| {
            match world.outcome(3) {
                Some(Err(SessionError::MediaAcquisition { cause, .. }))
                    if cause == "permission denied" => {},
                other => return Err(format!("start call returned {other:?}")),
            }
            expect_step_ok(world, 4)?;
            expect_state(world, SessionState::Connected)?;
            if world.engine_calls().iter().any(EngineCall::changes_tracks) {
                return Err("tracks were touched".to_string());
            }
            expect_no_live_capture(world)
        }))
        .run()
        .await;

    assert!(result.is_ok(), "scenario failed: {:?}", result);
}

#[tokio::test]
async fn scenario_call_needs_full_connectivity() {
    let result = Scenario::new("weak link call")
        .login("A", "B")
        .connectivity("weak")
        .start_call()
        .connectivity("full")
        .start_call()
        .oracle(Box::new(|world| {
            match world.outcome(2) {
                Some(Err(SessionError::InvalidState { .. })) => {},
                other => return Err(format!("call on weak link returned {other:?}")),
            }
            expect_step_ok(world, 4)?;
            expect_state(world, SessionState::InCall)?;
            if world.devices().live_tracks() != 2 {
                return Err(format!("{} live tracks", world.devices().live_tracks()));
            }
            Ok(())
        }))
        .run()
        .await;

    assert!(result.is_ok(), "scenario failed: {:?}", result);
}

#[tokio::test]
async fn scenario_toggle_and_hang_up() {
    let result = Scenario::new("toggle then hang up")
        .login("A", "B")
        .connectivity("full")
        .start_call()
        .toggle_audio()
        .toggle_audio()
        .toggle_video()
        .hang_up()
        .toggle_video()
        .oracle(Box::new(|world| {
            for step in 0..7 {
                expect_step_ok(world, step)?;
            }
            match world.outcome(7) {
                Some(Err(SessionError::NoTrack { .. })) => {},
                other => return Err(format!("toggle after hang up returned {other:?}")),
            }
            expect_state(world, SessionState::Connected)?;
            expect_no_live_capture(world)?;

            let toggles: Vec<bool> = world
                .notifications()
                .into_iter()
                .filter_map(|event| match event {
                    OrchestratorEvent::TrackToggled { enabled, .. } => Some(enabled),
                    _ => None,
                })
                .collect();
            if toggles != [false, true, false] {
                return Err(format!("unexpected toggles: {toggles:?}"));
            }
            Ok(())
        }))
        .run()
        .await;

    assert!(result.is_ok(), "scenario failed: {:?}", result);
}

#[tokio::test]
async fn scenario_disconnect_from_call_is_fresh_idle() {
    let config = OrchestratorConfig::secure();
    let expected = config.clone();
    let result = Scenario::new("disconnect mid call")
        .config(config)
        .login("A", "B")
        .connectivity("full")
        .submit_matching_code()
        .start_call()
        .peer_message("bye")
        .step(ScenarioStep::StartCounter)
        .disconnect()
        .oracle(Box::new(move |world| {
            for step in 0..7 {
                expect_step_ok(world, step)?;
            }
            expect_state(world, SessionState::Idle)?;
            expect_fresh_idle(world, expected.clone())?;
            expect_no_live_capture(world)?;

            let calls = world.engine_calls();
            let close = calls
                .iter()
                .position(|call| *call == EngineCall::CloseConnection)
                .ok_or("connection never closed")?;
            let last_removal = calls
                .iter()
                .rposition(|call| matches!(call, EngineCall::RemoveMediaTrack { .. }))
                .ok_or("tracks never removed")?;
            if last_removal > close {
                return Err("tracks removed after the connection closed".to_string());
            }

            let history = world.state_history();
            let tail = &history[history.len().saturating_sub(2)..];
            if tail != [SessionState::Closed, SessionState::Idle] {
                return Err(format!("unexpected final transitions: {tail:?}"));
            }
            Ok(())
        }))
        .run()
        .await;

    assert!(result.is_ok(), "scenario failed: {:?}", result);
}

#[tokio::test]
async fn scenario_peer_drop_then_relogin() {
    let result = Scenario::new("peer drops")
        .login("A", "B")
        .connectivity("full")
        .peer_message("hello")
        .connectivity("none")
        .peer_message("late")
        .login("A", "C")
        .oracle(Box::new(|world| {
            match world.outcome(4) {
                Some(Err(SessionError::StaleEvent { state: SessionState::Closed, .. })) => {},
                other => return Err(format!("late message returned {other:?}")),
            }
            expect_step_ok(world, 5)?;
            expect_state(world, SessionState::Connecting)?;

            let closes =
                world.engine_calls().iter().filter(|c| **c == EngineCall::CloseConnection).count();
            if closes != 0 {
                return Err(format!("engine closed {closes} times after a peer drop"));
            }
            if !world.orchestrator().messages().is_empty() {
                return Err("log survived the session".to_string());
            }
            Ok(())
        }))
        .run()
        .await;

    assert!(result.is_ok(), "scenario failed: {:?}", result);
}

#[tokio::test]
async fn scenario_refused_connection_returns_to_idle() {
    let result = Scenario::new("refused connection")
        .step(ScenarioStep::RefuseConnection("peer unavailable".to_string()))
        .login("A", "B")
        .oracle(Box::new(|world| {
            match world.outcome(1) {
                Some(Err(SessionError::Connection { reason })) if reason == "peer unavailable" => {},
                other => return Err(format!("login returned {other:?}")),
            }
            expect_state(world, SessionState::Idle)?;
            expect_no_live_capture(world)?;
            match world.orchestrator().session().failure_reason() {
                None => Ok(()),
                other => Err(format!("failure reason {other:?}")),
            }
        }))
        .run()
        .await;

    assert!(result.is_ok(), "scenario failed: {:?}", result);
}

#[tokio::test]
async fn scenario_engine_error_fails_session() {
    let result = Scenario::new("fatal engine error")
        .login("A", "B")
        .connectivity("full")
        .step(ScenarioStep::Engine(RawEngineEvent::Error("ice failed".to_string())))
        .oracle(Box::new(|world| {
            expect_step_ok(world, 2)?;
            expect_state(world, SessionState::Failed)?;
            let published = world.published_errors();
            if published != [SessionError::TransportFatal { reason: "ice failed".to_string() }] {
                return Err(format!("unexpected errors: {published:?}"));
            }
            Ok(())
        }))
        .run()
        .await;

    assert!(result.is_ok(), "scenario failed: {:?}", result);
}

#[tokio::test]
async fn scenario_counter_ticks_and_stops() {
    let counter = |count| {
        DataPayload::Counter { count }.encode().map(RawEngineEvent::Data).unwrap()
    };
    let result = Scenario::new("peer counter")
        .login("A", "B")
        .connectivity("full")
        .step(ScenarioStep::StartCounter)
        .advance(Duration::from_millis(500))
        .advance(Duration::from_millis(500))
        .advance(Duration::from_secs(3))
        .step(ScenarioStep::Engine(counter(9)))
        .disconnect()
        .advance(Duration::from_secs(5))
        .oracle(Box::new(|world| {
            for step in 0..9 {
                expect_step_ok(world, step)?;
            }

            let sent = world.engine().sent_payloads();
            let expected =
                [DataPayload::Counter { count: 1 }, DataPayload::Counter { count: 2 }];
            if sent != expected {
                return Err(format!("unexpected counter payloads: {sent:?}"));
            }

            let seen = world.notifications().into_iter().any(|event| {
                event == OrchestratorEvent::CounterChanged { local: 2, remote: 9 }
            });
            if !seen {
                return Err("peer counter was not published".to_string());
            }
            if world.orchestrator().counters() != (0, 0) {
                return Err("counters survived disconnect".to_string());
            }
            Ok(())
        }))
        .run()
        .await;

    assert!(result.is_ok(), "scenario failed: {:?}", result);
}
