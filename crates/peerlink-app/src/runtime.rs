//! Runtime
//!
//! Drives an [`Orchestrator`] against a real or simulated engine. User
//! intents enter through the async methods; engine events arrive on the
//! channel handed to the engine at construction. Everything runs on one
//! control loop: engine calls are awaited one at a time, and the result of
//! a deferred call is fed back into the orchestrator before the next event
//! is looked at.
//!
//! [`Runtime::wait`] is cancel-safe, so frontends can `select!` on it next
//! to their own input and call [`Runtime::dispatch`] with what it returned.

use std::collections::VecDeque;

use peerlink_core::{
    SessionError,
    env::Environment,
    event::RawEngineEvent,
    media::{MediaAction, MediaSelection},
    session::SessionState,
    transport::{EngineError, MediaDevices, OutgoingFile, TransportEngine},
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    action::OrchestratorAction,
    bridge::Bridge,
    config::OrchestratorConfig,
    orchestrator::{Orchestrator, Step},
};

/// Sending half handed to the engine for its events.
pub type EventSink = mpsc::UnboundedSender<RawEngineEvent>;

/// Create the channel between an engine and a runtime.
pub fn event_channel() -> (EventSink, mpsc::UnboundedReceiver<RawEngineEvent>) {
    mpsc::unbounded_channel()
}

/// Why the runtime woke up.
#[derive(Debug)]
pub enum Wakeup {
    /// The engine delivered an event.
    Engine(RawEngineEvent),
    /// The counter timer is due.
    Timer,
    /// The engine dropped its event sender.
    Closed,
}

/// Control loop over one orchestrator, engine and capture device set.
pub struct Runtime<E: Environment, T: TransportEngine, D: MediaDevices> {
    env: E,
    orchestrator: Orchestrator<E>,
    engine: T,
    devices: D,
    events: mpsc::UnboundedReceiver<RawEngineEvent>,
}

impl<E, T, D> Runtime<E, T, D>
where
    E: Environment,
    T: TransportEngine,
    D: MediaDevices,
{
    /// Runtime over `engine`, which pushes its events into the sender paired
    /// with `events`.
    pub fn new(
        env: E,
        config: OrchestratorConfig,
        engine: T,
        devices: D,
        events: mpsc::UnboundedReceiver<RawEngineEvent>,
    ) -> Self {
        let orchestrator = Orchestrator::new(env.clone(), config);
        Self { env, orchestrator, engine, devices, events }
    }

    /// Orchestrator state.
    pub fn orchestrator(&self) -> &Orchestrator<E> {
        &self.orchestrator
    }

    /// Mutable orchestrator, for subscribing observers.
    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator<E> {
        &mut self.orchestrator
    }

    /// Engine in use.
    pub fn engine(&self) -> &T {
        &self.engine
    }

    /// Log in and start connecting.
    ///
    /// # Errors
    /// Returns `Connection` if the engine refused to start the connection;
    /// the session is back in `Idle` by then.
    pub async fn login(
        &mut self,
        local_id: &str,
        peer_id: &str,
        secure_code: Option<String>,
    ) -> Result<(), SessionError> {
        let step = self.orchestrator.login(local_id, peer_id, secure_code);
        self.run(step).await?;
        self.connection_outcome()
    }

    /// Submit the peer's secure code.
    ///
    /// # Errors
    /// Returns `Connection` if the code did not match.
    pub async fn submit_secure_code(&mut self, code: &str) -> Result<(), SessionError> {
        let step = self.orchestrator.submit_secure_code(code);
        self.run(step).await?;
        self.connection_outcome()
    }

    /// Send a text message.
    pub async fn send_message(&mut self, text: &str) -> Result<(), SessionError> {
        let step = self.orchestrator.send_message(text);
        self.run(step).await
    }

    /// Send a file.
    pub async fn send_file(&mut self, file: OutgoingFile) -> Result<(), SessionError> {
        let step = self.orchestrator.send_file(file);
        self.run(step).await
    }

    /// Acquire audio and video and enter the call.
    pub async fn start_call(&mut self) -> Result<(), SessionError> {
        let step = self.orchestrator.start_call();
        self.run(step).await
    }

    /// Acquire local capture for `selection`, entering the call or adding
    /// tracks to it.
    pub async fn acquire_local(&mut self, selection: MediaSelection) -> Result<(), SessionError> {
        let step = self.orchestrator.acquire_local(selection);
        self.run(step).await
    }

    /// End the call.
    pub async fn hang_up(&mut self) -> Result<(), SessionError> {
        let step = self.orchestrator.hang_up();
        self.run(step).await
    }

    /// Flip the local audio track.
    pub async fn toggle_audio(&mut self) -> Result<(), SessionError> {
        let step = self.orchestrator.toggle_audio();
        self.run(step).await
    }

    /// Flip the local video track.
    pub async fn toggle_video(&mut self) -> Result<(), SessionError> {
        let step = self.orchestrator.toggle_video();
        self.run(step).await
    }

    /// Close the session.
    pub async fn disconnect(&mut self) -> Result<(), SessionError> {
        let step = self.orchestrator.disconnect();
        self.run(step).await
    }

    /// Start the peer counter.
    pub fn start_counter(&mut self) -> Result<(), SessionError> {
        self.orchestrator.start_counter()
    }

    /// Stop the peer counter.
    pub fn stop_counter(&mut self) -> bool {
        self.orchestrator.stop_counter()
    }

    /// Wait for the next engine event or timer deadline.
    ///
    /// Queued engine events win over a due timer.
    pub async fn wait(&mut self) -> Wakeup {
        let Some(deadline) = self.orchestrator.next_deadline() else {
            return self.events.recv().await.map_or(Wakeup::Closed, Wakeup::Engine);
        };
        let delay = deadline.saturating_duration_since(self.env.now());
        tokio::select! {
            biased;
            event = self.events.recv() => event.map_or(Wakeup::Closed, Wakeup::Engine),
            () = self.env.sleep(delay) => Wakeup::Timer,
        }
    }

    /// Process what [`Runtime::wait`] returned.
    ///
    /// Event errors are also published to observers by the orchestrator.
    pub async fn dispatch(&mut self, wakeup: Wakeup) -> Result<(), SessionError> {
        match wakeup {
            Wakeup::Engine(raw) => {
                let event = match Bridge::normalize(raw) {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(%err, "engine event rejected");
                        let error = SessionError::from(err);
                        self.orchestrator.report(error.clone());
                        return Err(error);
                    },
                };
                debug!(event = event.name(), "engine event");
                let step = self.orchestrator.handle_event(event);
                self.run(step).await
            },
            Wakeup::Timer => {
                let step = self.orchestrator.on_timer();
                self.run(step).await
            },
            Wakeup::Closed => {
                debug!("engine event channel closed");
                Ok(())
            },
        }
    }

    /// Wait for and process one wakeup. Returns `false` once the engine's
    /// event channel is closed.
    pub async fn pump(&mut self) -> Result<bool, SessionError> {
        match self.wait().await {
            Wakeup::Closed => Ok(false),
            wakeup => self.dispatch(wakeup).await.map(|()| true),
        }
    }

    /// Process every engine event already queued, in arrival order.
    ///
    /// Returns the errors raised along the way.
    pub async fn drain(&mut self) -> Vec<SessionError> {
        let mut errors = Vec::new();
        while let Ok(raw) = self.events.try_recv() {
            if let Err(error) = self.dispatch(Wakeup::Engine(raw)).await {
                errors.push(error);
            }
        }
        errors
    }

    fn connection_outcome(&self) -> Result<(), SessionError> {
        let session = self.orchestrator.session();
        match (session.state(), session.failure_reason()) {
            (SessionState::Failed, Some(reason)) => {
                Err(SessionError::Connection { reason: reason.to_string() })
            },
            _ => Ok(()),
        }
    }

    /// Execute a step's actions, feeding deferred results back.
    ///
    /// Teardown failures are reported and skipped. Any other failure drops
    /// the rest of the step, runs what the orchestrator needs to undo the
    /// failed action and is returned once that is done.
    async fn run(&mut self, step: Step) -> Result<(), SessionError> {
        let mut queue: VecDeque<OrchestratorAction> = step?.into();
        let mut failure = None;
        while let Some(action) = queue.pop_front() {
            let teardown = action.is_teardown();
            match self.execute(action.clone()).await {
                Ok(follow_up) => queue.extend(follow_up),
                Err(error) if teardown => {
                    warn!(%error, "teardown call failed");
                    self.orchestrator.report(error);
                },
                Err(error) => {
                    debug!(%error, dropped = queue.len(), "step aborted");
                    queue = self.orchestrator.action_failed(&action, &error).into();
                    failure = failure.or(Some(error));
                },
            }
        }
        failure.map_or(Ok(()), Err)
    }

    async fn execute(&mut self, action: OrchestratorAction) -> Step {
        match action {
            OrchestratorAction::StartConnection { peer_id, options } => {
                match self.engine.start_connection(&peer_id, options).await {
                    Ok(outcome) => self.orchestrator.connection_started(Ok(outcome)),
                    Err(err) => Err(SessionError::Connection { reason: err.reason }),
                }
            },
            OrchestratorAction::AcquireMedia(selection) => {
                let result = self.devices.acquire(selection).await;
                self.orchestrator.media_acquired(result)
            },
            OrchestratorAction::SendData(payload) => {
                self.engine.send_data(payload).await.map_err(rejected("send data"))?;
                Ok(vec![])
            },
            OrchestratorAction::SendFile(file) => {
                self.engine.send_file(file).await.map_err(rejected("send file"))?;
                Ok(vec![])
            },
            OrchestratorAction::Media(MediaAction::SetTrack { kind, track, stream }) => {
                self.engine
                    .set_media_track(kind, track, stream)
                    .await
                    .map_err(rejected("set media track"))?;
                Ok(vec![])
            },
            OrchestratorAction::Media(MediaAction::SetEnabled { kind, enabled }) => {
                self.engine
                    .set_track_enabled(kind, enabled)
                    .await
                    .map_err(rejected("enable track"))?;
                Ok(vec![])
            },
            OrchestratorAction::Media(MediaAction::RemoveTrack { kind }) => {
                self.engine.remove_media_track(kind).await.map_err(rejected("remove track"))?;
                Ok(vec![])
            },
            OrchestratorAction::CloseConnection => {
                self.engine.close_connection().await.map_err(rejected("close connection"))?;
                Ok(vec![])
            },
        }
    }
}

fn rejected(operation: &'static str) -> impl Fn(EngineError) -> SessionError {
    move |err| SessionError::Engine { operation, reason: err.reason }
}
