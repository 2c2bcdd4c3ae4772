//! `peerlink`: drive a peer session from the terminal.
//!
//! Runs the orchestrator over the in-process loopback engine. Commands are
//! read from stdin one per line (see `/help`), notifications are written to
//! stdout and logs go to stderr (`RUST_LOG` overrides `--log-level`).

use std::time::Duration;

use clap::Parser;
use peerlink_app::{Runtime, Wakeup, event_channel};
use peerlink_cli::{
    CliError, Flow, LoopbackDevices, LoopbackEngine, OrchestratorConfig, SystemEnv, commands,
    describe, execute,
};
use peerlink_core::{SessionError, session::PeerId, transport::EngineConfig};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout},
    sync::mpsc,
};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Peer session shell
#[derive(Parser, Debug)]
#[command(name = "peerlink")]
#[command(version, about, long_about = None)]
struct Args {
    /// Our identifier
    #[arg(long)]
    id: String,

    /// Peer to log in to right away
    #[arg(long)]
    peer: Option<String>,

    /// Signaling endpoint
    #[arg(long, default_value = "wss://localhost:8443")]
    signaling_url: String,

    /// Gate the connection on secure-code verification
    #[arg(long)]
    secure: bool,

    /// Authentication key for the signaling service
    #[arg(long)]
    auth_key: Option<String>,

    /// Secure code to use instead of a generated one
    #[arg(long, requires = "peer")]
    code: Option<String>,

    /// Log level when `RUST_LOG` is unset
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Peer counter period in milliseconds
    #[arg(long, default_value_t = 1000)]
    counter_interval_ms: u64,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

async fn write_line(stdout: &mut Stdout, line: &str) -> Result<(), CliError> {
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

/// Print a command outcome. Returns `false` when the shell should stop.
async fn report(stdout: &mut Stdout, outcome: Result<Flow, CliError>) -> Result<bool, CliError> {
    match outcome {
        Ok(Flow::Quit) => return Ok(false),
        Ok(Flow::Continue(Some(reply))) => write_line(stdout, &reply).await?,
        Ok(Flow::Continue(None)) => {},
        // Integrity failures are published as notifications.
        Err(CliError::Session(SessionError::Connection { .. })) => {},
        Err(err) if err.is_recoverable() => write_line(stdout, &format!("! {err}")).await?,
        Err(err) => return Err(err),
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let mut config =
        if args.secure { OrchestratorConfig::secure() } else { OrchestratorConfig::default() };
    config.counter_interval = Duration::from_millis(args.counter_interval_ms.max(1));

    let local_id = PeerId::parse(&args.id, config.max_id_len)?;
    let peer_id =
        args.peer.as_deref().map(|peer| PeerId::parse(peer, config.max_id_len)).transpose()?;
    let engine_config = EngineConfig {
        local_id,
        peer_id,
        signaling_url: args.signaling_url.clone(),
        secure: args.secure,
        auth_key: args.auth_key.clone(),
    };

    let (sink, events) = event_channel();
    let engine = LoopbackEngine::new(engine_config, sink);
    let mut runtime = Runtime::new(SystemEnv, config, engine, LoopbackDevices::new(), events);

    let (notes_tx, mut notes) = mpsc::unbounded_channel::<String>();
    runtime.orchestrator_mut().subscribe(Box::new(move |event| {
        if let Some(line) = describe(event) {
            let _ = notes_tx.send(line);
        }
    }));

    info!(id = %args.id, secure = args.secure, "shell started");
    let mut stdout = tokio::io::stdout();
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let mut running = true;
    if let Some(peer) = &args.peer {
        let login = runtime.login(&args.id, peer, args.code.clone()).await;
        running = report(&mut stdout, login.map(|()| Flow::Continue(None)).map_err(Into::into))
            .await?;
    }

    while running {
        while let Ok(line) = notes.try_recv() {
            write_line(&mut stdout, &line).await?;
        }

        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else { break };
                let outcome = execute(&mut runtime, commands::parse(&line)).await;
                running = report(&mut stdout, outcome).await?;
            },
            wakeup = runtime.wait() => {
                if matches!(wakeup, Wakeup::Closed) {
                    break;
                }
                if let Err(err) = runtime.dispatch(wakeup).await {
                    debug!(%err, "engine event failed");
                }
            },
        }
    }

    if runtime.orchestrator().state().is_active() {
        runtime.disconnect().await?;
    }
    info!("shell stopped");
    Ok(())
}
