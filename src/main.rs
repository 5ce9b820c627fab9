#![forbid(unsafe_code)]

//! `buildwire` — run build steps and exchange framed messages from a shell.
//!
//! Subcommands:
//! - `exec`: run a command in its own process group, streaming its output.
//! - `send`: write one frame to a TCP peer and print the reply frame.
//! - `echo-server`: echo every received frame back to its sender.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use tracing_subscriber::{fmt, EnvFilter};

use buildwire::config::BuildwireConfig;
use buildwire::framing::{read_frame_event_with, write_frame_with, Frame, FrameCodec, FrameOptions};
use buildwire::workers::WorkerPool;
use buildwire::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "buildwire", about = "Build step runner and frame protocol tool", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a shell command and stream its combined output.
    Exec(ExecArgs),
    /// Send one frame to a peer and print the reply.
    Send(SendArgs),
    /// Echo frames back to every connected client.
    EchoServer {
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:7777")]
        bind: String,
    },
}

#[derive(Debug, Args)]
struct ExecArgs {
    /// Working directory (defaults to the current directory).
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Seconds to wait for output or exit (overrides the config file).
    #[arg(long)]
    timeout: Option<u64>,

    /// Extra environment variable, `KEY=VALUE`. Repeatable.
    #[arg(long = "env", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// Do not inherit the current environment.
    #[arg(long)]
    isolated_env: bool,

    /// Command text handed to `sh -c`.
    command: String,
}

#[derive(Debug, Args)]
struct SendArgs {
    /// Peer address, `HOST:PORT`.
    #[arg(long)]
    addr: String,

    /// Per-operation timeout in seconds (overrides the config file).
    #[arg(long)]
    timeout: Option<u64>,

    /// Pretty-print the reply when it is JSON.
    #[arg(long)]
    json: bool,

    /// Read the payload from a file instead of the command line.
    #[arg(long, conflicts_with = "payload")]
    file: Option<PathBuf>,

    /// Payload text.
    payload: Option<String>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    let config = match &args.config {
        Some(path) => BuildwireConfig::load_from_path(path)?,
        None => BuildwireConfig::default(),
    };
    debug!(?config, "configuration loaded");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args.command, config))
}

async fn run(command: Command, config: BuildwireConfig) -> Result<()> {
    let workers = WorkerPool::from_config(&config.workers);

    let ct = CancellationToken::new();
    let signal_ct = ct.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_ct.cancel();
    });

    let result = match command {
        Command::Exec(args) => run_exec(args, &config, &ct).await,
        Command::Send(args) => run_send(args, &config, &workers).await,
        Command::EchoServer { bind } => run_echo_server(&bind, &ct).await,
    };

    workers.shutdown().await;
    result
}

#[cfg(unix)]
async fn run_exec(args: ExecArgs, config: &BuildwireConfig, ct: &CancellationToken) -> Result<()> {
    use buildwire::shell::{exec_command, EnvOverlay, ExecRequest, OutputLine};
    use tokio::io::AsyncWriteExt;

    let cwd = match args.cwd {
        Some(cwd) => cwd,
        None => std::env::current_dir()?,
    };
    let timeout = args
        .timeout
        .map_or_else(|| config.shell.timeout(), Duration::from_secs);
    let env = EnvOverlay::new()
        .inherit(config.shell.inherit_env && !args.isolated_env)
        .vars(args.env);

    let (tx, mut rx) = tokio::sync::mpsc::channel::<OutputLine>(config.shell.output_queue);
    let printer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            if let Err(err) = stdout.write_all(line.text.as_bytes()).await {
                warn!(%err, "failed to write command output");
                break;
            }
            if let Err(err) = stdout.flush().await {
                warn!(%err, "failed to flush command output");
                break;
            }
        }
    });

    let request = ExecRequest::new(args.command, cwd)
        .timeout(timeout)
        .line_limit(config.shell.line_limit_bytes)
        .env(env)
        .output(tx);

    let result = tokio::select! {
        result = exec_command(request) => result,
        () = ct.cancelled() => {
            warn!("interrupted, command process group killed");
            Err(AppError::Io(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                "interrupted by signal",
            )))
        }
    };

    if let Err(err) = printer.await {
        warn!(%err, "output printer task failed");
    }

    match result {
        Ok(_) => Ok(()),
        Err(err) => {
            if let AppError::CommandExecution { exit_code, .. } = &err {
                error!(?exit_code, "build step failed");
            }
            Err(err)
        }
    }
}

#[cfg(not(unix))]
async fn run_exec(
    _args: ExecArgs,
    _config: &BuildwireConfig,
    _ct: &CancellationToken,
) -> Result<()> {
    Err(AppError::Config(
        "exec requires a Unix platform with process groups".into(),
    ))
}

async fn run_send(args: SendArgs, config: &BuildwireConfig, workers: &WorkerPool) -> Result<()> {
    let SendArgs {
        addr,
        timeout,
        json,
        file,
        payload,
    } = args;

    let payload = match (payload, file) {
        (Some(payload), _) => payload,
        (None, Some(path)) => workers.read_file(path).await?,
        (None, None) => {
            return Err(AppError::Config(
                "either a payload or --file is required".into(),
            ))
        }
    };
    let timeout = timeout
        .map(Duration::from_secs)
        .or_else(|| config.framing.timeout());
    let options = FrameOptions::from(&config.framing);

    let span = info_span!("send", %addr);
    async move {
        let mut stream = TcpStream::connect(&addr).await?;
        let (mut reader, mut writer) = stream.split();

        write_frame_with(Some(&mut writer), &payload, timeout, &options).await?;
        info!(bytes = payload.len(), "frame sent");

        match read_frame_event_with(&mut reader, timeout, &options).await? {
            Frame::Closed => warn!("peer closed the connection without replying"),
            frame => {
                let bytes = frame.into_bytes();
                let text = String::from_utf8_lossy(&bytes);
                if json {
                    match serde_json::from_str::<serde_json::Value>(&text) {
                        Ok(value) => println!(
                            "{}",
                            serde_json::to_string_pretty(&value).unwrap_or_else(|_| text.to_string())
                        ),
                        Err(err) => {
                            warn!(%err, "reply is not JSON, printing raw");
                            println!("{text}");
                        }
                    }
                } else {
                    println!("{text}");
                }
            }
        }

        Ok::<(), AppError>(())
    }
    .instrument(span)
    .await
}

async fn run_echo_server(bind: &str, ct: &CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "echo server listening");

    loop {
        tokio::select! {
            () = ct.cancelled() => {
                info!("echo server shutting down");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let span = info_span!("echo_conn", %peer);
                        tokio::spawn(echo_connection(stream).instrument(span));
                    }
                    Err(err) => warn!(%err, "accept failed"),
                }
            }
        }
    }

    Ok(())
}

async fn echo_connection(stream: TcpStream) {
    let mut framed = Framed::new(stream, FrameCodec::new());

    while let Some(item) = framed.next().await {
        match item {
            Ok(frame) => {
                let payload = frame.into_bytes();
                debug!(bytes = payload.len(), "frame received");
                if let Err(err) = framed.send(payload).await {
                    warn!(%err, "failed to echo frame");
                    break;
                }
            }
            Err(err) => {
                warn!(%err, "frame decode failed, dropping connection");
                break;
            }
        }
    }

    info!("connection closed");
}

fn parse_env_pair(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
        "ctrl-c"
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(%err, "SIGTERM handler unavailable, listening for ctrl-c only");
                std::future::pending::<()>().await;
            }
        }
        "SIGTERM"
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    let received = tokio::select! {
        name = ctrl_c => name,
        name = terminate => name,
    };
    info!(signal = received, "shutdown signal received");
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Command output owns stdout; logs go to stderr.
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
