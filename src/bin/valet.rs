//! CLI binary for valet.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use valet::apps;
use valet::config::ValetConfig;
use valet::dispatch::{
    DispatchOutcome, Dispatcher, HandlerSet, UnconfiguredChatModel, UnconfiguredSearch,
};
use valet::intent::IntentKind;
use valet::platform;
use valet::policy::AdaptivePolicy;
use valet::system::{AlertEvent, SystemEngine};
use valet::valet_dirs;

/// Valet: a concurrent command router for a personal desktop assistant.
#[derive(Parser)]
#[command(name = "valet", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Interactive command loop.
    Run,

    /// Dispatch one batch of commands and exit.
    Exec {
        /// Command strings, each possibly composite ("mute and lock").
        commands: Vec<String>,
    },

    /// Print the learned policy arm table.
    Policy,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing();
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => ValetConfig::from_file(path)?,
        None => {
            let path = valet_dirs::config_file();
            if path.exists() {
                ValetConfig::from_file(&path)?
            } else {
                ValetConfig::default()
            }
        }
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_interactive(&config).await,
        Command::Exec { commands } => run_exec(&config, commands).await,
        Command::Policy => print_policy(&config),
    }
}

/// Stderr logging plus a daily-rolling file in the logs dir. Users can
/// override the filter with RUST_LOG.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("valet=info"));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let logs = valet_dirs::logs_dir();
    if std::fs::create_dir_all(&logs).is_ok() {
        let appender = tracing_appender::rolling::daily(&logs, "valet.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .with(file_layer)
            .try_init()
            .ok();
        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .try_init()
            .ok();
        None
    }
}

/// Wire the dispatcher to the host's real platform backends. Chat and
/// search stay unconfigured placeholders until a backend is added.
fn build(config: &ValetConfig) -> (Dispatcher, mpsc::UnboundedReceiver<AlertEvent>) {
    let timeout = Duration::from_secs(config.system.command_timeout_secs);
    let links = platform::create_link_opener();
    let desktop = platform::create_desktop_control(timeout);
    let sink = platform::create_alert_sink(timeout);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let system = Arc::new(SystemEngine::new(desktop, sink, events_tx, &config.system));
    let handlers = HandlerSet {
        apps: apps::create_app_control(links.clone(), timeout),
        links,
        chat: Arc::new(UnconfiguredChatModel),
        search: Arc::new(UnconfiguredSearch),
        policy: Arc::new(AdaptivePolicy::new(&config.policy)),
    };
    (
        Dispatcher::new(handlers, system, &config.dispatch),
        events_rx,
    )
}

/// Render countdown and stopwatch events as they arrive.
fn spawn_event_printer(mut events: mpsc::UnboundedReceiver<AlertEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                AlertEvent::Fired { label, time_of_day } => {
                    println!("alarm: {label} ({time_of_day})");
                }
                AlertEvent::Suppressed { label, time_of_day } => {
                    println!("cancelled alarm stayed quiet: {label} ({time_of_day})");
                }
                AlertEvent::TimerDone { label } => println!("timer done: {label}"),
                AlertEvent::StopwatchReport { elapsed } => println!("stopwatch: {elapsed}"),
            }
        }
    });
}

async fn run_interactive(config: &ValetConfig) -> anyhow::Result<()> {
    println!("valet v{}", env!("CARGO_PKG_VERSION"));
    println!("Type a command, or \"exit\" to quit.\n");

    let (dispatcher, events) = build(config);
    spawn_event_printer(events);

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let outcomes = dispatcher.dispatch(&[line.to_string()]).await;
        if print_outcomes(&outcomes) {
            break;
        }
    }
    Ok(())
}

async fn run_exec(config: &ValetConfig, commands: Vec<String>) -> anyhow::Result<()> {
    let (dispatcher, events) = build(config);
    spawn_event_printer(events);
    let outcomes = dispatcher.dispatch(&commands).await;
    print_outcomes(&outcomes);
    Ok(())
}

/// Print one line per result slot. Returns true when the batch carried
/// an exit intent, after its farewell has been printed.
fn print_outcomes(outcomes: &[DispatchOutcome]) -> bool {
    let mut exiting = false;
    for outcome in outcomes {
        match &outcome.result {
            Ok(summary) => println!("{}: {summary}", outcome.intent.kind.name()),
            Err(e) => println!("{}: failed: {e}", outcome.intent.kind.name()),
        }
        if outcome.intent.kind == IntentKind::Exit {
            exiting = true;
        }
    }
    exiting
}

fn print_policy(config: &ValetConfig) -> anyhow::Result<()> {
    let policy = AdaptivePolicy::new(&config.policy);
    println!(
        "{:<10} {:<14} {:<18} {:>8} {:>10}",
        "decision", "parameter", "value", "count", "mean"
    );
    for (decision_point, params) in policy.snapshot() {
        for (param, values) in params {
            for (value, stats) in values {
                println!(
                    "{decision_point:<10} {param:<14} {value:<18} {:>8} {:>10.4}",
                    stats.count, stats.mean_reward
                );
            }
        }
    }
    Ok(())
}
