// Command-line entry point for tracewatch.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

use tracewatch::api::server::start_server;
use tracewatch::application::TraceSession;
use tracewatch::infrastructure::{NmSymbolExtractor, Settings, TracerModelFactory};
use tracewatch::ports::dot_exporter::DotExporter;
use tracewatch::ports::GraphExporter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON-line API for the UI
    Serve {
        /// Overrides the port from the settings file
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the tracer arguments compiled from a trace configuration
    Args {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Build a call graph from saved tracer output
    Replay {
        #[arg(short, long)]
        input: PathBuf,
        /// DOT output path
        #[arg(short, long)]
        output: PathBuf,
        /// Only color nodes whose id contains this text
        #[arg(short, long, default_value = "")]
        search: String,
    },
    /// Run the tracer live and write the call graph when it stops
    Trace {
        #[arg(short, long)]
        config: PathBuf,
        /// DOT output path
        #[arg(short, long)]
        output: PathBuf,
        /// Seconds to trace; runs until Ctrl-C when omitted
        #[arg(short, long)]
        duration: Option<u64>,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "tracewatch=debug" } else { "tracewatch=info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = Registry::default()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {}", e);
    }
}

fn new_session(settings: &Settings) -> TraceSession {
    TraceSession::new(
        Box::new(NmSymbolExtractor::new()),
        Box::new(TracerModelFactory::new(settings.tracer.clone())),
    )
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut settings = Settings::load(cli.settings.as_deref())?;

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                settings.server.port = port;
            }
            let session = new_session(&settings);
            start_server(settings, session)
        }
        Command::Args { config } => {
            let mut session = new_session(&settings);
            session.load_config(&config)?;
            for arg in session.generate_arguments() {
                println!("{}", arg);
            }
            Ok(())
        }
        Command::Replay { input, output, search } => replay(&settings, &input, &output, &search),
        Command::Trace { config, output, duration } => {
            trace(&settings, &config, &output, duration.map(Duration::from_secs))
        }
    }
}

fn replay(settings: &Settings, input: &Path, output: &Path, search: &str) -> Result<()> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("Cannot read trace output {}", input.display()))?;

    let mut session = new_session(settings);
    session.submit_static_output(&text)?;
    write_graph(&session, output, search)
}

fn trace(settings: &Settings, config: &Path, output: &Path, duration: Option<Duration>) -> Result<()> {
    let mut session = new_session(settings);
    session.load_config(config)?;
    if session.generate_arguments().is_empty() {
        anyhow::bail!("No traced functions in {}", config.display());
    }

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || handler_stop.store(true, Ordering::SeqCst))
        .context("Error setting Ctrl-C handler")?;

    session.start_trace()?;
    match duration {
        Some(d) => info!(seconds = d.as_secs(), "Tracing"),
        None => info!("Tracing until Ctrl-C"),
    }

    let started = Instant::now();
    let poll = settings.display.poll_interval();
    while !stop.load(Ordering::SeqCst) {
        if duration.is_some_and(|d| started.elapsed() >= d) {
            break;
        }
        let status = session.status();
        if !status.trace_active {
            warn!(error = ?status.process_error, "Tracer exited");
            break;
        }
        thread::sleep(poll);
    }

    session.stop_trace();
    let status = session.status();
    if let Some(e) = status.thread_error {
        warn!(error = %e, "Trace reader failed");
    }
    write_graph(&session, output, "")
}

fn write_graph(session: &TraceSession, output: &Path, search: &str) -> Result<()> {
    let graph = session.graph();
    let path = output.to_string_lossy();
    DotExporter::with_search(search)
        .export(&graph, &path)
        .with_context(|| format!("Cannot write graph to {}", path))?;
    info!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        max_count = graph.thresholds.max,
        output = %path,
        "Graph written"
    );
    Ok(())
}
