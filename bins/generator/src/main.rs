use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trichrome_config::TrichromeConfig;
use trichrome_engine::GeneratorEngine;
use trichrome_graph::Graph;
use trichrome_ipc::{IpcNames, RingProducer, ShutdownToken};

/// Repeatedly 3-colors the input graph at random and publishes each
/// conflict edge set to the running supervisor.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Graph edges as "<u>-<v>" tokens, e.g.: 0-1 0-2 0-3 1-2 1-3 2-3
    #[arg(required = true, value_name = "EDGE")]
    edges: Vec<String>,

    /// Path to a TOML config file (shm_prefix, log_level).
    #[arg(long, value_name = "FILE")]
    config: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => TrichromeConfig::load(path.as_str())
            .with_context(|| format!("cannot load config '{path}'"))?,
        None => TrichromeConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level)
                .with_context(|| format!("invalid log_level '{}'", config.log_level))?,
        )
        .init();

    let graph = Graph::from_tokens(&args.edges).context("invalid edge list")?;

    let token = ShutdownToken::new();
    token
        .register_signals()
        .context("cannot install signal handlers")?;

    let names = IpcNames::new(config.shm_prefix.as_str()).context("invalid shm prefix")?;
    let producer = RingProducer::open(&names)
        .context("cannot open the shared ring; is the supervisor running?")?;

    let mut engine = GeneratorEngine::new(graph, producer, token);
    let report = engine.run().context("generator loop failed")?;
    info!(published = report.published, "generator exiting");
    Ok(())
}
