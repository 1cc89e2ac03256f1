use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use trichrome_config::TrichromeConfig;
use trichrome_engine::{SupervisorEngine, Verdict};
use trichrome_graph::Solution;
use trichrome_ipc::{CAPACITY, IpcNames, RingConfig, RingConsumer, ShutdownToken};

/// Creates the shared solution ring, consumes candidates from any number of
/// generators and reports the best edge-removal set seen.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
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

    let token = ShutdownToken::new();
    token
        .register_signals()
        .context("cannot install signal handlers")?;

    let names = IpcNames::new(config.shm_prefix.as_str()).context("invalid shm prefix")?;
    let consumer = RingConsumer::<Solution>::create(&names, RingConfig::new(CAPACITY)).context(
        "cannot create the shared ring; is another supervisor already running?",
    )?;

    let mut engine = SupervisorEngine::new(consumer, token);
    let verdict = engine.run().context("supervisor loop failed")?;

    if verdict == Verdict::Interrupted {
        match engine.best() {
            Some(best) => println!(
                "Shutting down. Best candidate removes {} edges: {}",
                best.len(),
                best
            ),
            None => println!("Shutting down before any candidate arrived."),
        }
    }
    Ok(())
}
