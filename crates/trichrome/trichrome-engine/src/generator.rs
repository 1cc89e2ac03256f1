use std::io;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};
use trichrome_graph::{Graph, Solution};
use trichrome_ipc::{PublishOutcome, RingProducer, ShutdownToken};

/// Counters reported when a generator stops.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeneratorReport {
    /// Candidates published into the ring.
    pub published: u64,
    /// Attempts discarded because the conflict set was too large to
    /// represent.
    pub discarded: u64,
}

/// The generator process loop: color the graph at random, publish the
/// conflict set, repeat until shutdown.
pub struct GeneratorEngine {
    graph: Graph,
    producer: RingProducer<Solution>,
    token: ShutdownToken,
    rng: StdRng,
}

impl GeneratorEngine {
    pub fn new(graph: Graph, producer: RingProducer<Solution>, token: ShutdownToken) -> Self {
        Self {
            graph,
            producer,
            token,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Runs until shutdown is observed (through the shared flag or the
    /// local token). All publishing blocks until a slot frees up, so the
    /// loop naturally paces itself against the supervisor.
    pub fn run(&mut self) -> io::Result<GeneratorReport> {
        let mut report = GeneratorReport::default();
        info!(
            vertices = self.graph.vertices().len(),
            edges = self.graph.edges().len(),
            "generator started"
        );

        loop {
            if self.token.is_set() {
                break;
            }
            let Some(candidate) = self.graph.random_conflict_set(&mut self.rng) else {
                report.discarded += 1;
                continue;
            };
            match self.producer.publish(candidate, &self.token)? {
                PublishOutcome::Published => {
                    report.published += 1;
                    debug!(size = candidate.len(), "published candidate");
                }
                PublishOutcome::Shutdown => break,
            }
        }

        info!(
            published = report.published,
            discarded = report.discarded,
            "generator stopped"
        );
        Ok(report)
    }
}
