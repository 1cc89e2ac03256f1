use std::io;

use tracing::info;
use trichrome_graph::Solution;
use trichrome_ipc::{ConsumeOutcome, RingConsumer, ShutdownToken};

/// Why the supervisor loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// A perfect candidate arrived: the graph is 3-colorable as given.
    ThreeColorable,
    /// An external interrupt ended the search early.
    Interrupted,
}

/// Keeps the smallest solution observed so far.
///
/// `None` stands in for the "worse than anything" sentinel: the first
/// candidate always improves, after that only strictly smaller ones do.
#[derive(Debug, Default)]
pub struct BestTracker {
    best: Option<Solution>,
}

impl BestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `candidate` if it is a strict improvement and says whether
    /// it was one.
    pub fn observe(&mut self, candidate: &Solution) -> bool {
        let improved = self.best.is_none_or(|best| candidate.len() < best.len());
        if improved {
            self.best = Some(*candidate);
        }
        improved
    }

    pub fn best(&self) -> Option<&Solution> {
        self.best.as_ref()
    }
}

/// The supervisor process loop: consume candidates, report improvements,
/// stop on a perfect solution or an interrupt.
pub struct SupervisorEngine {
    consumer: RingConsumer<Solution>,
    token: ShutdownToken,
    tracker: BestTracker,
}

impl SupervisorEngine {
    pub fn new(consumer: RingConsumer<Solution>, token: ShutdownToken) -> Self {
        Self {
            consumer,
            token,
            tracker: BestTracker::new(),
        }
    }

    /// Runs until a perfect candidate arrives or the token is set. In both
    /// cases shutdown is requested before returning, so generators blocked
    /// on a full ring drain out; after that the ring is never read again.
    pub fn run(&mut self) -> io::Result<Verdict> {
        info!("supervisor started, waiting for candidates");
        loop {
            match self.consumer.consume(&self.token)? {
                ConsumeOutcome::Interrupted => {
                    self.consumer.request_shutdown()?;
                    info!("search interrupted");
                    return Ok(Verdict::Interrupted);
                }
                ConsumeOutcome::Received(candidate) => {
                    if !self.tracker.observe(&candidate) {
                        continue;
                    }
                    if candidate.is_perfect() {
                        println!("The graph is 3-colorable!");
                        self.consumer.request_shutdown()?;
                        return Ok(Verdict::ThreeColorable);
                    }
                    println!("Solution with {} edges: {}", candidate.len(), candidate);
                }
            }
        }
    }

    pub fn best(&self) -> Option<&Solution> {
        self.tracker.best()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trichrome_graph::Edge;

    fn solution_of(size: u32) -> Solution {
        let mut s = Solution::empty();
        for i in 0..size {
            assert!(s.try_push(Edge::new(i, i + 1)));
        }
        s
    }

    /// Sizes [3, 2, 2, 0] must improve at 3, at the first 2, and at 0,
    /// never at the second 2.
    #[test]
    fn strict_improvement_sequence() {
        let mut tracker = BestTracker::new();
        let improvements: Vec<bool> = [3, 2, 2, 0]
            .into_iter()
            .map(|size| tracker.observe(&solution_of(size)))
            .collect();
        assert_eq!(improvements, [true, true, false, true]);
        assert!(tracker.best().unwrap().is_perfect());
    }

    #[test]
    fn first_candidate_always_improves() {
        let mut tracker = BestTracker::new();
        assert!(tracker.observe(&solution_of(8)));
        assert_eq!(tracker.best().unwrap().len(), 8);
    }

    #[test]
    fn equal_size_is_not_an_improvement() {
        let mut tracker = BestTracker::new();
        assert!(tracker.observe(&solution_of(4)));
        assert!(!tracker.observe(&solution_of(4)));
        assert!(tracker.observe(&solution_of(3)));
    }
}
