mod edge;
mod graph;
mod solution;

pub use edge::Edge;
pub use graph::{Graph, GraphError};
pub use solution::{MAX_EDGES, Solution};
