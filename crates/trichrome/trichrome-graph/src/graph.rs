use rand::Rng;

use crate::{Edge, Solution};

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("invalid edge token '{token}': expected '<u>-<v>' with non-negative vertex ids")]
    BadEdgeToken { token: String },

    #[error("at least one edge is required")]
    Empty,
}

/// The static input graph a generator repeatedly tries to 3-color.
///
/// Vertices are collected from the edge list in first-seen order, without
/// duplicates. Color lookup is by vertex id, so the color table is sized by
/// the largest id rather than the vertex count.
#[derive(Debug, Clone)]
pub struct Graph {
    vertices: Vec<u32>,
    edges: Vec<Edge>,
    max_vertex: u32,
}

impl Graph {
    /// Builds a graph from CLI edge tokens of the form `"<u>-<v>"`.
    /// At least one token is required; any malformed token is fatal.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self, GraphError> {
        if tokens.is_empty() {
            return Err(GraphError::Empty);
        }
        let edges = tokens
            .iter()
            .map(|t| t.as_ref().parse())
            .collect::<Result<Vec<Edge>, _>>()?;
        Ok(Self::from_edges(edges))
    }

    /// Builds a graph from an explicit edge list. An empty list is a valid
    /// (trivially 3-colorable) graph.
    pub fn from_edges(edges: Vec<Edge>) -> Self {
        let mut vertices: Vec<u32> = Vec::new();
        let mut max_vertex = 0;
        for edge in &edges {
            for vertex in [edge.u, edge.v] {
                if !vertices.contains(&vertex) {
                    vertices.push(vertex);
                }
                max_vertex = max_vertex.max(vertex);
            }
        }
        Self {
            vertices,
            edges,
            max_vertex,
        }
    }

    pub fn vertices(&self) -> &[u32] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// One coloring attempt: assign each vertex one of three colors uniformly
    /// at random and collect the edges whose endpoints collide. Those edges
    /// are the removal candidate that would make this coloring proper.
    ///
    /// Returns `None` when the conflict set exceeds [`crate::MAX_EDGES`];
    /// such an attempt cannot be represented and is of no interest to the
    /// supervisor anyway.
    pub fn random_conflict_set<R: Rng>(&self, rng: &mut R) -> Option<Solution> {
        let mut colors = vec![0u8; self.max_vertex as usize + 1];
        for &vertex in &self.vertices {
            colors[vertex as usize] = rng.random_range(0..3);
        }

        let mut solution = Solution::empty();
        for &edge in &self.edges {
            if colors[edge.u as usize] == colors[edge.v as usize] && !solution.try_push(edge) {
                return None;
            }
        }
        Some(solution)
    }
}
