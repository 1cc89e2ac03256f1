use std::fmt;
use std::str::FromStr;

use crate::GraphError;

/// An undirected graph edge between two vertex ids.
///
/// Plain old data, fixed size, `#[repr(C)]` so it can travel through the
/// shared-memory ring unchanged across process boundaries.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Edge {
    pub u: u32,
    pub v: u32,
}

impl Edge {
    pub const fn new(u: u32, v: u32) -> Self {
        Self { u, v }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.u, self.v)
    }
}

impl FromStr for Edge {
    type Err = GraphError;

    /// Parses an edge token of the form `<u>-<v>` with non-negative decimal
    /// vertex ids. Anything else (missing dash, empty side, sign characters,
    /// trailing garbage such as `1-2-3`) is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || GraphError::BadEdgeToken {
            token: s.to_string(),
        };

        let parse_vertex = |part: &str| -> Result<u32, GraphError> {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(bad());
            }
            part.parse().map_err(|_| bad())
        };

        let (u, v) = s.split_once('-').ok_or_else(bad)?;
        Ok(Edge::new(parse_vertex(u)?, parse_vertex(v)?))
    }
}
