// Raw call graph structures recorded from tracer output.
// Nodes are functions, edges are caller -> callee calls.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// `(caller_id, callee_id)`
pub type EdgeKey = (String, String);

/// A function seen in the trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub source: String, // module/binary the symbol lives in
    pub call_count: u64,
}

/// Calls recorded along one caller -> callee edge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// One entry per recorded call instance, each holding that call's
    /// captured parameter values.
    pub params: Vec<Vec<String>>,
    pub call_count: u64,
}

pub type NodeMap = IndexMap<String, GraphNode>;
pub type EdgeMap = IndexMap<EdgeKey, GraphEdge>;

/// Color thresholds derived from (or imposed on) the recorded counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub yellow: u64,
    pub red: u64,
    pub max: u64,
}

/// Optional user override of the yellow/red thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountRange {
    custom: Option<(u64, u64)>,
}

impl CountRange {
    /// Fix the thresholds. Bounds are sorted so yellow never exceeds red.
    pub fn set(&mut self, low: u64, high: u64) {
        self.custom = Some((low.min(high), low.max(high)));
    }

    /// Resolve against the current maximum count. Without an override the
    /// range is split in thirds: `yellow = ceil(max/3)`, `red = ceil(2*max/3)`.
    pub fn resolve(&self, max: u64) -> Thresholds {
        let (yellow, red) = match self.custom {
            Some(range) => range,
            None => {
                let yellow = max.div_ceil(3).max(1);
                let red = (2 * max).div_ceil(3).max(yellow);
                (yellow, red)
            }
        };
        Thresholds { yellow, red, max }
    }
}

/// The call graph for one trace session.
#[derive(Debug, Clone, Default)]
pub struct CallGraphData {
    pub nodes: NodeMap,
    pub edges: EdgeMap,
    pub range: CountRange,
}

impl CallGraphData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the node if missing and return it.
    pub fn ensure_node(&mut self, name: &str, source: &str) -> &mut GraphNode {
        let id = node_id(name, source);
        self.nodes.entry(id.clone()).or_insert_with(|| GraphNode {
            id,
            name: name.to_string(),
            source: source.to_string(),
            call_count: 0,
        })
    }

    pub fn record_call(&mut self, name: &str, source: &str) {
        self.ensure_node(name, source).call_count += 1;
    }

    /// Count one call along `caller -> callee`, attaching `params` when given.
    pub fn add_edge(&mut self, caller_id: &str, callee_id: &str, params: Option<Vec<String>>) {
        let edge = self
            .edges
            .entry((caller_id.to_string(), callee_id.to_string()))
            .or_default();
        edge.call_count += 1;
        if let Some(params) = params {
            edge.params.push(params);
        }
    }

    pub fn max_count(&self) -> u64 {
        self.nodes.values().map(|n| n.call_count).max().unwrap_or(0)
    }

    pub fn thresholds(&self) -> Thresholds {
        self.range.resolve(self.max_count())
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Stable node identifier for a symbol within a module.
pub fn node_id(name: &str, source: &str) -> String {
    format!("{}@{}", name, source)
}
