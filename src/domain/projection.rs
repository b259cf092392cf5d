//! Graph Projection
//!
//! Reads one snapshot of the active data source and derives the rendering
//! ready graph: visual nodes, visual edges with summarized parameters, and
//! the color thresholds.

use serde::{Deserialize, Serialize};

use crate::domain::callgraph::{EdgeMap, NodeMap, Thresholds};
use crate::error::{Result, TraceError};
use crate::ports::DataSource;

/// Shown on an edge that recorded more than one call instance.
pub const MULTIPLE_CALLS_MARKER: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualNode {
    pub id: String,
    pub name: String,
    pub source: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualEdge {
    pub source: String,
    pub target: String,
    pub caller_name: String,
    pub called_name: String,
    pub call_count: u64,
    /// Summary of the recorded parameters, see [`summarize`].
    pub params: String,
}

/// Call frequency band of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorClass {
    /// Never called (or filtered out by a search).
    Neutral,
    Green,
    Yellow,
    Red,
}

impl ColorClass {
    /// Half-open bands: `(0, yellow)` green, `[yellow, red)` yellow, `[red, ..)` red.
    /// Requires `yellow <= red`.
    pub fn classify(count: u64, yellow: u64, red: u64) -> ColorClass {
        if count == 0 {
            ColorClass::Neutral
        } else if count >= red {
            ColorClass::Red
        } else if count >= yellow {
            ColorClass::Yellow
        } else {
            ColorClass::Green
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColorClass::Neutral => "neutral",
            ColorClass::Green => "green",
            ColorClass::Yellow => "yellow",
            ColorClass::Red => "red",
        }
    }
}

impl std::fmt::Display for ColorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Thresholds {
    pub fn classify(&self, count: u64) -> ColorClass {
        ColorClass::classify(count, self.yellow, self.red)
    }
}

/// The full visual graph derived from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualGraph {
    pub nodes: Vec<VisualNode>,
    pub edges: Vec<VisualEdge>,
    pub thresholds: Thresholds,
}

impl VisualGraph {
    pub fn color_of(&self, node: &VisualNode) -> ColorClass {
        self.thresholds.classify(node.count)
    }

    /// Like [`color_of`](Self::color_of), but nodes whose id does not contain
    /// `search` stay neutral. An empty search matches every node.
    pub fn color_of_matching(&self, node: &VisualNode, search: &str) -> ColorClass {
        if node.id.contains(search) {
            self.color_of(node)
        } else {
            ColorClass::Neutral
        }
    }
}

/// Edge parameter label: nothing for no calls, the single call's values
/// space-joined, or [`MULTIPLE_CALLS_MARKER`] when there is more than one.
pub fn summarize(params: &[Vec<String>]) -> String {
    match params {
        [] => String::new(),
        [single] => single.join(" "),
        _ => MULTIPLE_CALLS_MARKER.to_string(),
    }
}

pub fn project_nodes(source: &dyn DataSource) -> Vec<VisualNode> {
    nodes_from(&source.nodes())
}

pub fn project_edges(source: &dyn DataSource) -> Vec<VisualEdge> {
    let nodes = source.nodes();
    edges_from(&nodes, &source.edges())
}

/// Project nodes, edges and thresholds, querying the source once for each.
pub fn project(source: &dyn DataSource) -> VisualGraph {
    let nodes = source.nodes();
    let edges = source.edges();
    let thresholds = Thresholds {
        yellow: source.yellow_count(),
        red: source.red_count(),
        max: source.max_count(),
    };

    VisualGraph {
        nodes: nodes_from(&nodes),
        edges: edges_from(&nodes, &edges),
        thresholds,
    }
}

/// Every recorded call instance along `caller -> callee`.
pub fn params_of_edge(source: &dyn DataSource, caller: &str, callee: &str) -> Result<Vec<Vec<String>>> {
    source
        .edges()
        .shift_remove(&(caller.to_string(), callee.to_string()))
        .map(|edge| edge.params)
        .ok_or_else(|| TraceError::edge_not_found(caller, callee))
}

/// Every recorded call instance into `node_id`, in edge order.
pub fn params_of_node(source: &dyn DataSource, node_id: &str) -> Vec<Vec<String>> {
    source
        .edges()
        .into_iter()
        .filter(|((_, callee), _)| callee == node_id)
        .flat_map(|(_, edge)| edge.params)
        .collect()
}

fn nodes_from(nodes: &NodeMap) -> Vec<VisualNode> {
    nodes
        .iter()
        .map(|(id, node)| VisualNode {
            id: id.clone(),
            name: node.name.clone(),
            source: node.source.clone(),
            count: node.call_count,
        })
        .collect()
}

fn edges_from(nodes: &NodeMap, edges: &EdgeMap) -> Vec<VisualEdge> {
    let name_of = |id: &str| {
        nodes
            .get(id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| id.to_string())
    };

    edges
        .iter()
        .map(|((caller, callee), edge)| VisualEdge {
            source: caller.clone(),
            target: callee.clone(),
            caller_name: name_of(caller),
            called_name: name_of(callee),
            call_count: edge.call_count,
            params: summarize(&edge.params),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::callgraph::{GraphEdge, GraphNode};

    struct FixedSource {
        nodes: NodeMap,
        edges: EdgeMap,
    }

    impl DataSource for FixedSource {
        fn nodes(&self) -> NodeMap {
            self.nodes.clone()
        }
        fn edges(&self) -> EdgeMap {
            self.edges.clone()
        }
        fn yellow_count(&self) -> u64 {
            2
        }
        fn red_count(&self) -> u64 {
            5
        }
        fn max_count(&self) -> u64 {
            9
        }
        fn set_range(&mut self, _low: u64, _high: u64) {}
    }

    fn strings(values: &[&[&str]]) -> Vec<Vec<String>> {
        values
            .iter()
            .map(|call| call.iter().map(|v| v.to_string()).collect())
            .collect()
    }

    fn fixture() -> FixedSource {
        let mut nodes = NodeMap::new();
        for (id, name, source, count) in [
            ("hash1", "name1", "source1", 0),
            ("hash2", "name2", "source2", 1),
            ("hash3", "name3", "source1", 2),
        ] {
            nodes.insert(
                id.to_string(),
                GraphNode {
                    id: id.to_string(),
                    name: name.to_string(),
                    source: source.to_string(),
                    call_count: count,
                },
            );
        }

        let mut edges = EdgeMap::new();
        let mut edge = |a: &str, b: &str, params: Vec<Vec<String>>, call_count: u64| {
            edges.insert((a.to_string(), b.to_string()), GraphEdge { params, call_count });
        };
        edge("hash1", "hash2", vec![], 0);
        edge("hash1", "hash3", strings(&[&["param"]]), 3);
        edge("hash2", "hash3", strings(&[&["p1"], &["p2"], &["p3"]]), 4);

        FixedSource { nodes, edges }
    }

    #[test]
    fn test_summarize() {
        assert_eq!(summarize(&[]), "");
        assert_eq!(summarize(&strings(&[&["x"]])), "x");
        assert_eq!(summarize(&strings(&[&["x", "y"]])), "x y");
        assert_eq!(summarize(&strings(&[&[]])), "");
        assert_eq!(summarize(&strings(&[&["a"], &["b"], &["c"]])), "...");
        assert_eq!(summarize(&strings(&[&["a"], &["a"]])), "...");
    }

    #[test]
    fn test_project_nodes_keeps_order() {
        let nodes = project_nodes(&fixture());
        let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["hash1", "hash2", "hash3"]);
        assert_eq!(
            nodes[1],
            VisualNode {
                id: "hash2".into(),
                name: "name2".into(),
                source: "source2".into(),
                count: 1,
            }
        );
    }

    #[test]
    fn test_project_edges() {
        let edges = project_edges(&fixture());
        assert_eq!(edges.len(), 3);
        assert_eq!(
            edges[1],
            VisualEdge {
                source: "hash1".into(),
                target: "hash3".into(),
                caller_name: "name1".into(),
                called_name: "name3".into(),
                call_count: 3,
                params: "param".into(),
            }
        );
        assert_eq!(edges[0].params, "");
        assert_eq!(edges[2].params, "...");
        assert_eq!(edges[2].caller_name, "name2");
    }

    #[test]
    fn test_missing_node_name_falls_back_to_id() {
        let mut source = fixture();
        source.nodes.shift_remove("hash3");
        let edges = project_edges(&source);
        assert_eq!(edges[1].called_name, "hash3");
    }

    #[test]
    fn test_params_of_edge() {
        let source = fixture();
        assert!(params_of_edge(&source, "hash1", "hash2").unwrap().is_empty());
        assert_eq!(params_of_edge(&source, "hash1", "hash3").unwrap(), strings(&[&["param"]]));
        assert_eq!(
            params_of_edge(&source, "hash2", "hash3").unwrap(),
            strings(&[&["p1"], &["p2"], &["p3"]])
        );
        assert!(params_of_edge(&source, "hash3", "hash1").unwrap_err().is_not_found());
    }

    #[test]
    fn test_params_of_node_collects_incoming_only() {
        let source = fixture();
        assert!(params_of_node(&source, "hash2").is_empty());
        assert!(params_of_node(&source, "hash1").is_empty());
        assert_eq!(
            params_of_node(&source, "hash3"),
            strings(&[&["param"], &["p1"], &["p2"], &["p3"]])
        );
    }

    #[test]
    fn test_color_bands() {
        let classes: Vec<ColorClass> = [0, 1, 2, 4, 5, 9]
            .iter()
            .map(|&c| ColorClass::classify(c, 2, 5))
            .collect();
        assert_eq!(
            classes,
            vec![
                ColorClass::Neutral,
                ColorClass::Green,
                ColorClass::Yellow,
                ColorClass::Yellow,
                ColorClass::Red,
                ColorClass::Red,
            ]
        );
    }

    #[test]
    fn test_equal_thresholds_leave_no_yellow_band() {
        assert_eq!(ColorClass::classify(3, 4, 4), ColorClass::Green);
        assert_eq!(ColorClass::classify(4, 4, 4), ColorClass::Red);
    }

    #[test]
    fn test_project_uses_source_thresholds() {
        let graph = project(&fixture());
        assert_eq!(graph.thresholds, Thresholds { yellow: 2, red: 5, max: 9 });
        assert_eq!(graph.color_of(&graph.nodes[0]), ColorClass::Neutral);
        assert_eq!(graph.color_of(&graph.nodes[1]), ColorClass::Green);
        assert_eq!(graph.color_of(&graph.nodes[2]), ColorClass::Yellow);
        assert_eq!(graph.color_of_matching(&graph.nodes[2], "hash2"), ColorClass::Neutral);
        assert_eq!(graph.color_of_matching(&graph.nodes[2], ""), ColorClass::Yellow);
    }
}
