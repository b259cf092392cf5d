use serde::{Deserialize, Serialize};
use crate::domain::callgraph::Thresholds;
use crate::domain::projection::VisualGraph;

#[derive(Debug, Serialize, Deserialize)]
pub struct GraphDto {
    pub nodes: Vec<NodeDto>,
    pub edges: Vec<EdgeDto>,
    pub yellow_count: u64,
    pub red_count: u64,
    pub max_count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeDto {
    pub id: String,
    pub name: String,
    pub source: String,
    pub count: u64,
    pub color: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EdgeDto {
    pub source: String,
    pub target: String,
    pub caller_name: String,
    pub called_name: String,
    pub call_count: u64,
    pub params: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FunctionsDto {
    pub traced: Vec<String>,
    pub not_traced: Vec<String>,
}

impl GraphDto {
    /// Node colors honour `search` the way the graph's search box does.
    pub fn from_graph(graph: VisualGraph, search: &str) -> Self {
        let nodes = graph
            .nodes
            .iter()
            .map(|n| NodeDto {
                id: n.id.clone(),
                name: n.name.clone(),
                source: n.source.clone(),
                count: n.count,
                color: graph.color_of_matching(n, search).to_string(),
            })
            .collect();

        let edges = graph
            .edges
            .into_iter()
            .map(|e| EdgeDto {
                source: e.source,
                target: e.target,
                caller_name: e.caller_name,
                called_name: e.called_name,
                call_count: e.call_count,
                params: e.params,
            })
            .collect();

        let Thresholds { yellow, red, max } = graph.thresholds;
        GraphDto {
            nodes,
            edges,
            yellow_count: yellow,
            red_count: red,
            max_count: max,
        }
    }
}
