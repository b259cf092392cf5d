//! Call Graph DOT Exporter
//!
//! Exports a VisualGraph as Graphviz DOT, node borders colored by call
//! frequency band.

use crate::domain::projection::{ColorClass, VisualGraph};
use crate::ports::GraphExporter;
use std::io::Result;

#[derive(Debug, Clone, Default)]
pub struct DotExporter {
    /// Only nodes whose id contains this text get a frequency color.
    pub search: String,
}

impl DotExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(search: impl Into<String>) -> Self {
        Self {
            search: search.into(),
        }
    }

    /// Convert a VisualGraph to a DOT string.
    pub fn to_dot(&self, graph: &VisualGraph) -> String {
        let mut lines = Vec::new();

        lines.push("digraph CallGraph {".to_string());
        lines.push("    rankdir=TB;".to_string());
        lines.push("    nodesep=0.8;".to_string());
        lines.push("    ranksep=1.0;".to_string());
        lines.push("    node [shape=box, fontname=\"Helvetica\", fontsize=12, style=filled, fillcolor=\"white\"];".to_string());
        lines.push("    edge [fontname=\"Helvetica\", fontsize=10, color=\"#cccccc\"];".to_string());
        lines.push("".to_string());

        for node in &graph.nodes {
            let color = Self::border_color(graph.color_of_matching(node, &self.search));
            lines.push(format!(
                "    \"{}\" [label=\"{}\", tooltip=\"{} ({} calls)\", color=\"{}\", fontcolor=\"{}\"];",
                Self::escape(&node.id),
                Self::escape(&node.name),
                Self::escape(&node.source),
                node.count,
                color,
                color
            ));
        }

        lines.push("".to_string());

        for edge in &graph.edges {
            lines.push(format!(
                "    \"{}\" -> \"{}\" [label=\"{}\"];",
                Self::escape(&edge.source),
                Self::escape(&edge.target),
                Self::escape(&edge.params)
            ));
        }

        lines.push("}".to_string());

        lines.join("\n")
    }

    fn border_color(class: ColorClass) -> &'static str {
        match class {
            ColorClass::Neutral => "grey",
            ColorClass::Green => "green",
            ColorClass::Yellow => "orange",
            ColorClass::Red => "red",
        }
    }

    fn escape(label: &str) -> String {
        label
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
    }
}

impl GraphExporter for DotExporter {
    fn export(&self, graph: &VisualGraph, path: &str) -> Result<()> {
        std::fs::write(path, self.to_dot(graph))
    }
}
