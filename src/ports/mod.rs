use crate::domain::callgraph::{EdgeMap, NodeMap};
use crate::domain::projection::VisualGraph;
use crate::error::Result;

pub mod dot_exporter;

/// Discovers the function symbols of a binary.
pub trait SymbolExtractor: Send {
    /// Symbol names in discovery order. Fails with a config error when `path`
    /// is not a readable binary.
    fn extract_symbols(&self, path: &str) -> Result<Vec<String>>;
}

/// A backing source of call graph data.
///
/// `start`, `stop`, `thread_error`, `process_error` and `trace_active` only
/// have meaning for a live trace. Sources that are not live keep the inert
/// defaults; callers must only rely on them after a trace was started.
pub trait DataSource: Send {
    fn nodes(&self) -> NodeMap;
    fn edges(&self) -> EdgeMap;
    fn yellow_count(&self) -> u64;
    fn red_count(&self) -> u64;
    fn max_count(&self) -> u64;
    fn set_range(&mut self, low: u64, high: u64);

    fn start(&mut self, _args: &[String]) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn thread_error(&self) -> Option<String> {
        None
    }

    fn process_error(&self) -> Option<String> {
        None
    }

    fn trace_active(&self) -> bool {
        false
    }
}

/// Builds the concrete data sources the model selector switches between.
pub trait ModelFactory: Send {
    fn base(&self) -> Box<dyn DataSource>;
    fn static_model(&self, text: &str) -> Result<Box<dyn DataSource>>;
    fn dynamic_model(&self) -> Box<dyn DataSource>;
}

pub trait GraphExporter {
    fn export(&self, graph: &VisualGraph, path: &str) -> std::io::Result<()>;
}
