pub mod selector;

use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

use crate::domain::projection::{self, VisualGraph};
use crate::domain::trace_config::TraceConfigStore;
use crate::error::Result;
use crate::infrastructure::config_file;
use crate::ports::{ModelFactory, SymbolExtractor};
use selector::{ModelSelector, ModelState};

/// Trace status shown next to the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceStatus {
    pub state: ModelState,
    pub trace_active: bool,
    pub thread_error: Option<String>,
    pub process_error: Option<String>,
}

/// Everything one UI session works on: the trace configuration and the
/// selector over the data sources.
pub struct TraceSession {
    store: TraceConfigStore,
    selector: ModelSelector,
}

impl TraceSession {
    pub fn new(extractor: Box<dyn SymbolExtractor>, factory: Box<dyn ModelFactory>) -> Self {
        Self {
            store: TraceConfigStore::new(extractor),
            selector: ModelSelector::new(factory),
        }
    }

    // ── configuration ────────────────────────────────────────────────────

    pub fn add_app(&mut self, path: &str) -> Result<()> {
        self.store.initialize_app(path)
    }

    pub fn remove_app(&mut self, path: &str) -> Result<()> {
        self.store.remove_app(path)
    }

    pub fn get_apps(&self) -> Vec<String> {
        self.store.get_apps()
    }

    pub fn traced_functions(&self, app: &str) -> Result<Vec<String>> {
        self.store.traced_functions(app)
    }

    pub fn untraced_functions(&self, app: &str) -> Result<Vec<String>> {
        self.store.untraced_functions(app)
    }

    pub fn add_function(&mut self, app: &str, function: &str) -> Result<()> {
        self.store.add_function(app, function)
    }

    pub fn remove_function(&mut self, app: &str, function: &str) -> Result<()> {
        self.store.remove_function(app, function)
    }

    pub fn get_parameters(&self, app: &str, function: &str) -> Result<IndexMap<String, String>> {
        self.store.get_parameters(app, function).cloned()
    }

    pub fn add_parameter(&mut self, app: &str, function: &str, index: &str, format: &str) -> Result<()> {
        self.store.add_parameter(app, function, index, format)
    }

    pub fn remove_parameter(&mut self, app: &str, function: &str, index: &str) -> Result<()> {
        self.store.remove_parameter(app, function, index)
    }

    pub fn generate_arguments(&self) -> Vec<String> {
        self.store.generate_arguments()
    }

    pub fn load_config(&mut self, path: &Path) -> Result<()> {
        config_file::load_trace_config(&mut self.store, path)
    }

    pub fn save_config(&self, path: &Path) -> Result<()> {
        config_file::save_trace_config(&self.store, path)
    }

    // ── data source transitions ──────────────────────────────────────────

    pub fn submit_static_output(&mut self, text: &str) -> Result<()> {
        self.selector.submit_static_output(text)
    }

    /// Start a live trace of everything currently marked as traced.
    pub fn start_trace(&mut self) -> Result<()> {
        let args = self.store.generate_arguments();
        info!(probes = args.len(), "Starting trace");
        self.selector.start_trace(&args)
    }

    pub fn stop_trace(&mut self) {
        self.selector.stop_trace();
    }

    pub fn set_range(&mut self, low: u64, high: u64) {
        self.selector.set_range(low, high);
    }

    pub fn status(&self) -> TraceStatus {
        TraceStatus {
            state: self.selector.state(),
            trace_active: self.selector.trace_active(),
            thread_error: self.selector.thread_error(),
            process_error: self.selector.process_error(),
        }
    }

    // ── projection ───────────────────────────────────────────────────────

    pub fn graph(&self) -> VisualGraph {
        projection::project(self.selector.active())
    }

    pub fn params_of_edge(&self, caller: &str, callee: &str) -> Result<Vec<Vec<String>>> {
        projection::params_of_edge(self.selector.active(), caller, callee)
    }

    pub fn params_of_node(&self, node_id: &str) -> Vec<Vec<String>> {
        projection::params_of_node(self.selector.active(), node_id)
    }
}
