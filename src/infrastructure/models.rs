// Data sources with no live process behind them, and the factory the model
// selector uses to build every kind of source.

use tracing::info;

use crate::domain::callgraph::{CallGraphData, EdgeMap, NodeMap};
use crate::domain::trace_output::TraceRecorder;
use crate::error::{Result, TraceError};
use crate::infrastructure::dynamic_model::DynamicModel;
use crate::infrastructure::settings::TracerSettings;
use crate::ports::{DataSource, ModelFactory};

/// The idle source: no trace data at all.
#[derive(Debug, Default)]
pub struct BaseModel {
    graph: CallGraphData,
}

impl BaseModel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataSource for BaseModel {
    fn nodes(&self) -> NodeMap {
        NodeMap::new()
    }

    fn edges(&self) -> EdgeMap {
        EdgeMap::new()
    }

    fn yellow_count(&self) -> u64 {
        self.graph.thresholds().yellow
    }

    fn red_count(&self) -> u64 {
        self.graph.thresholds().red
    }

    fn max_count(&self) -> u64 {
        0
    }

    fn set_range(&mut self, low: u64, high: u64) {
        self.graph.range.set(low, high);
    }
}

/// Replays a previously captured tracer output.
#[derive(Debug)]
pub struct StaticModel {
    graph: CallGraphData,
}

impl StaticModel {
    /// Fails with a config error when `text` holds no trace event.
    pub fn load_text(text: &str) -> Result<Self> {
        let recorder = TraceRecorder::parse_text(text);
        if recorder.events() == 0 {
            return Err(TraceError::config("No trace events found in the submitted output"));
        }
        info!(
            events = recorder.events(),
            nodes = recorder.graph().nodes.len(),
            "Loaded static trace output"
        );
        Ok(Self {
            graph: recorder.into_graph(),
        })
    }
}

impl DataSource for StaticModel {
    fn nodes(&self) -> NodeMap {
        self.graph.nodes.clone()
    }

    fn edges(&self) -> EdgeMap {
        self.graph.edges.clone()
    }

    fn yellow_count(&self) -> u64 {
        self.graph.thresholds().yellow
    }

    fn red_count(&self) -> u64 {
        self.graph.thresholds().red
    }

    fn max_count(&self) -> u64 {
        self.graph.max_count()
    }

    fn set_range(&mut self, low: u64, high: u64) {
        self.graph.range.set(low, high);
    }
}

/// Builds base, static and tracer-backed dynamic sources.
#[derive(Debug, Clone, Default)]
pub struct TracerModelFactory {
    tracer: TracerSettings,
}

impl TracerModelFactory {
    pub fn new(tracer: TracerSettings) -> Self {
        Self { tracer }
    }
}

impl ModelFactory for TracerModelFactory {
    fn base(&self) -> Box<dyn DataSource> {
        Box::new(BaseModel::new())
    }

    fn static_model(&self, text: &str) -> Result<Box<dyn DataSource>> {
        Ok(Box::new(StaticModel::load_text(text)?))
    }

    fn dynamic_model(&self) -> Box<dyn DataSource> {
        Box::new(DynamicModel::new(self.tracer.clone()))
    }
}
