//! Active-Model Selector
//!
//! Holds exactly one data source and the state tag describing it. Every
//! graph and count query is answered by the active source.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::callgraph::{EdgeMap, NodeMap};
use crate::error::Result;
use crate::ports::{DataSource, ModelFactory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelState {
    /// No trace data yet.
    Base,
    /// Replaying submitted tracer output.
    Static,
    /// Attached to a tracer process, running or stopped.
    Dynamic,
}

pub struct ModelSelector {
    state: ModelState,
    model: Box<dyn DataSource>,
    factory: Box<dyn ModelFactory>,
}

impl ModelSelector {
    pub fn new(factory: Box<dyn ModelFactory>) -> Self {
        let model = factory.base();
        Self {
            state: ModelState::Base,
            model,
            factory,
        }
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    /// The source currently answering queries.
    pub fn active(&self) -> &dyn DataSource {
        self.model.as_ref()
    }

    /// Replace the active source with a replay of `text`. On error the
    /// current source stays active.
    pub fn submit_static_output(&mut self, text: &str) -> Result<()> {
        let model = self.factory.static_model(text)?;
        self.activate(ModelState::Static, model);
        Ok(())
    }

    /// Launch a new live trace with the compiled probe arguments. A previous
    /// live trace is stopped first; if the new one fails to start the
    /// previous source stays active.
    pub fn start_trace(&mut self, args: &[String]) -> Result<()> {
        if self.state == ModelState::Dynamic {
            self.model.stop();
        }
        let mut model = self.factory.dynamic_model();
        model.start(args)?;
        self.activate(ModelState::Dynamic, model);
        Ok(())
    }

    /// Stop the live trace. The state stays `Dynamic` so the recorded
    /// counts remain visible. Only meaningful after [`start_trace`](Self::start_trace).
    pub fn stop_trace(&mut self) {
        self.model.stop();
        info!(state = ?self.state, "Stopped trace");
    }

    pub fn get_nodes(&self) -> NodeMap {
        self.model.nodes()
    }

    pub fn get_edges(&self) -> EdgeMap {
        self.model.edges()
    }

    pub fn yellow_count(&self) -> u64 {
        self.model.yellow_count()
    }

    pub fn red_count(&self) -> u64 {
        self.model.red_count()
    }

    pub fn max_count(&self) -> u64 {
        self.model.max_count()
    }

    pub fn set_range(&mut self, low: u64, high: u64) {
        self.model.set_range(low, high);
    }

    pub fn thread_error(&self) -> Option<String> {
        self.model.thread_error()
    }

    pub fn process_error(&self) -> Option<String> {
        self.model.process_error()
    }

    pub fn trace_active(&self) -> bool {
        self.model.trace_active()
    }

    fn activate(&mut self, state: ModelState, model: Box<dyn DataSource>) {
        info!(from = ?self.state, to = ?state, "Switching data source");
        self.state = state;
        self.model = model;
    }
}
