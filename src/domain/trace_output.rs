//! Trace Output Parser
//!
//! Turns the text printed by the bcc `trace` tool into a call graph. Input is
//! consumed line by line so the same recorder serves both a pasted capture
//! and a live tracer's stdout.
//!
//! ```text
//! PID     TID     COMM    FUNC     -
//! 4242    4242    app     do_work  7 hello
//!         do_work+0x0 [app]
//!         main+0x2f [app]
//! ```
//!
//! The event line names the probed function and carries the captured
//! parameter values; the indented lines are the user stack, innermost frame
//! first.

use tracing::trace;

use crate::domain::callgraph::{node_id, CallGraphData};

const DEFAULT_PID_COLUMN: usize = 0;
const DEFAULT_COMM_COLUMN: usize = 2;
const DEFAULT_FUNC_COLUMN: usize = 3;
const UNKNOWN_FRAME: &str = "[unknown]";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Frame {
    name: String,
    source: String,
}

#[derive(Debug)]
struct PendingEvent {
    func: String,
    comm: String,
    params: Vec<String>,
    frames: Vec<Frame>,
}

/// Incremental recorder of tracer output.
#[derive(Debug)]
pub struct TraceRecorder {
    graph: CallGraphData,
    pid_column: usize,
    comm_column: usize,
    func_column: usize,
    pending: Option<PendingEvent>,
    events: u64,
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self {
            graph: CallGraphData::new(),
            pid_column: DEFAULT_PID_COLUMN,
            comm_column: DEFAULT_COMM_COLUMN,
            func_column: DEFAULT_FUNC_COLUMN,
            pending: None,
            events: 0,
        }
    }
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a complete capture.
    pub fn parse_text(text: &str) -> Self {
        let mut recorder = Self::new();
        for line in text.lines() {
            recorder.feed_line(line);
        }
        recorder.finish();
        recorder
    }

    pub fn feed_line(&mut self, line: &str) {
        let line = line.trim_end();
        if line.trim().is_empty() {
            self.flush();
            return;
        }

        let indented = line.starts_with(' ') || line.starts_with('\t');
        if indented {
            if let Some(event) = self.pending.as_mut() {
                event.frames.push(parse_frame(line.trim()));
            }
            return;
        }

        self.flush();
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.contains(&"PID") && tokens.contains(&"FUNC") {
            self.read_header(&tokens);
            return;
        }

        let is_event = tokens
            .get(self.pid_column)
            .is_some_and(|pid| pid.parse::<u32>().is_ok())
            && tokens.len() > self.func_column;
        if !is_event {
            trace!(line, "Ignoring unrecognised trace line");
            return;
        }

        let mut params: Vec<String> = tokens[self.func_column + 1..]
            .iter()
            .map(|t| t.to_string())
            .collect();
        if params.len() == 1 && params[0] == "-" {
            params.clear();
        }

        self.pending = Some(PendingEvent {
            func: tokens[self.func_column].to_string(),
            comm: tokens.get(self.comm_column).copied().unwrap_or_default().to_string(),
            params,
            frames: Vec::new(),
        });
    }

    /// Record the event still waiting for stack frames.
    pub fn finish(&mut self) {
        self.flush();
    }

    /// Number of trace events recorded so far.
    pub fn events(&self) -> u64 {
        self.events
    }

    pub fn graph(&self) -> &CallGraphData {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut CallGraphData {
        &mut self.graph
    }

    pub fn into_graph(mut self) -> CallGraphData {
        self.finish();
        self.graph
    }

    fn read_header(&mut self, tokens: &[&str]) {
        let position = |name: &str, default: usize| {
            tokens.iter().position(|t| *t == name).unwrap_or(default)
        };
        self.pid_column = position("PID", DEFAULT_PID_COLUMN);
        self.comm_column = position("COMM", DEFAULT_COMM_COLUMN);
        self.func_column = position("FUNC", DEFAULT_FUNC_COLUMN);
    }

    fn flush(&mut self) {
        let Some(event) = self.pending.take() else {
            return;
        };
        self.events += 1;

        if event.frames.is_empty() {
            self.graph.record_call(&event.func, &event.comm);
            return;
        }

        let traced = &event.frames[0];
        self.graph.record_call(&traced.name, &traced.source);
        let mut params = (!event.params.is_empty()).then_some(event.params);

        for pair in event.frames.windows(2) {
            let (callee, caller) = (&pair[0], &pair[1]);
            self.graph.ensure_node(&caller.name, &caller.source);
            self.graph.add_edge(
                &node_id(&caller.name, &caller.source),
                &node_id(&callee.name, &callee.source),
                params.take(),
            );
        }
    }
}

/// `symbol+0x1c [module]`, optionally wrapped as `b'...'`.
fn parse_frame(text: &str) -> Frame {
    let text = text
        .strip_prefix("b'")
        .and_then(|t| t.strip_suffix('\''))
        .unwrap_or(text);

    if text.starts_with('[') {
        return Frame {
            name: UNKNOWN_FRAME.to_string(),
            source: "unknown".to_string(),
        };
    }

    let (symbol, source) = match text.rfind(" [") {
        Some(pos) => (
            &text[..pos],
            text[pos + 2..].trim_end_matches(']').to_string(),
        ),
        None => (text, "unknown".to_string()),
    };

    let name = match symbol.rfind('+') {
        Some(pos) if symbol[pos + 1..].starts_with("0x") => &symbol[..pos],
        _ => symbol,
    };

    Frame {
        name: name.trim().to_string(),
        source,
    }
}
