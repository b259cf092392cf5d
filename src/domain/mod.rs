pub mod callgraph;
pub mod format_spec;
pub mod projection;
pub mod trace_config;
pub mod trace_output;
