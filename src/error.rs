//! Error types shared by the trace configuration store, the model selector
//! and the graph projection.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TraceError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    /// A referenced application, function, parameter index or edge does not exist.
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// External input is malformed or unreachable (binary, config file, trace text).
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl TraceError {
    pub fn app_not_found(app: &str) -> Self {
        TraceError::NotFound {
            kind: "Application",
            key: app.to_string(),
        }
    }

    pub fn function_not_found(app: &str, function: &str) -> Self {
        TraceError::NotFound {
            kind: "Function",
            key: format!("{} in {}", function, app),
        }
    }

    pub fn parameter_not_found(app: &str, function: &str, index: &str) -> Self {
        TraceError::NotFound {
            kind: "Parameter",
            key: format!("{} of {}:{}", index, app, function),
        }
    }

    pub fn edge_not_found(caller: &str, callee: &str) -> Self {
        TraceError::NotFound {
            kind: "Edge",
            key: format!("{} -> {}", caller, callee),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        TraceError::Config {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TraceError::NotFound { .. })
    }

    pub fn is_config(&self) -> bool {
        matches!(self, TraceError::Config { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_missing_entity() {
        let err = TraceError::function_not_found("/bin/app", "do_work");
        assert_eq!(err.to_string(), "Function not found: do_work in /bin/app");
        assert!(err.is_not_found());

        let err = TraceError::config("File format is incorrect");
        assert_eq!(err.to_string(), "Configuration error: File format is incorrect");
        assert!(err.is_config());
    }
}
