//! Trace Configuration Store
//!
//! Tracks which functions (and which of their parameters) of which
//! applications are traced, and compiles that state into the argument list
//! the external tracer expects.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, TraceError};
use crate::ports::SymbolExtractor;

/// Trace state of one function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionEntry {
    pub traced: bool,
    /// Parameter index -> format string, in insertion order.
    pub parameters: IndexMap<String, String>,
}

/// Function name -> trace state, in symbol discovery order.
pub type ApplicationConfig = IndexMap<String, FunctionEntry>;

/// Persisted form: application -> traced function -> parameter index -> format.
pub type PersistedConfig = IndexMap<String, IndexMap<String, IndexMap<String, String>>>;

pub struct TraceConfigStore {
    apps: IndexMap<String, ApplicationConfig>,
    extractor: Box<dyn SymbolExtractor>,
}

impl TraceConfigStore {
    pub fn new(extractor: Box<dyn SymbolExtractor>) -> Self {
        Self {
            apps: IndexMap::new(),
            extractor,
        }
    }

    /// (Re)initialize `path` with every discovered symbol untraced.
    /// Any previous configuration for `path` is discarded.
    pub fn initialize_app(&mut self, path: &str) -> Result<()> {
        let config = self.fresh_app_config(path)?;
        info!(app = path, functions = config.len(), "Initialized application");
        self.apps.insert(path.to_string(), config);
        Ok(())
    }

    pub fn remove_app(&mut self, path: &str) -> Result<()> {
        self.apps
            .shift_remove(path)
            .ok_or_else(|| TraceError::app_not_found(path))?;
        info!(app = path, "Removed application");
        Ok(())
    }

    pub fn get_apps(&self) -> Vec<String> {
        self.apps.keys().cloned().collect()
    }

    pub fn get_functions_of_app(&self, path: &str) -> Result<&ApplicationConfig> {
        self.apps
            .get(path)
            .ok_or_else(|| TraceError::app_not_found(path))
    }

    /// Names of traced functions, in symbol order.
    pub fn traced_functions(&self, path: &str) -> Result<Vec<String>> {
        self.functions_where(path, true)
    }

    /// Names of functions not traced, in symbol order.
    pub fn untraced_functions(&self, path: &str) -> Result<Vec<String>> {
        self.functions_where(path, false)
    }

    pub fn set_function_traced(&mut self, path: &str, function: &str, traced: bool) -> Result<()> {
        self.entry_mut(path, function)?.traced = traced;
        debug!(app = path, function, traced, "Updated trace flag");
        Ok(())
    }

    pub fn add_function(&mut self, path: &str, function: &str) -> Result<()> {
        self.set_function_traced(path, function, true)
    }

    /// Stop tracing `function`. Its parameter setup is kept.
    pub fn remove_function(&mut self, path: &str, function: &str) -> Result<()> {
        self.set_function_traced(path, function, false)
    }

    pub fn get_parameters(&self, path: &str, function: &str) -> Result<&IndexMap<String, String>> {
        Ok(&self.entry(path, function)?.parameters)
    }

    /// Insert or overwrite the format for `index`. An overwritten index keeps
    /// its position in the format string.
    pub fn add_parameter(&mut self, path: &str, function: &str, index: &str, format: &str) -> Result<()> {
        let entry = self.entry_mut(path, function)?;
        if index.trim().is_empty() {
            return Err(TraceError::config(format!(
                "Parameter index of {}:{} must not be empty",
                path, function
            )));
        }
        if format.trim().is_empty() {
            return Err(TraceError::config(format!(
                "Format of parameter {} of {}:{} must not be empty",
                index, path, function
            )));
        }
        entry.parameters.insert(index.to_string(), format.to_string());
        debug!(app = path, function, index, format, "Added parameter");
        Ok(())
    }

    pub fn remove_parameter(&mut self, path: &str, function: &str, index: &str) -> Result<()> {
        self.entry_mut(path, function)?
            .parameters
            .shift_remove(index)
            .ok_or_else(|| TraceError::parameter_not_found(path, function, index))?;
        debug!(app = path, function, index, "Removed parameter");
        Ok(())
    }

    /// Compile the traced functions into tracer probe arguments:
    /// `app:function` or `app:function "fmt1 fmt2", arg<i1>, arg<i2>`.
    pub fn generate_arguments(&self) -> Vec<String> {
        let mut arguments = Vec::new();
        for (app, functions) in &self.apps {
            for (function, entry) in functions {
                if !entry.traced {
                    continue;
                }
                let mut argument = format!("{}:{}", app, function);
                if !entry.parameters.is_empty() {
                    let formats: Vec<&str> = entry.parameters.values().map(String::as_str).collect();
                    let args: Vec<String> = entry
                        .parameters
                        .keys()
                        .map(|index| format!("arg{}", index))
                        .collect();
                    argument = format!("{} \"{}\", {}", argument, formats.join(" "), args.join(", "));
                }
                arguments.push(argument);
            }
        }
        arguments
    }

    /// The persisted form of the current state: every application, with its
    /// traced functions and their parameters.
    pub fn to_persisted(&self) -> PersistedConfig {
        self.apps
            .iter()
            .map(|(app, functions)| {
                let traced = functions
                    .iter()
                    .filter(|(_, entry)| entry.traced)
                    .map(|(name, entry)| (name.clone(), entry.parameters.clone()))
                    .collect();
                (app.clone(), traced)
            })
            .collect()
    }

    pub fn serialize(&self) -> Result<String> {
        serde_yaml::to_string(&self.to_persisted())
            .map_err(|e| TraceError::config(format!("Could not serialize configuration: {}", e)))
    }

    /// Replace the configuration of every application named in `content`.
    ///
    /// Each application is rebuilt from a fresh symbol scan and only swapped
    /// in once all of its functions and parameters applied cleanly. A failing
    /// application keeps its previous state; the remaining ones still load and
    /// the failures are reported together as one config error.
    pub fn load_from_persistent_config(&mut self, content: &str) -> Result<()> {
        let persisted = parse_persisted(content)?;
        let mut failures = Vec::new();

        for (app, functions) in &persisted {
            match self.build_app_config(app, functions) {
                Ok(config) => {
                    self.apps.insert(app.clone(), config);
                    info!(app = app.as_str(), traced = functions.len(), "Loaded application config");
                }
                Err(e) => {
                    warn!(app = app.as_str(), error = %e, "Skipping application");
                    failures.push(format!("{}: {}", app, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(TraceError::config(failures.join("; ")))
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Private helpers
    // ─────────────────────────────────────────────────────────────────────

    fn fresh_app_config(&self, path: &str) -> Result<ApplicationConfig> {
        let symbols = self.extractor.extract_symbols(path)?;
        Ok(symbols
            .into_iter()
            .map(|symbol| (symbol, FunctionEntry::default()))
            .collect())
    }

    fn build_app_config(
        &self,
        app: &str,
        functions: &IndexMap<String, IndexMap<String, String>>,
    ) -> Result<ApplicationConfig> {
        let mut config = self.fresh_app_config(app)?;
        for (function, parameters) in functions {
            let entry = config.get_mut(function).ok_or_else(|| {
                TraceError::config(format!("No function named {} was found in {}", function, app))
            })?;
            entry.traced = true;
            for (index, format) in parameters {
                entry.parameters.insert(index.clone(), format.clone());
            }
        }
        Ok(config)
    }

    fn functions_where(&self, path: &str, traced: bool) -> Result<Vec<String>> {
        Ok(self
            .get_functions_of_app(path)?
            .iter()
            .filter(|(_, entry)| entry.traced == traced)
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn entry(&self, path: &str, function: &str) -> Result<&FunctionEntry> {
        self.get_functions_of_app(path)?
            .get(function)
            .ok_or_else(|| TraceError::function_not_found(path, function))
    }

    fn entry_mut(&mut self, path: &str, function: &str) -> Result<&mut FunctionEntry> {
        self.apps
            .get_mut(path)
            .ok_or_else(|| TraceError::app_not_found(path))?
            .get_mut(function)
            .ok_or_else(|| TraceError::function_not_found(path, function))
    }
}

/// Parse and validate the persisted 3-level mapping. Scalar keys (numeric
/// parameter indices in particular) are coerced to strings.
pub fn parse_persisted(content: &str) -> Result<PersistedConfig> {
    let root: Value = serde_yaml::from_str(content)
        .map_err(|e| TraceError::config(format!("File format is incorrect: {}", e)))?;

    let apps = match root {
        Value::Mapping(apps) => apps,
        _ => return Err(malformed("top level must map applications to functions")),
    };

    let mut persisted = PersistedConfig::new();
    for (app, functions) in apps {
        let app = scalar_key(&app).ok_or_else(|| malformed("application paths must be strings"))?;
        let mut traced = IndexMap::new();
        for (function, parameters) in as_mapping(functions, &app)? {
            let function = scalar_key(&function)
                .ok_or_else(|| malformed(&format!("function names of {} must be strings", app)))?;
            let mut params = IndexMap::new();
            for (index, format) in as_mapping(parameters, &function)? {
                let index = scalar_key(&index)
                    .ok_or_else(|| malformed(&format!("parameter indices of {} must be scalars", function)))?;
                let format = match format {
                    Value::String(s) if !s.trim().is_empty() => s,
                    _ => {
                        return Err(malformed(&format!(
                            "parameter {} of {} needs a non-empty format string",
                            index, function
                        )))
                    }
                };
                params.insert(index, format);
            }
            traced.insert(function, params);
        }
        persisted.insert(app, traced);
    }
    Ok(persisted)
}

/// `null` stands for an empty level.
fn as_mapping(value: Value, owner: &str) -> Result<serde_yaml::Mapping> {
    match value {
        Value::Mapping(m) => Ok(m),
        Value::Null => Ok(serde_yaml::Mapping::new()),
        _ => Err(malformed(&format!("entry {} must be a mapping", owner))),
    }
}

fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn malformed(detail: &str) -> TraceError {
    TraceError::config(format!("File format is incorrect: {}", detail))
}
