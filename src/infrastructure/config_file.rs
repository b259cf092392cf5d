use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::info;

use crate::domain::trace_config::TraceConfigStore;
use crate::error::{Result, TraceError};

/// Read a persisted trace configuration file.
pub fn read_trace_config(path: &Path) -> Result<String> {
    if path.is_dir() {
        return Err(TraceError::config(format!(
            "{} is a directory, not a file",
            path.display()
        )));
    }
    fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => {
            TraceError::config(format!("Could not find config file at {}", path.display()))
        }
        _ => TraceError::config(format!("Could not read config file {}: {}", path.display(), e)),
    })
}

/// Load `path` into `store`, see [`TraceConfigStore::load_from_persistent_config`].
pub fn load_trace_config(store: &mut TraceConfigStore, path: &Path) -> Result<()> {
    let content = read_trace_config(path)?;
    store.load_from_persistent_config(&content)?;
    info!(path = %path.display(), "Loaded trace configuration");
    Ok(())
}

pub fn save_trace_config(store: &TraceConfigStore, path: &Path) -> Result<()> {
    let content = store.serialize()?;
    fs::write(path, content).map_err(|e| {
        TraceError::config(format!("Could not save configuration to {}: {}", path.display(), e))
    })?;
    info!(path = %path.display(), "Saved trace configuration");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::SymbolExtractor;
    use tempfile::tempdir;

    struct OneBinary;

    impl SymbolExtractor for OneBinary {
        fn extract_symbols(&self, path: &str) -> Result<Vec<String>> {
            match path {
                "/bin/app" => Ok(vec!["main".to_string(), "work".to_string()]),
                _ => Err(TraceError::config(format!("Could not find binary at {}", path))),
            }
        }
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = read_trace_config(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("Could not find config file"));
    }

    #[test]
    fn test_directory_is_rejected() {
        let dir = tempdir().unwrap();
        let err = read_trace_config(dir.path()).unwrap_err();
        assert!(err.to_string().contains("is a directory"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.yaml");

        let mut store = TraceConfigStore::new(Box::new(OneBinary));
        store.initialize_app("/bin/app").unwrap();
        store.add_function("/bin/app", "work").unwrap();
        store.add_parameter("/bin/app", "work", "1", "%s").unwrap();
        save_trace_config(&store, &path).unwrap();

        let mut restored = TraceConfigStore::new(Box::new(OneBinary));
        load_trace_config(&mut restored, &path).unwrap();
        assert_eq!(restored.generate_arguments(), vec!["/bin/app:work \"%s\", arg1"]);
    }
}
