//! Application settings.
//!
//! Stored as TOML; every field has a default so a partial (or missing) file
//! is fine:
//!
//! ```toml
//! [tracer]
//! command = "trace-bpfcc"
//! flags = ["-U"]
//!
//! [server]
//! host = "127.0.0.1"
//! port = 4599
//!
//! [display]
//! poll_interval_ms = 500
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tracer: TracerSettings,
    pub server: ServerSettings,
    pub display: DisplaySettings,
}

/// How the external tracer is launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerSettings {
    pub command: String,
    /// Placed before the compiled probe arguments. `-U` asks for user stacks,
    /// which is where caller -> callee edges come from.
    pub flags: Vec<String>,
}

impl Default for TracerSettings {
    fn default() -> Self {
        Self {
            command: "trace-bpfcc".to_string(),
            flags: vec!["-U".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4599,
        }
    }
}

impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub poll_interval_ms: u64,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
        }
    }
}

impl DisplaySettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Settings {
    /// Read settings from `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Invalid settings file {}", path.display()))?;
        info!(path = %path.display(), tracer = %settings.tracer.command, "Loaded settings");
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write settings file {}", path.display()))?;
        info!(path = %path.display(), "Saved settings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.tracer.command, "trace-bpfcc");
        assert_eq!(settings.tracer.flags, vec!["-U"]);
        assert_eq!(settings.server.address(), "127.0.0.1:4599");
        assert_eq!(settings.display.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tracewatch.toml");
        fs::write(&path, "[tracer]\ncommand = \"/usr/share/bcc/tools/trace\"\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.tracer.command, "/usr/share/bcc/tools/trace");
        assert_eq!(settings.tracer.flags, vec!["-U"]);
        assert_eq!(settings.server.port, 4599);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tracewatch.toml");
        let mut settings = Settings::default();
        settings.server.port = 5000;
        settings.display.poll_interval_ms = 250;
        settings.save(&path).unwrap();

        assert_eq!(Settings::load(Some(&path)).unwrap(), settings);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[tracer\n").unwrap();
        assert!(Settings::load(Some(&path)).is_err());
        assert!(Settings::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
