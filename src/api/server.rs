use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use crate::api::dto::{FunctionsDto, GraphDto};
use crate::application::TraceSession;
use crate::domain::format_spec::FormatSpec;
use crate::error::TraceError;
use crate::infrastructure::settings::Settings;

#[derive(Debug, Deserialize)]
struct CommandReq {
    command: String,
    params: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ParameterDto {
    index: String,
    format: String,
}

/// JSON-line request server in front of one [`TraceSession`].
///
/// Connections are served one after another on the calling thread, which is
/// the only owner of the session and of the editable settings.
pub struct Server {
    listener: TcpListener,
    session: TraceSession,
    settings: Settings,
}

impl Server {
    pub fn bind(address: &str, session: TraceSession, settings: Settings) -> Result<Self> {
        let listener = TcpListener::bind(address)
            .with_context(|| format!("Failed to bind to {}", address))?;
        Ok(Self {
            listener,
            session,
            settings,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until a client sends `SHUTDOWN`, then hand the session back.
    pub fn run(mut self) -> Result<TraceSession> {
        info!(address = %self.local_addr()?, "API server listening");

        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => match handle_connection(&mut self.session, &mut self.settings, stream) {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, "Connection error"),
                },
                Err(e) => warn!(error = %e, "Accept error"),
            }
        }

        info!("API server stopped");
        Ok(self.session)
    }
}

pub fn start_server(settings: Settings, session: TraceSession) -> Result<()> {
    let address = settings.server.address();
    Server::bind(&address, session, settings)?.run()?;
    Ok(())
}

/// Returns `true` once shutdown was requested.
fn handle_connection(session: &mut TraceSession, settings: &mut Settings, stream: TcpStream) -> Result<bool> {
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            return Ok(false); // Connection closed
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let (response, shutdown) = match process_command(session, settings, trimmed) {
            Ok((data, shutdown)) => (
                json!({
                    "status": "success",
                    "data": data
                }),
                shutdown,
            ),
            Err(e) => (
                json!({
                    "status": "error",
                    "kind": error_kind(&e),
                    "message": e.to_string()
                }),
                false,
            ),
        };

        let response_str = serde_json::to_string(&response)?;
        writer.write_all(response_str.as_bytes())?;
        writer.write_all(b"\n")?;

        if shutdown {
            info!("Shutdown requested");
            return Ok(true);
        }
    }
}

fn error_kind(e: &anyhow::Error) -> &'static str {
    match e.downcast_ref::<TraceError>() {
        Some(TraceError::NotFound { .. }) => "not_found",
        Some(TraceError::Config { .. }) => "config",
        None => "request",
    }
}

fn process_command(
    session: &mut TraceSession,
    settings: &mut Settings,
    json_str: &str,
) -> Result<(Value, bool)> {
    let req: CommandReq = serde_json::from_str(json_str)
        .context("Invalid JSON format")?;
    let params = req.params.unwrap_or(Value::Null);
    debug!(command = %req.command, "Request");

    let data = match req.command.as_str() {
        "PING" => json!("PONG"),
        "ADD_APP" => {
            let path = str_param(&params, "path")?;
            session.add_app(&path)?;
            json!(path)
        }
        "REMOVE_APP" => {
            session.remove_app(&str_param(&params, "path")?)?;
            Value::Null
        }
        "GET_APPS" => json!(session.get_apps()),
        "GET_FUNCTIONS" => {
            let app = str_param(&params, "app")?;
            serde_json::to_value(FunctionsDto {
                traced: session.traced_functions(&app)?,
                not_traced: session.untraced_functions(&app)?,
            })?
        }
        "ADD_FUNCTION" => {
            let (app, function) = function_params(&params)?;
            session.add_function(&app, &function)?;
            Value::Null
        }
        "REMOVE_FUNCTION" => {
            let (app, function) = function_params(&params)?;
            session.remove_function(&app, &function)?;
            Value::Null
        }
        "GET_PARAMETERS" => {
            let (app, function) = function_params(&params)?;
            let parameters: Vec<ParameterDto> = session
                .get_parameters(&app, &function)?
                .into_iter()
                .map(|(index, format)| ParameterDto { index, format })
                .collect();
            serde_json::to_value(parameters)?
        }
        "ADD_PARAMETER" => {
            let (app, function) = function_params(&params)?;
            let index = index_param(&params)?;
            let format = format_param(&params)?;
            session.add_parameter(&app, &function, &index, &format)?;
            Value::Null
        }
        "REMOVE_PARAMETER" => {
            let (app, function) = function_params(&params)?;
            session.remove_parameter(&app, &function, &index_param(&params)?)?;
            Value::Null
        }
        "GENERATE_ARGS" => json!(session.generate_arguments()),
        "LOAD_CONFIG" => {
            session.load_config(&PathBuf::from(str_param(&params, "path")?))?;
            json!(session.get_apps())
        }
        "SAVE_CONFIG" => {
            session.save_config(&PathBuf::from(str_param(&params, "path")?))?;
            Value::Null
        }
        "SUBMIT_OUTPUT" => {
            session.submit_static_output(&str_param(&params, "text")?)?;
            serde_json::to_value(session.status())?
        }
        "START_TRACE" => {
            session.start_trace()?;
            serde_json::to_value(session.status())?
        }
        "STOP_TRACE" => {
            session.stop_trace();
            serde_json::to_value(session.status())?
        }
        "SET_RANGE" => {
            session.set_range(u64_param(&params, "low")?, u64_param(&params, "high")?);
            Value::Null
        }
        "GET_GRAPH" => {
            let search = params.get("search").and_then(|v| v.as_str()).unwrap_or("");
            serde_json::to_value(GraphDto::from_graph(session.graph(), search))?
        }
        "GET_EDGE_PARAMS" => json!(session.params_of_edge(
            &str_param(&params, "caller")?,
            &str_param(&params, "callee")?
        )?),
        "GET_NODE_PARAMS" => json!(session.params_of_node(&str_param(&params, "node")?)),
        "STATUS" => serde_json::to_value(session.status())?,
        "GET_SETTINGS" => serde_json::to_value(&*settings)?,
        "SAVE_SETTINGS" => {
            // Saved settings take effect the next time the server starts.
            let path = PathBuf::from(str_param(&params, "path")?);
            if let Some(updated) = params.get("settings") {
                *settings = serde_json::from_value(updated.clone())
                    .context("Invalid 'settings' param")?;
            }
            settings.save(&path)?;
            serde_json::to_value(&*settings)?
        }
        "SHUTDOWN" => return Ok((json!("Shutting down..."), true)),
        _ => anyhow::bail!("Unknown command: {}", req.command),
    };

    Ok((data, false))
}

fn str_param(params: &Value, name: &str) -> Result<String> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Missing '{}' param", name))
}

fn function_params(params: &Value) -> Result<(String, String)> {
    Ok((str_param(params, "app")?, str_param(params, "function")?))
}

/// Parameter indices are strings in the store; numbers from the UI's
/// numeric input are coerced here.
fn index_param(params: &Value) -> Result<String> {
    match params.get("index") {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => anyhow::bail!("Missing 'index' param"),
    }
}

/// Accepts a raw format string or one of the catalogue's option values
/// (`string:%s`, `string`, `%s`).
fn format_param(params: &Value) -> Result<String> {
    let raw = str_param(params, "format")?;
    Ok(FormatSpec::from_option(&raw)
        .map(|spec| spec.specifier().to_string())
        .unwrap_or(raw))
}

fn u64_param(params: &Value, name: &str) -> Result<u64> {
    params
        .get(name)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| anyhow::anyhow!("Missing '{}' param", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_param_coerces_numbers() {
        assert_eq!(index_param(&json!({"index": 0})).unwrap(), "0");
        assert_eq!(index_param(&json!({"index": "2"})).unwrap(), "2");
        assert!(index_param(&json!({"index": ""})).is_err());
        assert!(index_param(&json!({})).is_err());
    }

    #[test]
    fn test_format_param_accepts_option_values() {
        assert_eq!(format_param(&json!({"format": "string:%s"})).unwrap(), "%s");
        assert_eq!(format_param(&json!({"format": "unsigned long"})).unwrap(), "%lu");
        assert_eq!(format_param(&json!({"format": "%5d"})).unwrap(), "%5d");
    }

    #[test]
    fn test_error_kind_reflects_trace_errors() {
        let e: anyhow::Error = TraceError::app_not_found("x").into();
        assert_eq!(error_kind(&e), "not_found");
        let e: anyhow::Error = TraceError::config("bad").into();
        assert_eq!(error_kind(&e), "config");
        assert_eq!(error_kind(&anyhow::anyhow!("Missing 'path' param")), "request");
    }
}
