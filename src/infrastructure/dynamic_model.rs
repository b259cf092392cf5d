//! Live trace data source.
//!
//! Launches the external tracer with the compiled probe arguments and feeds
//! its stdout into a shared [`TraceRecorder`] from a background thread. The
//! UI thread only ever takes snapshots of the recorder.

use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::domain::callgraph::{EdgeMap, NodeMap};
use crate::domain::trace_output::TraceRecorder;
use crate::error::{Result, TraceError};
use crate::infrastructure::settings::TracerSettings;
use crate::ports::DataSource;

/// How long `stop` waits for the output readers after killing the tracer.
const READER_GRACE: Duration = Duration::from_millis(500);

/// Describes the tracer invocation for a set of probe arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracerCommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

pub fn build_tracer_command(tracer: &TracerSettings, probes: &[String]) -> TracerCommandSpec {
    TracerCommandSpec {
        program: tracer.command.clone(),
        args: tracer.flags.iter().chain(probes).cloned().collect(),
    }
}

/// State shared with the reader threads of one tracer run.
#[derive(Default)]
struct RunState {
    recorder: Mutex<TraceRecorder>,
    active: AtomicBool,
    thread_error: Mutex<Option<String>>,
    process_error: Mutex<String>,
}

pub struct DynamicModel {
    tracer: TracerSettings,
    run: Arc<RunState>,
    child: Option<Child>,
    readers: Vec<JoinHandle<()>>,
}

impl DynamicModel {
    pub fn new(tracer: TracerSettings) -> Self {
        Self {
            tracer,
            run: Arc::new(RunState::default()),
            child: None,
            readers: Vec::new(),
        }
    }

    fn spawn_stdout_reader(&self, stdout: impl Read + Send + 'static) -> JoinHandle<()> {
        let run = Arc::clone(&self.run);

        thread::spawn(move || {
            let result = for_each_line(stdout, |line| lock(&run.recorder).feed_line(line));
            if let Err(e) = result {
                warn!(error = %e, "Failed reading tracer output");
                *lock(&run.thread_error) = Some(format!("Failed reading tracer output: {}", e));
            }
            lock(&run.recorder).finish();
            run.active.store(false, Ordering::SeqCst);
            debug!("Tracer output closed");
        })
    }

    fn spawn_stderr_reader(&self, stderr: impl Read + Send + 'static) -> JoinHandle<()> {
        let run = Arc::clone(&self.run);

        thread::spawn(move || {
            let result = for_each_line(stderr, |line| {
                let mut buffer = lock(&run.process_error);
                if !buffer.is_empty() {
                    buffer.push('\n');
                }
                buffer.push_str(line);
            });
            if let Err(e) = result {
                debug!(error = %e, "Failed reading tracer stderr");
            }
        })
    }

    /// Join the readers that finish within [`READER_GRACE`]. A reader still
    /// blocked on a pipe held open by some unrelated process is detached; it
    /// only ever touches the state of its own run.
    fn join_readers(&mut self) {
        let deadline = Instant::now() + READER_GRACE;
        while self.readers.iter().any(|h| !h.is_finished()) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        for handle in self.readers.drain(..) {
            if !handle.is_finished() {
                warn!("Tracer output still open, detaching reader");
                continue;
            }
            if handle.join().is_err() {
                *lock(&self.run.thread_error) = Some("Tracer reader thread panicked".to_string());
            }
        }
    }
}

impl DataSource for DynamicModel {
    fn nodes(&self) -> NodeMap {
        lock(&self.run.recorder).graph().nodes.clone()
    }

    fn edges(&self) -> EdgeMap {
        lock(&self.run.recorder).graph().edges.clone()
    }

    fn yellow_count(&self) -> u64 {
        lock(&self.run.recorder).graph().thresholds().yellow
    }

    fn red_count(&self) -> u64 {
        lock(&self.run.recorder).graph().thresholds().red
    }

    fn max_count(&self) -> u64 {
        lock(&self.run.recorder).graph().max_count()
    }

    fn set_range(&mut self, low: u64, high: u64) {
        lock(&self.run.recorder).graph_mut().range.set(low, high);
    }

    fn start(&mut self, args: &[String]) -> Result<()> {
        self.stop();
        self.run = Arc::new(RunState::default());

        let spec = build_tracer_command(&self.tracer, args);
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            // Own process group, so stop() reaches wrappers like sudo and
            // whatever they spawn.
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        let mut child = command
            .spawn()
            .map_err(|e| TraceError::config(format!("Failed to start tracer {}: {}", spec.program, e)))?;

        self.run.active.store(true, Ordering::SeqCst);
        if let Some(stdout) = child.stdout.take() {
            let handle = self.spawn_stdout_reader(stdout);
            self.readers.push(handle);
        }
        if let Some(stderr) = child.stderr.take() {
            let handle = self.spawn_stderr_reader(stderr);
            self.readers.push(handle);
        }

        info!(pid = child.id(), program = %spec.program, probes = args.len(), "Started tracer");
        self.child = Some(child);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Ok(Some(status)) = child.try_wait() {
                if !status.success() {
                    let mut buffer = lock(&self.run.process_error);
                    if buffer.is_empty() {
                        *buffer = format!("Tracer exited with {}", status);
                    }
                }
            }
            kill_tracer(&mut child);
            if let Err(e) = child.wait() {
                warn!(error = %e, "Failed to reap tracer");
            }
            info!(pid = child.id(), "Stopped tracer");
        }

        self.join_readers();
        self.run.active.store(false, Ordering::SeqCst);
    }

    fn thread_error(&self) -> Option<String> {
        lock(&self.run.thread_error).clone()
    }

    fn process_error(&self) -> Option<String> {
        let buffer = lock(&self.run.process_error);
        (!buffer.is_empty()).then(|| buffer.clone())
    }

    fn trace_active(&self) -> bool {
        self.run.active.load(Ordering::SeqCst)
    }
}

impl Drop for DynamicModel {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Call `f` with every line of `input`, newline stripped. Bytes that are not
/// UTF-8 are replaced rather than ending the stream.
fn for_each_line(input: impl Read, mut f: impl FnMut(&str)) -> io::Result<()> {
    let mut reader = BufReader::new(input);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => return Ok(()),
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                f(line.trim_end_matches(['\n', '\r']));
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Kill the tracer's whole process group, falling back to the child alone.
#[cfg(unix)]
fn kill_tracer(child: &mut Child) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => {
            debug!(error = %e, "killpg failed");
            if let Err(e) = child.kill() {
                debug!(error = %e, "Tracer already gone");
            }
        }
    }
}

#[cfg(not(unix))]
fn kill_tracer(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(error = %e, "Tracer already gone");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait_until_inactive(model: &DynamicModel) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while model.trace_active() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_build_tracer_command_puts_flags_first() {
        let spec = build_tracer_command(
            &TracerSettings::default(),
            &["app:main".to_string(), "app:work \"%d\", arg1".to_string()],
        );
        assert_eq!(spec.program, "trace-bpfcc");
        assert_eq!(spec.args, vec!["-U", "app:main", "app:work \"%d\", arg1"]);
    }

    #[test]
    fn test_idle_model_reports_nothing() {
        let model = DynamicModel::new(TracerSettings::default());
        assert!(!model.trace_active());
        assert!(model.nodes().is_empty());
        assert!(model.thread_error().is_none());
        assert!(model.process_error().is_none());
    }

    #[test]
    fn test_missing_tracer_is_config_error() {
        let mut model = DynamicModel::new(TracerSettings {
            command: "/nonexistent/tracer".to_string(),
            flags: vec![],
        });
        let err = model.start(&["app:main".to_string()]).unwrap_err();
        assert!(err.is_config());
        assert!(!model.trace_active());
    }

    #[cfg(unix)]
    #[test]
    fn test_records_output_of_fake_tracer() {
        let script = "printf 'PID TID COMM FUNC\\n1 1 app work 5\\n1 1 app work 6\\n'; echo oops >&2";
        let mut model = DynamicModel::new(TracerSettings {
            command: "sh".to_string(),
            flags: vec!["-c".to_string(), script.to_string()],
        });
        model.start(&["app:work".to_string()]).unwrap();
        wait_until_inactive(&model);
        model.stop();

        assert!(!model.trace_active());
        assert_eq!(model.nodes()["work@app"].call_count, 2);
        assert_eq!(model.max_count(), 2);
        assert_eq!(model.process_error().as_deref(), Some("oops"));
        assert!(model.thread_error().is_none());
    }

    fn shell_tracer(script: &str) -> DynamicModel {
        DynamicModel::new(TracerSettings {
            command: "sh".to_string(),
            flags: vec!["-c".to_string(), script.to_string()],
        })
    }

    #[test]
    fn test_for_each_line_replaces_invalid_utf8() {
        let input: &[u8] = b"one\r\ntw\xffo\nthree";
        let mut lines = Vec::new();
        for_each_line(input, |line| lines.push(line.to_string())).unwrap();
        assert_eq!(lines, vec!["one", "tw\u{FFFD}o", "three"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_invalid_utf8_output_keeps_recording() {
        let mut model = shell_tracer(
            "printf 'PID TID COMM FUNC\\n1 1 app work 5\\n1 1 app work \\377\\n1 1 app work 6\\n1 1 app work 7\\n'",
        );
        model.start(&["app:work".to_string()]).unwrap();
        wait_until_inactive(&model);
        model.stop();

        assert_eq!(model.nodes()["work@app"].call_count, 4);
        assert!(model.thread_error().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_invalid_utf8_stderr_keeps_draining() {
        let mut model = shell_tracer("printf 'bad \\377\\n' >&2; echo later >&2");
        model.start(&[]).unwrap();
        wait_until_inactive(&model);
        model.stop();

        let stderr = model.process_error().unwrap();
        assert!(stderr.starts_with("bad "));
        assert!(stderr.ends_with("later"));
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_does_not_wait_for_background_children() {
        let mut model = shell_tracer(
            "(sleep 5; echo late) & printf 'PID TID COMM FUNC\\n1 1 app work 5\\n'; wait",
        );
        model.start(&["app:work".to_string()]).unwrap();
        thread::sleep(Duration::from_millis(300));

        let started = Instant::now();
        model.stop();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!model.trace_active());
        assert_eq!(model.nodes()["work@app"].call_count, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_restart_starts_from_empty_graph() {
        let mut model = shell_tracer("printf 'PID TID COMM FUNC\\n1 1 app work 5\\n'");
        model.start(&[]).unwrap();
        wait_until_inactive(&model);
        model.start(&[]).unwrap();
        wait_until_inactive(&model);
        model.stop();
        assert_eq!(model.nodes()["work@app"].call_count, 1);
    }
}
