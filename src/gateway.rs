//! # Scripting Gateway
//!
//! Runs a single automation command against the player through an external
//! interpreter process (`osascript -e <script>` on macOS) and hands back the
//! captured standard output.
//!
//! The gateway owns no state and never retries. Retry policy belongs to the
//! detector, which simply re-observes the player on its next check.
//!
//! ## Serialization
//!
//! The agent talks to the player from two threads (the playback watcher and
//! the detector loop). [`SerializedGateway`] wraps any gateway in a mutex so
//! that at most one automation call is in flight at any time.

use log::debug;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::string::FromUtf8Error;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default interpreter used to talk to the player
pub const OSASCRIPT: &str = "/usr/bin/osascript";

/// How often a running interpreter is polled for completion
const WAIT_STEP: Duration = Duration::from_millis(10);

/// Failures of a single automation call.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The interpreter process could not be started.
    #[error("failed to launch {interpreter}: {source}")]
    LaunchFailed {
        interpreter: String,
        #[source]
        source: io::Error,
    },

    /// The interpreter ran but reported failure.
    #[error("script exited with {status}: {stderr}")]
    NonZeroExit { status: String, stderr: String },

    /// The interpreter output was not valid UTF-8.
    #[error("script output is not valid UTF-8: {0}")]
    DecodeFailed(#[from] FromUtf8Error),

    /// The interpreter did not finish in time and was killed.
    #[error("script did not finish within {0:?}")]
    TimedOut(Duration),

    /// Waiting on the interpreter process failed.
    #[error("failed to wait for script: {0}")]
    WaitFailed(#[source] io::Error),
}

/// Executes automation commands against the player.
pub trait ScriptGateway {
    /// Run `script` synchronously and return its standard output.
    fn execute(&self, script: &str) -> Result<String, GatewayError>;
}

/// Gateway backed by a command-line script interpreter.
///
/// The script is passed as the argument following `flag`, so the default
/// configuration runs `osascript -e <script>`.
#[derive(Debug, Clone)]
pub struct CommandGateway {
    interpreter: PathBuf,
    flag: String,
    timeout: Option<Duration>,
}

impl Default for CommandGateway {
    fn default() -> Self {
        Self::osascript(Some(Duration::from_secs(5)))
    }
}

impl CommandGateway {
    /// Create a gateway for an arbitrary interpreter
    pub fn new(interpreter: impl Into<PathBuf>, flag: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            flag: flag.into(),
            timeout: None,
        }
    }

    /// Create the AppleScript gateway used on macOS
    pub fn osascript(timeout: Option<Duration>) -> Self {
        Self::new(OSASCRIPT, "-e").with_timeout(timeout)
    }

    /// Kill scripts that run longer than `timeout` (`None` waits forever)
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn interpreter_name(&self) -> String {
        self.interpreter.display().to_string()
    }

    /// Poll the child until it exits, killing it once the timeout passes.
    fn wait_for_exit(&self, child: &mut Child) -> Result<ExitStatus, GatewayError> {
        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {}
                Err(e) => return Err(GatewayError::WaitFailed(e)),
            }

            if let Some(limit) = self.timeout {
                if started.elapsed() >= limit {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(GatewayError::TimedOut(limit));
                }
            }
            thread::sleep(WAIT_STEP);
        }
    }
}

/// Read a child pipe to the end on its own thread, so a chatty script never
/// blocks on a full pipe while we wait for it.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn collect(reader: JoinHandle<io::Result<Vec<u8>>>) -> Result<Vec<u8>, GatewayError> {
    reader
        .join()
        .map_err(|_| GatewayError::WaitFailed(io::Error::other("pipe reader panicked")))?
        .map_err(GatewayError::WaitFailed)
}

impl ScriptGateway for CommandGateway {
    fn execute(&self, script: &str) -> Result<String, GatewayError> {
        debug!("Executing script: {script}");

        let mut child = Command::new(&self.interpreter)
            .arg(&self.flag)
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| GatewayError::LaunchFailed {
                interpreter: self.interpreter_name(),
                source,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        // On timeout the readers are left to finish once the pipes close.
        let status = self.wait_for_exit(&mut child)?;
        let stdout = collect(stdout)?;
        let stderr = collect(stderr)?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(GatewayError::NonZeroExit {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8(stdout)?)
    }
}

/// Shares one gateway between threads, allowing one call at a time.
#[derive(Debug)]
pub struct SerializedGateway<G> {
    inner: Arc<Mutex<G>>,
}

impl<G> Clone for SerializedGateway<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G: ScriptGateway> SerializedGateway<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            inner: Arc::new(Mutex::new(gateway)),
        }
    }
}

impl<G: ScriptGateway> ScriptGateway for SerializedGateway<G> {
    fn execute(&self, script: &str) -> Result<String, GatewayError> {
        // A panic inside another call leaves the gateway itself intact.
        let gateway = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        gateway.execute(script)
    }
}
