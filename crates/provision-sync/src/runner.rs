//! External command execution.
//!
//! Every tool the engine drives (git, aria2c, vendor GPU utilities) is
//! invoked through the [`CommandRunner`] trait so that reconciliation logic
//! can be exercised with [`ScriptedRunner`] instead of real processes.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    /// Kill the process if it runs longer than this.
    pub timeout: Option<Duration>,
    /// Capture stdout/stderr. When false the child inherits the terminal.
    pub capture: bool,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: Vec::new(),
            cwd: None,
            timeout: None,
            capture: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn inherit_output(mut self) -> Self {
        self.capture = false;
        self
    }

    /// Shell-like rendering for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What a finished process produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        CommandOutput {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        CommandOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Last non-empty stderr line, or the exit status when stderr is empty.
    pub fn stderr_summary(&self) -> String {
        self.stderr
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .map(str::to_string)
            .unwrap_or_else(|| match self.code {
                Some(code) => format!("exit status {code}"),
                None => "terminated by signal".to_string(),
            })
    }
}

/// Why a command could not produce an output.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The program is not installed or not on `PATH`.
    #[error("{program} not found")]
    NotFound { program: String },

    /// The process exceeded its timeout and was killed.
    #[error("{program} timed out after {}s", .timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },

    /// Spawning or waiting failed for another reason.
    #[error("running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs external commands.
pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunError> {
        let io_err = |source: std::io::Error| {
            if source.kind() == std::io::ErrorKind::NotFound {
                RunError::NotFound {
                    program: invocation.program.clone(),
                }
            } else {
                RunError::Io {
                    program: invocation.program.clone(),
                    source,
                }
            }
        };

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        command.envs(invocation.env.iter().map(|(k, v)| (k, v)));
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }
        if invocation.capture {
            command
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        }

        tracing::debug!(command = %invocation.command_line(), "spawning");
        let mut child = command.spawn().map_err(io_err)?;
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let status = match invocation.timeout {
            None => child.wait().map_err(io_err)?,
            Some(timeout) => match wait_with_deadline(&mut child, timeout).map_err(io_err)? {
                Some(status) => status,
                // Readers are left detached: a grandchild may still hold the pipes.
                None => {
                    return Err(RunError::TimedOut {
                        program: invocation.program.clone(),
                        timeout,
                    })
                }
            },
        };

        Ok(CommandOutput {
            code: status.code(),
            stdout: join_reader(stdout),
            stderr: join_reader(stderr),
        })
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Wait for `child` until `timeout` elapses. Returns `None` after killing it.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

type Handler = dyn Fn(&Invocation) -> Result<CommandOutput, RunError> + Send + Sync;

/// A fake runner that answers from a closure and records every call.
pub struct ScriptedRunner {
    handler: Box<Handler>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Invocation) -> Result<CommandOutput, RunError> + Send + Sync + 'static,
    {
        ScriptedRunner {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A runner on which every program is missing.
    pub fn nothing_installed() -> Self {
        ScriptedRunner::new(|inv| {
            Err(RunError::NotFound {
                program: inv.program.clone(),
            })
        })
    }

    /// Every invocation seen so far, in call order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(invocation.clone());
        }
        (self.handler)(invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_rendering() {
        let inv = Invocation::new("git", ["pull", "--ff-only"]);
        assert_eq!(inv.command_line(), "git pull --ff-only");
        assert!(inv.capture);
        assert!(!inv.clone().inherit_output().capture);
    }

    #[test]
    fn stderr_summary_prefers_last_line() {
        let out = CommandOutput::failed(128, "Cloning into 'x'...\nfatal: repository not found\n\n");
        assert_eq!(out.stderr_summary(), "fatal: repository not found");
        assert_eq!(CommandOutput::failed(2, "").stderr_summary(), "exit status 2");
    }

    #[test]
    fn missing_program_is_not_found() {
        let result = SystemRunner.run(&Invocation::new(
            "provision-test-no-such-binary",
            Vec::<String>::new(),
        ));
        assert!(matches!(result, Err(RunError::NotFound { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn captures_output_and_exit_code() {
        let out = SystemRunner
            .run(&Invocation::new("sh", ["-c", "echo hi; echo oops >&2; exit 3"]))
            .unwrap();
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout.trim(), "hi");
        assert_eq!(out.stderr.trim(), "oops");
        assert!(!out.success());
    }

    #[cfg(unix)]
    #[test]
    fn slow_process_times_out() {
        let started = Instant::now();
        let result = SystemRunner.run(
            &Invocation::new("sleep", ["5"]).with_timeout(Some(Duration::from_millis(200))),
        );
        assert!(matches!(result, Err(RunError::TimedOut { .. })));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn env_is_passed() {
        let out = SystemRunner
            .run(&Invocation::new("sh", ["-c", "printf %s \"$PROVISION_TEST\""]).with_env("PROVISION_TEST", "yes"))
            .unwrap();
        assert_eq!(out.stdout, "yes");
    }

    #[test]
    fn scripted_runner_records_calls() {
        let runner = ScriptedRunner::new(|inv| Ok(CommandOutput::ok(inv.args.join(","))));
        let out = runner.run(&Invocation::new("tool", ["a", "b"])).unwrap();
        assert_eq!(out.stdout, "a,b");
        assert_eq!(runner.calls().len(), 1);
        assert_eq!(runner.calls()[0].program, "tool");
    }
}
