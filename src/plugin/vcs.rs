use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{operation} exited with {status}: {stderr}")]
    Failed {
        operation: &'static str,
        status: ExitStatus,
        stderr: String,
    },
    #[error("{operation} timed out after {}s", .timeout.as_secs())]
    TimedOut {
        operation: &'static str,
        timeout: Duration,
    },
}

/// Version-control operations, always relative to the current working
/// directory. Callers scope the directory with
/// [`with_working_dir`](crate::plugin::workdir::with_working_dir).
///
/// On success the captured standard output is returned.
pub trait Vcs {
    /// Clone `url` into the current (empty) directory.
    fn clone_here(&self, url: &str) -> Result<String, VcsError>;
    /// Fetch and merge upstream changes for the repository in the current directory.
    fn pull_here(&self) -> Result<String, VcsError>;
}

/// `git` driven as a subprocess with a wall-clock limit.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    timeout: Option<Duration>,
}

impl GitCli {
    /// A zero `timeout` disables the limit.
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout: (!timeout.is_zero()).then_some(timeout),
        }
    }

    fn run(&self, operation: &'static str, args: &[&str]) -> Result<String, VcsError> {
        let spawn_err = |source| VcsError::Spawn {
            program: self.program.clone(),
            source,
        };

        let mut command = Command::new(&self.program);
        command
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group, so a timeout also reaches ssh and remote helpers.
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut command, 0);

        let mut child = command.spawn().map_err(spawn_err)?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let started = Instant::now();

        let status = loop {
            match child.try_wait().map_err(spawn_err)? {
                Some(status) => break status,
                None => {
                    if let Some(timeout) = self.timeout
                        && started.elapsed() >= timeout
                    {
                        kill_tree(&mut child);
                        let _ = child.wait();
                        collect(stdout);
                        collect(stderr);
                        tracing::warn!("{operation} killed after {}s", timeout.as_secs());
                        return Err(VcsError::TimedOut { operation, timeout });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            }
        };

        let stdout = collect(stdout);
        let stderr = collect(stderr);

        if status.success() {
            Ok(stdout)
        } else {
            Err(VcsError::Failed {
                operation,
                status,
                stderr: stderr.trim().to_string(),
            })
        }
    }
}

impl Vcs for GitCli {
    fn clone_here(&self, url: &str) -> Result<String, VcsError> {
        self.run("git clone", &["clone", url, "."])
    }

    fn pull_here(&self) -> Result<String, VcsError> {
        self.run("git pull", &["pull"])
    }
}

#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    use rustix::process::{Pid, Signal, kill_process_group};

    if let Err(err) = kill_process_group(Pid::from_child(child), Signal::KILL) {
        tracing::debug!("process group kill failed: {err}");
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}
