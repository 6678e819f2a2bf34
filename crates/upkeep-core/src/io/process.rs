//! Launching and supervising installer processes.

use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use wait_timeout::ChildExt;

/// Interval at which a running installer is checked.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A program plus its argument string, as a Windows command line would carry it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallCommand {
    pub program: PathBuf,
    pub args: String,
}

impl InstallCommand {
    pub fn new(program: impl Into<PathBuf>, args: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: args.into(),
        }
    }
}

impl std::fmt::Display for InstallCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.program.display())
        } else {
            write!(f, "{} {}", self.program.display(), self.args)
        }
    }
}

/// How a supervised process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Exited on its own.
    Exited { code: i32 },
    /// Still running at the deadline and terminated.
    TimedOut,
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited { code: 0 })
    }
}

/// A started child process.
pub trait RunningProcess: Send {
    /// Wait up to `timeout` for the process to exit, returning its exit code if it did.
    fn wait_for(&mut self, timeout: Duration) -> io::Result<Option<i32>>;

    /// Forcibly terminate the process.
    fn kill(&mut self) -> io::Result<()>;
}

/// Starts processes.
pub trait Launcher: Send + Sync {
    fn launch(&self, command: &InstallCommand) -> io::Result<Box<dyn RunningProcess>>;
}

/// Launches real OS processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn launch(&self, command: &InstallCommand) -> io::Result<Box<dyn RunningProcess>> {
        let mut cmd = Command::new(&command.program);
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            if !command.args.is_empty() {
                cmd.raw_arg(&command.args);
            }
        }
        #[cfg(not(windows))]
        cmd.args(split_args(&command.args));

        let child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(Box::new(SystemProcess { child }))
    }
}

struct SystemProcess {
    child: Child,
}

impl RunningProcess for SystemProcess {
    fn wait_for(&mut self, timeout: Duration) -> io::Result<Option<i32>> {
        // Killed by a signal means no exit code; treat as failure.
        Ok(self
            .child
            .wait_timeout(timeout)?
            .map(|status| status.code().unwrap_or(-1)))
    }

    fn kill(&mut self) -> io::Result<()> {
        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }
}

/// Split a Windows-style argument string on whitespace, keeping double
/// quoted sections together.
pub fn split_args(args: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut pending = false;
    for c in args.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                pending = true;
            }
            c if c.is_whitespace() && !quoted => {
                if pending {
                    out.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }
    if pending {
        out.push(current);
    }
    out
}

/// Wait for `process`, polling once per [`POLL_INTERVAL`], until it exits or
/// `timeout_secs` seconds have elapsed. A process still running at the
/// deadline is killed.
pub fn supervise(process: &mut dyn RunningProcess, timeout_secs: u64) -> io::Result<ProcessOutcome> {
    let mut elapsed: u64 = 0;
    loop {
        if let Some(code) = process.wait_for(POLL_INTERVAL)? {
            tracing::debug!("Process exited with code {code} after about {elapsed}s");
            return Ok(ProcessOutcome::Exited { code });
        }
        elapsed += 1;
        if elapsed >= timeout_secs {
            break;
        }
    }

    tracing::warn!("Process still running after {timeout_secs}s, terminating it");
    if let Err(e) = process.kill() {
        tracing::warn!("Could not terminate process: {e}");
    }
    Ok(ProcessOutcome::TimedOut)
}
