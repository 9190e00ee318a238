use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;

/// Runs shell commands inside the host's namespaces. Injectable so tests
/// can substitute canned output instead of needing a privileged container.
pub trait HostCommandRunner: Send + Sync {
    /// Whether namespace entry is possible at all: requires both the
    /// nsenter utility and a shared host PID namespace.
    fn available(&self) -> bool;

    /// Runs the command and returns trimmed stdout on success.
    fn run(&self, command: &str) -> Option<String>;
}

/// `nsenter --target 1` against the host's mount/uts/ipc/net namespaces.
pub struct NsenterRunner {
    timeout: Duration,
}

impl NsenterRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl HostCommandRunner for NsenterRunner {
    fn available(&self) -> bool {
        Path::new("/proc/1").exists() && find_in_path("nsenter")
    }

    fn run(&self, command: &str) -> Option<String> {
        let mut cmd = Command::new("nsenter");
        cmd.args(["--target", "1", "--mount", "--uts", "--ipc", "--net", "--", "sh", "-c"])
            .arg(command);
        let output = run_with_timeout(cmd, self.timeout)?;
        let trimmed = output.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(trimmed.to_string())
    }
}

fn find_in_path(binary: &str) -> bool {
    let Some(path) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path).any(|dir| dir.join(binary).is_file())
}

/// Spawns the command and polls for completion, killing the child once the
/// deadline passes. Returns stdout only for a zero exit status. A reader
/// thread drains the pipe while the child runs so output larger than the
/// pipe buffer cannot stall it into the timeout.
fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Option<String> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    let mut child = cmd.spawn().ok()?;
    let mut stdout = child.stdout.take()?;
    let reader = std::thread::spawn(move || {
        let mut out = String::new();
        stdout.read_to_string(&mut out).ok().map(|_| out)
    });
    let deadline = Instant::now() + timeout;

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let out = reader.join().ok().flatten()?;
                if !status.success() {
                    return None;
                }
                return Some(out);
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    debug!(timeout_ms = timeout.as_millis() as u64, "nsenter timed out, killing child");
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = reader.join();
                    return None;
                }
                std::thread::sleep(Duration::from_millis(25));
            }
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = reader.join();
                return None;
            }
        }
    }
}
