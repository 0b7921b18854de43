//! git::command
//!
//! Bounded execution of the `git` CLI.
//!
//! Network-facing operations (fetch, pull, push) and the porcelain that
//! git2 does not cover well (stash, merge/rebase integration) run as child
//! processes. Every child:
//! - runs with `GIT_TERMINAL_PROMPT=0` and a null stdin, so a missing
//!   credential fails instead of waiting for input
//! - is killed once its deadline passes, so one unreachable remote cannot
//!   stall the rest of the repository list

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use super::GitError;

/// How often a running child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long output is awaited once git itself has exited. A descendant
/// that outlives git may still hold the pipes open.
const PIPE_GRACE: Duration = Duration::from_secs(2);

/// Captured result of a successful git invocation.
#[derive(Debug, Clone, Default)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `git <args>` in `workdir`, failing on non-zero exit.
///
/// With `timeout` set, git and everything it spawned (ssh, remote helpers,
/// shell aliases) are killed and [`GitError::Timeout`] returned once it has
/// run that long.
pub fn run_git(
    workdir: &Path,
    args: &[&str],
    timeout: Option<Duration>,
) -> Result<GitOutput, GitError> {
    let command = format!("git {}", args.join(" "));
    tracing::debug!(command = %command, dir = %workdir.display(), "running");

    let mut cmd = Command::new("git");
    cmd.args(args)
        .current_dir(workdir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("GIT_MERGE_AUTOEDIT", "no")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = cmd.spawn().map_err(|e| GitError::Spawn {
        command: command.clone(),
        message: e.to_string(),
    })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    // On the early returns below the reader threads are left detached;
    // they finish once the last holder of the pipes is gone.
    let status = match wait_with_deadline(&mut child, timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            tracing::debug!(command = %command, "deadline passed, killed");
            return Err(GitError::Timeout {
                command,
                secs: timeout.map(|t| t.as_secs()).unwrap_or_default(),
            });
        }
        Err(e) => {
            kill_process_group(&mut child);
            return Err(GitError::Spawn {
                command,
                message: e.to_string(),
            });
        }
    };

    let stdout = collect(stdout);
    let stderr = collect(stderr);

    if !status.success() {
        return Err(GitError::CommandFailed {
            command,
            code: status.code(),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(GitOutput { stdout, stderr })
}

/// Wait for `child`, killing its process group at the deadline.
/// `Ok(None)` means timed out.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Option<Duration>,
) -> std::io::Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some);
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            kill_process_group(child);
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Kill `child` and every process in its group, then reap it.
fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Ok(pid) = i32::try_from(child.id()) {
            let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Read a pipe to completion on a helper thread so a chatty child never
/// blocks on a full pipe buffer.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<String>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });
        rx
    })
}

fn collect(output: Option<Receiver<String>>) -> String {
    output
        .and_then(|rx| rx.recv_timeout(PIPE_GRACE).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn captures_stdout() {
        let temp = TempDir::new().unwrap();
        let out =
            run_git(temp.path(), &["--version"], Some(Duration::from_secs(30))).unwrap();
        assert!(out.stdout.starts_with("git version"));
    }

    #[test]
    fn non_zero_exit_is_command_failed() {
        let temp = TempDir::new().unwrap();
        // Not a repository, so rev-parse fails.
        let result = run_git(temp.path(), &["rev-parse", "HEAD"], None);
        match result {
            Err(GitError::CommandFailed { command, code, .. }) => {
                assert_eq!(command, "git rev-parse HEAD");
                assert_ne!(code, Some(0));
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn deadline_kills_alias_descendants() {
        let temp = TempDir::new().unwrap();
        let started = Instant::now();

        let result = run_git(
            temp.path(),
            &["-c", "alias.hang=!sleep 20", "hang"],
            Some(Duration::from_secs(1)),
        );

        assert!(matches!(result, Err(GitError::Timeout { secs: 1, .. })));
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "returned after {:?}",
            started.elapsed()
        );
    }

    #[cfg(unix)]
    #[test]
    fn lingering_descendant_does_not_stall_success() {
        let temp = TempDir::new().unwrap();
        let started = Instant::now();

        let result = run_git(
            temp.path(),
            &["-c", "alias.linger=!sleep 20 &", "linger"],
            Some(Duration::from_secs(30)),
        );

        assert!(result.is_ok());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn missing_workdir_is_spawn_error() {
        let temp = TempDir::new().unwrap();
        let result = run_git(&temp.path().join("gone"), &["status"], None);
        assert!(matches!(result, Err(GitError::Spawn { .. })));
    }
}
