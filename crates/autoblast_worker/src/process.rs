//! Scoped ownership of a spawned tool process and its process group.
//!
//! The tool is started as the leader of a fresh process group, so killing the
//! group also reaches anything it forked. Dropping the guard before the child
//! has been reaped kills the group; this covers timeouts, task cancellation
//! and early returns alike.

use std::process::ExitStatus;
use tokio::process::{Child, ChildStderr, ChildStdout};
use tracing::debug;

pub struct ProcessGroupGuard {
    child: Child,
    pid: Option<u32>,
    reaped: bool,
}

impl ProcessGroupGuard {
    pub fn new(child: Child) -> Self {
        let pid = child.id();
        Self {
            child,
            pid,
            reaped: false,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Take the piped stdout/stderr handles. `None` if either was not piped
    /// or has already been taken.
    pub fn take_pipes(&mut self) -> Option<(ChildStdout, ChildStderr)> {
        let stdout = self.child.stdout.take()?;
        let stderr = self.child.stderr.take()?;
        Some((stdout, stderr))
    }

    /// Wait for the group leader to exit.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        let status = self.child.wait().await?;
        self.reaped = true;
        Ok(status)
    }

    /// Kill the whole process group and reap the leader.
    pub async fn terminate(&mut self) {
        if self.reaped {
            return;
        }
        self.kill_group();
        if let Err(e) = self.child.kill().await {
            debug!("kill after group signal failed (pid={:?}): {}", self.pid, e);
        }
        self.reaped = true;
    }

    #[cfg(unix)]
    fn kill_group(&self) {
        if let Some(pid) = self.pid {
            // SAFETY: killpg only sends a signal; the pgid is the leader's pid
            // because the child was spawned with process_group(0) and has not
            // been reaped yet.
            let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
            if rc != 0 {
                debug!(
                    "killpg({}) failed: {}",
                    pid,
                    std::io::Error::last_os_error()
                );
            }
        }
    }

    #[cfg(not(unix))]
    fn kill_group(&self) {}
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        if !self.reaped {
            self.kill_group();
            // kill_on_drop on the command reaps the leader in the background.
            let _ = self.child.start_kill();
        }
    }
}
