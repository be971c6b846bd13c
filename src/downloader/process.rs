// Control over the one running media-tool process
//
// Call sites never branch on the platform: the controller receives a
// `ProcessFactory` once and talks to the `ProcessControl` it returns.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use super::errors::DownloadError;

/// Capability interface over a child process
#[async_trait]
pub trait ProcessControl: Send + Sync {
    fn pid(&self) -> u32;

    /// Stop scheduling the process
    fn suspend(&self) -> Result<(), DownloadError>;

    /// Continue a suspended process
    fn resume(&self) -> Result<(), DownloadError>;

    /// Ask the process to exit
    fn terminate(&self) -> Result<(), DownloadError>;

    /// Force the process down
    fn kill(&self) -> Result<(), DownloadError>;

    /// `true` once the process has been reaped
    fn has_exited(&self) -> bool;

    /// Wait up to `limit` for the exit; returns whether it happened
    async fn wait(&self, limit: Duration) -> bool;
}

/// Builds the control handle for a freshly spawned child.
///
/// `exited` flips to `true` after the owner has reaped the child.
pub type ProcessFactory = fn(u32, watch::Receiver<bool>) -> Arc<dyn ProcessControl>;

/// Backend for the current platform
pub fn platform_factory() -> ProcessFactory {
    attach
}

#[cfg(unix)]
fn attach(pid: u32, exited: watch::Receiver<bool>) -> Arc<dyn ProcessControl> {
    Arc::new(SignalProcess::new(pid, exited))
}

#[cfg(not(unix))]
fn attach(pid: u32, exited: watch::Receiver<bool>) -> Arc<dyn ProcessControl> {
    Arc::new(TaskKillProcess::new(pid, exited))
}

async fn wait_for_exit(exited: &watch::Receiver<bool>, limit: Duration) -> bool {
    let mut rx = exited.clone();
    // A dropped sender means the owner is gone, so the child is too
    let done = tokio::time::timeout(limit, rx.wait_for(|done| *done))
        .await
        .is_ok();
    done
}

/// POSIX signals: SIGSTOP / SIGCONT / SIGTERM / SIGKILL
#[cfg(unix)]
pub struct SignalProcess {
    pid: u32,
    exited: watch::Receiver<bool>,
}

#[cfg(unix)]
impl SignalProcess {
    pub fn new(pid: u32, exited: watch::Receiver<bool>) -> Self {
        Self { pid, exited }
    }

    fn signal(&self, signal: libc::c_int, name: &str) -> Result<(), DownloadError> {
        // Never signal a reaped pid, it may already belong to someone else
        if self.has_exited() {
            return Ok(());
        }

        let pid = libc::pid_t::try_from(self.pid)
            .map_err(|_| DownloadError::Io(format!("pid {} out of range", self.pid)))?;
        let rc = unsafe { libc::kill(pid, signal) };
        if rc == 0 {
            tracing::debug!("[Process] {} -> {}", name, self.pid);
            Ok(())
        } else {
            Err(DownloadError::Io(format!(
                "{} to pid {} failed: {}",
                name,
                self.pid,
                std::io::Error::last_os_error()
            )))
        }
    }
}

#[cfg(unix)]
#[async_trait]
impl ProcessControl for SignalProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn suspend(&self) -> Result<(), DownloadError> {
        self.signal(libc::SIGSTOP, "SIGSTOP")
    }

    fn resume(&self) -> Result<(), DownloadError> {
        self.signal(libc::SIGCONT, "SIGCONT")
    }

    fn terminate(&self) -> Result<(), DownloadError> {
        self.signal(libc::SIGTERM, "SIGTERM")
    }

    fn kill(&self) -> Result<(), DownloadError> {
        self.signal(libc::SIGKILL, "SIGKILL")
    }

    fn has_exited(&self) -> bool {
        *self.exited.borrow()
    }

    async fn wait(&self, limit: Duration) -> bool {
        wait_for_exit(&self.exited, limit).await
    }
}

/// `taskkill` based control; processes cannot be suspended here
#[cfg(not(unix))]
pub struct TaskKillProcess {
    pid: u32,
    exited: watch::Receiver<bool>,
}

#[cfg(not(unix))]
impl TaskKillProcess {
    pub fn new(pid: u32, exited: watch::Receiver<bool>) -> Self {
        Self { pid, exited }
    }

    fn taskkill(&self, force: bool) -> Result<(), DownloadError> {
        if self.has_exited() {
            return Ok(());
        }

        let pid = self.pid.to_string();
        let mut args = vec!["/PID", pid.as_str(), "/T"];
        if force {
            args.push("/F");
        }

        let output = std::process::Command::new("taskkill").args(&args).output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(DownloadError::Io(format!(
                "taskkill failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

#[cfg(not(unix))]
#[async_trait]
impl ProcessControl for TaskKillProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn suspend(&self) -> Result<(), DownloadError> {
        Err(DownloadError::SuspendUnsupported)
    }

    fn resume(&self) -> Result<(), DownloadError> {
        Err(DownloadError::SuspendUnsupported)
    }

    fn terminate(&self) -> Result<(), DownloadError> {
        self.taskkill(false)
    }

    fn kill(&self) -> Result<(), DownloadError> {
        self.taskkill(true)
    }

    fn has_exited(&self) -> bool {
        *self.exited.borrow()
    }

    async fn wait(&self, limit: Duration) -> bool {
        wait_for_exit(&self.exited, limit).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Stdio;
    use tokio::process::Command;

    /// Spawn `sh -c script` and reap it in the background
    fn spawn(script: &str) -> (Arc<dyn ProcessControl>, tokio::task::JoinHandle<Option<i32>>) {
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(script)
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();
        let (tx, rx) = watch::channel(false);

        let reaper = tokio::spawn(async move {
            let status = child.wait().await.ok();
            let _ = tx.send(true);
            status.and_then(|s| s.code())
        });

        (platform_factory()(pid, rx), reaper)
    }

    #[tokio::test]
    async fn test_wait_reports_exit() {
        let (control, reaper) = spawn("exit 0");
        assert!(control.wait(Duration::from_secs(5)).await);
        assert!(control.has_exited());
        assert_eq!(reaper.await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_wait_times_out_on_running_process() {
        let (control, _reaper) = spawn("sleep 5");
        assert!(!control.wait(Duration::from_millis(100)).await);
        control.kill().unwrap();
        assert!(control.wait(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_terminate() {
        let (control, reaper) = spawn("sleep 5");
        control.terminate().unwrap();
        assert!(control.wait(Duration::from_secs(5)).await);
        // Killed by a signal, so no exit code
        assert_eq!(reaper.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_suspend_and_resume() {
        let (control, _reaper) = spawn("sleep 0.3");
        control.suspend().unwrap();
        // Stopped processes do not finish their sleep
        assert!(!control.wait(Duration::from_millis(600)).await);
        control.resume().unwrap();
        assert!(control.wait(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_signals_after_exit_are_noops() {
        let (control, _reaper) = spawn("exit 0");
        assert!(control.wait(Duration::from_secs(5)).await);
        assert!(control.suspend().is_ok());
        assert!(control.kill().is_ok());
    }
}
