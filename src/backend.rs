//! Collaborators outside the core
//!
//! The core never talks to clients or spawns processes itself. Everything
//! that leaves the process goes through [`ShellBackend`], so the display
//! server can plug in its protocol objects and tests can record calls.

use log::{debug, error, info, warn};
use std::process::Stdio;
use tokio::process::{Child, Command as TokioCommand};

use crate::types::{SurfaceId, ViewId};

/// Side effects the core asks the outside world to perform
pub trait ShellBackend {
    /// Spawn a configured command line
    fn run_command(&mut self, command: &str);

    /// Ask the client owning `view` to close it
    fn close_view(&mut self, view: ViewId);

    /// Tell a popup's client to dismiss it
    fn send_popup_done(&mut self, surface: SurfaceId);

    /// Stop the display loop
    fn terminate(&mut self);
}

/// Backend without a display server: commands are spawned through `sh -c`
/// on the surrounding tokio runtime, everything else is only logged.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    spawned: usize,
    children: Vec<Child>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commands successfully spawned so far
    pub fn spawned(&self) -> usize {
        self.spawned
    }

    /// Reap exited commands and return how many are still running
    pub fn running(&mut self) -> usize {
        self.children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    debug!("Command {:?} exited with {}", child.id(), status);
                }
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!("⚠️ Failed to poll command: {}", e);
                false
            }
        });
        self.children.len()
    }
}

impl ShellBackend for HeadlessBackend {
    fn run_command(&mut self, command: &str) {
        self.running();

        // Child processes are registered with the runtime's reaper
        if tokio::runtime::Handle::try_current().is_err() {
            error!("❌ Cannot spawn `{}` outside a tokio runtime", command);
            return;
        }

        let spawned = TokioCommand::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(child) => {
                self.spawned += 1;
                debug!("🚀 Spawned `{}` (pid {:?})", command, child.id());
                self.children.push(child);
            }
            Err(e) => error!("❌ Failed to spawn `{}`: {}", command, e),
        }
    }

    fn close_view(&mut self, view: ViewId) {
        info!("🗑️ Close requested for {}", view);
    }

    fn send_popup_done(&mut self, surface: SurfaceId) {
        debug!("Popup {} dismissed", surface);
    }

    fn terminate(&mut self) {
        let running = self.running();
        info!("🛑 Display loop termination requested ({} command(s) still running)", running);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, Duration};

    #[tokio::test]
    async fn test_finished_commands_are_reaped() {
        let mut backend = HeadlessBackend::new();
        backend.run_command("true");
        backend.run_command("exit 3");
        assert_eq!(backend.spawned(), 2);

        for _ in 0..200 {
            if backend.running() == 0 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(backend.running(), 0);
    }

    #[test]
    fn test_no_spawn_without_runtime() {
        let mut backend = HeadlessBackend::new();
        backend.run_command("true");
        assert_eq!(backend.spawned(), 0);
        assert_eq!(backend.running(), 0);
    }
}
