//! Relaunch after install.
//!
//! A detached `/bin/sh` waits for this process to exit, clears quarantine on
//! the new bundle, and opens it. The PID is captured when the coordinator is
//! created so the helper waits on the process that did the install.

use crate::error::{Result, SvgPadError};
use crate::update::shell;
use std::path::Path;
use std::process::{Command, Stdio};

const POLL_INTERVAL: &str = "0.2";

/// Spawns the relaunch helper.
#[derive(Debug, Clone)]
pub struct RelaunchCoordinator {
    pid: u32,
}

impl Default for RelaunchCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RelaunchCoordinator {
    /// Capture the current process ID.
    pub fn new() -> Self {
        Self::for_pid(std::process::id())
    }

    /// Wait on `pid` instead of the current process.
    pub fn for_pid(pid: u32) -> Self {
        Self { pid }
    }

    /// PID the helper waits on.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Script run by the helper shell.
    pub fn script(&self, bundle: &Path) -> String {
        format!(
            "while kill -0 {pid} 2>/dev/null; do sleep {POLL_INTERVAL}; done; {xattr} 2>/dev/null; open {bundle}",
            pid = self.pid,
            xattr = shell::strip_quarantine_command(bundle),
            bundle = shell::quote(bundle),
        )
    }

    /// Clear quarantine on `bundle` and start the detached helper.
    ///
    /// Returns as soon as the helper is spawned; the caller is expected to
    /// exit promptly afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`SvgPadError::Relaunch`] if the helper cannot be spawned.
    pub fn schedule(&self, bundle: &Path) -> Result<()> {
        if let Err(e) = shell::strip_quarantine(bundle) {
            tracing::warn!("could not clear quarantine before relaunch: {e}");
        }

        let script = self.script(bundle);
        tracing::debug!("relaunch helper: {script}");

        let mut command = Command::new("/bin/sh");
        command
            .arg("-c")
            .arg(&script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = command
            .spawn()
            .map_err(|e| SvgPadError::Relaunch(format!("cannot spawn relaunch helper: {e}")))?;
        tracing::info!(
            "relaunch helper {} waiting for pid {} to exit",
            child.id(),
            self.pid
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_current_pid() {
        assert_eq!(RelaunchCoordinator::new().pid(), std::process::id());
    }

    #[test]
    fn script_waits_then_opens() {
        let script = RelaunchCoordinator::for_pid(321).script(Path::new("/Applications/SVGPad.app"));
        assert_eq!(
            script,
            "while kill -0 321 2>/dev/null; do sleep 0.2; done; \
             xattr -d -r com.apple.quarantine '/Applications/SVGPad.app' 2>/dev/null; \
             open '/Applications/SVGPad.app'"
        );
    }

    #[test]
    fn script_quotes_awkward_paths() {
        let script = RelaunchCoordinator::for_pid(1).script(Path::new("/Users/me/It's Apps/SVGPad.app"));
        assert!(script.ends_with(r"open '/Users/me/It'\''s Apps/SVGPad.app'"));
    }
}
