//! Administrator shell execution through AppleScript.

use std::process::{Command, Stdio};

use super::PrivilegedRunner;

/// Quote `s` as an AppleScript string literal.
pub fn applescript_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Runs commands via `osascript -e 'do shell script … with administrator privileges'`.
///
/// The system shows its own password prompt. Inside App Sandbox the prompt
/// cannot be shown at all, so the runner fails without trying.
#[derive(Debug, Default)]
pub struct AppleScriptRunner;

impl AppleScriptRunner {
    fn script(command: &str) -> String {
        format!(
            "do shell script {} with administrator privileges",
            applescript_string(command)
        )
    }
}

impl PrivilegedRunner for AppleScriptRunner {
    fn run_privileged(&self, command: &str) -> anyhow::Result<()> {
        if crate::app_dirs::is_sandboxed() {
            anyhow::bail!("administrator prompt is unavailable inside App Sandbox");
        }

        let osascript = which::which("osascript")
            .map_err(|e| anyhow::anyhow!("osascript not available: {e}"))?;

        tracing::debug!("running privileged: {command}");
        let output = Command::new(osascript)
            .arg("-e")
            .arg(Self::script(command))
            .stdin(Stdio::null())
            .output()?;

        if output.status.success() {
            Ok(())
        } else {
            // -128 is "User canceled."
            anyhow::bail!(
                "privileged command failed ({:?}): {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )
        }
    }
}
