//! Shell command helpers shared by the installer and the relaunch helper.

use std::path::Path;
use std::process::{Command, Stdio};

/// Extended attribute macOS attaches to downloaded files.
pub const QUARANTINE_ATTR: &str = "com.apple.quarantine";

/// Quote `path` for `/bin/sh` using single quotes.
pub fn quote(path: &Path) -> String {
    quote_str(&path.to_string_lossy())
}

/// Quote an arbitrary string for `/bin/sh` using single quotes.
pub fn quote_str(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// `xattr` invocation that recursively removes the quarantine marker.
pub fn strip_quarantine_command(bundle: &Path) -> String {
    format!("xattr -d -r {QUARANTINE_ATTR} {}", quote(bundle))
}

/// Remove the quarantine marker from `bundle` and everything inside it.
///
/// Best-effort: callers log the error and carry on, since Gatekeeper will
/// simply ask the user on first launch.
pub fn strip_quarantine(bundle: &Path) -> anyhow::Result<()> {
    let xattr = which::which("xattr").map_err(|e| anyhow::anyhow!("xattr not available: {e}"))?;
    let output = Command::new(xattr)
        .args(["-d", "-r", QUARANTINE_ATTR])
        .arg(bundle)
        .stdin(Stdio::null())
        .output()?;

    // xattr exits non-zero when the attribute was never set.
    let stderr = String::from_utf8_lossy(&output.stderr);
    if output.status.success() || stderr.contains("No such xattr") {
        Ok(())
    } else {
        anyhow::bail!(
            "xattr failed on {}: {}",
            bundle.display(),
            stderr.trim()
        )
    }
}

/// Run `program args…` and turn a non-zero exit into an error carrying stderr.
pub fn run(program: &str, args: &[&std::ffi::OsStr]) -> anyhow::Result<()> {
    tracing::debug!(
        "running {program} {}",
        args.iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    );
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| anyhow::anyhow!("cannot run {program}: {e}"))?;
    if output.status.success() {
        Ok(())
    } else {
        anyhow::bail!(
            "{program} exited with {:?}: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        )
    }
}
