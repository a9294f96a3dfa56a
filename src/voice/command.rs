//! External audio programs (`play`, `sox`) run as subprocesses

use std::ffi::OsStr;
use std::process::Stdio;

use tokio::process::Command;

use crate::{Error, Result};

/// Run `program` with `args` to completion
///
/// Stdout is discarded and stderr is captured for the error message. Spawn
/// failures and non-zero exits are reported through `to_error`, so callers
/// keep their own error variant.
pub(super) async fn run_command<I, S>(
    program: &str,
    args: I,
    to_error: fn(String) -> Error,
) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| to_error(format!("failed to spawn {program}: {e}")))?;

    if !output.stderr.is_empty() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::trace!(program, stderr = %stderr, "audio program stderr");
    }

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(to_error(format!(
            "{program} exited with code {code}: {}",
            stderr.trim()
        )));
    }

    Ok(())
}
