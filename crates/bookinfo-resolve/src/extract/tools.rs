use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::error::{ResolveError, Result};

/// Unique scratch file in the system temp dir. The caller removes it.
pub(crate) fn scratch_path(tool: &str, extension: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "bookinfo_{tool}_{}_{}.{extension}",
        std::process::id(),
        Uuid::now_v7()
    ))
}

/// Run an external tool to completion, killing it after `timeout`.
///
/// Output is expected in a file the tool writes; stdout and stderr are
/// discarded so a chatty tool cannot block on a full pipe.
pub(crate) fn run_with_timeout(mut command: Command, tool: &str, timeout: Duration) -> Result<()> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                ResolveError::PdfExtraction(format!("{tool} is not installed"))
            } else {
                ResolveError::PdfExtraction(format!("failed to run {tool}: {err}"))
            }
        })?;

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if started.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ResolveError::PdfExtraction(format!(
                        "{tool} timed out after {timeout:?}"
                    )));
                }
                thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ResolveError::PdfExtraction(format!(
                    "{tool} process failed: {err}"
                )));
            }
        }
    };

    if !status.success() {
        return Err(ResolveError::PdfExtraction(format!(
            "{tool} exited with status {status}"
        )));
    }
    Ok(())
}

/// Read and delete a scratch file produced by a tool.
pub(crate) fn take_scratch(path: &Path) -> Result<Vec<u8>> {
    let bytes = fs::read(path).map_err(|err| {
        ResolveError::PdfExtraction(format!("failed to read tool output {}: {err}", path.display()))
    });
    let _ = fs::remove_file(path);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_paths_are_unique() {
        let a = scratch_path("pdftotext", "txt");
        let b = scratch_path("pdftotext", "txt");
        assert_ne!(a, b);
        assert_eq!(a.extension().and_then(|e| e.to_str()), Some("txt"));
    }

    #[test]
    fn missing_tool_is_reported() {
        let command = Command::new("bookinfo-definitely-not-a-real-tool");
        let err = run_with_timeout(command, "fake-tool", Duration::from_secs(1)).unwrap_err();
        assert!(err.to_string().contains("fake-tool is not installed"));
    }

    #[test]
    fn missing_output_is_an_error() {
        let path = scratch_path("test", "bin");
        assert!(take_scratch(&path).is_err());
    }
}
