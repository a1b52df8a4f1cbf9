use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Outcome of one post-create command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookResult {
    pub command: String,
    pub success: bool,
    /// `None` when the process was killed by a signal or never started.
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

/// Run each command in order. A failing command does not stop the rest.
pub fn run_post_create(commands: &[String], working_dir: &Path) -> Vec<HookResult> {
    commands
        .iter()
        .map(|command| execute_hook(command, working_dir))
        .collect()
}

/// Run one command through the platform shell in `working_dir`.
pub fn execute_hook(command: &str, working_dir: &Path) -> HookResult {
    debug!(command, dir = %working_dir.display(), "running hook");
    let output = shell(command).current_dir(working_dir).output();

    match output {
        Ok(output) => {
            let result = HookResult {
                command: command.to_string(),
                success: output.status.success(),
                exit_code: output.status.code(),
                stdout: non_empty(&output.stdout),
                stderr: non_empty(&output.stderr),
            };
            if !result.success {
                warn!(command, exit_code = ?result.exit_code, "hook failed");
            }
            result
        }
        Err(e) => {
            warn!(command, error = %e, "hook could not be started");
            HookResult {
                command: command.to_string(),
                success: false,
                exit_code: None,
                stdout: None,
                stderr: Some(format!("Failed to execute command: {e}")),
            }
        }
    }
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", command]);
    cmd
}

#[cfg(not(windows))]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]);
    cmd
}

fn non_empty(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    (!text.is_empty()).then(|| text.into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_output_and_exit_code() {
        let tmp = tempfile::tempdir().unwrap();
        let ok = execute_hook("echo hello", tmp.path());
        assert!(ok.success);
        assert_eq!(ok.exit_code, Some(0));
        assert_eq!(ok.stdout.as_deref(), Some("hello\n"));
        assert!(ok.stderr.is_none());

        let bad = execute_hook("echo oops >&2; exit 3", tmp.path());
        assert!(!bad.success);
        assert_eq!(bad.exit_code, Some(3));
        assert_eq!(bad.stderr.as_deref(), Some("oops\n"));
    }

    #[test]
    fn runs_in_working_dir() {
        let tmp = tempfile::tempdir().unwrap();
        execute_hook("touch marker", tmp.path());
        assert!(tmp.path().join("marker").exists());
    }

    #[test]
    fn failure_does_not_stop_later_hooks() {
        let tmp = tempfile::tempdir().unwrap();
        let commands = vec!["false".to_string(), "touch after".to_string()];
        let results = run_post_create(&commands, tmp.path());
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(results[1].success);
        assert!(tmp.path().join("after").exists());
    }

    #[test]
    fn missing_working_dir_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let result = execute_hook("true", &tmp.path().join("nope"));
        assert!(!result.success);
        assert!(result.exit_code.is_none());
        assert!(result.stderr.unwrap().starts_with("Failed to execute command"));
    }
}
