use std::path::Path;
use std::process::Command;
use tracing::debug;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Whatever the tool printed, for error messages.
    pub fn message(&self) -> String {
        let text = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };
        format!("exit code {:?}: {}", self.code, text)
    }
}

/// Runs an external tool to completion.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput>;
}

/// Runs real processes, without flashing a console window on Windows.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        let mut command = Command::new(program);
        command.args(args);
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(CREATE_NO_WINDOW);
        }
        let output = command.output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Starts `program` without waiting for it. A background thread waits
/// on the child so it is reaped when it exits. Returns the process id.
pub fn spawn_detached(program: &Path, args: &[String], dir: Option<&Path>) -> std::io::Result<u32> {
    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = dir {
        command.current_dir(dir);
    }
    let mut child = command.spawn()?;
    let pid = child.id();
    std::thread::spawn(move || match child.wait() {
        Ok(status) => debug!(pid, code = ?status.code(), "detached process exited"),
        Err(err) => debug!(pid, error = %err, "could not wait on detached process"),
    });
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_fails_to_spawn() {
        let missing = Path::new("/nonexistent/launcher-guard/launcher.exe");
        assert!(spawn_detached(missing, &[], None).is_err());
    }

    #[test]
    fn message_prefers_stderr() {
        let output = CommandOutput {
            success: false,
            code: Some(1),
            stdout: "ignored".into(),
            stderr: " No rules match \n".into(),
        };
        assert_eq!(output.message(), "exit code Some(1): No rules match");
    }
}
