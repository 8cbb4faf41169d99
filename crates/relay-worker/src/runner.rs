use std::io::Write;
use std::process::{Command, Stdio};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("couldn't spawn {command:?}: {source}")]
    Spawn { command: String, source: std::io::Error },
    #[error("couldn't write to {command:?}'s stdin: {source}")]
    Stdin { command: String, source: std::io::Error },
    #[error("couldn't wait on {command:?}: {source}")]
    Wait { command: String, source: std::io::Error },
}

/// One complete message, accumulated frame by frame from the worker's
/// listener (spec §4.6). `frames` holds every frame of the message in
/// order; concatenated, they become the spawned command's stdin.
pub type Message = Vec<Vec<u8>>;

/// Spawns `command` once per message, piping the message's frames
/// concatenated on stdin and exposing per-frame sizing through environment
/// variables, mirroring the original's `posix_spawn` call: `ZLMB_FRAME` (the
/// frame count), `ZLMB_FRAME_LENGTH` (colon-joined per-frame byte sizes),
/// and `ZLMB_LENGTH` (the total byte count).
pub struct WorkerRunner {
    command: String,
    trailing_args: Vec<String>,
}

impl WorkerRunner {
    pub fn new(command: impl Into<String>, trailing_args: Vec<String>) -> Self {
        Self { command: command.into(), trailing_args }
    }

    /// Spawns the command, writes every frame to its stdin in order, closes
    /// stdin, and blocks until it exits. The child's stdout/stderr are
    /// inherited rather than captured, matching `posix_spawn`'s defaults, but
    /// its environment is cleared first (spec §4.6: "inheriting those three
    /// environment entries and only those") so only the three `ZLMB_*`
    /// variables reach it.
    pub fn run(&self, message: &Message) -> Result<(), RunnerError> {
        let frame_count = message.len();
        let frame_lengths =
            message.iter().map(|frame| frame.len().to_string()).collect::<Vec<_>>().join(":");
        let total_length: usize = message.iter().map(Vec::len).sum();

        let mut child = Command::new(&self.command)
            .args(&self.trailing_args)
            .env_clear()
            .env("ZLMB_FRAME", frame_count.to_string())
            .env("ZLMB_FRAME_LENGTH", frame_lengths)
            .env("ZLMB_LENGTH", total_length.to_string())
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|source| RunnerError::Spawn { command: self.command.clone(), source })?;

        let stdin_result = if let Some(mut stdin) = child.stdin.take() {
            message.iter().try_for_each(|frame| stdin.write_all(frame))
        } else {
            Ok(())
        };

        let status = child.wait().map_err(|source| RunnerError::Wait { command: self.command.clone(), source })?;
        if !status.success() {
            tracing::warn!(command = %self.command, %status, "relay-worker: child exited non-zero");
        }
        stdin_result.map_err(|source| RunnerError::Stdin { command: self.command.clone(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_command_and_feeds_stdin() {
        let out = tempfile::NamedTempFile::new().unwrap();
        let path = out.path().to_str().unwrap().to_owned();
        let runner = WorkerRunner::new("sh", vec!["-c".to_owned(), format!("cat > {path}")]);
        let message: Message = vec![b"hello ".to_vec(), b"world".to_vec()];
        runner.run(&message).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello world");
    }

    #[test]
    fn env_vars_reflect_frame_shape() {
        let out = tempfile::NamedTempFile::new().unwrap();
        let path = out.path().to_str().unwrap().to_owned();
        let runner = WorkerRunner::new(
            "sh",
            vec!["-c".to_owned(), format!("printf '%s %s %s' \"$ZLMB_FRAME\" \"$ZLMB_FRAME_LENGTH\" \"$ZLMB_LENGTH\" > {path}")],
        );
        let message: Message = vec![b"ab".to_vec(), b"cde".to_vec()];
        runner.run(&message).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "2 2:3 5");
    }

    #[test]
    fn non_zero_exit_is_logged_not_surfaced_as_an_error() {
        let runner = WorkerRunner::new("sh", vec!["-c".to_owned(), "exit 7".to_owned()]);
        let message: Message = vec![b"x".to_vec()];
        assert!(runner.run(&message).is_ok());
    }

    #[test]
    fn failing_spawn_reports_error() {
        let runner = WorkerRunner::new("/does/not/exist", Vec::new());
        let message: Message = vec![b"x".to_vec()];
        assert!(matches!(runner.run(&message), Err(RunnerError::Spawn { .. })));
    }
}
