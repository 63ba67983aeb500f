//! Local command backend.
//!
//! The command string is split with shell-words, the program resolved on
//! `PATH`, and the rendered prompt written to its stdin. Stdout is the
//! response. The child is killed once the per-call deadline passes.
use super::{LanguageModel, LmError, LmRequest};
use anyhow::{anyhow, Context, Result};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct CommandLm {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandLm {
    pub fn new(command: &str, timeout: Duration) -> Result<Self> {
        let mut args =
            shell_words::split(command).with_context(|| format!("parse LM command: {command}"))?;
        if args.is_empty() {
            return Err(anyhow!("LM command is empty"));
        }
        let name = args.remove(0);
        let program =
            which::which(&name).with_context(|| format!("LM command {name:?} not found"))?;
        Ok(Self {
            program,
            args,
            timeout,
        })
    }
}

impl LanguageModel for CommandLm {
    fn complete(&self, request: &LmRequest) -> Result<String, LmError> {
        let prompt = request.full_prompt();
        let start = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                LmError::RemoteCall(format!("spawn {}: {err}", self.program.display()))
            })?;

        // Drain output on threads so a chatty child never blocks on a full pipe.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        // Written on a thread so the deadline also bounds a child that never reads stdin.
        let writer = child
            .stdin
            .take()
            .map(|stdin| feed(stdin, prompt.clone().into_bytes()));

        let status = wait_with_deadline(&mut child, self.timeout)?;
        if let Some(Ok(Err(err))) = writer.map(|handle| handle.join()) {
            // A child that exits without reading stdin is judged by its status.
            tracing::debug!(error = %err, "LM command closed stdin early");
        }
        let stdout = collect(stdout);
        let stderr = collect(stderr);
        let elapsed_ms = start.elapsed().as_millis();

        tracing::info!(
            kind = %request.kind,
            attempt = request.attempt,
            elapsed_ms,
            prompt_bytes = prompt.len(),
            response_bytes = stdout.len(),
            "lm invoke complete"
        );

        if !status.success() {
            return Err(LmError::RemoteCall(format!(
                "LM command failed with status {status}: {}",
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        String::from_utf8(stdout)
            .map_err(|err| LmError::RemoteCall(format!("decode LM stdout as UTF-8: {err}")))
    }
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> Result<ExitStatus, LmError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                tracing::warn!(timeout_ms = timeout.as_millis(), "LM command timed out");
                return Err(LmError::Timeout(timeout));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(err) => return Err(LmError::RemoteCall(format!("wait for LM command: {err}"))),
        }
    }
}

fn feed<W: Write + Send + 'static>(
    mut pipe: W,
    bytes: Vec<u8>,
) -> thread::JoinHandle<std::io::Result<()>> {
    // Dropping the pipe on return closes the child's stdin.
    thread::spawn(move || pipe.write_all(&bytes))
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::LmCallKind;

    fn request(prompt: &str) -> LmRequest {
        LmRequest::text(LmCallKind::Answer, 1, prompt.to_string())
    }

    #[test]
    fn echoes_prompt_through_stdin() {
        let lm = CommandLm::new("cat", Duration::from_secs(10)).expect("cat on PATH");
        let response = lm.complete(&request("hello there")).expect("complete");
        assert_eq!(response, "hello there");
    }

    #[test]
    fn non_zero_exit_is_a_remote_call_error() {
        let lm = CommandLm::new("sh -c 'echo boom >&2; exit 3'", Duration::from_secs(10))
            .expect("sh on PATH");
        match lm.complete(&request("x")) {
            Err(LmError::RemoteCall(message)) => assert!(message.contains("boom"), "{message}"),
            other => panic!("expected remote call error, got {other:?}"),
        }
    }

    #[test]
    fn slow_command_times_out() {
        let lm = CommandLm::new("sh -c 'sleep 5'", Duration::from_millis(100)).expect("sh");
        let started = Instant::now();
        match lm.complete(&request("x")) {
            Err(LmError::Timeout(limit)) => assert_eq!(limit, Duration::from_millis(100)),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn deadline_applies_while_child_ignores_large_prompt() {
        let lm = CommandLm::new("sh -c 'sleep 3'", Duration::from_millis(100)).expect("sh");
        let prompt = "x".repeat(1024 * 1024);
        let started = Instant::now();
        match lm.complete(&request(&prompt)) {
            Err(LmError::Timeout(limit)) => assert_eq!(limit, Duration::from_millis(100)),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn large_prompt_round_trips_through_reading_child() {
        let lm = CommandLm::new("cat", Duration::from_secs(10)).expect("cat on PATH");
        let prompt = "y".repeat(512 * 1024);
        let response = lm.complete(&request(&prompt)).expect("complete");
        assert_eq!(response.len(), prompt.len());
    }

    #[test]
    fn missing_program_is_rejected_up_front() {
        let err = CommandLm::new("definitely-not-an-lm-binary-xyz", Duration::from_secs(1))
            .expect_err("missing program");
        assert!(err.to_string().contains("not found"));
        assert!(CommandLm::new("   ", Duration::from_secs(1)).is_err());
    }
}
