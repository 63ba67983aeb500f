//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Canned responses for each prompt kind, served by a generated shell script.
#[derive(Debug, Clone)]
pub struct MockResponses {
    pub role: String,
    pub clarification: String,
    pub answer: String,
    pub verdict: String,
}

impl Default for MockResponses {
    fn default() -> Self {
        Self {
            role: "1".to_string(),
            clarification: r#"{"need": false, "reasons": [], "questions": []}"#.to_string(),
            answer: "Paris is the capital of France.".to_string(),
            verdict: r#"{"judge": true, "reason": "accurate and direct"}"#.to_string(),
        }
    }
}

/// Isolated environment: a temp dir holding the mock LM and acting as the
/// user config dir.
pub struct TestEnv {
    pub dir: TempDir,
    pub lm_command: String,
}

impl TestEnv {
    pub fn new(responses: &MockResponses) -> anyhow::Result<Self> {
        let dir = TempDir::new()?;
        let script = dir.path().join("mock-lm.sh");
        write_script(&script, &mock_script(responses))?;
        Ok(Self {
            lm_command: script.display().to_string(),
            dir,
        })
    }

    /// An LM that always fails with a non-zero exit.
    pub fn failing() -> anyhow::Result<Self> {
        let dir = TempDir::new()?;
        let script = dir.path().join("broken-lm.sh");
        write_script(
            &script,
            "#!/bin/sh\ncat >/dev/null\necho 'upstream unavailable' >&2\nexit 3\n",
        )?;
        Ok(Self {
            lm_command: script.display().to_string(),
            dir,
        })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// `ranswer` with the environment pinned to this temp dir.
    pub fn ranswer(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_ranswer"));
        cmd.env("XDG_CONFIG_HOME", self.dir.path())
            .env("HOME", self.dir.path())
            .env_remove("RANSWER_LM_COMMAND")
            .env_remove("RUST_LOG");
        cmd
    }

    pub fn ask(&self, args: &[&str]) -> anyhow::Result<Output> {
        Ok(self
            .ranswer()
            .arg("ask")
            .arg("--lm")
            .arg(&self.lm_command)
            .args(args)
            .output()?)
    }
}

fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

fn mock_script(responses: &MockResponses) -> String {
    format!(
        r##"#!/bin/sh
prompt=$(cat)
case "$prompt" in
  *"# Task: quality check"*) printf '%s' {verdict} ;;
  *"# Task: clarification check"*) printf '%s' {clarification} ;;
  *"# Task: role selection"*) printf '%s' {role} ;;
  *"# Task: answer"*) printf '%s' {answer} ;;
  *) echo "unrecognized prompt" >&2; exit 2 ;;
esac
"##,
        verdict = shell_quote(&responses.verdict),
        clarification = shell_quote(&responses.clarification),
        role = shell_quote(&responses.role),
        answer = shell_quote(&responses.answer),
    )
}

fn write_script(path: &Path, body: &str) -> anyhow::Result<()> {
    fs::write(path, body)?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

pub fn stdout_json(output: &Output) -> anyhow::Result<serde_json::Value> {
    Ok(serde_json::from_slice(&output.stdout)?)
}
