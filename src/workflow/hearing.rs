//! Human side of the clarification sub-flow.
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::Mutex;

/// One reply to a follow-up question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HumanReply {
    Answer(String),
    /// The input channel is gone; no further questions can be asked.
    Closed,
}

/// Channel for asking the end user follow-up questions.
///
/// Implementations never fail: read errors are reported as [`HumanReply::Closed`].
pub trait HumanChannel: Send + Sync {
    /// Ask question `index` (0-based) and wait for the reply.
    fn ask(&self, index: usize, question: &str) -> HumanReply;
}

/// Reads answers line by line from stdin, prompting on stderr.
pub struct StdinChannel;

impl HumanChannel for StdinChannel {
    fn ask(&self, index: usize, question: &str) -> HumanReply {
        let mut stderr = std::io::stderr().lock();
        if index == 0 {
            let _ = writeln!(
                stderr,
                "\n--- A few follow-up questions (answer what you can, Enter to skip) ---"
            );
        }
        let _ = write!(stderr, "Q{n}. {question}\nA{n}: ", n = index + 1);
        let _ = stderr.flush();

        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) => HumanReply::Closed,
            Ok(_) => HumanReply::Answer(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(err) => {
                tracing::warn!(error = %err, "reading clarification answer failed");
                HumanReply::Closed
            }
        }
    }
}

/// Replays a fixed list of replies, then reports the channel closed.
///
/// Backs `ask --answer` for non-interactive runs.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    replies: Mutex<VecDeque<HumanReply>>,
}

impl ScriptedChannel {
    pub fn new(replies: impl IntoIterator<Item = HumanReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
        }
    }

    /// Convenience for answer-only scripts; empty strings are blank answers.
    pub fn answers<S: Into<String>>(answers: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            answers
                .into_iter()
                .map(|answer| HumanReply::Answer(answer.into())),
        )
    }
}

impl HumanChannel for ScriptedChannel {
    fn ask(&self, index: usize, question: &str) -> HumanReply {
        tracing::debug!(index, question, "scripted clarification question");
        self.replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .unwrap_or(HumanReply::Closed)
    }
}
