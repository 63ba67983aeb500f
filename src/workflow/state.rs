//! Conversation state threaded through one workflow run.
//!
//! Stages never mutate the state directly. They read it and return a
//! [`StateDelta`] naming the fields they changed; the controller merges the
//! delta. `retry_count` is not part of any delta: only the controller bumps it.
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationState {
    query: String,
    selected_role: String,
    answer_history: Vec<String>,
    judge_verdict: bool,
    judge_reason: String,
    retry_count: u32,
    max_retries: u32,
    needs_clarification: bool,
    clarification_questions: Vec<String>,
    extra_context: String,
}

/// Quality judge decision on the latest answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub approved: bool,
    pub reason: String,
}

/// Clarification assessment for the current pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Clarification {
    pub needed: bool,
    pub questions: Vec<String>,
}

/// Fields changed by one stage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StateDelta {
    pub selected_role: Option<String>,
    pub clarification: Option<Clarification>,
    /// `"{question} => {answer}"` lines to append to the extra context.
    pub context_lines: Vec<String>,
    pub answer: Option<String>,
    pub verdict: Option<Verdict>,
}

impl ConversationState {
    pub fn new(query: impl Into<String>, max_retries: u32) -> Self {
        Self {
            query: query.into(),
            selected_role: String::new(),
            answer_history: Vec::new(),
            judge_verdict: false,
            judge_reason: String::new(),
            retry_count: 0,
            max_retries,
            needs_clarification: false,
            clarification_questions: Vec::new(),
            extra_context: String::new(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Display name of the selected role; empty until selection completes.
    pub fn selected_role(&self) -> &str {
        &self.selected_role
    }

    pub fn answer_history(&self) -> &[String] {
        &self.answer_history
    }

    pub fn current_answer(&self) -> Option<&str> {
        self.answer_history.last().map(String::as_str)
    }

    pub fn judge_verdict(&self) -> bool {
        self.judge_verdict
    }

    pub fn judge_reason(&self) -> &str {
        &self.judge_reason
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retries_remaining(&self) -> bool {
        self.retry_count < self.max_retries
    }

    pub fn needs_clarification(&self) -> bool {
        self.needs_clarification
    }

    pub fn clarification_questions(&self) -> &[String] {
        &self.clarification_questions
    }

    pub fn extra_context(&self) -> &str {
        &self.extra_context
    }

    /// Whether the next answer must address a previous rejection.
    pub fn feedback_due(&self) -> bool {
        self.retry_count > 0 && !self.judge_verdict && !self.judge_reason.is_empty()
    }

    /// Merge a stage delta.
    ///
    /// The role is only taken while unset and answers are not appended after
    /// an approval; such deltas are dropped with a warning.
    pub(super) fn apply(&mut self, delta: StateDelta) {
        if let Some(role) = delta.selected_role {
            if self.selected_role.is_empty() {
                self.selected_role = role;
            } else {
                tracing::warn!(
                    current = %self.selected_role,
                    ignored = %role,
                    "role already selected"
                );
            }
        }
        if let Some(clarification) = delta.clarification {
            self.needs_clarification = clarification.needed;
            self.clarification_questions = clarification.questions;
        }
        if !delta.context_lines.is_empty() {
            if !self.extra_context.is_empty() {
                self.extra_context.push('\n');
            }
            self.extra_context.push_str(&delta.context_lines.join("\n"));
        }
        if let Some(answer) = delta.answer {
            if self.judge_verdict {
                tracing::warn!("answer produced after approval ignored");
            } else {
                self.answer_history.push(answer);
            }
        }
        if let Some(verdict) = delta.verdict {
            self.judge_verdict = verdict.approved;
            self.judge_reason = verdict.reason;
        }
    }

    /// Count one more attempt. Returns false, leaving the count unchanged,
    /// once the bound is reached.
    pub(super) fn record_retry(&mut self) -> bool {
        if !self.retries_remaining() {
            return false;
        }
        self.retry_count += 1;
        true
    }
}
