//! Stage implementations.
//!
//! Each stage reads the conversation state and returns the delta it produced.
//! None of them touches `retry_count`.
use super::controller::CancelToken;
use super::hearing::{HumanChannel, HumanReply};
use super::prompts;
use super::state::{Clarification, ConversationState, StateDelta, Verdict};
use crate::lm::{complete_structured, LanguageModel, LmCallKind, LmError, LmRequest, OutputSchema};
use crate::roles::RoleCatalog;
use serde::Deserialize;

/// The selector only has to emit an id.
const ROLE_SELECTION_MAX_TOKENS: u32 = 3;
const MAX_CLARIFICATION_QUESTIONS: usize = 3;

const CLARIFICATION_SCHEMA: OutputSchema = OutputSchema {
    name: "clarification decision",
    shape: r#"{"need": true, "reasons": ["..."], "questions": ["..."]}"#,
};

const VERDICT_SCHEMA: OutputSchema = OutputSchema {
    name: "quality verdict",
    shape: r#"{"judge": true, "reason": "..."}"#,
};

#[derive(Debug, Deserialize)]
struct ClarificationDecision {
    need: bool,
    #[serde(default)]
    reasons: Vec<String>,
    #[serde(default)]
    questions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Judgement {
    #[serde(default)]
    judge: bool,
    #[serde(default)]
    reason: String,
}

fn attempt(state: &ConversationState) -> u32 {
    state.retry_count() + 1
}

/// Pick a role and record its display name. Unparseable responses resolve to
/// the catalog's default role.
pub fn select_role(
    lm: &dyn LanguageModel,
    catalog: &RoleCatalog,
    state: &ConversationState,
) -> Result<StateDelta, LmError> {
    let prompt = prompts::role_selection(state.query(), catalog.all_roles());
    let request = LmRequest::text(LmCallKind::RoleSelection, attempt(state), prompt)
        .with_max_tokens(ROLE_SELECTION_MAX_TOKENS);
    let raw = lm.complete(&request)?;
    let role = catalog.resolve_selection(&raw);
    tracing::info!(role_id = %role.id, role = %role.name, "role selected");
    Ok(StateDelta {
        selected_role: Some(role.name.clone()),
        ..StateDelta::default()
    })
}

/// Decide whether the question needs follow-up before answering.
pub fn assess_clarification(
    lm: &dyn LanguageModel,
    state: &ConversationState,
) -> Result<StateDelta, LmError> {
    let request = LmRequest::structured(
        LmCallKind::Clarification,
        attempt(state),
        prompts::clarification(state),
        CLARIFICATION_SCHEMA,
    );
    let decision: ClarificationDecision = complete_structured(lm, &request)?.into_result()?;
    let questions: Vec<String> = decision
        .questions
        .into_iter()
        .map(|question| question.trim().to_string())
        .filter(|question| !question.is_empty())
        .take(MAX_CLARIFICATION_QUESTIONS)
        .collect();
    tracing::info!(
        need = decision.need,
        questions = questions.len(),
        reasons = ?decision.reasons,
        "clarification assessed"
    );
    Ok(StateDelta {
        clarification: Some(Clarification {
            needed: decision.need,
            questions,
        }),
        ..StateDelta::default()
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HearingOutcome {
    Finished(StateDelta),
    /// Cancellation was observed; nothing collected is kept.
    Cancelled,
}

/// Ask each clarification question in order and fold non-blank answers into
/// `"{question} => {answer}"` lines. A closed channel ends the hearing early.
pub fn hear(
    channel: &dyn HumanChannel,
    state: &ConversationState,
    cancel: &CancelToken,
) -> HearingOutcome {
    let mut lines = Vec::new();
    for (index, question) in state.clarification_questions().iter().enumerate() {
        if cancel.is_cancelled() {
            return HearingOutcome::Cancelled;
        }
        match channel.ask(index, question) {
            HumanReply::Answer(answer) => {
                let answer = answer.trim();
                if !answer.is_empty() {
                    lines.push(format!("{question} => {answer}"));
                }
            }
            HumanReply::Closed => {
                tracing::debug!(index, "clarification channel closed");
                break;
            }
        }
    }
    if cancel.is_cancelled() {
        return HearingOutcome::Cancelled;
    }
    tracing::info!(
        asked = state.clarification_questions().len(),
        answered = lines.len(),
        "hearing finished"
    );
    HearingOutcome::Finished(StateDelta {
        context_lines: lines,
        ..StateDelta::default()
    })
}

/// Produce the next candidate answer.
pub fn answer(
    lm: &dyn LanguageModel,
    catalog: &RoleCatalog,
    state: &ConversationState,
) -> Result<StateDelta, LmError> {
    let request = LmRequest::text(
        LmCallKind::Answer,
        attempt(state),
        prompts::answer(state, catalog.all_roles()),
    );
    let text = lm.complete(&request)?;
    Ok(StateDelta {
        answer: Some(text.trim().to_string()),
        ..StateDelta::default()
    })
}

/// Judge the latest answer.
pub fn judge(lm: &dyn LanguageModel, state: &ConversationState) -> Result<StateDelta, LmError> {
    let request = LmRequest::structured(
        LmCallKind::QualityCheck,
        attempt(state),
        prompts::quality_check(state),
        VERDICT_SCHEMA,
    );
    let judgement: Judgement = complete_structured(lm, &request)?.into_result()?;
    tracing::info!(
        attempt = attempt(state),
        approved = judgement.judge,
        reason = %judgement.reason,
        "answer judged"
    );
    Ok(StateDelta {
        verdict: Some(Verdict {
            approved: judgement.judge,
            reason: judgement.reason,
        }),
        ..StateDelta::default()
    })
}

#[cfg(test)]
#[path = "stages_tests.rs"]
mod tests;
