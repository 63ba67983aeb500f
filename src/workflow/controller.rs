//! Workflow controller: drives the stage machine over one conversation.
//!
//! The controller owns the [`ConversationState`] for the whole run, merges the
//! delta each stage returns, and is the only place `retry_count` changes.
//! Cancellation is checked between stages; an in-flight LM call always
//! completes first.
use super::hearing::HumanChannel;
use super::machine::{transition, DoneReason, Event, InvalidTransition, Stage, Variant};
use super::stages::{self, HearingOutcome};
use super::state::ConversationState;
use crate::config::DEFAULT_MAX_RETRIES;
use crate::error::ErrorKind;
use crate::lm::{LanguageModel, LmError};
use crate::roles::RoleCatalog;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowOptions {
    pub max_retries: u32,
    pub variant: Variant,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            variant: Variant::Clarify,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The judge accepted the final answer.
    Approved,
    /// Retries ran out; the final answer was rejected and is returned as-is.
    BestEffort,
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowOutcome {
    pub status: OutcomeStatus,
    pub role: String,
    pub judge_verdict: bool,
    pub judge_reason: String,
    pub extra_context: String,
    pub answer: String,
    pub retry_count: u32,
    pub answer_history: Vec<String>,
}

impl WorkflowOutcome {
    fn from_state(state: ConversationState, reason: DoneReason) -> Self {
        let status = match reason {
            DoneReason::Approved => OutcomeStatus::Approved,
            DoneReason::Exhausted => OutcomeStatus::BestEffort,
        };
        Self {
            status,
            role: state.selected_role().to_string(),
            judge_verdict: state.judge_verdict(),
            judge_reason: state.judge_reason().to_string(),
            extra_context: state.extra_context().to_string(),
            answer: state.current_answer().unwrap_or_default().to_string(),
            retry_count: state.retry_count(),
            answer_history: state.answer_history().to_vec(),
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == OutcomeStatus::Approved
    }
}

/// Run-level failure. Names the stage that failed and the last one that
/// completed, so a caller can decide whether to start over.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow aborted in {stage} ({kind}; last completed: {}): {source}", label(.last_completed))]
    Stage {
        stage: Stage,
        last_completed: Option<Stage>,
        kind: ErrorKind,
        source: LmError,
    },
    #[error("workflow cancelled before {stage} (last completed: {})", label(.last_completed))]
    Cancelled {
        stage: Stage,
        last_completed: Option<Stage>,
    },
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

fn label(stage: &Option<Stage>) -> String {
    stage.map_or_else(|| "none".to_string(), |stage| stage.to_string())
}

impl WorkflowError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Stage { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn last_completed(&self) -> Option<Stage> {
        match self {
            Self::Stage { last_completed, .. } | Self::Cancelled { last_completed, .. } => {
                *last_completed
            }
            Self::InvalidTransition(_) => None,
        }
    }
}

pub struct WorkflowController<'a> {
    lm: &'a dyn LanguageModel,
    catalog: &'a RoleCatalog,
    channel: &'a dyn HumanChannel,
    options: WorkflowOptions,
    cancel: CancelToken,
}

impl<'a> WorkflowController<'a> {
    pub fn new(
        lm: &'a dyn LanguageModel,
        catalog: &'a RoleCatalog,
        channel: &'a dyn HumanChannel,
        options: WorkflowOptions,
    ) -> Self {
        Self {
            lm,
            catalog,
            channel,
            options,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the workflow for one query until it reaches a terminal stage.
    pub fn run(&self, query: &str) -> Result<WorkflowOutcome, WorkflowError> {
        let mut state = ConversationState::new(query, self.options.max_retries);
        let mut stage = Stage::SelectingRole;
        let mut last_completed = None;

        loop {
            let fail = move |source: LmError| WorkflowError::Stage {
                stage,
                last_completed,
                kind: source.kind(),
                source,
            };
            let delta = match stage {
                Stage::Done(reason) => {
                    tracing::info!(
                        outcome = %stage,
                        retries = state.retry_count(),
                        "workflow finished"
                    );
                    return Ok(WorkflowOutcome::from_state(state, reason));
                }
                _ if self.cancel.is_cancelled() => {
                    return Err(WorkflowError::Cancelled {
                        stage,
                        last_completed,
                    });
                }
                Stage::SelectingRole => {
                    stages::select_role(self.lm, self.catalog, &state).map_err(fail)?
                }
                Stage::AssessingClarification => {
                    stages::assess_clarification(self.lm, &state).map_err(fail)?
                }
                Stage::Hearing => match stages::hear(self.channel, &state, &self.cancel) {
                    HearingOutcome::Finished(delta) => delta,
                    HearingOutcome::Cancelled => {
                        return Err(WorkflowError::Cancelled {
                            stage,
                            last_completed,
                        })
                    }
                },
                Stage::Answering => stages::answer(self.lm, self.catalog, &state).map_err(fail)?,
                Stage::Checking => stages::judge(self.lm, &state).map_err(fail)?,
            };
            state.apply(delta);

            let event = match stage {
                Stage::SelectingRole => Event::RoleSelected,
                Stage::AssessingClarification => Event::ClarificationAssessed {
                    needed: state.needs_clarification(),
                },
                Stage::Hearing => Event::HearingFinished,
                Stage::Answering => Event::Answered,
                _ => Event::Judged {
                    approved: state.judge_verdict(),
                    retries_remaining: state.retries_remaining(),
                },
            };
            let next = transition(stage, event, self.options.variant)?;
            if stage == Stage::Checking && !next.is_terminal() {
                state.record_retry();
                tracing::info!(
                    retry = state.retry_count(),
                    max_retries = state.max_retries(),
                    reason = %state.judge_reason(),
                    "answer rejected, retrying"
                );
            }
            tracing::debug!(from = %stage, to = %next, "workflow transition");
            last_completed = Some(stage);
            stage = next;
        }
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
