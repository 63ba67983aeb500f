//! Stage graph of the workflow as a pure transition function.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Whether the run includes the clarification sub-flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Role -> clarification check -> [hearing] -> answer -> check; retries
    /// return to the clarification check.
    #[default]
    Clarify,
    /// Role -> answer -> check; retries return to answering.
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneReason {
    /// The judge accepted the latest answer.
    Approved,
    /// Retries ran out with the latest answer still rejected.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SelectingRole,
    AssessingClarification,
    Hearing,
    Answering,
    Checking,
    Done(DoneReason),
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done(_))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelectingRole => write!(f, "selecting_role"),
            Self::AssessingClarification => write!(f, "assessing_clarification"),
            Self::Hearing => write!(f, "hearing"),
            Self::Answering => write!(f, "answering"),
            Self::Checking => write!(f, "checking"),
            Self::Done(DoneReason::Approved) => write!(f, "done(approved)"),
            Self::Done(DoneReason::Exhausted) => write!(f, "done(exhausted)"),
        }
    }
}

/// What a completed stage reports back to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    RoleSelected,
    ClarificationAssessed { needed: bool },
    HearingFinished,
    Answered,
    Judged { approved: bool, retries_remaining: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no transition from {stage} on {event:?}")]
pub struct InvalidTransition {
    pub stage: Stage,
    pub event: Event,
}

/// Next stage for `event` observed in `stage`.
///
/// A `Judged` rejection with retries remaining leads back into the loop; the
/// caller is responsible for counting that retry.
pub fn transition(
    stage: Stage,
    event: Event,
    variant: Variant,
) -> Result<Stage, InvalidTransition> {
    let next = match (stage, event) {
        (Stage::SelectingRole, Event::RoleSelected) => loop_entry(variant),
        (Stage::AssessingClarification, Event::ClarificationAssessed { needed: true }) => {
            Stage::Hearing
        }
        (Stage::AssessingClarification, Event::ClarificationAssessed { needed: false }) => {
            Stage::Answering
        }
        (Stage::Hearing, Event::HearingFinished) => Stage::Answering,
        (Stage::Answering, Event::Answered) => Stage::Checking,
        (Stage::Checking, Event::Judged { approved: true, .. }) => {
            Stage::Done(DoneReason::Approved)
        }
        (
            Stage::Checking,
            Event::Judged {
                approved: false,
                retries_remaining: true,
            },
        ) => loop_entry(variant),
        (
            Stage::Checking,
            Event::Judged {
                approved: false,
                retries_remaining: false,
            },
        ) => Stage::Done(DoneReason::Exhausted),
        _ => return Err(InvalidTransition { stage, event }),
    };
    Ok(next)
}

fn loop_entry(variant: Variant) -> Stage {
    match variant {
        Variant::Clarify => Stage::AssessingClarification,
        Variant::Direct => Stage::Answering,
    }
}
