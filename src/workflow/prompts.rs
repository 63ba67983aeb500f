//! Prompt templates and rendering.
//!
//! Templates live in `prompts/` and are compiled in. Placeholders are
//! `{name}`; rendering is a single pass, so values containing braces are never
//! re-expanded.
use crate::roles::RoleProfile;
use crate::workflow::ConversationState;

const ROLE_SELECTION: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/role_selection.md"
));
const CLARIFICATION: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/clarification.md"
));
const ANSWER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/prompts/answer.md"));
const ANSWER_FEEDBACK: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/answer_feedback.md"
));
const QUALITY_CHECK: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/quality_check.md"
));

const NO_CONTEXT: &str = "(none)";
const NO_USER_INPUT: &str = "(no additional input)";

/// Substitute `{name}` placeholders. Unknown placeholders are kept verbatim.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn role_selection(query: &str, roles: &[RoleProfile]) -> String {
    let role_options = roles
        .iter()
        .map(|role| format!("{}: {}: {}", role.id, role.name, role.description))
        .collect::<Vec<_>>()
        .join("\n");
    render(
        ROLE_SELECTION,
        &[("query", query), ("role_options", &role_options)],
    )
}

pub fn clarification(state: &ConversationState) -> String {
    render(
        CLARIFICATION,
        &[
            ("query", state.query()),
            ("extra_context", or_placeholder(state.extra_context(), NO_CONTEXT)),
            ("role", state.selected_role()),
        ],
    )
}

/// Answer prompt. Every role's details are listed, not only the selected
/// one. The feedback section appears only when a rejection must be addressed.
pub fn answer(state: &ConversationState, roles: &[RoleProfile]) -> String {
    let role_details = roles
        .iter()
        .map(|role| format!("- {}: {}", role.name, role.details))
        .collect::<Vec<_>>()
        .join("\n");
    let feedback_section = if state.feedback_due() {
        render(ANSWER_FEEDBACK, &[("judge_reason", state.judge_reason())])
    } else {
        String::new()
    };
    render(
        ANSWER,
        &[
            ("role", state.selected_role()),
            ("role_details", &role_details),
            ("query", state.query()),
            (
                "extra_context",
                or_placeholder(state.extra_context(), NO_USER_INPUT),
            ),
            ("feedback_section", &feedback_section),
        ],
    )
}

pub fn quality_check(state: &ConversationState) -> String {
    render(
        QUALITY_CHECK,
        &[
            ("role", state.selected_role()),
            ("query", state.query()),
            ("extra_context", or_placeholder(state.extra_context(), NO_CONTEXT)),
            ("answer", state.current_answer().unwrap_or_default()),
        ],
    )
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.trim().is_empty() {
        placeholder
    } else {
        value
    }
}
