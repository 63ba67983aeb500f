//! Role-selecting answer workflow with LM quality checks.
//!
//! A question runs through role selection, an optional clarification
//! sub-flow, answering, and a quality check that sends rejected answers back
//! with the judge's feedback a bounded number of times.
//!
//! The language model sits behind [`lm::LanguageModel`] and the end user
//! behind [`workflow::HumanChannel`], so the controller can be driven by the
//! CLI, by an embedding program, or by scripted doubles in tests.
pub mod config;
pub mod error;
pub mod lm;
pub mod roles;
mod util;
pub mod workflow;
