//! CLI argument parsing for the answer workflow.
//!
//! The CLI is thin: it resolves config and flags, then hands off to the
//! library controller.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "ranswer",
    version,
    about = "Answer questions through a role-selecting LM workflow with quality checks",
    after_help = "Commands:\n  ask [QUERY]              Run the workflow for one question\n  roles                    List the role catalog\n  init --config <path>     Write a config stub with the built-in roles\n  log <path>               Summarize an LM call log\n\nExamples:\n  ranswer ask --lm 'llm -m gpt-4o-mini' \"What is the capital of France?\"\n  echo 'Plan a 3-day trip' | ranswer ask --direct --json\n  ranswer ask --log /tmp/calls.jsonl --answer Kyoto --answer 'in April' 'Plan my trip'\n  ranswer roles --json\n  ranswer log /tmp/calls.jsonl",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Ask(AskArgs),
    Roles(RolesArgs),
    Init(InitArgs),
    Log(LogArgs),
}

#[derive(Parser, Debug)]
#[command(about = "Run the answer workflow for one question")]
pub struct AskArgs {
    /// Question to answer; read from stdin when omitted
    pub query: Option<String>,

    /// Config file (defaults to the user config dir, then built-in defaults)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// LM command line for the command backend (prompt on stdin, answer on stdout)
    #[arg(long, value_name = "CMD")]
    pub lm: Option<String>,

    /// Maximum number of re-answers after a rejected quality check
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Skip the clarification sub-flow
    #[arg(long)]
    pub direct: bool,

    /// Answer clarification questions from this list instead of stdin (repeatable)
    #[arg(long = "answer", value_name = "TEXT")]
    pub answers: Vec<String>,

    /// Append one JSON line per LM call to this file
    #[arg(long, value_name = "PATH")]
    pub log: Option<PathBuf>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,

    /// Emit debug-level logs on stderr
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
#[command(about = "List the configured role catalog")]
pub struct RolesArgs {
    /// Config file (defaults to the user config dir, then built-in defaults)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Show a single role by id
    #[arg(long, value_name = "ID")]
    pub id: Option<String>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Write a config stub with the built-in roles")]
pub struct InitArgs {
    /// Destination path (defaults to the user config dir)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Overwrite an existing config
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Summarize an LM call log written by `ask --log`")]
pub struct LogArgs {
    /// Call log path
    pub path: PathBuf,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}
