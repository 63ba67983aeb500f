use anyhow::{anyhow, Context, Result};
use clap::Parser;
use role_answer::config::{
    catalog, config_stub, default_config_path, resolve_config, resolve_lm_command, write_config,
    LM_COMMAND_ENV,
};
use role_answer::error::ErrorKind;
use role_answer::lm::{build_client, load_call_log, CallLogEntry, LanguageModel, LoggedLm};
use role_answer::workflow::{
    HumanChannel, ScriptedChannel, StdinChannel, Variant, WorkflowController, WorkflowOptions,
    WorkflowOutcome,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Read;
use tracing_subscriber::EnvFilter;

mod cli;
use cli::{AskArgs, Command, InitArgs, LogArgs, RolesArgs, RootArgs};

fn main() -> Result<()> {
    let args = RootArgs::parse();
    let verbose = matches!(&args.command, Command::Ask(ask) if ask.verbose);
    init_tracing(verbose);

    match args.command {
        Command::Ask(args) => cmd_ask(args),
        Command::Roles(args) => cmd_roles(args),
        Command::Init(args) => cmd_init(args),
        Command::Log(args) => cmd_log(args),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_ask(args: AskArgs) -> Result<()> {
    let mut config = resolve_config(args.config.as_deref())?;
    if let Some(max_retries) = args.max_retries {
        config.max_retries = max_retries;
    }
    if args.direct {
        config.variant = Variant::Direct;
    }
    config.lm.command = resolve_lm_command(
        args.lm.as_deref(),
        &config.lm,
        std::env::var(LM_COMMAND_ENV).ok(),
    );
    let catalog = catalog(&config)?;

    let query = match args.query {
        Some(query) => query,
        None => read_stdin_query()?,
    };
    let query = query.trim();
    if query.is_empty() {
        return Err(anyhow!("empty question (pass QUERY or pipe it on stdin)"));
    }

    let client = build_client(&config.lm)?;
    let lm: Box<dyn LanguageModel> = match &args.log {
        Some(path) => Box::new(LoggedLm::new(client, path.clone())),
        None => client,
    };
    let channel: Box<dyn HumanChannel> = if args.answers.is_empty() {
        Box::new(StdinChannel)
    } else {
        Box::new(ScriptedChannel::answers(args.answers))
    };
    let options = WorkflowOptions {
        max_retries: config.max_retries,
        variant: config.variant,
    };

    let controller = WorkflowController::new(lm.as_ref(), &catalog, channel.as_ref(), options);
    match controller.run(query) {
        Ok(outcome) if args.json => print_json(&outcome),
        Ok(outcome) => {
            print_outcome(&outcome);
            Ok(())
        }
        Err(err) => {
            if args.json {
                print_json(&ErrorReport {
                    error: err.to_string(),
                    kind: err.kind(),
                    transient: err.kind().is_some_and(ErrorKind::is_transient),
                    last_completed: err.last_completed().map(|stage| stage.to_string()),
                })?;
            }
            Err(err.into())
        }
    }
}

#[derive(Serialize)]
struct ErrorReport {
    error: String,
    kind: Option<ErrorKind>,
    /// Whether rerunning the whole workflow may succeed.
    transient: bool,
    last_completed: Option<String>,
}

fn read_stdin_query() -> Result<String> {
    let mut query = String::new();
    std::io::stdin()
        .read_to_string(&mut query)
        .context("read question from stdin")?;
    Ok(query)
}

fn print_outcome(outcome: &WorkflowOutcome) {
    println!("Role: {}", outcome.role);
    if outcome.is_approved() {
        println!("Status: approved (retries: {})", outcome.retry_count);
    } else {
        println!(
            "Status: best effort, not approved after {} retries",
            outcome.retry_count
        );
    }
    if !outcome.judge_reason.is_empty() {
        println!("Review: {}", outcome.judge_reason);
    }
    if !outcome.extra_context.is_empty() {
        println!();
        println!("Additional context:");
        for line in outcome.extra_context.lines() {
            println!("  {line}");
        }
    }
    println!();
    println!("{}", outcome.answer);
}

fn cmd_roles(args: RolesArgs) -> Result<()> {
    let config = resolve_config(args.config.as_deref())?;
    let catalog = catalog(&config)?;

    if let Some(id) = &args.id {
        let role = catalog.describe(id)?;
        if args.json {
            return print_json(role);
        }
        println!("{}: {}", role.id, role.name);
        println!("  {}", role.description);
        println!("  {}", role.details);
        return Ok(());
    }

    if args.json {
        return print_json(catalog.all_roles());
    }
    for role in catalog.all_roles() {
        println!("{}: {} - {}", role.id, role.name, role.description);
    }
    Ok(())
}

fn cmd_init(args: InitArgs) -> Result<()> {
    let path = args
        .config
        .or_else(default_config_path)
        .ok_or_else(|| anyhow!("no config directory on this platform (pass --config)"))?;
    write_config(&path, &config_stub()?, args.force)?;
    println!("Wrote config to {}", path.display());
    Ok(())
}

#[derive(Serialize)]
struct LogSummary {
    calls: usize,
    failed: usize,
    total_duration_ms: u64,
    by_kind: BTreeMap<String, usize>,
    entries: Vec<CallLogEntry>,
}

fn summarize_log(entries: Vec<CallLogEntry>) -> LogSummary {
    let mut by_kind = BTreeMap::new();
    for entry in &entries {
        *by_kind.entry(entry.kind.to_string()).or_insert(0) += 1;
    }
    LogSummary {
        calls: entries.len(),
        failed: entries.iter().filter(|entry| entry.error.is_some()).count(),
        total_duration_ms: entries.iter().map(|entry| entry.duration_ms).sum(),
        by_kind,
        entries,
    }
}

fn cmd_log(args: LogArgs) -> Result<()> {
    let summary = summarize_log(load_call_log(&args.path)?);
    if args.json {
        return print_json(&summary);
    }
    println!(
        "{} calls, {} failed, {} ms total",
        summary.calls, summary.failed, summary.total_duration_ms
    );
    for (kind, count) in &summary.by_kind {
        println!("  {kind}: {count}");
    }
    for entry in &summary.entries {
        match &entry.error {
            Some(error) => println!(
                "[attempt {}] {} {}ms failed: {error}",
                entry.attempt, entry.kind, entry.duration_ms
            ),
            None => println!(
                "[attempt {}] {} {}ms",
                entry.attempt, entry.kind, entry.duration_ms
            ),
        }
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{text}");
    Ok(())
}
