// Wizard Flow - terminal driver
//
// Usage: wizard-flow [wizard] [workspace]
//
// Runs every catalog step in order against the local SQLite database,
// resuming wherever the previous run stopped.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use wizard_flow::engine::{AnswerStatus, SequencerState};
use wizard_flow::services::wizard::{
    catalog, FinalizeOutcome, Identity, SubmitOutcome, TracingNotifier, WizardController,
    WizardServices, WizardView,
};
use wizard_flow::storage::config::ConfigService;
use wizard_flow::storage::database::Database;
use wizard_flow::utils::logging;
use wizard_flow::WizardSession;

const DEFAULT_WIZARD: &str = "launch";
const DEFAULT_WORKSPACE: &str = "default";

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Answer(&'a str),
    Draft(&'a str),
    Reset(usize),
    Submit,
    Restart,
    Help,
    Quit,
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let trimmed = line.trim();
        let Some(command) = trimmed.strip_prefix(':') else {
            return Self::Answer(line);
        };
        let (name, rest) = command
            .split_once(char::is_whitespace)
            .map(|(name, rest)| (name, rest.trim()))
            .unwrap_or((command, ""));
        match name {
            "q" | "quit" => Self::Quit,
            "submit" => Self::Submit,
            "restart" => Self::Restart,
            "help" => Self::Help,
            "draft" => Self::Draft(rest),
            "reset" => match rest.parse::<usize>() {
                Ok(n) if n > 0 => Self::Reset(n - 1),
                _ => Self::Unknown(trimmed),
            },
            _ => Self::Unknown(trimmed),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let wizard = args.next().unwrap_or_else(|| DEFAULT_WIZARD.to_string());
    let workspace = args.next().unwrap_or_else(|| DEFAULT_WORKSPACE.to_string());

    let config_service = ConfigService::new().context("Failed to load configuration")?;
    let config = config_service.config().clone();
    logging::init(Some(&config.log_filter));

    let db = match &config.database_path {
        Some(path) => Database::open(Path::new(path)),
        None => Database::new(),
    }
    .context("Failed to open database")?;
    let services = WizardServices::sqlite(&db, Arc::new(TracingNotifier));

    let session = open_session(&services, &workspace, &wizard).await?;
    tracing::info!("[Driver] Session {} for workspace {}", session.id, workspace);
    println!("Wizard '{}' (session {}). Type :help for commands.", wizard, session.id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    for step in catalog::names() {
        if session.is_step_completed(step) {
            println!("\n== {} (already submitted)", step);
            continue;
        }

        let model = Arc::new(catalog::by_name(step)?);
        let controller = WizardController::new(
            model,
            config.clone(),
            services.clone(),
            Identity::new(workspace.as_str(), Some(session.id.clone())),
        );

        println!("\n== {}", step);
        let report = controller.mount().await.context("Failed to load wizard step")?;
        if report.pointer_discarded {
            tracing::debug!("[Driver] Stale question pointer dropped for '{}'", step);
        }
        if let Some(outcome) = &report.resumed_finalize {
            print_finalize(outcome);
        }
        print_transcript(&controller.view().await);

        let keep_going = run_step(&controller, &mut lines).await?;
        controller.flush().await.context("Failed to save progress")?;
        if !keep_going {
            println!("Progress saved. Run again to resume.");
            return Ok(());
        }
    }

    println!("\nAll steps submitted.");
    Ok(())
}

/// Resume the newest unfinished session or start a new one.
async fn open_session(
    services: &WizardServices,
    workspace: &str,
    wizard: &str,
) -> anyhow::Result<WizardSession> {
    if let Some(session) = services.sessions.latest_session(workspace, wizard).await? {
        if !session.is_complete() {
            return Ok(session);
        }
    }
    let session = WizardSession::new(workspace, wizard, catalog::names());
    services
        .sessions
        .save_session(&session)
        .await
        .context("Failed to create session")?;
    Ok(session)
}

/// Drive one step until it is submitted. Returns false when the user quits.
async fn run_step(
    controller: &WizardController,
    lines: &mut Lines<BufReader<Stdin>>,
) -> anyhow::Result<bool> {
    loop {
        let view = controller.view().await;
        if view.is_completed {
            return Ok(true);
        }
        print_prompt(&view);

        let Some(line) = lines.next_line().await.context("Failed to read from stdin")? else {
            return Ok(false);
        };

        match Command::parse(&line) {
            Command::Quit => return Ok(false),
            Command::Help => print_help(),
            Command::Submit => print_finalize(&controller.finalize().await),
            Command::Restart => {
                controller.restart().await;
            }
            Command::Draft(text) => {
                if !controller.set_draft(text).await {
                    println!("  No question is waiting for an answer.");
                }
            }
            Command::Reset(index) => {
                if let Err(e) = controller.reset_item(index).await {
                    println!("  ! {}", e);
                }
            }
            Command::Unknown(text) => println!("  Unknown command '{}'. Type :help.", text),
            Command::Answer(text) => match controller.submit_current(text).await {
                SubmitOutcome::Completed => print_finalize(&FinalizeOutcome::Submitted),
                SubmitOutcome::FinalizeFailed(e) => {
                    println!("  ! {}", e);
                    println!("  Type :submit to retry.");
                }
                // The error slot is printed with the next prompt
                SubmitOutcome::Rejected(_) | SubmitOutcome::Advanced(_) => {}
                SubmitOutcome::Ignored => println!("  Still working on the previous answer."),
            },
        }
    }
}

fn print_prompt(view: &WizardView) {
    if let Some(error) = &view.error {
        println!("  ! {}", error);
    }
    match &view.prompt {
        Some(prompt) => {
            let mut line = format!("? {}", prompt.label);
            if !prompt.choices.is_empty() {
                let labels: Vec<&str> = prompt.choices.iter().map(|c| c.label.as_str()).collect();
                line.push_str(&format!(" [{}]", labels.join(" / ")));
            }
            if !prompt.required {
                line.push_str(" (optional)");
            }
            println!("{}", line);
            if !view.draft.is_empty() {
                println!("  (current: {})", view.draft);
            }
        }
        None if view.state == SequencerState::Finalizing => {
            println!("All questions answered. Type :submit to send '{}'.", view.step);
        }
        None => {}
    }
}

fn print_transcript(view: &WizardView) {
    for line in &view.transcript {
        match &line.status {
            AnswerStatus::Answered(value) => println!("  {}: {}", line.label, value),
            AnswerStatus::Skipped => println!("  {}: (skipped)", line.label),
            AnswerStatus::Unanswered => {}
        }
    }
}

fn print_finalize(outcome: &FinalizeOutcome) {
    match outcome {
        FinalizeOutcome::Submitted => println!("Step submitted."),
        FinalizeOutcome::Empty => println!("Nothing to submit yet."),
        FinalizeOutcome::AlreadyRunning => println!("Submission already in progress."),
        FinalizeOutcome::NotReady => println!("There are still questions to answer."),
        FinalizeOutcome::Failed(e) => println!("  ! {}", e),
    }
}

fn print_help() {
    println!("  <text>        answer the current question (skip / no / none to leave blank)");
    println!("  :draft <text> save text without submitting it");
    println!("  :reset <n>    clear item n of the list and answer it again");
    println!("  :submit       send the step once every question is answered");
    println!("  :restart      discard this step's answers");
    println!("  :quit         save progress and exit");
}
