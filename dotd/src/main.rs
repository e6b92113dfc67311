//! DOTD - outfit analysis client
//!
//! CLI entry point. Acts as the presentation layer: turns commands into app
//! intents and prints the state the app ends up in.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use secrecy::SecretString;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use dotd::cli::{Cli, Command};
use dotd::config::Config;
use dotd::events::{EventBus, LifecycleEvent, read_task_events, spawn_event_logger};
use dotd::gateway::{GenerationRequest, ImageUpload, TaskId};
use dotd::{App, GenerationResult, NavigationView, Outcome};

/// Slack on top of the polling budget before giving up on an outcome
const OUTCOME_GRACE: Duration = Duration::from_secs(5);
const LOGGER_DRAIN: Duration = Duration::from_secs(2);

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dotd")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("dotd.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    info!(base_url = %config.backend.base_url, "dotd loaded config");

    match cli.command {
        Command::Register { name, email, password } => {
            debug!(%email, "main: matched Register command");
            cmd_register(&config, &name, &email, &password).await
        }
        Command::Login { email, password } => {
            debug!(%email, "main: matched Login command");
            cmd_login(&config, &email, &password).await
        }
        Command::Generate {
            image,
            prompt,
            gender,
            age_group,
            email,
            password,
            token,
        } => {
            debug!(?image, "main: matched Generate command");
            let credentials = email.zip(password);
            let request = GenerateArgs {
                image,
                prompt,
                gender,
                age_group,
            };
            cmd_generate(&config, request, credentials, token).await
        }
        Command::History { task_id, file } => {
            debug!(%task_id, "main: matched History command");
            cmd_history(&config, &task_id, file)
        }
    }
}

struct GenerateArgs {
    image: PathBuf,
    prompt: String,
    gender: String,
    age_group: String,
}

async fn cmd_register(config: &Config, name: &str, email: &str, password: &str) -> Result<()> {
    let mut app = App::from_config(config)?;
    let record = app.register(name, email, password).await?;
    println!("{} Registered {} (id {})", "✓".green(), record.name.bold(), record.id);
    Ok(())
}

async fn cmd_login(config: &Config, email: &str, password: &str) -> Result<()> {
    let mut app = App::from_config(config)?;
    let user = app.login(email, password).await?;
    println!("{} Logged in as {} (id {})", "✓".green(), user.name.bold(), user.id);
    if let Some(avatar) = &user.avatar_url {
        println!("  avatar: {}", avatar);
    }
    println!("  view:   {}", app.view());
    Ok(())
}

async fn cmd_generate(
    config: &Config,
    args: GenerateArgs,
    credentials: Option<(String, String)>,
    token: Option<String>,
) -> Result<()> {
    let image = ImageUpload::from_path(&args.image)
        .await
        .with_context(|| format!("Failed to read image {}", args.image.display()))?;
    let request = GenerationRequest::new(image, args.prompt)
        .with_gender(args.gender)
        .with_age_group(args.age_group);

    let mut app = App::from_config(config)?;

    let logger = match &config.events.log_file {
        Some(path) => Some(spawn_event_logger(app.bus(), path).context("Failed to open event log")?),
        None => None,
    };

    if let Some(token) = token {
        if !app.restore_session(SecretString::new(token)).await {
            println!("{} Stored token was rejected, continuing as guest", "!".yellow());
        }
    } else if let Some((email, password)) = credentials {
        let user = app.login(&email, &password).await?;
        println!("{} Logged in as {}", "✓".green(), user.name.bold());
    }

    app.navigate(NavigationView::Generate);
    let progress = spawn_progress_printer(app.bus());

    let outcome = match app.submit(request).await {
        Ok(task_id) => {
            println!("{} Task {} created", "→".cyan(), task_id.to_string().bold());
            let limit = config.polling.max_duration() + config.backend.timeout() + OUTCOME_GRACE;
            tokio::select! {
                outcome = app.wait_for_outcome(limit) => outcome.map_err(eyre::Report::from),
                _ = tokio::signal::ctrl_c() => {
                    warn!("cmd_generate: interrupted, cancelling");
                    app.navigate(NavigationView::Home);
                    Ok(Outcome::Cancelled)
                }
            }
        }
        Err(err) => {
            debug!(error = %err, "cmd_generate: submit failed");
            Err(err.into())
        }
    };

    let view = app.view();
    let failure = app.failure().map(str::to_string);
    drop(app);
    progress.abort();
    if let Some(logger) = logger {
        drain_logger(logger).await;
    }

    println!("  view: {}", view.to_string().bold());
    match outcome? {
        Outcome::Succeeded(result) => {
            print_result(&result);
            Ok(())
        }
        Outcome::Failed(failure) => {
            println!("{} {}", "✗".red(), failure.message.red());
            Err(eyre::eyre!("Generation failed: {}", failure.message))
        }
        Outcome::Cancelled => {
            match failure {
                Some(message) => println!("{} {}", "!".yellow(), message),
                None => println!("{} Cancelled", "!".yellow()),
            }
            Ok(())
        }
    }
}

/// Let the event logger write out what is still queued
///
/// The logger stops once the app, and with it every bus sender, is gone.
async fn drain_logger(logger: JoinHandle<()>) {
    if tokio::time::timeout(LOGGER_DRAIN, logger).await.is_err() {
        warn!("drain_logger: event logger did not finish in time");
    }
}

fn cmd_history(config: &Config, task_id: &str, file: Option<PathBuf>) -> Result<()> {
    let path = file
        .or_else(|| config.events.log_file.clone())
        .ok_or_else(|| eyre::eyre!("No event log configured (set events.log-file or pass --file)"))?;

    let task_id = TaskId::new(task_id);
    let entries = read_task_events(&path, &task_id).with_context(|| format!("Failed to read {}", path.display()))?;

    if entries.is_empty() {
        println!("No events recorded for task {}", task_id);
        return Ok(());
    }

    println!("{} {}", "Task".bold(), task_id.to_string().bold());
    for entry in entries {
        println!(
            "  {}  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            describe(&entry.event)
        );
    }
    Ok(())
}

/// Print lifecycle progress until the submission settles
fn spawn_progress_printer(bus: &Arc<EventBus>) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) if event.is_terminal() => break,
                Ok(event) => println!("  {}", describe(&event)),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn describe(event: &LifecycleEvent) -> String {
    match event {
        LifecycleEvent::Submitting { .. } => "submitting".cyan().to_string(),
        LifecycleEvent::PollingStarted { task_id, .. } => format!("{} {}", "polling".cyan(), task_id),
        LifecycleEvent::StatusObserved { status, attempt, .. } => {
            format!("{} {} (check {})", "status".cyan(), status, attempt)
        }
        LifecycleEvent::TransientPollError { attempt, message, .. } => {
            format!("{} {} (check {})", "retrying".yellow(), message, attempt)
        }
        LifecycleEvent::Succeeded { .. } => "completed".green().to_string(),
        LifecycleEvent::Failed { failure, .. } => format!("{} {}", "failed".red(), failure.message),
        LifecycleEvent::Cancelled { .. } => "cancelled".yellow().to_string(),
    }
}

fn print_result(result: &GenerationResult) {
    println!("{} Analysis complete", "✓".green());
    if let Some(url) = &result.image_url {
        println!("  {} {}", "image:".bold(), url);
    }
    println!("  {} {}", "analysis:".bold(), result.analysis);
    println!("  {} {}", "recommendation:".bold(), result.recommendation);
    if !result.tags.is_empty() {
        let tags: Vec<String> = result.tags.iter().map(|tag| format!("#{}", tag)).collect();
        println!("  {} {}", "tags:".bold(), tags.join(" "));
    }
}
