//! BotTalk - simulated conversations between AI personas
//!
//! Main entry point for the `bottalk` binary. Personas and the topic are
//! kept in a settings file; `bottalk run` lets them talk until the
//! iteration cap is reached or Ctrl+C is pressed.

mod cli;
mod config;
mod conversation;
mod error;
mod llm;
mod logging;
mod persona;
mod version;

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::cli::{Cli, Commands, ConfigSubcommand, PersonaSubcommand, TopicSubcommand};
use crate::config::AppConfig;
use crate::conversation::{
    ConversationController, ConversationEvent, MessageGenerator, SpeakerSelector, Transcript,
};
use crate::error::{Error, Result};
use crate::persona::{PersonaEdit, Roster, SettingsStore, StoredSettings};

/// Consecutive failed turns before `run` gives up
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

fn main() -> Result<()> {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    // Commands that must work without a loadable configuration
    match &cli.command {
        Commands::Version => {
            print!("{}", version::report());
            return Ok(());
        }
        Commands::Config {
            subcommand: ConfigSubcommand::Init { path, force },
        } => {
            logging::init_simple(tracing::Level::WARN)?;
            return exit_on_error(init_config_file(path.as_deref(), *force));
        }
        _ => {}
    }

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprint!("{}", e.format_for_terminal());
            std::process::exit(e.exit_code());
        }
    };

    // The guards must be kept alive for the lifetime of the program
    let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    debug!(
        version = %version::Revision::embedded(),
        target = env!("BOTTALK_TARGET"),
        profile = env!("BOTTALK_PROFILE"),
        "Starting BotTalk"
    );

    let result = match cli.command {
        Commands::Run {
            topic,
            iterations,
            provider,
            transcript,
        } => run_conversation(
            config,
            RunOptions {
                topic,
                iterations,
                provider,
                transcript,
            },
        ),
        Commands::Persona { subcommand } => handle_persona_command(&config, subcommand),
        Commands::Topic { subcommand } => handle_topic_command(&config, subcommand),
        Commands::Config { subcommand } => handle_config_command(&config, subcommand),
        // Handled before configuration was loaded
        Commands::Version => Ok(()),
    };

    exit_on_error(result)
}

/// Print a failed command's error and exit with its code
fn exit_on_error(result: Result<()>) -> Result<()> {
    if let Err(e) = result {
        debug!(error = %e.format_for_log(), "Command failed");
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────
// Run
// ─────────────────────────────────────────────────────────────────

struct RunOptions {
    topic: Option<String>,
    iterations: Option<u32>,
    provider: Option<String>,
    transcript: Option<String>,
}

/// JSON document written by `run --transcript`
#[derive(Serialize)]
struct TranscriptExport<'a> {
    topic: &'a str,
    personas: &'a Roster,
    iterations: u32,
    messages: &'a Transcript,
}

fn run_conversation(mut config: AppConfig, options: RunOptions) -> Result<()> {
    if let Some(ref provider) = options.provider {
        config.llm.provider = provider.parse()?;
    }
    if let Some(iterations) = options.iterations {
        config.simulation.max_iterations = iterations;
    }
    config.validate()?;

    let store = SettingsStore::new(config.settings_path());
    let saved = store.load_or_default();
    saved.roster.ensure_ready()?;

    let topic = options
        .topic
        .map(|t| t.trim().to_string())
        .unwrap_or(saved.topic);

    info!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        personas = saved.roster.len(),
        cap = config.simulation.max_iterations,
        "Configuration loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("bottalk")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;

    runtime.block_on(async_run_main(
        config,
        saved.roster,
        topic,
        options.transcript.map(PathBuf::from),
    ))
}

async fn async_run_main(
    config: AppConfig,
    roster: Roster,
    topic: String,
    transcript_path: Option<PathBuf>,
) -> Result<()> {
    let model = llm::build_model(&config)?;
    let selector = SpeakerSelector::new(model.clone(), config.selection.clone());
    let generator = MessageGenerator::new(model, config.generation.clone());
    let controller =
        ConversationController::new(roster, topic, selector, generator, &config.simulation)?;

    let mut events = controller.subscribe();
    let mut renderer = Renderer::new(controller.roster().clone());
    renderer.header(controller.topic(), controller.cap());

    controller.start();

    // Ctrl+C pauses the conversation and ends the run
    let shutdown_signal = tokio::signal::ctrl_c();
    tokio::pin!(shutdown_signal);

    let outcome = loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Interrupt received");
                controller.pause();
                renderer.interrupted();
                break Ok(());
            }

            event = events.recv() => {
                match event {
                    Ok(ConversationEvent::Stopped { iterations }) => {
                        debug!(iterations, "Conversation finished");
                        break Ok(());
                    }
                    Ok(event) => {
                        if let Err(e) = renderer.render(&event) {
                            controller.pause();
                            break Err(e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Renderer fell behind, some events were dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break Ok(()),
                }
            }
        }
    };

    if let Some(path) = transcript_path {
        let state = controller.state();
        let export = TranscriptExport {
            topic: controller.topic(),
            personas: controller.roster(),
            iterations: state.iteration_count,
            messages: &state.transcript,
        };
        write_transcript(&path, &export)?;
    }

    outcome
}

fn write_transcript(path: &Path, export: &TranscriptExport<'_>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let json = serde_json::to_string_pretty(export)?;
    std::fs::write(path, json).map_err(|e| Error::IoWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    info!(path = %path.display(), messages = export.messages.len(), "Transcript written");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────
// Terminal Renderer
// ─────────────────────────────────────────────────────────────────

/// Prints conversation events as a chat log
struct Renderer<W: Write = std::io::Stdout> {
    roster: Roster,
    out: W,
    /// Speaker prefix held back until the first token arrives
    pending_speaker: Option<String>,
    /// A message line has been started and not yet finished
    line_open: bool,
    failures: u32,
}

impl Renderer {
    fn new(roster: Roster) -> Self {
        Self::with_writer(roster, std::io::stdout())
    }
}

impl<W: Write> Renderer<W> {
    fn with_writer(roster: Roster, out: W) -> Self {
        Self {
            roster,
            out,
            pending_speaker: None,
            line_open: false,
            failures: 0,
        }
    }

    fn header(&mut self, topic: &str, cap: u32) {
        let names: Vec<String> = self.roster.iter().map(|p| p.colored_name()).collect();
        self.write(format_args!("Participants: {}\n", names.join(", ")));
        if !topic.is_empty() {
            self.write(format_args!("Topic: {}\n", topic));
        }
        self.write(format_args!("Messages: {}\n\n", cap));
    }

    fn render(&mut self, event: &ConversationEvent) -> Result<()> {
        match event {
            ConversationEvent::StepStarted { persona_id, persona_name } => {
                let name = self
                    .roster
                    .get(persona_id)
                    .map(|p| p.colored_name())
                    .unwrap_or_else(|| persona_name.clone());
                self.pending_speaker = Some(name);
            }
            ConversationEvent::Token { text, .. } => {
                if let Some(name) = self.pending_speaker.take() {
                    self.write(format_args!("{}: ", name));
                    self.line_open = true;
                }
                self.write(format_args!("{}", text));
            }
            ConversationEvent::MessageAppended { iteration, cap, .. } => {
                self.failures = 0;
                self.close_line();
                self.write(format_args!("Iteration: {} / {}\n\n", iteration, cap));
            }
            ConversationEvent::StepFailed { error, .. } => {
                self.close_line();
                self.failures += 1;
                if self.failures >= MAX_CONSECUTIVE_FAILURES {
                    return Err(Error::provider_response(format!(
                        "{} turns in a row failed, last error: {}",
                        self.failures, error
                    )));
                }
            }
            ConversationEvent::StepDiscarded => self.close_line(),
            ConversationEvent::Started
            | ConversationEvent::Paused
            | ConversationEvent::Reset
            | ConversationEvent::Stopped { .. } => {}
        }
        Ok(())
    }

    fn interrupted(&mut self) {
        self.close_line();
        self.write(format_args!("Bye-bye...\n"));
    }

    fn close_line(&mut self) {
        self.pending_speaker = None;
        if self.line_open {
            self.write(format_args!("\n"));
            self.line_open = false;
        }
    }

    fn write(&mut self, args: std::fmt::Arguments<'_>) {
        // Nothing useful to do if stdout is gone
        let _ = self.out.write_fmt(args);
        let _ = self.out.flush();
    }
}

// ─────────────────────────────────────────────────────────────────
// Persona and Topic Commands
// ─────────────────────────────────────────────────────────────────

fn handle_persona_command(config: &AppConfig, subcommand: PersonaSubcommand) -> Result<()> {
    let store = SettingsStore::new(config.settings_path());
    let mut settings = store.load_or_default();

    match subcommand {
        PersonaSubcommand::List => {
            if settings.roster.is_empty() {
                println!("No personas saved.");
                println!("Add one with: bottalk persona add <name> <description>");
                return Ok(());
            }

            for persona in &settings.roster {
                let gender = persona
                    .gender
                    .map(|g| format!(" ({})", g))
                    .unwrap_or_default();
                println!(
                    "{}  {}{} - {}",
                    persona.id,
                    persona.colored_name(),
                    gender,
                    persona.description
                );
            }
            println!();
            println!("{} persona(s) in {}", settings.roster.len(), store.path().display());
        }

        PersonaSubcommand::Add {
            name,
            description,
            gender,
        } => {
            let persona = settings.roster.add(&name, &description, gender)?;
            println!("Added {} ({})", persona.colored_name(), persona.id);
            save_settings(&store, &settings)?;
        }

        PersonaSubcommand::Edit {
            id,
            name,
            description,
            gender,
            clear_gender,
        } => {
            let id = settings.roster.resolve(&id)?.id.clone();
            let edit = PersonaEdit {
                name,
                description,
                gender: if clear_gender { Some(None) } else { gender.map(Some) },
            };
            let persona = settings.roster.edit(&id, edit)?;
            println!("Updated {} ({})", persona.colored_name(), persona.id);
            save_settings(&store, &settings)?;
        }

        PersonaSubcommand::Remove { id } => {
            let id = settings.roster.resolve(&id)?.id.clone();
            let removed = settings.roster.remove(&id)?;
            println!("Removed {} ({})", removed.name, removed.id);

            if settings.roster.is_empty() {
                store.clear()?;
            } else {
                save_settings(&store, &settings)?;
            }
        }
    }

    Ok(())
}

fn handle_topic_command(config: &AppConfig, subcommand: TopicSubcommand) -> Result<()> {
    let store = SettingsStore::new(config.settings_path());
    let mut settings = store.load_or_default();

    match subcommand {
        TopicSubcommand::Show => {
            if settings.topic.is_empty() {
                println!("No topic set. The personas will pick their own.");
            } else {
                println!("{}", settings.topic);
            }
        }
        TopicSubcommand::Set { topic } => {
            settings.topic = topic.trim().to_string();
            if save_settings(&store, &settings)? {
                println!("Topic set: {}", settings.topic);
            }
        }
        TopicSubcommand::Clear => {
            settings.topic.clear();
            if save_settings(&store, &settings)? {
                println!("Topic cleared");
            }
        }
    }

    Ok(())
}

/// Save, telling the user when an empty roster kept the file unchanged
fn save_settings(store: &SettingsStore, settings: &StoredSettings) -> Result<bool> {
    let saved = store.save(settings)?;
    if !saved {
        eprintln!("Nothing saved: add a persona first with 'bottalk persona add'.");
    }
    Ok(saved)
}

// ─────────────────────────────────────────────────────────────────
// Config Commands
// ─────────────────────────────────────────────────────────────────

fn init_config_file(path: Option<&str>, force: bool) -> Result<()> {
    let path = config::init_config(path, force)?;
    println!("Configuration file created: {}", path.display());
    println!("Edit this file, or set BOTTALK_API_KEY, then add personas with 'bottalk persona add'.");
    Ok(())
}

fn handle_config_command(config: &AppConfig, subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show => {
            let toml_str = toml::to_string_pretty(&config.redacted())?;
            println!("{}", toml_str);
            println!("# Settings file: {}", config.settings_path().display());
        }
        ConfigSubcommand::Validate => {
            // Loading already validated; report what will be used
            println!("Configuration is valid");
            println!("  Provider:   {}", config.llm.provider);
            println!("  Model:      {}", config.llm.model);
            println!("  Iterations: {}", config.simulation.max_iterations);
            println!("  Settings:   {}", config.settings_path().display());
        }
        ConfigSubcommand::Init { path, force } => {
            init_config_file(path.as_deref(), force)?;
        }
    }
    Ok(())
}
