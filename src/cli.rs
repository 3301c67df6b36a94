//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for BotTalk.

use clap::{Parser, Subcommand};

use crate::persona::Gender;

/// BotTalk - simulated group chats between AI personas
///
/// Describe a few personas, pick a topic, and watch them talk to each other.
#[derive(Parser, Debug)]
#[command(name = "bottalk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(short, long, env = "BOTTALK_CONFIG", global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a conversation between the saved personas
    Run {
        /// Topic for this run (defaults to the saved topic)
        #[arg(short, long)]
        topic: Option<String>,

        /// Number of messages before the conversation stops
        #[arg(short = 'n', long)]
        iterations: Option<u32>,

        /// Override the model provider (openai, mock)
        #[arg(long, env = "BOTTALK_PROVIDER")]
        provider: Option<String>,

        /// Write the finished transcript to this file as JSON
        #[arg(long)]
        transcript: Option<String>,
    },

    /// Manage the saved personas
    Persona {
        #[command(subcommand)]
        subcommand: PersonaSubcommand,
    },

    /// Manage the saved conversation topic
    Topic {
        #[command(subcommand)]
        subcommand: TopicSubcommand,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Display version and build information
    Version,
}

/// Persona subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum PersonaSubcommand {
    /// List the saved personas
    List,

    /// Add a persona
    Add {
        /// Display name
        name: String,

        /// Personality the model should play
        description: String,

        /// Gender (m or f)
        #[arg(short, long)]
        gender: Option<Gender>,
    },

    /// Change a persona's name, description or gender
    Edit {
        /// Persona id or name
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Gender (m or f)
        #[arg(short, long, conflicts_with = "clear_gender")]
        gender: Option<Gender>,

        /// Remove the gender
        #[arg(long)]
        clear_gender: bool,
    },

    /// Remove a persona
    Remove {
        /// Persona id or name
        id: String,
    },
}

/// Topic subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum TopicSubcommand {
    /// Print the saved topic
    Show,

    /// Save a new topic
    Set {
        topic: String,
    },

    /// Remove the saved topic
    Clear,
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show,

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the configuration
    Validate,
}
