//! CLI module for Skiff.

pub mod commands;
mod output;
pub mod preflight;
mod render;

pub use output::Output;
pub use render::{drive_turn, EventRenderer};

use clap::{Parser, Subcommand};

/// Skiff - an agentic chat client for your terminal
///
/// Talks to any OpenAI-compatible provider and lets the model read, search
/// and edit files, run commands and use git in the current directory.
#[derive(Parser, Debug)]
#[command(name = "skiff")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Defaults to `chat`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Provider to use (see `skiff providers`)
        #[arg(short, long)]
        provider: Option<String>,

        /// Model to use instead of the provider default
        #[arg(short, long)]
        model: Option<String>,

        /// Resume a stored session by id or id prefix
        #[arg(short, long)]
        resume: Option<String>,
    },

    /// Ask a single question and exit
    Ask {
        /// The question or task
        question: String,

        #[arg(short, long)]
        provider: Option<String>,

        #[arg(short, long)]
        model: Option<String>,
    },

    /// List known providers and their key status
    Providers,

    /// List the tools available to the model
    Tools,

    /// Manage stored sessions
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Check configuration and system requirements
    Doctor,
}

#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// List recent sessions
    List {
        /// Maximum number of sessions (0 for all)
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Print the messages of a session
    Show {
        /// Session id or unique prefix
        id: String,
    },

    /// Export a session as JSON
    Export {
        id: String,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Delete a session and its messages
    Delete { id: String },

    /// Totals across all sessions
    Stats,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "agent.max_iterations")
        key: String,
        /// Configuration value
        value: String,
    },

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_parses() {
        let cli = Cli::try_parse_from(["skiff", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_chat_flags() {
        let cli = Cli::try_parse_from([
            "skiff", "chat", "-p", "openai", "-m", "gpt-4o-mini", "-r", "ab12",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Chat { provider, model, resume }) => {
                assert_eq!(provider.as_deref(), Some("openai"));
                assert_eq!(model.as_deref(), Some("gpt-4o-mini"));
                assert_eq!(resume.as_deref(), Some("ab12"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_sessions_export() {
        let cli =
            Cli::try_parse_from(["skiff", "sessions", "export", "ab12", "-o", "out.json"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Sessions {
                action: SessionAction::Export { ref id, output: Some(ref o) }
            }) if id == "ab12" && o == "out.json"
        ));
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
