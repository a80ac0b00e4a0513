//! CLI definitions for palaver.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::PalaverConfig;

/// Talk to a checkpointed agent from the terminal.
#[derive(Parser, Debug)]
#[command(name = "palaver", version, about = "Palaver agent CLI")]
pub struct Cli {
    /// TOML config file (environment variables still override it)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Model override
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// System prompt override
    #[arg(short, long, global = true)]
    pub system: Option<String>,

    /// Keep checkpoints in memory only
    #[arg(long, global = true)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one turn and print the final answer
    Chat(TurnArgs),
    /// Run one turn and print frames as they arrive
    Stream(TurnArgs),
    /// Print a thread's stored messages
    History(HistoryArgs),
}

#[derive(Args, Debug)]
pub struct TurnArgs {
    /// Conversation thread id
    #[arg(short, long)]
    pub thread: String,

    /// User prompt
    pub prompt: String,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Conversation thread id
    #[arg(short, long)]
    pub thread: String,
}

impl Cli {
    /// Resolve configuration: file (if given), environment, then flags.
    pub fn load_config(&self) -> crate::error::Result<PalaverConfig> {
        let mut config = match &self.config {
            Some(path) => PalaverConfig::from_file(path)?,
            None => PalaverConfig::from_env()?,
        };
        if let Some(model) = &self.model {
            config.model.model = model.clone();
        }
        if let Some(system) = &self.system {
            config.system_prompt = Some(system.clone());
        }
        if self.ephemeral {
            config.checkpoint.backend = crate::config::CheckpointBackend::Memory;
        }
        Ok(config)
    }
}
