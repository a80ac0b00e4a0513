//! Palaver: checkpointed, tool-using conversational agents.
//!
//! An [`engine::AgentEngine`] alternates between model calls and tool calls
//! until the model answers, persisting each thread's history in a
//! [`checkpoint::CheckpointStore`]. The [`orchestrator::Orchestrator`] exposes
//! synchronous chat, streaming over a [`relay::FrameRelay`], and history.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use palaver::prelude::*;
//!
//! # async fn example() -> palaver::error::Result<()> {
//! let config = PalaverConfig::from_env()?;
//! let orchestrator = Orchestrator::from_config(&config, Arc::new(ToolRegistry::new()))?;
//! orchestrator.initialize().await?;
//! let reply = orchestrator.chat(ChatRequest::text("t1", "What is 2+2?")).await?;
//! println!("{}", reply.content.text());
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod prelude;
pub mod provider;
pub mod relay;
pub mod tools;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;
