//! Palaver CLI binary entry point.

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use palaver::cli::{Cli, Commands};
use palaver::orchestrator::{ChatRequest, Orchestrator, StreamRequest};
use palaver::tools::ToolRegistry;
use palaver::types::StreamFrame;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "palaver=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.load_config()?;
    let orchestrator = Orchestrator::from_config(&config, Arc::new(ToolRegistry::new()))?;
    orchestrator.initialize().await?;

    let result = match cli.command {
        Commands::Chat(args) => {
            let reply = orchestrator
                .chat(ChatRequest::text(args.thread, args.prompt))
                .await?;
            println!("{}", reply.content.text());
            Ok(())
        }
        Commands::Stream(args) => stream(&orchestrator, args.thread, args.prompt).await,
        Commands::History(args) => {
            for message in orchestrator.history(&args.thread).await? {
                println!("[{}] {}", message.role, message.content.text());
            }
            Ok(())
        }
    };

    orchestrator.shutdown().await?;
    result
}

async fn stream(
    orchestrator: &Orchestrator,
    thread_id: String,
    prompt: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut frames = orchestrator
        .stream(StreamRequest {
            thread_id,
            content: prompt,
        })
        .await?;

    let mut stdout = std::io::stdout();
    while let Some(frame) = frames.next().await {
        match frame? {
            StreamFrame::Message(message) => {
                print!("{}", message.content.text());
                let _ = stdout.flush();
            }
            StreamFrame::Done => {
                println!();
            }
            StreamFrame::Error(error) => {
                println!();
                return Err(error.message.into());
            }
        }
    }
    Ok(())
}
