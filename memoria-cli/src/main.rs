//! Memoria CLI - terminal chat with bounded conversation memory

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use memoria_core::config::{CONFIG_FILE, MemoriaConfig};
use memoria_core::display::DisplaySink;
use memoria_core::llm::{ModelService, ScriptedService};
use memoria_core::prompt::PromptBuilderFactory;
use memoria_core::session::{FileSessionStore, SessionController, SessionStore};

#[derive(Parser)]
#[command(name = "memoria")]
#[command(about = "Terminal chat client with bounded conversation memory", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "MEMORIA_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Answer from a scripted in-process service instead of Ollama
    #[arg(long)]
    offline: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new chat session
    Chat,
    /// Resume a saved session
    Resume {
        /// Saved identifier, such as chat-1700000000000.yaml
        identifier: String,
    },
    /// List saved sessions, newest first
    Sessions,
    /// Version information
    Version,
}

/// Writes straight to stdout, flushing after every message so fragments
/// appear as they stream in
struct TerminalDisplay;

impl DisplaySink for TerminalDisplay {
    fn show(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout leaves nothing to report to
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = MemoriaConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Version => {
            println!("memoria {}", env!("CARGO_PKG_VERSION"));
            println!("memoria-core {}", memoria_core::VERSION);
        }
        Commands::Sessions => {
            let store = FileSessionStore::new(&config.storage.sessions_dir);
            let sessions = store.list().await?;
            if sessions.is_empty() {
                println!("No saved sessions in {}", store.dir().display());
            }
            for identifier in sessions {
                println!("{}", identifier);
            }
        }
        Commands::Chat => {
            let mut controller = build_controller(config, cli.config, cli.offline)?;
            controller.start().await;
            run_loop(&mut controller).await?;
        }
        Commands::Resume { identifier } => {
            let mut controller = build_controller(config, cli.config, cli.offline)?;
            controller.resume_saved(&identifier).await;
            run_loop(&mut controller).await?;
        }
    }

    Ok(())
}

fn build_controller(
    config: MemoriaConfig,
    config_path: Option<PathBuf>,
    offline: bool,
) -> Result<SessionController> {
    let mut builder = SessionController::builder()
        .config(config)
        .config_path(config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE)))
        .display(Arc::new(TerminalDisplay));

    if offline {
        let service: Arc<dyn ModelService> = Arc::new(
            ScriptedService::new().with_default_reply(["(offline) ", "no model service attached"]),
        );
        builder = builder.model_service(service);
    }

    Ok(builder.build()?)
}

async fn run_loop(controller: &mut SessionController) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!(
        "memoria: model {}, memory {}. /new, /model <id>, /memory <id>, /quit",
        controller.config().model,
        controller.config().memory
    );

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let (command, argument) = match input.split_once(char::is_whitespace) {
            Some((command, argument)) => (command, argument.trim()),
            None => (input, ""),
        };

        match command {
            "/quit" | "/exit" => break,
            "/new" => {
                controller.start().await;
                println!("Started a new session");
            }
            "/model" => match controller.update_model(argument).await {
                Ok(()) => println!("Model set to {}, new session started", argument),
                Err(e) => {
                    warn!(model = argument, error = %e, "Model switch rejected");
                    println!(
                        "{} (available: {})",
                        e,
                        PromptBuilderFactory::MODELS.join(", ")
                    );
                }
            },
            "/memory" => match controller.update_memory(argument).await {
                Ok(()) => println!("Memory set to {}, new session started", argument),
                Err(e) => {
                    warn!(memory = argument, error = %e, "Memory switch rejected");
                    println!("{} (available: buffer, summary)", e);
                }
            },
            _ => controller.process_input(input).await,
        }
    }

    controller.end().await;
    info!("Chat loop finished");
    println!();
    Ok(())
}
