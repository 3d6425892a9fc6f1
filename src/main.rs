use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use dotenv::dotenv;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use std::sync::Arc;

use rust_rag_assistant::api::{self, AppState};
use rust_rag_assistant::commands::{CommandHandler, CommandOutcome};
use rust_rag_assistant::config::{EmbeddingBackend, Settings};
use rust_rag_assistant::llm::{CachedEmbedder, ChatSession, Embedder, LocalEmbedder, SessionConfig};
use rust_rag_assistant::providers::{OpenAIEmbedder, OpenRouterProvider};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Ask questions about your PDF and text documents", long_about = None)]
struct Args {
    /// Run the terminal REPL instead of the web UI
    #[arg(long)]
    cli: bool,

    /// Overrides PORT
    #[arg(long)]
    port: Option<u16>,

    /// Overrides HOST
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut settings = Settings::from_env()?;
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(host) = &args.host {
        settings.host = host.clone();
    }

    let session = build_session(&settings)?;

    if args.cli {
        run_cli_mode(session, settings).await
    } else {
        run_api_server(session, settings).await
    }
}

fn build_session(settings: &Settings) -> Result<ChatSession> {
    let embedder: Arc<dyn Embedder> = match settings.embedding_backend {
        EmbeddingBackend::Local => Arc::new(
            LocalEmbedder::new(settings.embedding_dimensions).with_model_name(settings.embedding_model.clone()),
        ),
        EmbeddingBackend::OpenAI => {
            Arc::new(OpenAIEmbedder::new(settings).context("Failed to create embedding client")?)
        }
    };
    let embedder = Arc::new(CachedEmbedder::new(embedder, settings.embedding_cache_size));
    let generator = Arc::new(OpenRouterProvider::new(settings).context("Failed to create OpenRouter client")?);

    log::info!(
        "Using {} for answers and {} ({} dims) for embeddings",
        settings.llm_model,
        settings.embedding_model,
        settings.embedding_dimensions
    );
    Ok(ChatSession::new(embedder, generator, SessionConfig::from_settings(settings)?))
}

async fn run_cli_mode(session: ChatSession, settings: Settings) -> Result<()> {
    println!(
        "\n📄 {} {}",
        "RAG Document Assistant".bright_cyan().bold(),
        format!("(powered by {})", settings.short_model_name()).bright_black()
    );

    let mut command_handler = CommandHandler::new(session, settings);
    command_handler
        .handle_command("help")
        .await
        .map_err(anyhow::Error::msg)?;

    let mut rl = Editor::<(), DefaultHistory>::new()?;
    loop {
        match rl.readline("👤 ") {
            Ok(line) => {
                let input = line.trim();
                if !input.is_empty() {
                    let _ = rl.add_history_entry(input);
                }
                match command_handler.handle_command(input).await {
                    Ok(CommandOutcome::Exit) => break,
                    Ok(CommandOutcome::Continue) => {}
                    Err(e) => println!("{}", e.red()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
    Ok(())
}

async fn run_api_server(session: ChatSession, settings: Settings) -> Result<()> {
    let (host, port) = (settings.host.clone(), settings.port);
    let app = api::create_api(AppState::new(session, settings));

    let listener = api::bind_listener(&host, port)
        .await
        .with_context(|| format!("Failed to bind to {}:{}", host, port))?;

    log::info!("Document assistant ready on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
