use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use log::info;
use std::io;

use gemini_rag_chat::config::AppConfig;
use gemini_rag_chat::database::QdrantClient;
use gemini_rag_chat::gemini::GeminiClient;
use gemini_rag_chat::prompt::PromptBuilder;
use gemini_rag_chat::rag::RagPipeline;
use gemini_rag_chat::session::ChatSession;

/// Chat with a pre-indexed document using Gemini and Qdrant
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of chunks to retrieve per question (overrides RAG_TOP_K)
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Language of the answers (overrides RAG_LANGUAGE)
    #[arg(short, long)]
    language: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    // Load configuration from environment; nothing is served without it
    let mut config = AppConfig::from_env().context("Invalid configuration")?;
    if let Some(top_k) = args.top_k {
        config.retrieval = config
            .retrieval
            .with_top_k(top_k)
            .context("Invalid --top-k")?;
    }
    if let Some(language) = args.language {
        config.retrieval.language = language;
    }

    let dimension = config.gemini.embedding_dimension;
    let gemini = GeminiClient::new(config.gemini).context("Failed to initialize Gemini client")?;
    let qdrant = QdrantClient::new(config.qdrant, config.retrieval.candidate_multiplier)
        .context("Failed to initialize Qdrant client")?;

    qdrant
        .verify_index(dimension)
        .await
        .context("Vector index is not usable")?;

    info!(
        "Answering in {} with top {} chunks",
        config.retrieval.language, config.retrieval.top_k
    );

    let pipeline = RagPipeline::new(
        gemini.clone(),
        qdrant,
        gemini,
        PromptBuilder::new(config.retrieval.language),
        config.retrieval.top_k,
    );

    let mut session = ChatSession::new(pipeline);
    session
        .run_query_loop(io::stdin().lock(), io::stdout())
        .await
        .context("Error in query loop")?;

    Ok(())
}
