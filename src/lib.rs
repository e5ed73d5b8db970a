pub mod completion;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod error;
pub mod gemini;
pub mod prompt;
pub mod rag;
pub mod session;
