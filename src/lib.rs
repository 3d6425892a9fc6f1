pub mod api;
pub mod commands;
pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod llm;
pub mod providers;

// Re-export commonly used items
pub use config::Settings;
pub use error::RagError;
pub use llm::chat::ChatSession;
