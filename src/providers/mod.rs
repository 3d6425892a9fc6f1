pub mod openai;
pub mod openrouter;
pub mod traits;
pub mod utils;

pub use openai::OpenAIEmbedder;
pub use openrouter::OpenRouterProvider;
pub use traits::{CompletionProvider, GenerationError};
