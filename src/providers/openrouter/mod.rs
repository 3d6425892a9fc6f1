#[allow(clippy::module_inception)]
mod openrouter;

pub use openrouter::OpenRouterProvider;
