//! Vision model access through a local Ollama server.

pub mod model_manager;
pub mod ollama;

#[cfg(test)]
pub(crate) mod test_server;

pub use model_manager::{ModelError, ModelManager};
pub use ollama::OllamaDescriber;
