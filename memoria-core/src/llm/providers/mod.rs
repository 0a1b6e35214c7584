//! Model service implementations

pub mod ollama;

pub use ollama::OllamaService;
