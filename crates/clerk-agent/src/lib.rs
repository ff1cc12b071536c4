pub mod instruction;
pub mod message;
pub mod ollama;
pub mod openai;
pub mod tools;

pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;
