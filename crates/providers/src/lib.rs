//! Generation backend implementations for Switchyard.

pub mod openai_compat;

pub use openai_compat::OpenAiBackend;
