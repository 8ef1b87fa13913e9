//! Ollama provider implementation (local models)
//!
//! This module provides completion through Ollama's native `/api/chat` API.

pub mod chat;
pub mod types;

pub use chat::OllamaCompletionProvider;
