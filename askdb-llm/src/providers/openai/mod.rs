//! OpenAI-compatible provider implementation
//!
//! Works against any server exposing `/chat/completions` with bearer auth.

pub mod chat;
pub mod client;
pub mod types;

pub use chat::OpenAICompletionProvider;
pub use client::OpenAIClient;
