//! Model endpoint transport
//!
//! The pieces that talk HTTP: the `ChatClient` trait over chat completion
//! endpoints, and the retry policy applied beneath it. Everything above
//! this module treats the model as a text-in/text-out collaborator.

pub mod client;
pub mod retry;

pub use client::{ChatClient, ChatMessage, ChatRole, OpenAiChatClient, SecretString};
pub use retry::{with_retry, AttemptOutcome, RetryConfig};
