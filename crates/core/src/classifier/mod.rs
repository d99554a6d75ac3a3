//! File classification and episode extraction.
//!
//! Decides which files out of a finished torrent are worth keeping,
//! whether they are main numbered episodes, and what their episode
//! number is. Two strategies exist side by side:
//!
//! - **Rules**: extension allowlists, keyword denylists and an ordered
//!   regex chain. Works offline, always available.
//! - **LLM**: an OpenAI-style chat completion with a strict JSON answer
//!   contract. Optional; any failure falls back to the rules, and every
//!   result carries the strategy that produced it.

mod engine;
mod llm;
mod rules;
mod types;

pub use engine::Classifier;
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAiClient};
pub use rules::{is_subtitle_file, is_video_file};
pub use types::{Classification, Strategy, Verdict};
