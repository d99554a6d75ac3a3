//! Result types for file classification and episode extraction.

use serde::{Deserialize, Serialize};

/// What a filename was judged to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Worth keeping at all. Samples, trailers and menu reels are not.
    pub important: bool,
    /// Regular numbered episode, as opposed to a special, OVA or movie.
    pub main_episode: bool,
    /// Video file by extension. Subtitles report false here.
    pub video: bool,
}

impl Classification {
    pub fn unimportant() -> Self {
        Self {
            important: false,
            main_episode: false,
            video: false,
        }
    }
}

/// Which strategy produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Rules,
    Llm,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Rules => "rules",
            Strategy::Llm => "llm",
        }
    }
}

/// A classification or extraction result tagged with the strategy that
/// produced it, so LLM fallbacks stay visible to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict<T> {
    pub value: T,
    pub strategy: Strategy,
}

impl<T> Verdict<T> {
    pub fn rules(value: T) -> Self {
        Self {
            value,
            strategy: Strategy::Rules,
        }
    }

    pub fn llm(value: T) -> Self {
        Self {
            value,
            strategy: Strategy::Llm,
        }
    }
}
