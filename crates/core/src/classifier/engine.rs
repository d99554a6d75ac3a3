//! Classification dispatch across the rule and LLM strategies.
//!
//! The two strategies are never blended inside a single call: either the
//! LLM answers and the verdict is tagged `Llm`, or anything goes wrong
//! and the rule chain answers with the verdict tagged `Rules`.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::metrics::CLASSIFIER_FALLBACKS;
use crate::store::Source;

use super::llm::{complete_json, CompletionRequest, LlmClient, LlmError};
use super::rules;
use super::types::{Classification, Verdict};

const IMPORTANCE_SYSTEM_PROMPT: &str = "You are an expert at analyzing anime and TV \
release filenames. Judge whether a file is worth keeping, whether it is a main \
numbered episode, and whether it is a video file.";

const EPISODE_SYSTEM_PROMPT: &str = "You extract episode numbers from release \
filenames. Ignore years, resolutions, codec numbers and group tags. Episode \
numbers are between 1 and 999. Answer 0 when the episode cannot be determined.";

fn importance_prompt(filename: &str, video: bool) -> String {
    let kind = if video { "video" } else { "subtitle" };
    format!(
        "Analyze this filename and judge:\n\n\
         Filename: {filename}\n\n\
         1. Is it an important file (not a sample, preview, trailer, menu, or \
         NCOP/NCED credits reel)?\n\
         2. Is it a main numbered episode (not an SP/special, OVA, OAD, movie or PV)?\n\
         3. The extension already says this is a {kind} file.\n\n\
         Movies, specials and OVAs are important but never count as main episodes.\n\
         Samples, previews and credit reels are never important.\n\n\
         Answer with exactly this JSON and nothing else:\n\
         {{\n\
         \x20   \"is_important\": true/false,\n\
         \x20   \"is_main_episode\": true/false,\n\
         \x20   \"is_video\": true/false,\n\
         \x20   \"reason\": \"short justification\"\n\
         }}"
    )
}

fn episode_prompt(filename: &str) -> String {
    format!(
        "Extract the episode number from this filename:\n\n\
         Filename: {filename}\n\n\
         Common forms include 第01集, E01, EP01, Episode 01, S01E01 (take the \
         number after the E), [01], (01), and a trailing standalone number such \
         as - 01.\n\n\
         Answer with exactly this JSON and nothing else:\n\
         {{\n\
         \x20   \"episode_number\": number or 0,\n\
         \x20   \"confidence\": \"high/medium/low\",\n\
         \x20   \"reason\": \"short justification\"\n\
         }}"
    )
}

#[derive(Debug, Deserialize)]
struct ImportanceAnswer {
    #[serde(default)]
    is_important: bool,
    #[serde(default)]
    is_main_episode: bool,
    #[serde(default)]
    #[allow(dead_code)]
    is_video: bool,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct EpisodeAnswer {
    #[serde(default)]
    episode_number: i64,
    #[serde(default)]
    confidence: String,
    #[serde(default)]
    reason: String,
}

/// File classifier and episode extractor.
pub struct Classifier {
    llm: Option<Arc<dyn LlmClient>>,
}

impl Classifier {
    pub fn new(llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { llm }
    }

    pub fn rules_only() -> Self {
        Self { llm: None }
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    /// Classify a filename. Files that are neither video nor subtitle by
    /// extension are rejected without consulting the LLM.
    pub async fn classify(&self, filename: &str) -> Verdict<Classification> {
        let video = rules::is_video_file(filename);
        let subtitle = rules::is_subtitle_file(filename);

        if !video && !subtitle {
            return Verdict::rules(Classification::unimportant());
        }

        if let Some(llm) = &self.llm {
            match importance_by_llm(llm.as_ref(), filename, video).await {
                Ok(classification) => return Verdict::llm(classification),
                Err(e) => {
                    warn!(filename, error = %e, "LLM classification failed, using rules");
                    CLASSIFIER_FALLBACKS.with_label_values(&["importance"]).inc();
                }
            }
        }

        Verdict::rules(rules::classify(filename))
    }

    /// Extract an episode number for a file belonging to `source`. A
    /// stored per-source pattern takes precedence over the LLM flag; the
    /// rule chain is the default and the fallback.
    pub async fn extract_episode(&self, source: &Source, filename: &str) -> Verdict<Option<i64>> {
        if let Some(pattern) = source.episode_regex.as_deref() {
            return Verdict::rules(rules::apply_custom_pattern(pattern, filename));
        }

        if source.use_llm_episode {
            if let Some(llm) = &self.llm {
                match episode_by_llm(llm.as_ref(), filename).await {
                    Ok(episode) => return Verdict::llm(episode),
                    Err(e) => {
                        warn!(filename, error = %e, "LLM episode extraction failed, using rules");
                        CLASSIFIER_FALLBACKS.with_label_values(&["episode"]).inc();
                    }
                }
            }
        }

        Verdict::rules(rules::extract_episode(filename))
    }
}

async fn importance_by_llm(
    llm: &dyn LlmClient,
    filename: &str,
    video: bool,
) -> Result<Classification, LlmError> {
    let request = CompletionRequest::new(importance_prompt(filename, video))
        .with_system(IMPORTANCE_SYSTEM_PROMPT);
    let answer: ImportanceAnswer = complete_json(llm, request).await?;

    info!(
        filename,
        important = answer.is_important,
        main_episode = answer.is_main_episode,
        reason = %answer.reason,
        "LLM classified file"
    );

    // The extension decides the video flag; the model only judges
    // importance and episode kind.
    Ok(Classification {
        important: answer.is_important,
        main_episode: answer.is_main_episode,
        video,
    })
}

async fn episode_by_llm(llm: &dyn LlmClient, filename: &str) -> Result<Option<i64>, LlmError> {
    let request =
        CompletionRequest::new(episode_prompt(filename)).with_system(EPISODE_SYSTEM_PROMPT);
    let answer: EpisodeAnswer = complete_json(llm, request).await?;

    match answer.episode_number {
        0 => {
            info!(filename, reason = %answer.reason, "LLM could not determine an episode");
            Ok(None)
        }
        episode @ 1..=999 => {
            info!(
                filename,
                episode,
                confidence = %answer.confidence,
                "LLM extracted episode"
            );
            Ok(Some(episode))
        }
        episode => Err(LlmError::Json(format!(
            "Episode number out of range: {}",
            episode
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================
