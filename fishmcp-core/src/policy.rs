//! Maps a text and a declared use case to sampling parameters.
//!
//! Presets are fixed per use case. The generation budget grows with the text
//! length in three tiers so short prompts never reserve a long decode.
//! [`RecentRecommendations`] remembers which use case was last recommended for
//! a text, so synthesizing that text without a use case follows the advice.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::params::{ParameterSet, UseCase};

/// Tier boundaries measured in characters, paired with the token budget below them.
const TOKEN_TIERS: [(usize, u32); 2] = [(100, 512), (300, 1024)];
const MAX_TOKEN_BUDGET: u32 = 2048;
const RECENT_CAPACITY: usize = 64;

struct Preset {
    temperature: f64,
    top_p: f64,
    repetition_penalty: f64,
    style: &'static str,
}

fn preset(use_case: UseCase) -> Preset {
    match use_case {
        UseCase::Conversational => Preset {
            temperature: 0.8,
            top_p: 0.8,
            repetition_penalty: 1.1,
            style: "natural, dynamic speech",
        },
        UseCase::Narrative => Preset {
            temperature: 0.75,
            top_p: 0.85,
            repetition_penalty: 1.05,
            style: "smooth, storytelling delivery",
        },
        UseCase::Expressive => Preset {
            temperature: 0.9,
            top_p: 0.75,
            repetition_penalty: 1.15,
            style: "more variation and emotion",
        },
        UseCase::Stable => Preset {
            temperature: 0.7,
            top_p: 0.9,
            repetition_penalty: 1.0,
            style: "consistent, predictable output",
        },
    }
}

/// Token budget for a text of `text_length` characters.
pub fn max_new_tokens_for(text_length: usize) -> u32 {
    TOKEN_TIERS
        .iter()
        .find(|(limit, _)| text_length < *limit)
        .map(|(_, tokens)| *tokens)
        .unwrap_or(MAX_TOKEN_BUDGET)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub use_case: UseCase,
    pub parameters: ParameterSet,
    pub text_length: usize,
    pub rationale: String,
}

pub fn recommend(text: &str, use_case: UseCase) -> Recommendation {
    recommend_requested(text, use_case, None)
}

/// Like [`recommend`], but records a use case the caller asked for that could
/// not be recognized so the rationale can say conversational was used instead.
pub fn recommend_requested(
    text: &str,
    use_case: UseCase,
    unrecognized: Option<&str>,
) -> Recommendation {
    let text_length = text.chars().count();
    let preset = preset(use_case);
    let parameters = ParameterSet {
        temperature: preset.temperature,
        top_p: preset.top_p,
        repetition_penalty: preset.repetition_penalty,
        max_new_tokens: max_new_tokens_for(text_length),
    };

    let mut rationale = String::new();
    if let Some(requested) = unrecognized {
        rationale.push_str(&format!(
            "Unrecognized use_case '{requested}'; falling back to '{use_case}'. \
             Valid values: conversational, narrative, expressive, stable.\n"
        ));
    }
    rationale.push_str(&format!(
        "Preset '{use_case}' targets {}.\n\
         temperature = {}: randomness of generation; 0.8-1.0 is more varied and expressive, \
         0.6-0.7 more consistent.\n\
         top_p = {}: diversity of sampled tokens; higher values widen the choice, \
         0.7-0.8 keeps speech focused and natural.\n\
         repetition_penalty = {}: discourages repeated phrases; 1.1-1.2 prevents them strongly, \
         1.0-1.05 keeps a natural flow.\n\
         max_new_tokens = {}: generation budget chosen for a {text_length}-character text \
         (512 below 100 characters, 1024 below 300, 2048 otherwise).",
        preset.style,
        parameters.temperature,
        parameters.top_p,
        parameters.repetition_penalty,
        parameters.max_new_tokens,
    ));

    Recommendation {
        use_case,
        parameters,
        text_length,
        rationale,
    }
}

/// Bounded memory of the use case most recently recommended for each text.
/// Texts are compared after trimming surrounding whitespace.
#[derive(Debug, Default)]
pub struct RecentRecommendations {
    entries: Mutex<VecDeque<(String, UseCase)>>,
}

impl RecentRecommendations {
    pub fn record(&self, text: &str, use_case: UseCase) {
        let text = text.trim();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|(recorded, _)| recorded != text);
        if entries.len() == RECENT_CAPACITY {
            entries.pop_front();
        }
        entries.push_back((text.to_string(), use_case));
    }

    pub fn lookup(&self, text: &str) -> Option<UseCase> {
        let text = text.trim();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(recorded, _)| recorded == text)
            .map(|(_, use_case)| *use_case)
    }
}
