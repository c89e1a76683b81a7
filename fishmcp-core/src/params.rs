use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SpeechError;

pub const TEMPERATURE_RANGE: RangeInclusive<f64> = 0.1..=1.0;
pub const TOP_P_RANGE: RangeInclusive<f64> = 0.1..=1.0;
pub const REPETITION_PENALTY_RANGE: RangeInclusive<f64> = 0.9..=2.0;
/// Hard ceiling on generated tokens forwarded to the model.
pub const MAX_NEW_TOKENS_RANGE: RangeInclusive<u32> = 1..=4096;

/// Sampling parameters handed to the speech model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub temperature: f64,
    pub top_p: f64,
    pub repetition_penalty: f64,
    pub max_new_tokens: u32,
}

impl ParameterSet {
    pub fn validate(&self) -> Result<(), SpeechError> {
        check_float("temperature", self.temperature, &TEMPERATURE_RANGE)?;
        check_float("top_p", self.top_p, &TOP_P_RANGE)?;
        check_float(
            "repetition_penalty",
            self.repetition_penalty,
            &REPETITION_PENALTY_RANGE,
        )?;

        if !MAX_NEW_TOKENS_RANGE.contains(&self.max_new_tokens) {
            return Err(SpeechError::invalid_argument(format!(
                "max_new_tokens = {} is outside the allowed range [{}, {}]",
                self.max_new_tokens,
                MAX_NEW_TOKENS_RANGE.start(),
                MAX_NEW_TOKENS_RANGE.end()
            )));
        }

        Ok(())
    }
}

fn check_float(field: &str, value: f64, range: &RangeInclusive<f64>) -> Result<(), SpeechError> {
    if value.is_finite() && range.contains(&value) {
        return Ok(());
    }
    Err(SpeechError::invalid_argument(format!(
        "{field} = {value} is outside the allowed range [{}, {}]",
        range.start(),
        range.end()
    )))
}

/// Caller-supplied parameter values. Any subset may be present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterOverrides {
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub repetition_penalty: Option<f64>,
    #[serde(default)]
    pub max_new_tokens: Option<u32>,
}

impl ParameterOverrides {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.top_p.is_none()
            && self.repetition_penalty.is_none()
            && self.max_new_tokens.is_none()
    }

    pub fn apply_to(&self, base: ParameterSet) -> ParameterSet {
        ParameterSet {
            temperature: self.temperature.unwrap_or(base.temperature),
            top_p: self.top_p.unwrap_or(base.top_p),
            repetition_penalty: self.repetition_penalty.unwrap_or(base.repetition_penalty),
            max_new_tokens: self.max_new_tokens.unwrap_or(base.max_new_tokens),
        }
    }

    /// Turn the overrides into a full parameter set, failing if any field is
    /// missing. Used when auto-optimization is disabled.
    pub fn into_complete(self) -> Result<ParameterSet, SpeechError> {
        match (
            self.temperature,
            self.top_p,
            self.repetition_penalty,
            self.max_new_tokens,
        ) {
            (Some(temperature), Some(top_p), Some(repetition_penalty), Some(max_new_tokens)) => {
                Ok(ParameterSet {
                    temperature,
                    top_p,
                    repetition_penalty,
                    max_new_tokens,
                })
            }
            _ => {
                let missing: Vec<&str> = [
                    ("temperature", self.temperature.is_none()),
                    ("top_p", self.top_p.is_none()),
                    ("repetition_penalty", self.repetition_penalty.is_none()),
                    ("max_new_tokens", self.max_new_tokens.is_none()),
                ]
                .into_iter()
                .filter(|(_, absent)| *absent)
                .map(|(name, _)| name)
                .collect();

                Err(SpeechError::invalid_argument(format!(
                    "optimize=false requires an explicit parameter set; missing: {}. \
                     Provide them or set optimize=true",
                    missing.join(", ")
                )))
            }
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::VariantArray,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum UseCase {
    #[default]
    Conversational,
    Narrative,
    Expressive,
    Stable,
}

impl UseCase {
    /// Resolve a caller-supplied use case. Missing or unrecognized values fall
    /// back to conversational; an unrecognized value is returned alongside so
    /// callers can report it.
    pub fn resolve(requested: Option<&str>) -> (UseCase, Option<String>) {
        let Some(raw) = requested else {
            return (UseCase::default(), None);
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return (UseCase::default(), None);
        }

        match UseCase::from_str(trimmed) {
            Ok(use_case) => (use_case, None),
            Err(_) => (UseCase::default(), Some(raw.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParameterSet {
        ParameterSet {
            temperature: 0.8,
            top_p: 0.8,
            repetition_penalty: 1.1,
            max_new_tokens: 512,
        }
    }

    #[test]
    fn test_validate_accepts_range_bounds() {
        let lower = ParameterSet {
            temperature: 0.1,
            top_p: 0.1,
            repetition_penalty: 0.9,
            max_new_tokens: 1,
        };
        let upper = ParameterSet {
            temperature: 1.0,
            top_p: 1.0,
            repetition_penalty: 2.0,
            max_new_tokens: 4096,
        };
        assert!(lower.validate().is_ok());
        assert!(upper.validate().is_ok());
    }

    #[test]
    fn test_validate_names_offending_field() {
        let params = ParameterSet {
            top_p: 1.5,
            ..sample()
        };
        let err = params.validate().unwrap_err();
        assert!(matches!(err, SpeechError::InvalidArgument(_)));
        assert!(err.to_string().contains("top_p"));

        let params = ParameterSet {
            max_new_tokens: 0,
            ..sample()
        };
        assert!(params.validate().unwrap_err().to_string().contains("max_new_tokens"));

        let params = ParameterSet {
            temperature: f64::NAN,
            ..sample()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_overrides_replace_only_provided_fields() {
        let overrides = ParameterOverrides {
            temperature: Some(0.5),
            max_new_tokens: Some(256),
            ..Default::default()
        };
        let applied = overrides.apply_to(sample());
        assert_eq!(applied.temperature, 0.5);
        assert_eq!(applied.top_p, 0.8);
        assert_eq!(applied.repetition_penalty, 1.1);
        assert_eq!(applied.max_new_tokens, 256);
    }

    #[test]
    fn test_incomplete_overrides_list_missing_fields() {
        let overrides = ParameterOverrides {
            temperature: Some(0.5),
            ..Default::default()
        };
        let message = overrides.into_complete().unwrap_err().to_string();
        assert!(message.contains("top_p"));
        assert!(message.contains("repetition_penalty"));
        assert!(message.contains("max_new_tokens"));
        assert!(!message.contains("temperature,"));
    }

    #[test]
    fn test_use_case_resolution() {
        assert_eq!(UseCase::resolve(None), (UseCase::Conversational, None));
        assert_eq!(
            UseCase::resolve(Some(" Narrative ")),
            (UseCase::Narrative, None)
        );
        assert_eq!(
            UseCase::resolve(Some("whisper")),
            (UseCase::Conversational, Some("whisper".to_string()))
        );
        assert_eq!(UseCase::Expressive.to_string(), "expressive");
    }
}
