use crate::TtsError;
use crate::layout::TokenLayout;
use crate::prompt::PromptBatch;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationConfig {
    /// Upper bound on generated tokens per row.
    pub max_new_tokens: usize,
    pub do_sample: bool,
    /// Temperature scaling applied to logits (must be > 0).
    pub temperature: f32,
    /// Nucleus top-p in (0, 1].
    pub top_p: f32,
    /// Must be > 0; 1.0 disables the penalty.
    pub repetition_penalty: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: 800,
            do_sample: true,
            temperature: 0.6,
            top_p: 0.95,
            repetition_penalty: 1.1,
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), TtsError> {
        if self.max_new_tokens == 0 {
            return Err(TtsError::InvalidArg("max_new_tokens must be > 0".into()));
        }
        if !(self.temperature > 0.0) {
            return Err(TtsError::InvalidArg("temperature must be > 0".into()));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(TtsError::InvalidArg("top_p must be in (0, 1]".into()));
        }
        if !(self.repetition_penalty > 0.0) {
            return Err(TtsError::InvalidArg("repetition_penalty must be > 0".into()));
        }
        Ok(())
    }
}

/// Token ids the generator must stop on / pad finished rows with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopTokens {
    pub eos: u32,
    pub pad: u32,
}

impl StopTokens {
    pub fn for_layout(layout: &TokenLayout) -> Self {
        Self {
            eos: layout.end_of_speech(),
            pad: layout.pad(),
        }
    }
}

/// The autoregressive language model.
///
/// Each returned row is the prompt row followed by the generated tokens, ending at `stop.eos` or
/// after `cfg.max_new_tokens`. Rows that stop early may be right-padded with `stop.pad`.
pub trait TokenGenerator {
    fn generate(
        &self,
        batch: &PromptBatch,
        cfg: &GenerationConfig,
        stop: StopTokens,
    ) -> Result<Vec<Vec<u32>>, TtsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        GenerationConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: GenerationConfig = serde_json::from_str(r#"{"maxNewTokens": 1200}"#).unwrap();
        assert_eq!(cfg.max_new_tokens, 1200);
        assert_eq!(cfg.top_p, 0.95);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let bad = [
            GenerationConfig { max_new_tokens: 0, ..Default::default() },
            GenerationConfig { temperature: 0.0, ..Default::default() },
            GenerationConfig { top_p: 1.5, ..Default::default() },
            GenerationConfig { repetition_penalty: f32::NAN, ..Default::default() },
        ];
        for cfg in bad {
            assert!(matches!(cfg.validate(), Err(TtsError::InvalidArg(_))), "{cfg:?}");
        }
    }

    #[test]
    fn stop_tokens_follow_layout() {
        let s = StopTokens::for_layout(&TokenLayout::JENNY);
        assert_eq!(s.eos, 64402);
        assert_eq!(s.pad, 64407);
    }
}
