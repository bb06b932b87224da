use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::TtsError;

/// Tokens per frame: one coarse, two middle and four fine codes.
pub const FRAME_SIZE: usize = 7;
/// Number of SNAC codebook layers.
pub const NUM_LAYERS: usize = 3;
/// Output rate of the SNAC 24 kHz vocoder.
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

const DEFAULT_VOCAB_SIZE: u32 = 64_400;
const DEFAULT_CODEBOOK_SIZE: u32 = 4_096;

/// Vocabulary layout of a mixed text + audio token stream.
///
/// Every structural marker is derived from `vocab_size` (the base text vocabulary). Audio codes
/// start at [`TokenLayout::audio_tokens_start`] and occupy `FRAME_SIZE * codebook_size` ids,
/// one codebook-sized block per intra-frame slot.
///
/// Fields are private: a `TokenLayout` only exists once [`TokenLayout::new`] has checked that
/// every id it can address fits in `u32`, so the marker accessors cannot overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "LayoutFile")]
pub struct TokenLayout {
    vocab_size: u32,
    codebook_size: u32,
}

/// On-disk form of a layout; missing fields fall back to the Jenny values.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutFile {
    #[serde(default = "default_vocab_size")]
    vocab_size: u32,
    #[serde(default = "default_codebook_size")]
    codebook_size: u32,
}

fn default_vocab_size() -> u32 {
    DEFAULT_VOCAB_SIZE
}

fn default_codebook_size() -> u32 {
    DEFAULT_CODEBOOK_SIZE
}

impl TryFrom<LayoutFile> for TokenLayout {
    type Error = TtsError;

    fn try_from(f: LayoutFile) -> Result<Self, Self::Error> {
        Self::new(f.vocab_size, f.codebook_size)
    }
}

impl Default for TokenLayout {
    fn default() -> Self {
        Self::JENNY
    }
}

impl TokenLayout {
    /// VyvoTTS-LFM2-Jenny + `snac_24khz`.
    pub const JENNY: Self = Self {
        vocab_size: DEFAULT_VOCAB_SIZE,
        codebook_size: DEFAULT_CODEBOOK_SIZE,
    };

    pub fn new(vocab_size: u32, codebook_size: u32) -> Result<Self, TtsError> {
        if vocab_size == 0 {
            return Err(TtsError::InvalidArg("vocabSize must be > 0".into()));
        }
        if codebook_size == 0 {
            return Err(TtsError::InvalidArg("codebookSize must be > 0".into()));
        }
        // Highest addressable audio id must be representable.
        let top = u64::from(vocab_size) + 10 + (FRAME_SIZE as u64) * u64::from(codebook_size) - 1;
        if top > u64::from(u32::MAX) {
            return Err(TtsError::InvalidArg(format!(
                "layout addresses ids up to {top}, which does not fit in u32"
            )));
        }
        Ok(Self {
            vocab_size,
            codebook_size,
        })
    }

    pub const fn vocab_size(&self) -> u32 {
        self.vocab_size
    }
    pub const fn codebook_size(&self) -> u32 {
        self.codebook_size
    }

    pub const fn start_of_text(&self) -> u32 {
        1
    }
    pub const fn end_of_text(&self) -> u32 {
        7
    }
    pub const fn start_of_speech(&self) -> u32 {
        self.vocab_size + 1
    }
    pub const fn end_of_speech(&self) -> u32 {
        self.vocab_size + 2
    }
    pub const fn start_of_human(&self) -> u32 {
        self.vocab_size + 3
    }
    pub const fn end_of_human(&self) -> u32 {
        self.vocab_size + 4
    }
    pub const fn pad(&self) -> u32 {
        self.vocab_size + 7
    }
    pub const fn audio_tokens_start(&self) -> u32 {
        self.vocab_size + 10
    }

    /// Reads a `layout.json` (camelCase; missing fields fall back to the Jenny values).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TtsError> {
        let bytes = std::fs::read(path.as_ref())?;
        let file: LayoutFile = serde_json::from_slice(&bytes)?;
        Self::try_from(file)
    }

    /// Marker table, keyed by marker name. Used for diagnostics and the CLI.
    pub fn markers(&self) -> [(&'static str, u32); 8] {
        [
            ("startOfText", self.start_of_text()),
            ("endOfText", self.end_of_text()),
            ("startOfSpeech", self.start_of_speech()),
            ("endOfSpeech", self.end_of_speech()),
            ("startOfHuman", self.start_of_human()),
            ("endOfHuman", self.end_of_human()),
            ("pad", self.pad()),
            ("audioTokensStart", self.audio_tokens_start()),
        ]
    }
}
