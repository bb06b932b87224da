//! Pure-Rust decoding of VyvoTTS audio-token streams into SNAC codebook indices.
//!
//! Notes:
//! - The language model (token generation) and the SNAC vocoder (codes -> waveform) are
//!   external collaborators; this crate only defines their seams ([`TokenGenerator`],
//!   [`SnacVocoder`]) and everything in between.
//! - The decoding core ([`codes`], [`batch`]) is allocation-predictable and never blocks.

pub mod batch;
pub mod codes;
mod error;
pub mod generation;
pub mod layout;
pub mod pipeline;
pub mod prompt;
pub mod vocoder;
pub mod wav;

pub use batch::{BatchSummary, decode_batch};
pub use codes::{
    Aligned, DecodeWarning, DecodedRow, RowDiagnostics, Segment, SnacCodes, align, decode_row,
    deinterleave, normalize, segment,
};
pub use error::{DecodeError, RangeViolation};
pub use generation::{GenerationConfig, StopTokens, TokenGenerator};
pub use layout::{DEFAULT_SAMPLE_RATE, FRAME_SIZE, NUM_LAYERS, TokenLayout};
pub use pipeline::TtsPipeline;
pub use prompt::{PromptBatch, TextTokenizer, build_prompt_batch, frame_prompt, pad_batch, with_voice};
pub use vocoder::{SnacVocoder, check_layer_lengths};
pub use wav::{TtsWavResult, peak_normalize_to_pcm16};

#[derive(Debug, thiserror::Error)]
pub enum TtsError {
    #[error("invalid argument: {0}")]
    InvalidArg(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("generation error: {0}")]
    Generation(String),
    #[error("vocoder error: {0}")]
    Vocoder(String),
}
