/// Why a token was rejected while decoding a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RangeViolation {
    /// The raw id is a text or marker token, not an audio token.
    #[error("below audio_tokens_start ({audio_tokens_start})")]
    BelowAudioStart { audio_tokens_start: u32 },
    /// After removing the slot offset the code does not address a codebook entry.
    #[error("frame {frame} slot {slot} yields code {code}, outside [0, {codebook_size})")]
    OutsideCodebook {
        frame: usize,
        slot: usize,
        code: i64,
        codebook_size: u32,
    },
}

/// Fatal per-row decoding failure.
///
/// `position` indexes into the frame-aligned payload, `token` is the raw vocabulary id found
/// there. Out-of-range values are reported, never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("token out of range at position {position} (id {token}): {violation}")]
    TokenOutOfRange {
        position: usize,
        token: u32,
        violation: RangeViolation,
    },
}
