//! Token stream -> SNAC codebook indices.
//!
//! The model emits audio as frames of 7 tokens. Slot `p` of a frame is drawn from its own
//! codebook-sized block of the vocabulary (`audio_tokens_start + p * codebook_size ..`), and the
//! slots are spread over the three SNAC layers in a 1:2:4 pattern:
//!
//! ```text
//! slot:   0   1   2   3   4   5   6
//! layer:  1   2   3   3   2   3   3
//! ```
//!
//! Decoding a row is a straight pipeline: [`segment`] -> [`align`] -> [`normalize`] ->
//! [`deinterleave`]. [`decode_row`] runs all of it and keeps the non-fatal diagnostics.

use serde::Serialize;

use crate::error::{DecodeError, RangeViolation};
use crate::layout::{FRAME_SIZE, NUM_LAYERS, TokenLayout};

#[derive(Debug, Clone, Copy)]
enum Layer {
    Coarse,
    Middle,
    Fine,
}

/// `(target layer, codebook block)` for each intra-frame slot.
const SLOT_MAP: [(Layer, u32); FRAME_SIZE] = [
    (Layer::Coarse, 0),
    (Layer::Middle, 1),
    (Layer::Fine, 2),
    (Layer::Fine, 3),
    (Layer::Middle, 4),
    (Layer::Fine, 5),
    (Layer::Fine, 6),
];

/// The three SNAC code layers for one utterance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnacCodes {
    /// One code per frame.
    pub layer1: Vec<u32>,
    /// Two codes per frame.
    pub layer2: Vec<u32>,
    /// Four codes per frame.
    pub layer3: Vec<u32>,
}

impl SnacCodes {
    fn with_frames(frames: usize) -> Self {
        Self {
            layer1: Vec::with_capacity(frames),
            layer2: Vec::with_capacity(frames * 2),
            layer3: Vec::with_capacity(frames * 4),
        }
    }

    pub fn frames(&self) -> usize {
        self.layer1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layer1.is_empty()
    }

    /// Coarse to fine.
    pub fn layers(&self) -> [&[u32]; NUM_LAYERS] {
        [&self.layer1, &self.layer2, &self.layer3]
    }

    fn layer_mut(&mut self, layer: Layer) -> &mut Vec<u32> {
        match layer {
            Layer::Coarse => &mut self.layer1,
            Layer::Middle => &mut self.layer2,
            Layer::Fine => &mut self.layer3,
        }
    }
}

/// Output of [`segment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub payload: Vec<u32>,
    /// Index of the last `StartOfSpeech` in the input. `None` means the whole input was used.
    pub start_marker: Option<usize>,
    pub end_markers_removed: usize,
}

/// Isolates the speech payload: everything after the last `StartOfSpeech`, minus every
/// `EndOfSpeech`. Without a `StartOfSpeech` the whole input is the payload.
pub fn segment(tokens: &[u32], layout: &TokenLayout) -> Segment {
    let start_of_speech = layout.start_of_speech();
    let end_of_speech = layout.end_of_speech();

    let start_marker = tokens.iter().rposition(|&t| t == start_of_speech);
    let tail = match start_marker {
        Some(i) => &tokens[i + 1..],
        None => tokens,
    };

    let mut payload = Vec::with_capacity(tail.len());
    let mut end_markers_removed = 0usize;
    for &t in tail {
        if t == end_of_speech {
            end_markers_removed += 1;
        } else {
            payload.push(t);
        }
    }

    Segment {
        payload,
        start_marker,
        end_markers_removed,
    }
}

/// Output of [`align`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aligned {
    pub tokens: Vec<u32>,
    /// Trailing tokens dropped because they did not fill a frame.
    pub discarded: usize,
}

/// Truncates the payload to a whole number of frames. The partial tail is dropped, never padded.
pub fn align(mut payload: Vec<u32>) -> Aligned {
    let keep = payload.len() / FRAME_SIZE * FRAME_SIZE;
    let discarded = payload.len() - keep;
    payload.truncate(keep);
    Aligned {
        tokens: payload,
        discarded,
    }
}

/// Rebases raw vocabulary ids onto the codec range (`raw - audio_tokens_start`).
pub fn normalize(aligned: &[u32], layout: &TokenLayout) -> Result<Vec<u32>, DecodeError> {
    let audio_tokens_start = layout.audio_tokens_start();
    aligned
        .iter()
        .enumerate()
        .map(|(position, &token)| {
            token
                .checked_sub(audio_tokens_start)
                .ok_or(DecodeError::TokenOutOfRange {
                    position,
                    token,
                    violation: RangeViolation::BelowAudioStart { audio_tokens_start },
                })
        })
        .collect()
}

/// Splits normalized tokens into the three SNAC layers.
///
/// Only complete frames are read; callers are expected to pass [`align`]ed input. Every code
/// must land in `[0, codebook_size)` after its slot offset is removed.
pub fn deinterleave(normalized: &[u32], layout: &TokenLayout) -> Result<SnacCodes, DecodeError> {
    let codebook_size = i64::from(layout.codebook_size());
    let mut codes = SnacCodes::with_frames(normalized.len() / FRAME_SIZE);

    for (frame, chunk) in normalized.chunks_exact(FRAME_SIZE).enumerate() {
        for (slot, (&token, &(layer, block))) in chunk.iter().zip(SLOT_MAP.iter()).enumerate() {
            let code = i64::from(token) - i64::from(block) * codebook_size;
            if !(0..codebook_size).contains(&code) {
                return Err(DecodeError::TokenOutOfRange {
                    position: frame * FRAME_SIZE + slot,
                    token: token.saturating_add(layout.audio_tokens_start()),
                    violation: RangeViolation::OutsideCodebook {
                        frame,
                        slot,
                        code,
                        codebook_size: layout.codebook_size(),
                    },
                });
            }
            codes.layer_mut(layer).push(code as u32);
        }
    }

    Ok(codes)
}

/// Non-fatal conditions observed while decoding a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DecodeWarning {
    /// No `StartOfSpeech`; the full row was treated as payload.
    MarkerNotFound,
    /// The payload was not a multiple of the frame size.
    FrameMisalignment { discarded: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowDiagnostics {
    pub start_marker: Option<usize>,
    pub end_markers_removed: usize,
    pub discarded_tail: usize,
}

impl RowDiagnostics {
    pub fn warnings(&self) -> Vec<DecodeWarning> {
        let mut out = Vec::new();
        if self.start_marker.is_none() {
            out.push(DecodeWarning::MarkerNotFound);
        }
        if self.discarded_tail > 0 {
            out.push(DecodeWarning::FrameMisalignment {
                discarded: self.discarded_tail,
            });
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedRow {
    pub codes: SnacCodes,
    pub diagnostics: RowDiagnostics,
}

/// Runs the full per-row pipeline on one generated token sequence.
pub fn decode_row(tokens: &[u32], layout: &TokenLayout) -> Result<DecodedRow, DecodeError> {
    let seg = segment(tokens, layout);
    let end_markers_removed = seg.end_markers_removed;
    let start_marker = seg.start_marker;
    if start_marker.is_none() {
        tracing::debug!(len = tokens.len(), "no start-of-speech marker; decoding whole row");
    }

    let aligned = align(seg.payload);
    if aligned.discarded > 0 {
        tracing::debug!(
            discarded = aligned.discarded,
            kept = aligned.tokens.len(),
            "dropped partial trailing frame"
        );
    }

    let normalized = normalize(&aligned.tokens, layout)?;
    let codes = deinterleave(&normalized, layout)?;

    Ok(DecodedRow {
        codes,
        diagnostics: RowDiagnostics {
            start_marker,
            end_markers_removed,
            discarded_tail: aligned.discarded,
        },
    })
}
