use crate::TtsError;
use crate::batch::{BatchSummary, decode_batch};
use crate::codes::SnacCodes;
use crate::generation::{GenerationConfig, StopTokens, TokenGenerator};
use crate::layout::TokenLayout;
use crate::prompt::{PromptBatch, TextTokenizer, build_prompt_batch, pad_batch};
use crate::vocoder::{SnacVocoder, check_layer_lengths};
use crate::wav::TtsWavResult;

/// Prompt text -> LM tokens -> SNAC codes -> WAV, one result per prompt.
#[derive(Debug)]
pub struct TtsPipeline<G, V> {
    pub layout: TokenLayout,
    pub generation: GenerationConfig,
    pub generator: G,
    pub vocoder: V,
}

impl<G: TokenGenerator, V: SnacVocoder> TtsPipeline<G, V> {
    pub fn new(layout: TokenLayout, generation: GenerationConfig, generator: G, vocoder: V) -> Self {
        Self {
            layout,
            generation,
            generator,
            vocoder,
        }
    }

    pub fn synthesize_texts(
        &self,
        tokenizer: &dyn TextTokenizer,
        prompts: &[&str],
        voice: Option<&str>,
    ) -> Result<Vec<Result<TtsWavResult, TtsError>>, TtsError> {
        let batch = build_prompt_batch(tokenizer, prompts, voice, &self.layout)?;
        self.synthesize_batch(&batch)
    }

    /// `prompt_rows` are tokenized prompts without framing markers.
    pub fn synthesize_ids(
        &self,
        prompt_rows: &[Vec<u32>],
    ) -> Result<Vec<Result<TtsWavResult, TtsError>>, TtsError> {
        let batch = pad_batch(prompt_rows, &self.layout)?;
        self.synthesize_batch(&batch)
    }

    /// The outer error is a batch-level failure (bad config, generator failure); inner errors
    /// belong to individual rows.
    pub fn synthesize_batch(
        &self,
        batch: &PromptBatch,
    ) -> Result<Vec<Result<TtsWavResult, TtsError>>, TtsError> {
        self.generation.validate()?;

        let stop = StopTokens::for_layout(&self.layout);
        let generated = self.generator.generate(batch, &self.generation, stop)?;
        if generated.len() != batch.len() {
            return Err(TtsError::Generation(format!(
                "generator returned {} rows for a batch of {}",
                generated.len(),
                batch.len()
            )));
        }

        let rows: Vec<&[u32]> = generated
            .iter()
            .map(|r| strip_trailing_padding(r, stop.pad))
            .collect();
        let decoded = decode_batch(&rows, &self.layout);
        let summary = BatchSummary::from_results(&decoded);
        tracing::info!(
            rows = decoded.len(),
            succeeded = summary.succeeded,
            failed = summary.failed,
            frames = summary.frames,
            "decoded generated batch"
        );

        Ok(decoded
            .into_iter()
            .enumerate()
            .map(|(row, res)| {
                let out = res
                    .map_err(TtsError::from)
                    .and_then(|d| self.render(&d.codes));
                if let Err(e) = &out {
                    tracing::warn!(row, error = %e, "row produced no audio");
                }
                out
            })
            .collect())
    }

    fn render(&self, codes: &SnacCodes) -> Result<TtsWavResult, TtsError> {
        if codes.is_empty() {
            return Err(TtsError::InvalidArg("no complete audio frames".into()));
        }
        check_layer_lengths(codes)?;

        let sample_rate = self.vocoder.sample_rate();
        let samples = self.vocoder.decode(codes)?;
        if samples.is_empty() {
            return Err(TtsError::Vocoder("vocoder returned no samples".into()));
        }
        TtsWavResult::from_samples(sample_rate, &samples)
    }
}

/// Rows that hit `EndOfSpeech` early come back right-padded; the padding is not payload.
fn strip_trailing_padding(row: &[u32], pad: u32) -> &[u32] {
    let end = row.iter().rposition(|&t| t != pad).map_or(0, |i| i + 1);
    &row[..end]
}
