use crate::TtsError;
use crate::layout::TokenLayout;

/// Left-padded prompt batch, ready for the language model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBatch {
    pub input_ids: Vec<Vec<u32>>,
    /// 0 over padding, 1 over real tokens.
    pub attention_mask: Vec<Vec<u8>>,
}

impl PromptBatch {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Shared row length after padding.
    pub fn width(&self) -> usize {
        self.input_ids.first().map(Vec::len).unwrap_or(0)
    }
}

/// Text -> token ids. Implemented for HF `tokenizer.json` tokenizers.
pub trait TextTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, TtsError>;
}

impl TextTokenizer for tokenizers::Tokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, TtsError> {
        // `Tokenizer` derefs to `TokenizerImpl`, which owns the inherent `encode`.
        let enc = (**self)
            .encode(text, true)
            .map_err(|e| TtsError::Tokenizer(format!("encode failed: {e}")))?;
        Ok(enc.get_ids().to_vec())
    }
}

/// Multi-speaker checkpoints take the voice as a `"{voice}: "` text prefix.
pub fn with_voice(text: &str, voice: Option<&str>) -> String {
    match voice.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => format!("{v}: {text}"),
        None => text.to_string(),
    }
}

/// `[StartOfHuman] ++ prompt ++ [EndOfText, EndOfHuman]`
pub fn frame_prompt(prompt_ids: &[u32], layout: &TokenLayout) -> Vec<u32> {
    let mut out = Vec::with_capacity(prompt_ids.len() + 3);
    out.push(layout.start_of_human());
    out.extend_from_slice(prompt_ids);
    out.push(layout.end_of_text());
    out.push(layout.end_of_human());
    out
}

/// Frames every prompt and left-pads the batch with `Pad` to the longest row.
pub fn pad_batch<R: AsRef<[u32]>>(
    prompts: &[R],
    layout: &TokenLayout,
) -> Result<PromptBatch, TtsError> {
    if prompts.is_empty() {
        return Err(TtsError::InvalidArg("prompt batch is empty".into()));
    }

    let framed: Vec<Vec<u32>> = prompts
        .iter()
        .map(|p| frame_prompt(p.as_ref(), layout))
        .collect();
    let width = framed.iter().map(Vec::len).max().unwrap_or(0);

    let mut input_ids = Vec::with_capacity(framed.len());
    let mut attention_mask = Vec::with_capacity(framed.len());
    for row in framed {
        let padding = width - row.len();

        let mut ids = Vec::with_capacity(width);
        ids.resize(padding, layout.pad());
        ids.extend_from_slice(&row);

        let mut mask = Vec::with_capacity(width);
        mask.resize(padding, 0u8);
        mask.resize(width, 1u8);

        input_ids.push(ids);
        attention_mask.push(mask);
    }

    Ok(PromptBatch {
        input_ids,
        attention_mask,
    })
}

/// Tokenizes `prompts` (with an optional voice prefix) and builds the padded batch.
pub fn build_prompt_batch(
    tokenizer: &dyn TextTokenizer,
    prompts: &[&str],
    voice: Option<&str>,
    layout: &TokenLayout,
) -> Result<PromptBatch, TtsError> {
    let mut rows = Vec::with_capacity(prompts.len());
    for p in prompts {
        let p = p.trim();
        if p.is_empty() {
            return Err(TtsError::InvalidArg("prompt text is empty".into()));
        }
        rows.push(tokenizer.encode(&with_voice(p, voice))?);
    }
    pad_batch(&rows, layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    const L: TokenLayout = TokenLayout::JENNY;

    struct ByteTokenizer;

    impl TextTokenizer for ByteTokenizer {
        fn encode(&self, text: &str) -> Result<Vec<u32>, TtsError> {
            Ok(text.bytes().map(u32::from).collect())
        }
    }

    #[test]
    fn frame_wraps_prompt_in_human_markers() {
        let got = frame_prompt(&[10, 11], &L);
        assert_eq!(got, vec![64403, 10, 11, 7, 64404]);
    }

    #[test]
    fn pad_batch_left_pads_and_masks() {
        let b = pad_batch(&[vec![1, 2, 3], vec![4]], &L).unwrap();
        assert_eq!(b.width(), 6);
        assert_eq!(b.input_ids[0], vec![64403, 1, 2, 3, 7, 64404]);
        assert_eq!(b.input_ids[1], vec![64407, 64407, 64403, 4, 7, 64404]);
        assert_eq!(b.attention_mask[0], vec![1; 6]);
        assert_eq!(b.attention_mask[1], vec![0, 0, 1, 1, 1, 1]);
    }

    #[test]
    fn empty_batch_is_rejected() {
        let rows: Vec<Vec<u32>> = Vec::new();
        assert!(matches!(pad_batch(&rows, &L), Err(TtsError::InvalidArg(_))));
    }

    #[test]
    fn voice_prefix_is_optional() {
        assert_eq!(with_voice("hi", Some("tara")), "tara: hi");
        assert_eq!(with_voice("hi", Some("  ")), "hi");
        assert_eq!(with_voice("hi", None), "hi");
    }

    #[test]
    fn build_prompt_batch_tokenizes_with_voice() {
        let b = build_prompt_batch(&ByteTokenizer, &["ab", "abc"], Some("v"), &L).unwrap();
        assert_eq!(b.len(), 2);
        // "v: ab" = 5 bytes, framed = 8; "v: abc" = 6 bytes, framed = 9.
        assert_eq!(b.width(), 9);
        assert_eq!(b.input_ids[0][0], L.pad());
        assert_eq!(b.input_ids[0][1], L.start_of_human());
        assert_eq!(b.input_ids[0][2], u32::from(b'v'));
    }

    #[test]
    fn blank_prompt_is_rejected() {
        let err = build_prompt_batch(&ByteTokenizer, &["  "], None, &L).unwrap_err();
        assert!(matches!(err, TtsError::InvalidArg(_)));
    }
}
