use crate::TtsError;
use crate::codes::SnacCodes;
use crate::layout::NUM_LAYERS;

/// Codes per frame in each layer, coarse to fine.
const LAYER_DENSITY: [usize; NUM_LAYERS] = [1, 2, 4];

/// SNAC decoder: three code layers in, mono `f32` samples out.
pub trait SnacVocoder {
    fn sample_rate(&self) -> u32;

    fn decode(&self, codes: &SnacCodes) -> Result<Vec<f32>, TtsError>;
}

/// Checks the 1:2:4 layer shape the vocoder expects.
pub fn check_layer_lengths(codes: &SnacCodes) -> Result<(), TtsError> {
    let frames = codes.frames();
    let lens = codes.layers().map(<[u32]>::len);
    if lens.iter().zip(LAYER_DENSITY).any(|(&n, d)| n != frames * d) {
        return Err(TtsError::InvalidArg(format!(
            "layer lengths {}/{}/{} are not 1:2:4",
            lens[0], lens[1], lens[2]
        )));
    }
    Ok(())
}
