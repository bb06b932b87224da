use std::io::Cursor;

use crate::TtsError;

/// One rendered utterance: peak-normalized 16-bit mono WAV.
#[derive(Debug, Clone)]
pub struct TtsWavResult {
    pub sample_rate: u32,
    /// Number of PCM frames in `wav_bytes`.
    pub samples: usize,
    pub wav_bytes: Vec<u8>,
}

impl TtsWavResult {
    /// Normalizes vocoder output with [`peak_normalize_to_pcm16`] and wraps it in a WAV file.
    pub fn from_samples(sample_rate: u32, samples: &[f32]) -> Result<Self, TtsError> {
        if sample_rate == 0 {
            return Err(TtsError::InvalidArg("sample_rate must be > 0".into()));
        }
        let pcm = peak_normalize_to_pcm16(samples);
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut buf = Cursor::new(Vec::with_capacity(44 + pcm.len() * 2));
        let mut w = hound::WavWriter::new(&mut buf, spec)?;
        for &s in &pcm {
            w.write_sample(s)?;
        }
        w.finalize()?;

        Ok(Self {
            sample_rate,
            samples: pcm.len(),
            wav_bytes: buf.into_inner(),
        })
    }

    pub fn duration_ms(&self) -> u64 {
        (self.samples as u64).saturating_mul(1000) / u64::from(self.sample_rate.max(1))
    }
}

/// Loudness-normalizes one utterance to 16-bit PCM: `x / max|x| * 32767`, truncated toward
/// zero.
///
/// Silent input stays silent. Non-finite samples count as 0.
pub fn peak_normalize_to_pcm16(samples: &[f32]) -> Vec<i16> {
    let finite = |x: f32| if x.is_finite() { x } else { 0.0 };
    let peak = samples.iter().fold(0.0f32, |m, &x| m.max(finite(x).abs()));
    if peak == 0.0 {
        return vec![0; samples.len()];
    }
    samples
        .iter()
        .map(|&x| (finite(x) / peak * 32767.0) as i16)
        .collect()
}
