//! Sample post-processing and WAV encoding.

use std::io::Cursor;

use bytes::Bytes;

use crate::core::error::PipelineResult;
use crate::core::model::ModelError;

/// Fail if any sample is NaN or infinite
pub fn ensure_finite(samples: &[f32]) -> Result<(), ModelError> {
    match samples.iter().position(|s| !s.is_finite()) {
        Some(idx) => Err(ModelError::InvalidSamples(format!(
            "non-finite sample at index {idx}"
        ))),
        None => Ok(()),
    }
}

/// Peak absolute sample value
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}

/// Scale samples down so the peak equals `limit` when the peak exceeds full
/// scale. Quieter audio is left untouched.
///
/// Returns the applied gain, if any.
pub fn normalize_peak(samples: &mut [f32], limit: f32) -> Option<f32> {
    let peak = peak(samples);
    if peak <= 1.0 {
        return None;
    }
    let gain = limit / peak;
    samples.iter_mut().for_each(|s| *s *= gain);
    Some(gain)
}

/// Encode mono samples as 16-bit PCM WAV
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> PipelineResult<Bytes> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for sample in samples {
            writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(Bytes::from(cursor.into_inner()))
}

/// Duration in seconds of `len` mono samples
pub fn duration_secs(len: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    len as f64 / sample_rate as f64
}
