//! Channel mixing and sample-rate conversion for the recognizer feed.
//!
//! Whisper wants 16 kHz mono `f32`; capture devices usually deliver 44.1 or
//! 48 kHz interleaved stereo.  Linear interpolation is enough for speech.

/// Target rate of the recognizer feed.
pub const TARGET_RATE: u32 = 16_000;

/// Average interleaved frames down to one channel.
///
/// ```rust
/// use interview_voice::audio::stereo_to_mono;
///
/// let mono = stereo_to_mono(&[0.5, -0.5, 0.2, 0.4], 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Resample mono `samples` from `source_rate` to [`TARGET_RATE`].
pub fn resample_to_16k(samples: &[f32], source_rate: u32) -> Vec<f32> {
    if source_rate == TARGET_RATE || samples.is_empty() || source_rate == 0 {
        return samples.to_vec();
    }

    let ratio = source_rate as f64 / TARGET_RATE as f64;
    let out_len = ((samples.len() as f64) / ratio).floor() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx.min(last)];
            let b = samples[(idx + 1).min(last)];
            a + (b - a) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_passthrough() {
        assert_eq!(stereo_to_mono(&[0.1, 0.2], 1), vec![0.1, 0.2]);
        assert!(stereo_to_mono(&[0.1, 0.2], 0).is_empty());
    }

    #[test]
    fn downsample_48k_to_16k_thirds_length() {
        let input = vec![0.25_f32; 48_000];
        let out = resample_to_16k(&input, 48_000);
        assert_eq!(out.len(), 16_000);
        assert!(out.iter().all(|s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn same_rate_is_identity() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_to_16k(&input, 16_000), input);
    }
}
