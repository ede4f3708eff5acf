//! Energy-based voice activity detection.
//!
//! Audio is split into 30 ms frames (480 samples at 16 kHz); a frame is voice
//! when its RMS exceeds the threshold.  The recognizer uses
//! [`VadDetector::is_voice`] for endpointing and
//! [`VadDetector::trim_silence`] before handing an utterance to Whisper.

/// 30 ms at 16 kHz.
pub const FRAME_SAMPLES: usize = 480;

#[derive(Debug, Clone, Copy)]
pub struct VadDetector {
    rms_threshold: f32,
}

impl VadDetector {
    /// `rms_threshold` around `0.01` suits a quiet room.
    pub fn new(rms_threshold: f32) -> Self {
        Self { rms_threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.rms_threshold
    }

    /// `true` when `frame` carries voice energy.
    pub fn is_voice(&self, frame: &[f32]) -> bool {
        if frame.is_empty() {
            return false;
        }
        let mean_sq = frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32;
        mean_sq.sqrt() > self.rms_threshold
    }

    /// Sub-slice from the first to the last voice frame; empty when the clip
    /// is silent.
    ///
    /// ```rust
    /// use interview_voice::audio::VadDetector;
    ///
    /// let mut audio = vec![0.0_f32; 480];
    /// audio.extend(vec![0.5_f32; 480]);
    /// audio.extend(vec![0.0_f32; 480]);
    /// assert_eq!(VadDetector::new(0.01).trim_silence(&audio).len(), 480);
    /// ```
    pub fn trim_silence<'a>(&self, audio: &'a [f32]) -> &'a [f32] {
        let frames: Vec<&[f32]> = audio.chunks(FRAME_SAMPLES).collect();
        let first = frames.iter().position(|f| self.is_voice(f));
        let last = frames.iter().rposition(|f| self.is_voice(f));
        match (first, last) {
            (Some(first), Some(last)) => {
                let start = first * FRAME_SAMPLES;
                let end = ((last + 1) * FRAME_SAMPLES).min(audio.len());
                &audio[start..end]
            }
            _ => &audio[0..0],
        }
    }
}
