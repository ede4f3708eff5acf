//! Audio input: microphone capture → mono 16 kHz feed → VAD.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → stereo_to_mono → resample_to_16k
//!           → AudioFeed (ring buffer) → recognizer (VadDetector, Whisper)
//! ```
//!
//! [`CaptureManager`] owns the one live stream; everything downstream only
//! reads from the shared [`AudioFeed`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use interview_voice::audio::{AudioFeed, CaptureManager, CpalMicrophone};
//!
//! let feed = Arc::new(AudioFeed::default());
//! let mut capture = CaptureManager::new(Box::new(CpalMicrophone::new(Arc::clone(&feed))));
//! capture.acquire(None).unwrap();
//! // ... feed.drain() from the recognizer ...
//! capture.release();
//! ```

pub mod buffer;
pub mod capture;
pub mod resample;
pub mod vad;

pub use buffer::{AudioFeed, RingBuffer, SharedFeed, DEFAULT_FEED_CAPACITY};
pub use capture::{
    AudioHandle, AudioStream, CaptureError, CaptureManager, CpalMicrophone, DeviceInfo,
    Microphone, DEFAULT_DEVICE_ID,
};
pub use resample::{resample_to_16k, stereo_to_mono, TARGET_RATE};
pub use vad::{VadDetector, FRAME_SAMPLES};
