//! Capture Manager: owns the single live microphone stream.
//!
//! [`CaptureManager`] is the only place that opens, mutes or releases the
//! input stream.  The hardware side is abstracted behind [`Microphone`] so
//! the session can be driven by a test double; [`CpalMicrophone`] is the
//! production backend.
//!
//! Muting does not tear the stream down.  It flips a flag read in the audio
//! callback, so unmuting is instant and does not re-prompt the device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::buffer::SharedFeed;
use super::resample::{resample_to_16k, stereo_to_mono};

/// Device id meaning "whatever the host considers the default input".
pub const DEFAULT_DEVICE_ID: &str = "default";

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors raised while acquiring a microphone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("microphone access was denied")]
    PermissionDenied,

    #[error("no microphone named \"{0}\" was found")]
    NotFound(String),

    #[error("microphone \"{0}\" cannot provide a usable input stream")]
    Overconstrained(String),

    #[error("no audio input device is available")]
    NoDevice,

    #[error("audio backend error: {0}")]
    Backend(String),
}

impl CaptureError {
    /// `true` for failures that a retry on the default device may fix.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CaptureError::NotFound(_) | CaptureError::Overconstrained(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Backend traits
// ---------------------------------------------------------------------------

/// An input device as presented to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub label: String,
    pub is_default: bool,
}

/// A running input stream.
pub trait AudioStream {
    /// Gate whether captured audio is forwarded.
    fn set_enabled(&self, enabled: bool);
    /// Stop the hardware stream.  Must tolerate repeated calls.
    fn stop(&mut self);
}

/// Opens input streams.
pub trait Microphone {
    /// Open `device` (or the host default for `None`).  The stream starts
    /// forwarding audio only when `enabled` is true.
    fn open(
        &mut self,
        device: Option<&str>,
        enabled: bool,
    ) -> Result<Box<dyn AudioStream>, CaptureError>;

    /// Enumerate input devices.
    fn devices(&self) -> Vec<DeviceInfo>;
}

// ---------------------------------------------------------------------------
// AudioHandle / CaptureManager
// ---------------------------------------------------------------------------

/// The live stream plus the device it was opened on.
pub struct AudioHandle {
    stream: Box<dyn AudioStream>,
    device: Option<String>,
}

impl AudioHandle {
    /// `None` for the host default.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }
}

/// Owner of the microphone stream and mute flag.
pub struct CaptureManager {
    backend: Box<dyn Microphone>,
    handle: Option<AudioHandle>,
    muted: bool,
}

impl CaptureManager {
    pub fn new(backend: Box<dyn Microphone>) -> Self {
        Self {
            backend,
            handle: None,
            muted: false,
        }
    }

    /// Open `device_id` (`None` or `"default"` selects the host default).
    ///
    /// The held stream is stopped only once the replacement has opened, so a
    /// failed switch keeps the previous microphone.  A recoverable error on a
    /// named device should be retried by the caller with `None`.
    pub fn acquire(&mut self, device_id: Option<&str>) -> Result<&AudioHandle, CaptureError> {
        let device = device_id
            .map(str::trim)
            .filter(|id| !id.is_empty() && *id != DEFAULT_DEVICE_ID);

        let stream = self.backend.open(device, !self.muted)?;
        self.release();
        log::info!(
            "capture: acquired {}{}",
            device.unwrap_or(DEFAULT_DEVICE_ID),
            if self.muted { " (muted)" } else { "" }
        );

        Ok(&*self.handle.insert(AudioHandle {
            stream,
            device: device.map(str::to_string),
        }))
    }

    /// Gate audio without closing the stream.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if let Some(handle) = &self.handle {
            handle.stream.set_enabled(!muted);
        }
    }

    /// Stop the stream and drop the handle.  Safe to call repeatedly.
    pub fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.stream.stop();
            log::info!(
                "capture: released {}",
                handle.device().unwrap_or(DEFAULT_DEVICE_ID)
            );
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn handle(&self) -> Option<&AudioHandle> {
        self.handle.as_ref()
    }

    pub fn devices(&self) -> Vec<DeviceInfo> {
        self.backend.devices()
    }
}

impl Drop for CaptureManager {
    fn drop(&mut self) {
        self.release();
    }
}

// ---------------------------------------------------------------------------
// CpalMicrophone
// ---------------------------------------------------------------------------

/// Microphone backend built on `cpal`.
///
/// Every opened stream downmixes to mono, resamples to 16 kHz and appends
/// into the shared [`AudioFeed`](super::AudioFeed).  Stream errors raise the
/// feed's lost flag so the recognizer can report a capture failure.
pub struct CpalMicrophone {
    feed: SharedFeed,
}

impl CpalMicrophone {
    pub fn new(feed: SharedFeed) -> Self {
        Self { feed }
    }

    fn find_device(host: &cpal::Host, name: &str) -> Result<cpal::Device, CaptureError> {
        let mut devices = host
            .input_devices()
            .map_err(|e| CaptureError::Backend(e.to_string()))?;
        devices
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| CaptureError::NotFound(name.to_string()))
    }
}

impl Microphone for CpalMicrophone {
    fn open(
        &mut self,
        device: Option<&str>,
        enabled: bool,
    ) -> Result<Box<dyn AudioStream>, CaptureError> {
        let host = cpal::default_host();
        let dev = match device {
            Some(name) => Self::find_device(&host, name)?,
            None => host.default_input_device().ok_or(CaptureError::NoDevice)?,
        };

        // A named device that cannot report a config is "overconstrained";
        // the caller falls back to the default.
        let supported = dev.default_input_config().map_err(|e| match device {
            Some(name) => {
                log::warn!("capture: {name} has no usable input config: {e}");
                CaptureError::Overconstrained(name.to_string())
            }
            None => CaptureError::Backend(e.to_string()),
        })?;

        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        let gate = Arc::new(AtomicBool::new(enabled));
        let data_gate = Arc::clone(&gate);
        let data_feed = Arc::clone(&self.feed);
        let err_feed = Arc::clone(&self.feed);

        let stream = dev
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !data_gate.load(Ordering::Relaxed) {
                        return;
                    }
                    let mono = stereo_to_mono(data, channels);
                    data_feed.push(&resample_to_16k(&mono, sample_rate));
                },
                move |err: cpal::StreamError| {
                    log::error!("capture: stream error: {err}");
                    if matches!(err, cpal::StreamError::DeviceNotAvailable) {
                        err_feed.mark_lost();
                    }
                },
                None,
            )
            .map_err(|e| match (e, device) {
                (cpal::BuildStreamError::DeviceNotAvailable, Some(name)) => {
                    CaptureError::NotFound(name.to_string())
                }
                (cpal::BuildStreamError::StreamConfigNotSupported, Some(name)) => {
                    CaptureError::Overconstrained(name.to_string())
                }
                (e, _) => CaptureError::Backend(e.to_string()),
            })?;

        stream
            .play()
            .map_err(|e| CaptureError::Backend(e.to_string()))?;

        self.feed.clear();
        self.feed.mark_live();
        log::debug!("capture: stream running at {sample_rate} Hz, {channels} ch");

        Ok(Box::new(CpalStream {
            stream: Some(stream),
            gate,
        }))
    }

    fn devices(&self) -> Vec<DeviceInfo> {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());

        let Ok(devices) = host.input_devices() else {
            return Vec::new();
        };

        devices
            .filter_map(|d| d.name().ok())
            .map(|name| DeviceInfo {
                is_default: default_name.as_deref() == Some(name.as_str()),
                label: name.clone(),
                id: name,
            })
            .collect()
    }
}

struct CpalStream {
    stream: Option<cpal::Stream>,
    gate: Arc<AtomicBool>,
}

impl AudioStream for CpalStream {
    fn set_enabled(&self, enabled: bool) {
        self.gate.store(enabled, Ordering::Relaxed);
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::debug!("capture: pause on stop failed: {e}");
            }
        }
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::fake::FakeMicrophone;
    use super::*;

    #[test]
    fn acquire_replaces_previous_stream() {
        let (mic, log) = FakeMicrophone::new();
        let mut capture = CaptureManager::new(Box::new(mic));

        capture.acquire(Some("USB")).unwrap();
        capture.acquire(None).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.opened, vec![Some("USB".to_string()), None]);
        assert_eq!(log.live_streams, 1);
    }

    #[test]
    fn default_id_maps_to_host_default() {
        let (mic, log) = FakeMicrophone::new();
        let mut capture = CaptureManager::new(Box::new(mic));

        let handle = capture.acquire(Some(DEFAULT_DEVICE_ID)).unwrap();
        assert!(handle.device().is_none());
        assert_eq!(log.lock().unwrap().opened, vec![None]);
    }

    #[test]
    fn missing_device_is_recoverable() {
        let (mut mic, _log) = FakeMicrophone::new();
        mic.missing.push("Gone".into());
        let mut capture = CaptureManager::new(Box::new(mic));

        let err = capture.acquire(Some("Gone")).err().unwrap();
        assert!(err.is_recoverable());
        assert!(!capture.is_active());
        assert!(!CaptureError::PermissionDenied.is_recoverable());
    }

    #[test]
    fn failed_switch_keeps_previous_stream() {
        let (mic, log) = FakeMicrophone::new();
        let mut capture = CaptureManager::new(Box::new(mic));
        capture.acquire(Some("Built-in")).unwrap();

        log.lock().unwrap().denied = true;
        let err = capture.acquire(Some("USB")).err().unwrap();
        assert!(matches!(err, CaptureError::PermissionDenied));

        assert!(capture.is_active());
        assert_eq!(capture.handle().and_then(|h| h.device()), Some("Built-in"));
        assert_eq!(log.lock().unwrap().live_streams, 1);
    }

    #[test]
    fn mute_keeps_stream_open() {
        let (mic, log) = FakeMicrophone::new();
        let mut capture = CaptureManager::new(Box::new(mic));
        capture.acquire(None).unwrap();

        capture.set_muted(true);
        {
            let log = log.lock().unwrap();
            assert!(!log.enabled);
            assert_eq!(log.live_streams, 1);
        }
        capture.set_muted(false);
        assert!(log.lock().unwrap().enabled);
    }

    #[test]
    fn muted_flag_applies_to_next_stream() {
        let (mic, log) = FakeMicrophone::new();
        let mut capture = CaptureManager::new(Box::new(mic));
        capture.set_muted(true);
        capture.acquire(None).unwrap();
        assert!(!log.lock().unwrap().enabled);
    }

    #[test]
    fn release_is_idempotent() {
        let (mic, log) = FakeMicrophone::new();
        let mut capture = CaptureManager::new(Box::new(mic));
        capture.acquire(None).unwrap();

        capture.release();
        capture.release();
        assert!(!capture.is_active());
        assert_eq!(log.lock().unwrap().live_streams, 0);
    }
}
