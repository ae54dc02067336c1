// This is free and unencumbered software released into the public domain.

use super::{
    CameraBackend, CameraDriver, CameraSource, Dispatcher, PipelineConfig, PipelineError,
};
use std::sync::mpsc::sync_channel;

/// Capacity of the frame channel between driver and dispatcher. One slot:
/// a frame arriving while the previous one is in flight is dropped, never
/// queued (keep-only-latest).
const FRAME_CHANNEL_CAPACITY: usize = 1;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Open a camera by device identifier and wire it to a dispatcher.
///
/// `synthetic:` (or `synthetic`) selects the in-process generator; any
/// other identifier goes to the ffmpeg backend when compiled in.
pub fn open_camera(
    device: impl AsRef<str>,
    config: PipelineConfig,
) -> Result<CameraSource, PipelineError> {
    let device = device.as_ref();
    let backend = select_backend(device)?;

    let (events_tx, events_rx) = sync_channel(EVENT_CHANNEL_CAPACITY);
    let dispatcher = Dispatcher::new(FRAME_CHANNEL_CAPACITY, backend, events_tx.clone());

    let driver: Box<dyn CameraDriver> = match backend {
        CameraBackend::Synthetic => Box::new(super::drivers::synthetic::SyntheticCameraDriver::open(
            config,
            dispatcher.sender(),
            events_tx,
        )?),
        CameraBackend::Ffmpeg => {
            #[cfg(feature = "ffmpeg")]
            {
                Box::new(super::drivers::ffmpeg::FfmpegCameraDriver::open(
                    device,
                    config,
                    dispatcher.sender(),
                    events_tx,
                )?)
            }
            #[cfg(not(feature = "ffmpeg"))]
            {
                return Err(PipelineError::NoDriver);
            }
        },
    };

    Ok(CameraSource::new(driver, dispatcher, events_rx))
}

fn select_backend(device: &str) -> Result<CameraBackend, PipelineError> {
    if device == "synthetic" || device.starts_with("synthetic:") {
        return Ok(CameraBackend::Synthetic);
    }
    if cfg!(feature = "ffmpeg") {
        return Ok(CameraBackend::Ffmpeg);
    }
    Err(PipelineError::NoDriver)
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "macos")] {
        /// Platform default device identifier used when none is configured.
        pub fn default_device() -> &'static str {
            "avf:0"
        }
    } else if #[cfg(target_os = "linux")] {
        /// Platform default device identifier used when none is configured.
        pub fn default_device() -> &'static str {
            "file:/dev/video0"
        }
    } else if #[cfg(target_os = "windows")] {
        /// Platform default device identifier used when none is configured.
        pub fn default_device() -> &'static str {
            "dshow:video=default"
        }
    } else {
        /// Platform default device identifier used when none is configured.
        pub fn default_device() -> &'static str {
            "synthetic:"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_scheme_selects_the_synthetic_backend() {
        assert_eq!(
            select_backend("synthetic:").unwrap(),
            CameraBackend::Synthetic
        );
        assert_eq!(
            select_backend("synthetic").unwrap(),
            CameraBackend::Synthetic
        );
    }

    #[cfg(feature = "ffmpeg")]
    #[test]
    fn other_devices_fall_through_to_ffmpeg() {
        assert_eq!(
            select_backend("file:/dev/video0").unwrap(),
            CameraBackend::Ffmpeg
        );
    }

    #[test]
    fn opening_a_synthetic_camera_succeeds() {
        let source = open_camera("synthetic:", PipelineConfig::new(32, 24, 30.0)).unwrap();
        assert_eq!(source.backend(), CameraBackend::Synthetic);
    }
}
