// This is free and unencumbered software released into the public domain.

use crate::shared::{Facing, Frame, PixelFormat, Rotation};
use bytes::Bytes;
use derive_more::Display;
use std::sync::{
    Mutex,
    atomic::{AtomicU64, Ordering},
    mpsc::SyncSender,
};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum EngineErrorKind {
    #[display("initialization")]
    Initialization,
    #[display("effect")]
    Effect,
    #[display("rendering")]
    Rendering,
    #[display("unknown")]
    Unknown,
}

/// An error reported by the effect engine, either as a return value or
/// asynchronously via [`EngineEvent::Error`].
#[derive(Clone, Debug, Error)]
#[error("effect engine {kind} error: {message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn effect(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Effect, message)
    }

    pub fn rendering(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Rendering, message)
    }
}

/// Opaque handle to a platform window or surface the engine renders to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSurface {
    pub native_handle: usize,
}

impl RenderSurface {
    pub fn new(native_handle: usize) -> Self {
        Self { native_handle }
    }
}

/// Metadata accompanying one packed buffer into the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
    pub facing: Facing,
    pub format: PixelFormat,
    pub chroma_pixel_stride: u32,
}

impl FrameInfo {
    pub fn of(frame: &Frame) -> Self {
        Self {
            width: frame.width,
            height: frame.height,
            rotation: frame.rotation,
            facing: frame.facing,
            format: frame.pixel_format(),
            chroma_pixel_stride: frame.chroma_pixel_stride(),
        }
    }
}

/// Asynchronous notifications from the engine's own render thread(s).
#[derive(Clone, Debug)]
pub enum EngineEvent {
    Initialized,
    EffectSwitched {
        slot: String,
    },
    ScreenshotTaken {
        width: u32,
        height: u32,
        rgba: Bytes,
    },
    FaceVisibilityChanged {
        visible: bool,
    },
    ShutdownFinished,
    Error {
        kind: EngineErrorKind,
        message: String,
    },
}

/// The effect engine boundary.
///
/// The engine is an external black box that renders processed frames to a
/// surface. Calls arrive single-threaded and in capture order: exactly one
/// `receive_frame` per frame, never overlapping. Engines render
/// asynchronously and report progress on their event channel.
pub trait EffectEngine: Send + Sync {
    /// Hand one packed `[Y][V][U]` buffer plus its geometry to the engine.
    fn receive_frame(&self, packed: &[u8], info: &FrameInfo) -> Result<(), EngineError>;

    /// Change the active effect in `slot`. `None` is the no-effect sentinel
    /// and clears the slot. Selection does not survive engine
    /// teardown/init; the caller re-issues this after [`EngineEvent::Initialized`].
    fn switch_effect(&self, slot: &str, path: Option<&str>) -> Result<(), EngineError>;

    /// Forward a render-surface change. `None` with zero dimensions
    /// signals teardown.
    fn set_render_surface(
        &self,
        surface: Option<RenderSurface>,
        width: u32,
        height: u32,
    ) -> Result<(), EngineError>;

    /// Request a screenshot; the result arrives as
    /// [`EngineEvent::ScreenshotTaken`].
    fn take_screenshot(&self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Request engine teardown; completion arrives as
    /// [`EngineEvent::ShutdownFinished`].
    fn shutdown(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// A conforming engine that renders nothing.
///
/// Validates call shape, tracks the active effect, and emits the lifecycle
/// events a real SDK binding would. Default engine for the viewer binary
/// and a reference for bindings.
pub struct NoopEffectEngine {
    events_tx: SyncSender<EngineEvent>,
    frames: AtomicU64,
    active_effect: Mutex<Option<String>>,
    last_geometry: Mutex<Option<(u32, u32)>>,
}

impl NoopEffectEngine {
    pub fn new(events_tx: SyncSender<EngineEvent>) -> Self {
        let _ = events_tx.try_send(EngineEvent::Initialized);
        Self {
            events_tx,
            frames: AtomicU64::new(0),
            active_effect: Mutex::new(None),
            last_geometry: Mutex::new(None),
        }
    }

    pub fn frames_received(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn active_effect(&self) -> Option<String> {
        self.active_effect
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl EffectEngine for NoopEffectEngine {
    fn receive_frame(&self, packed: &[u8], info: &FrameInfo) -> Result<(), EngineError> {
        let luma = (info.width as usize) * (info.height as usize);
        if packed.len() < luma {
            return Err(EngineError::rendering(format!(
                "packed buffer ({} bytes) smaller than luma plane ({luma} bytes)",
                packed.len()
            )));
        }
        self.frames.fetch_add(1, Ordering::Relaxed);
        *self
            .last_geometry
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some((info.width, info.height));
        Ok(())
    }

    fn switch_effect(&self, slot: &str, path: Option<&str>) -> Result<(), EngineError> {
        *self
            .active_effect
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = path.map(str::to_owned);
        let _ = self.events_tx.try_send(EngineEvent::EffectSwitched {
            slot: slot.to_owned(),
        });
        Ok(())
    }

    fn set_render_surface(
        &self,
        _surface: Option<RenderSurface>,
        _width: u32,
        _height: u32,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    fn take_screenshot(&self) -> Result<(), EngineError> {
        let (width, height) = self
            .last_geometry
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .unwrap_or((1, 1));
        let rgba = Bytes::from(vec![0u8; (width as usize) * (height as usize) * 4]);
        let _ = self.events_tx.try_send(EngineEvent::ScreenshotTaken {
            width,
            height,
            rgba,
        });
        Ok(())
    }

    fn shutdown(&self) -> Result<(), EngineError> {
        let _ = self.events_tx.try_send(EngineEvent::ShutdownFinished);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::sync_channel;

    #[test]
    fn noop_engine_announces_initialization() {
        let (tx, rx) = sync_channel(4);
        let _engine = NoopEffectEngine::new(tx);
        assert!(matches!(rx.try_recv(), Ok(EngineEvent::Initialized)));
    }

    #[test]
    fn noop_engine_tracks_active_effect() {
        let (tx, rx) = sync_channel(4);
        let engine = NoopEffectEngine::new(tx);
        let _ = rx.try_recv();

        engine
            .switch_effect("effect", Some("file:///android_asset/Snail.deepar"))
            .unwrap();
        assert_eq!(
            engine.active_effect().as_deref(),
            Some("file:///android_asset/Snail.deepar")
        );
        assert!(matches!(
            rx.try_recv(),
            Ok(EngineEvent::EffectSwitched { slot }) if slot == "effect"
        ));

        engine.switch_effect("effect", None).unwrap();
        assert_eq!(engine.active_effect(), None);
    }

    #[test]
    fn noop_engine_rejects_short_buffers() {
        let (tx, _rx) = sync_channel(4);
        let engine = NoopEffectEngine::new(tx);
        let info = FrameInfo {
            width: 8,
            height: 8,
            rotation: Rotation::Deg0,
            facing: Facing::Front,
            format: PixelFormat::Yuv420_888,
            chroma_pixel_stride: 1,
        };
        let err = engine.receive_frame(&[0u8; 16], &info).unwrap_err();
        assert_eq!(err.kind, EngineErrorKind::Rendering);
        assert_eq!(engine.frames_received(), 0);
    }

    #[test]
    fn screenshot_uses_last_frame_geometry() {
        let (tx, rx) = sync_channel(4);
        let engine = NoopEffectEngine::new(tx);
        let _ = rx.try_recv();

        let info = FrameInfo {
            width: 4,
            height: 2,
            rotation: Rotation::Deg0,
            facing: Facing::Back,
            format: PixelFormat::Yuv420_888,
            chroma_pixel_stride: 1,
        };
        engine.receive_frame(&[0u8; 12], &info).unwrap();
        engine.take_screenshot().unwrap();

        match rx.try_recv() {
            Ok(EngineEvent::ScreenshotTaken {
                width,
                height,
                rgba,
            }) => {
                assert_eq!((width, height), (4, 2));
                assert_eq!(rgba.len(), 4 * 2 * 4);
            },
            other => panic!("expected screenshot event, got {other:?}"),
        }
    }
}
