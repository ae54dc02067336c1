// This is free and unencumbered software released into the public domain.

//! Test doubles shared by the unit and integration tests: deterministic
//! frames with release accounting, plus recording and fault-injecting
//! effect engines.

use crate::shared::{
    EffectEngine, EngineError, Facing, Frame, FrameInfo, Plane, RenderSurface, Rotation,
};
use bytes::Bytes;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

/// A planar YUV 4:2:0 frame with each plane filled by a constant byte, so
/// repack output can be checked plane by plane.
pub fn frame_with_fill(width: u32, height: u32, y_fill: u8, u_fill: u8, v_fill: u8) -> Frame {
    let chroma_width = width.div_ceil(2);
    let chroma_height = height.div_ceil(2);
    let luma_size = (width as usize) * (height as usize);
    let chroma_size = (chroma_width as usize) * (chroma_height as usize);

    let planes = [
        Plane::new(Bytes::from(vec![y_fill; luma_size]), width, 1),
        Plane::new(Bytes::from(vec![u_fill; chroma_size]), chroma_width, 1),
        Plane::new(Bytes::from(vec![v_fill; chroma_size]), chroma_width, 1),
    ];
    match Frame::new_yuv420(width, height, Rotation::Deg0, Facing::Front, planes) {
        Ok(frame) => frame,
        Err(err) => panic!("test frame construction failed: {err}"),
    }
}

/// A test frame whose release hook increments `releases`.
pub fn counted_frame(width: u32, height: u32, releases: &Arc<AtomicUsize>) -> Frame {
    let releases = Arc::clone(releases);
    frame_with_fill(width, height, 0x10, 0x20, 0x30).with_release(move || {
        releases.fetch_add(1, Ordering::SeqCst);
    })
}

/// One frame as the engine saw it.
#[derive(Clone, Debug)]
pub struct ReceivedFrame {
    pub data: Vec<u8>,
    pub info: FrameInfo,
}

/// An engine that records every call it receives.
#[derive(Default)]
pub struct RecordingEngine {
    received: Mutex<Vec<ReceivedFrame>>,
    switches: Mutex<Vec<(String, Option<String>)>>,
    surfaces: Mutex<Vec<(Option<RenderSurface>, u32, u32)>>,
    shutdowns: AtomicUsize,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<ReceivedFrame> {
        self.received.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn switches(&self) -> Vec<(String, Option<String>)> {
        self.switches.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn surfaces(&self) -> Vec<(Option<RenderSurface>, u32, u32)> {
        self.surfaces.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl EffectEngine for RecordingEngine {
    fn receive_frame(&self, packed: &[u8], info: &FrameInfo) -> Result<(), EngineError> {
        self.received
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(ReceivedFrame {
                data: packed.to_vec(),
                info: *info,
            });
        Ok(())
    }

    fn switch_effect(&self, slot: &str, path: Option<&str>) -> Result<(), EngineError> {
        self.switches
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((slot.to_owned(), path.map(str::to_owned)));
        Ok(())
    }

    fn set_render_surface(
        &self,
        surface: Option<RenderSurface>,
        width: u32,
        height: u32,
    ) -> Result<(), EngineError> {
        self.surfaces
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((surface, width, height));
        Ok(())
    }

    fn shutdown(&self) -> Result<(), EngineError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// An engine that sees every frame but rejects it, for exercising the
/// failure paths of the per-frame callback.
#[derive(Default)]
pub struct FaultyEngine {
    frames_seen: AtomicUsize,
}

impl FaultyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_seen(&self) -> usize {
        self.frames_seen.load(Ordering::SeqCst)
    }
}

impl EffectEngine for FaultyEngine {
    fn receive_frame(&self, _packed: &[u8], _info: &FrameInfo) -> Result<(), EngineError> {
        self.frames_seen.fetch_add(1, Ordering::SeqCst);
        Err(EngineError::rendering("injected render failure"))
    }

    fn switch_effect(&self, _slot: &str, _path: Option<&str>) -> Result<(), EngineError> {
        Err(EngineError::effect("injected effect failure"))
    }

    fn set_render_surface(
        &self,
        _surface: Option<RenderSurface>,
        _width: u32,
        _height: u32,
    ) -> Result<(), EngineError> {
        Ok(())
    }
}
