// This is free and unencumbered software released into the public domain.

use crate::shared::PipelineError;
use bytes::Bytes;
use derive_more::Display;

/// Pixel layout of a captured frame. The pipeline carries exactly one
/// format: planar YUV 4:2:0 with 8-bit samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Yuv420_888,
}

/// Frame rotation relative to the sensor's natural orientation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display)]
pub enum Rotation {
    #[default]
    #[display("0")]
    Deg0,
    #[display("90")]
    Deg90,
    #[display("180")]
    Deg180,
    #[display("270")]
    Deg270,
}

impl Rotation {
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees {
            0 => Some(Self::Deg0),
            90 => Some(Self::Deg90),
            180 => Some(Self::Deg180),
            270 => Some(Self::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }
}

/// Which lens captured the frame. Front-facing frames are mirrored by the
/// renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display)]
pub enum Facing {
    #[default]
    #[display("front")]
    Front,
    #[display("back")]
    Back,
}

impl Facing {
    pub fn is_front(self) -> bool {
        matches!(self, Self::Front)
    }
}

/// One planar byte region of a frame.
#[derive(Clone, Debug)]
pub struct Plane {
    pub data: Bytes,
    pub row_stride: u32,
    pub pixel_stride: u32,
}

impl Plane {
    pub fn new(data: Bytes, row_stride: u32, pixel_stride: u32) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// One capture instance: geometry metadata plus the Y, U, V planes in
/// capture order.
///
/// A frame must be released exactly once after processing; releasing hands
/// the capture resources back to the camera source. [`Frame::release`]
/// consumes the frame, and dropping an unreleased frame invokes the hook as
/// a backstop, so the hook never runs twice.
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
    pub facing: Facing,
    pub timestamp_ns: u64,
    planes: [Plane; 3],
    release: Option<ReleaseFn>,
}

impl core::fmt::Debug for Frame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("rotation", &self.rotation)
            .field("facing", &self.facing)
            .field("timestamp_ns", &self.timestamp_ns)
            .field("planes", &self.planes)
            .finish()
    }
}

impl Frame {
    /// Build a planar YUV 4:2:0 frame from its three planes in capture
    /// order (Y, U, V).
    pub fn new_yuv420(
        width: u32,
        height: u32,
        rotation: Rotation,
        facing: Facing,
        planes: [Plane; 3],
    ) -> Result<Self, PipelineError> {
        if width == 0 || height == 0 {
            return Err(PipelineError::invalid_frame(format!(
                "zero frame dimensions ({width}x{height})"
            )));
        }
        if planes[0].data.is_empty() {
            return Err(PipelineError::invalid_frame("empty luma plane"));
        }
        Ok(Self {
            width,
            height,
            rotation,
            facing,
            timestamp_ns: 0,
            planes,
            release: None,
        })
    }

    pub fn with_timestamp_ns(mut self, timestamp_ns: u64) -> Self {
        self.timestamp_ns = timestamp_ns;
        self
    }

    /// Attach the hand-back hook invoked when the frame is released.
    pub fn with_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(release));
        self
    }

    pub fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Yuv420_888
    }

    pub fn planes(&self) -> &[Plane; 3] {
        &self.planes
    }

    pub fn y(&self) -> &Plane {
        &self.planes[0]
    }

    pub fn u(&self) -> &Plane {
        &self.planes[1]
    }

    pub fn v(&self) -> &Plane {
        &self.planes[2]
    }

    /// Combined size of the three plane payloads in bytes.
    pub fn total_plane_size(&self) -> usize {
        self.planes.iter().map(Plane::size).sum()
    }

    /// Chroma pixel stride, taken from the first chroma plane.
    pub fn chroma_pixel_stride(&self) -> u32 {
        self.planes[1].pixel_stride
    }

    /// Release the frame, handing its resources back to the source.
    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    fn plane(len: usize) -> Plane {
        Plane::new(Bytes::from(vec![0u8; len]), 4, 1)
    }

    #[test]
    fn rotation_parses_only_quarter_turns() {
        assert_eq!(Rotation::from_degrees(0), Some(Rotation::Deg0));
        assert_eq!(Rotation::from_degrees(90), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(180), Some(Rotation::Deg180));
        assert_eq!(Rotation::from_degrees(270), Some(Rotation::Deg270));
        assert_eq!(Rotation::from_degrees(45), None);
        assert_eq!(Rotation::Deg270.degrees(), 270);
    }

    #[test]
    fn rejects_zero_dimensions() {
        let err = Frame::new_yuv420(0, 4, Rotation::Deg0, Facing::Front, [
            plane(16),
            plane(4),
            plane(4),
        ])
        .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidFrame(_)));
    }

    #[test]
    fn rejects_empty_luma_plane() {
        let err = Frame::new_yuv420(4, 4, Rotation::Deg0, Facing::Front, [
            plane(0),
            plane(4),
            plane(4),
        ])
        .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidFrame(_)));
    }

    #[test]
    fn release_hook_runs_exactly_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        let frame = Frame::new_yuv420(4, 4, Rotation::Deg0, Facing::Front, [
            plane(16),
            plane(4),
            plane(4),
        ])
        .unwrap()
        .with_release(move || {
            count2.fetch_add(1, Ordering::SeqCst);
        });

        frame.release();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_invokes_release_hook_as_backstop() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        {
            let _frame = Frame::new_yuv420(4, 4, Rotation::Deg0, Facing::Front, [
                plane(16),
                plane(4),
                plane(4),
            ])
            .unwrap()
            .with_release(move || {
                count2.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn chroma_pixel_stride_comes_from_second_plane() {
        let frame = Frame::new_yuv420(4, 4, Rotation::Deg0, Facing::Front, [
            Plane::new(Bytes::from(vec![0u8; 16]), 4, 1),
            Plane::new(Bytes::from(vec![0u8; 4]), 4, 2),
            Plane::new(Bytes::from(vec![0u8; 4]), 4, 1),
        ])
        .unwrap();
        assert_eq!(frame.chroma_pixel_stride(), 2);
        assert_eq!(frame.total_plane_size(), 24);
    }
}
