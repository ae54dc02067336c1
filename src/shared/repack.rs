// This is free and unencumbered software released into the public domain.

use crate::shared::{BufferPool, Frame, FrameInfo, PipelineError};

/// A repacked frame ready for engine dispatch: the pooled buffer content
/// plus the metadata describing it.
#[derive(Debug)]
pub struct RepackedFrame<'a> {
    pub data: &'a [u8],
    pub info: FrameInfo,
}

/// Copies one frame's planes into the next pooled buffer in the layout the
/// effect engine expects: `[Y][V][U]`, with the chroma planes swapped
/// relative to capture order.
///
/// The pool is sized from the first observed frame. If a later frame's
/// combined plane size differs (a resolution change), the pool is
/// reallocated and its epoch bumped rather than leaving the mismatch
/// undefined.
#[derive(Debug)]
pub struct FrameRepacker {
    buffer_count: usize,
    pool: Option<BufferPool>,
}

impl FrameRepacker {
    pub fn new(buffer_count: usize) -> Self {
        Self {
            buffer_count: buffer_count.max(1),
            pool: None,
        }
    }

    /// The pool, once the first frame has sized it.
    pub fn pool(&self) -> Option<&BufferPool> {
        self.pool.as_ref()
    }

    /// Repack `frame` into the pool's current buffer and return the filled
    /// content with its dispatch metadata. Does not advance the pool and
    /// does not release the frame; the caller advances after handing the
    /// buffer downstream.
    pub fn repack(&mut self, frame: &Frame) -> Result<RepackedFrame<'_>, PipelineError> {
        let y_size = frame.y().size();
        let v_size = frame.v().size();
        let u_size = frame.u().size();
        let total = frame.total_plane_size();
        if total == 0 {
            return Err(PipelineError::invalid_frame("frame has no plane data"));
        }

        match self.pool.as_mut() {
            Some(pool) if pool.capacity() != total => {
                #[cfg(feature = "tracing")]
                asimov_module::tracing::warn!(
                    target: "ar_camera_pipeline",
                    old = pool.capacity(),
                    new = total,
                    epoch = pool.epoch() + 1,
                    "frame geometry changed, reallocating buffer pool"
                );
                pool.resize(total);
            },
            Some(_) => {},
            None => {
                self.pool = Some(BufferPool::new(self.buffer_count, total));
            },
        }
        let Some(pool) = self.pool.as_mut() else {
            return Err(PipelineError::other("buffer pool unavailable"));
        };

        let out = pool.current_mut().as_mut_slice();
        // Chroma swap: the engine wants Y, then V, then U.
        out[..y_size].copy_from_slice(&frame.y().data);
        out[y_size..y_size + v_size].copy_from_slice(&frame.v().data);
        out[y_size + v_size..y_size + v_size + u_size].copy_from_slice(&frame.u().data);

        Ok(RepackedFrame {
            data: pool.current().as_slice(),
            info: FrameInfo::of(frame),
        })
    }

    /// Rotate to the next pooled buffer. Called once per frame, after the
    /// filled buffer has been handed to the engine.
    pub fn advance_after_dispatch(&mut self) {
        if let Some(pool) = self.pool.as_mut() {
            pool.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::testing::frame_with_fill;

    #[test]
    fn repacked_content_is_y_then_v_then_u() {
        let mut repacker = FrameRepacker::new(2);
        let frame = frame_with_fill(4, 4, 0x11, 0x22, 0x33);
        let y_size = frame.y().size();
        let u_size = frame.u().size();
        let v_size = frame.v().size();

        let repacked = repacker.repack(&frame).unwrap();
        assert_eq!(repacked.data.len(), y_size + u_size + v_size);
        assert!(repacked.data[..y_size].iter().all(|&b| b == 0x11));
        assert!(repacked.data[y_size..y_size + v_size].iter().all(|&b| b == 0x33));
        assert!(repacked.data[y_size + v_size..].iter().all(|&b| b == 0x22));
        frame.release();
    }

    #[test]
    fn first_frame_sizes_the_pool() {
        let mut repacker = FrameRepacker::new(2);
        assert!(repacker.pool().is_none());

        let frame = frame_with_fill(4, 4, 1, 2, 3);
        let total = frame.total_plane_size();
        let _ = repacker.repack(&frame).unwrap();
        frame.release();

        let pool = repacker.pool().unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.capacity(), total);
        assert_eq!(pool.epoch(), 0);
    }

    #[test]
    fn pool_index_cycles_across_dispatches() {
        let mut repacker = FrameRepacker::new(2);
        let mut indices = Vec::new();
        for _ in 0..4 {
            let frame = frame_with_fill(4, 4, 1, 2, 3);
            let _ = repacker.repack(&frame).unwrap();
            indices.push(repacker.pool().unwrap().index());
            repacker.advance_after_dispatch();
            frame.release();
        }
        assert_eq!(indices, [0, 1, 0, 1]);
    }

    #[test]
    fn metadata_describes_the_source_frame() {
        let mut repacker = FrameRepacker::new(2);
        let frame = frame_with_fill(6, 4, 1, 2, 3);
        let repacked = repacker.repack(&frame).unwrap();
        assert_eq!(repacked.info.width, 6);
        assert_eq!(repacked.info.height, 4);
        assert_eq!(repacked.info.chroma_pixel_stride, 1);
        frame.release();
    }

    #[test]
    fn geometry_change_reallocates_instead_of_corrupting() {
        let mut repacker = FrameRepacker::new(2);

        let frame = frame_with_fill(4, 4, 1, 2, 3);
        let small = frame.total_plane_size();
        let _ = repacker.repack(&frame).unwrap();
        repacker.advance_after_dispatch();
        frame.release();

        let frame = frame_with_fill(8, 8, 4, 5, 6);
        let large = frame.total_plane_size();
        assert_ne!(small, large);
        let repacked = repacker.repack(&frame).unwrap();
        assert_eq!(repacked.data.len(), large);
        frame.release();

        let pool = repacker.pool().unwrap();
        assert_eq!(pool.epoch(), 1);
        assert_eq!(pool.capacity(), large);
    }
}
