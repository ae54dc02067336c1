// This is free and unencumbered software released into the public domain.

use crate::shared::{
    CameraBackend, CameraDriver, CameraEvent, Facing, Frame, FrameMsg, PipelineConfig,
    PipelineError, Plane, Rotation, try_send_frame,
};
use bytes::Bytes;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::SyncSender,
    },
    thread::JoinHandle,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// In-process frame generator: a moving gradient at the configured
/// geometry and rate. Stands in for camera hardware in demos and tests.
pub struct SyntheticCameraDriver {
    config: PipelineConfig,
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
    frame_tx: SyncSender<FrameMsg>,
    events_tx: SyncSender<CameraEvent>,
}

impl SyntheticCameraDriver {
    pub fn open(
        config: PipelineConfig,
        frame_tx: SyncSender<FrameMsg>,
        events_tx: SyncSender<CameraEvent>,
    ) -> Result<Self, PipelineError> {
        if config.width == 0 || config.height == 0 {
            return Err(PipelineError::invalid_config(format!(
                "synthetic source needs non-zero dimensions, got {}x{}",
                config.width, config.height
            )));
        }
        Ok(Self {
            config,
            stop: Arc::new(AtomicBool::new(false)),
            join: None,
            frame_tx,
            events_tx,
        })
    }
}

impl CameraDriver for SyntheticCameraDriver {
    fn backend(&self) -> CameraBackend {
        CameraBackend::Synthetic
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        if self.join.is_some() {
            return Ok(());
        }

        self.stop.store(false, Ordering::Relaxed);

        let width = self.config.width;
        let height = self.config.height;
        let facing = self.config.facing;
        let interval = Duration::from_secs_f64(1.0 / self.config.fps.max(1.0));

        let stop = Arc::clone(&self.stop);
        let frame_tx = self.frame_tx.clone();
        let events_tx = self.events_tx.clone();

        let join = std::thread::spawn(move || {
            let mut tick: u64 = 0;
            while !stop.load(Ordering::Relaxed) {
                let frame = match generate_frame(width, height, facing, tick) {
                    Ok(frame) => frame,
                    Err(error) => {
                        let _ = events_tx.try_send(CameraEvent::Error {
                            backend: CameraBackend::Synthetic,
                            error,
                        });
                        break;
                    },
                };
                try_send_frame(&frame_tx, &events_tx, CameraBackend::Synthetic, frame);
                tick = tick.wrapping_add(1);
                std::thread::sleep(interval);
            }
        });

        self.join = Some(join);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PipelineError> {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
        let _ = self.frame_tx.try_send(FrameMsg::Stop);
        Ok(())
    }
}

impl Drop for SyntheticCameraDriver {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn generate_frame(
    width: u32,
    height: u32,
    facing: Facing,
    tick: u64,
) -> Result<Frame, PipelineError> {
    let chroma_width = width.div_ceil(2);
    let chroma_height = height.div_ceil(2);
    let luma_size = (width as usize) * (height as usize);
    let chroma_size = (chroma_width as usize) * (chroma_height as usize);

    let phase = (tick & 0xff) as u8;
    let mut data = vec![0u8; luma_size + 2 * chroma_size];
    for row in 0..height as usize {
        for col in 0..width as usize {
            data[row * width as usize + col] =
                ((row + col) as u8).wrapping_add(phase);
        }
    }
    data[luma_size..luma_size + chroma_size].fill(phase.wrapping_add(64));
    data[luma_size + chroma_size..].fill(phase.wrapping_add(192));

    let data = Bytes::from(data);
    let planes = [
        Plane::new(data.slice(..luma_size), width, 1),
        Plane::new(data.slice(luma_size..luma_size + chroma_size), chroma_width, 1),
        Plane::new(data.slice(luma_size + chroma_size..), chroma_width, 1),
    ];

    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    Ok(Frame::new_yuv420(width, height, Rotation::Deg0, facing, planes)?.with_timestamp_ns(ts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_frames_have_consistent_planes() {
        let frame = generate_frame(8, 6, Facing::Front, 3).unwrap();
        assert_eq!(frame.y().size(), 8 * 6);
        assert_eq!(frame.u().size(), 4 * 3);
        assert_eq!(frame.v().size(), 4 * 3);
        assert_eq!(frame.total_plane_size(), 48 + 12 + 12);
        assert_eq!(frame.chroma_pixel_stride(), 1);
        frame.release();
    }

    #[test]
    fn rejects_zero_geometry() {
        let (frame_tx, _rx) = std::sync::mpsc::sync_channel(1);
        let (events_tx, _erx) = std::sync::mpsc::sync_channel(1);
        let config = PipelineConfig::new(0, 480, 30.0);
        assert!(matches!(
            SyntheticCameraDriver::open(config, frame_tx, events_tx),
            Err(PipelineError::InvalidConfig(_))
        ));
    }
}
