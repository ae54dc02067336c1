// This is free and unencumbered software released into the public domain.

use crate::shared::{
    CameraBackend, CameraDriver, CameraEvent, Frame, FrameMsg, PipelineConfig, PipelineError,
    Plane, Rotation, try_send_frame,
};
use bytes::Bytes;
use std::{
    env,
    io::Read,
    process::{Child, Command, Stdio},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::SyncSender,
    },
    thread::JoinHandle,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Camera driver that spawns `ffmpeg` against the platform capture API and
/// reads raw planar `yuv420p` frames from its stdout.
pub struct FfmpegCameraDriver {
    config: PipelineConfig,
    child: Option<Child>,
    stop: Arc<AtomicBool>,
    reader_join: Option<JoinHandle<()>>,
    frame_tx: SyncSender<FrameMsg>,
    events_tx: SyncSender<CameraEvent>,
}

impl core::fmt::Debug for FfmpegCameraDriver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FfmpegCameraDriver")
            .field("config", &self.config)
            .field("child", &self.child.as_ref().map(|_| "<child>"))
            .finish()
    }
}

impl FfmpegCameraDriver {
    pub fn open(
        _input_url: impl AsRef<str>,
        config: PipelineConfig,
        frame_tx: SyncSender<FrameMsg>,
        events_tx: SyncSender<CameraEvent>,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            config,
            child: None,
            stop: Arc::new(AtomicBool::new(false)),
            reader_join: None,
            frame_tx,
            events_tx,
        })
    }

    #[inline]
    fn now_ns_best_effort() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }

    fn spawn(&self) -> Result<Child, PipelineError> {
        spawn_reader(&self.config)
    }

    fn stop_child(&mut self) {
        if let Some(mut child) = self.child.take() {
            #[cfg(unix)]
            {
                unsafe {
                    let _ = libc::kill(child.id() as i32, libc::SIGTERM);
                }
                let start = std::time::Instant::now();
                while start.elapsed() < Duration::from_millis(900) {
                    if let Ok(Some(_)) = child.try_wait() {
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(20));
                }
                let _ = child.kill();
                let _ = child.wait();
            }
            #[cfg(not(unix))]
            {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}

impl CameraDriver for FfmpegCameraDriver {
    fn backend(&self) -> CameraBackend {
        CameraBackend::Ffmpeg
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        if self.child.is_some() {
            return Ok(());
        }

        self.stop.store(false, Ordering::Relaxed);

        let mut child = self.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PipelineError::other("ffmpeg stdout not piped"))?;

        let width = self.config.width;
        let height = self.config.height;
        let facing = self.config.facing;
        let chroma_width = width.div_ceil(2);
        let chroma_height = height.div_ceil(2);
        let luma_size = (width as usize) * (height as usize);
        let chroma_size = (chroma_width as usize) * (chroma_height as usize);
        let frame_size = luma_size + 2 * chroma_size;

        let stop = Arc::clone(&self.stop);
        let frame_tx = self.frame_tx.clone();
        let events_tx = self.events_tx.clone();

        let join = std::thread::spawn(move || {
            let mut reader = std::io::BufReader::new(stdout);

            while !stop.load(Ordering::Relaxed) {
                let mut buf = vec![0u8; frame_size];
                match reader.read_exact(&mut buf) {
                    Ok(()) => {
                        let data = Bytes::from(buf);
                        // yuv420p plane order on the wire is Y, U, V.
                        let planes = [
                            Plane::new(data.slice(..luma_size), width, 1),
                            Plane::new(
                                data.slice(luma_size..luma_size + chroma_size),
                                chroma_width,
                                1,
                            ),
                            Plane::new(data.slice(luma_size + chroma_size..), chroma_width, 1),
                        ];
                        let frame =
                            match Frame::new_yuv420(width, height, Rotation::Deg0, facing, planes)
                            {
                                Ok(frame) => frame
                                    .with_timestamp_ns(FfmpegCameraDriver::now_ns_best_effort()),
                                Err(error) => {
                                    let _ = events_tx.try_send(CameraEvent::Error {
                                        backend: CameraBackend::Ffmpeg,
                                        error,
                                    });
                                    break;
                                },
                            };
                        try_send_frame(&frame_tx, &events_tx, CameraBackend::Ffmpeg, frame);
                    },
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                    Err(e) => {
                        let _ = events_tx.try_send(CameraEvent::Error {
                            backend: CameraBackend::Ffmpeg,
                            error: PipelineError::driver("ffmpeg read", e),
                        });
                        break;
                    },
                }
            }
        });

        self.reader_join = Some(join);
        self.child = Some(child);

        Ok(())
    }

    fn stop(&mut self) -> Result<(), PipelineError> {
        self.stop.store(true, Ordering::Relaxed);
        self.stop_child();
        if let Some(j) = self.reader_join.take() {
            let _ = j.join();
        }
        let _ = self.frame_tx.try_send(FrameMsg::Stop);
        Ok(())
    }
}

impl Drop for FfmpegCameraDriver {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn spawn_reader(config: &PipelineConfig) -> Result<Child, PipelineError> {
    let device = config.device.as_deref().unwrap_or("").trim();
    let input_device = get_input_device(device);

    const INPUT_FRAMERATE: u32 = 30;

    let mut ffargs: Vec<String> = vec![
        "-hide_banner".into(),
        "-nostdin".into(),
        "-nostats".into(),
        "-f".into(),
        ffmpeg_format().into(),
        "-loglevel".into(),
        "error".into(),
        "-video_size".into(),
        format!("{}x{}", config.width, config.height),
        "-framerate".into(),
        INPUT_FRAMERATE.to_string(),
    ];

    ffargs.extend([
        "-i".into(),
        input_device,
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-f".into(),
        "rawvideo".into(),
        "pipe:1".into(),
    ]);

    let stderr = if config.diagnostics || env::var_os("AR_CAMERA_FFMPEG_STDERR").is_some() {
        Stdio::inherit()
    } else {
        Stdio::null()
    };

    Command::new("ffmpeg")
        .args(&ffargs)
        .stdout(Stdio::piped())
        .stderr(stderr)
        .spawn()
        .map_err(|e| PipelineError::driver("spawning ffmpeg", e))
}

#[cfg(target_os = "macos")]
fn ffmpeg_format() -> &'static str {
    "avfoundation"
}

#[cfg(target_os = "linux")]
fn ffmpeg_format() -> &'static str {
    "v4l2"
}

#[cfg(target_os = "windows")]
fn ffmpeg_format() -> &'static str {
    "dshow"
}

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
fn ffmpeg_format() -> &'static str {
    "lavfi"
}

#[cfg(target_os = "macos")]
fn get_input_device(device: &str) -> String {
    device.strip_prefix("avf:").unwrap_or(device).to_string()
}

#[cfg(target_os = "linux")]
fn get_input_device(device: &str) -> String {
    let d = device.strip_prefix("file:").unwrap_or(device);
    if d.chars().all(|c| c.is_ascii_digit()) {
        format!("/dev/video{d}")
    } else {
        d.to_string()
    }
}

#[cfg(target_os = "windows")]
fn get_input_device(device: &str) -> String {
    device.strip_prefix("dshow:").unwrap_or(device).to_string()
}

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
fn get_input_device(device: &str) -> String {
    device.to_string()
}
