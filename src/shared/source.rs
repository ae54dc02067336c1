// This is free and unencumbered software released into the public domain.

use crate::shared::{Frame, PipelineError};
use std::{
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, SyncSender, TrySendError, sync_channel},
    },
    thread::JoinHandle,
    time::Duration,
};

/// The per-frame analyzer callback. Invoked from the dispatch thread,
/// strictly one frame at a time; the sink owns the frame and is
/// responsible for releasing it.
pub type FrameSink = Arc<dyn Fn(Frame) + Send + Sync + 'static>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraBackend {
    Ffmpeg,
    Synthetic,
}

#[derive(Debug)]
pub enum CameraEvent {
    Started {
        backend: CameraBackend,
    },
    Stopped {
        backend: CameraBackend,
    },
    FrameDropped {
        backend: CameraBackend,
    },
    Warning {
        backend: CameraBackend,
        message: String,
    },
    Error {
        backend: CameraBackend,
        error: PipelineError,
    },
}

pub enum FrameMsg {
    Frame(Frame),
    Stop,
}

/// Owns the dispatch thread between a camera driver and the frame sink.
///
/// Frames queue through a bounded channel sized for the keep-only-latest
/// policy: a frame arriving while the previous one is still in flight is
/// dropped at the sender, not queued.
pub struct Dispatcher {
    tx: SyncSender<FrameMsg>,
    sink: Arc<RwLock<Option<FrameSink>>>,
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn new(
        capacity: usize,
        backend: CameraBackend,
        events_tx: SyncSender<CameraEvent>,
    ) -> Self {
        let (tx, rx) = sync_channel::<FrameMsg>(capacity.max(1));
        let sink: Arc<RwLock<Option<FrameSink>>> = Arc::new(RwLock::new(None));
        let stop = Arc::new(AtomicBool::new(false));

        let sink2 = Arc::clone(&sink);
        let stop2 = Arc::clone(&stop);

        let join = std::thread::spawn(move || {
            let _ = events_tx.try_send(CameraEvent::Started { backend });

            while !stop2.load(Ordering::Relaxed) {
                match rx.recv_timeout(Duration::from_millis(200)) {
                    Ok(FrameMsg::Frame(frame)) => {
                        let sink = sink2.read().ok().and_then(|g| g.clone());
                        match sink {
                            Some(sink) => (sink)(frame),
                            None => frame.release(),
                        }
                    },
                    Ok(FrameMsg::Stop) => break,
                    Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
                    Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }

            let _ = events_tx.try_send(CameraEvent::Stopped { backend });
        });

        Self {
            tx,
            sink,
            stop,
            join: Some(join),
        }
    }

    pub fn sender(&self) -> SyncSender<FrameMsg> {
        self.tx.clone()
    }

    pub fn set_sink(&self, sink: FrameSink) {
        if let Ok(mut g) = self.sink.write() {
            *g = Some(sink);
        }
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.tx.try_send(FrameMsg::Stop);
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

pub trait CameraDriver: Send {
    fn backend(&self) -> CameraBackend;
    fn start(&mut self) -> Result<(), PipelineError>;
    fn stop(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// An opened camera: the platform driver plus the dispatch machinery that
/// carries its frames to the sink.
pub struct CameraSource {
    driver: Box<dyn CameraDriver>,
    dispatcher: Dispatcher,
    events_rx: Receiver<CameraEvent>,
}

impl CameraSource {
    pub(crate) fn new(
        driver: Box<dyn CameraDriver>,
        dispatcher: Dispatcher,
        events_rx: Receiver<CameraEvent>,
    ) -> Self {
        Self {
            driver,
            dispatcher,
            events_rx,
        }
    }

    pub fn backend(&self) -> CameraBackend {
        self.driver.backend()
    }

    pub fn set_sink(&self, sink: FrameSink) {
        self.dispatcher.set_sink(sink);
    }

    pub fn events(&self) -> &Receiver<CameraEvent> {
        &self.events_rx
    }

    pub fn start(&mut self) -> Result<(), PipelineError> {
        self.driver.start()
    }

    pub fn stop(&mut self) -> Result<(), PipelineError> {
        let r = self.driver.stop();
        self.dispatcher.stop();
        r
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

pub fn report_drop(events_tx: &SyncSender<CameraEvent>, backend: CameraBackend) {
    let _ = events_tx.try_send(CameraEvent::FrameDropped { backend });
}

/// Push one frame toward the dispatcher. When the channel is occupied the
/// frame is released and reported dropped (keep-only-latest); a
/// disconnected channel surfaces as a stream-closed error.
pub fn try_send_frame(
    frame_tx: &SyncSender<FrameMsg>,
    events_tx: &SyncSender<CameraEvent>,
    backend: CameraBackend,
    frame: Frame,
) {
    match frame_tx.try_send(FrameMsg::Frame(frame)) {
        Ok(()) => {},
        Err(TrySendError::Full(FrameMsg::Frame(frame))) => {
            frame.release();
            report_drop(events_tx, backend);
        },
        Err(TrySendError::Full(FrameMsg::Stop)) => {},
        Err(TrySendError::Disconnected(_)) => {
            let _ = events_tx.try_send(CameraEvent::Error {
                backend,
                error: PipelineError::Closed,
            });
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::testing::{counted_frame, frame_with_fill};
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn full_channel_drops_and_releases_the_frame() {
        let (frame_tx, _frame_rx) = sync_channel(1);
        let (events_tx, events_rx) = sync_channel(4);
        let releases = Arc::new(AtomicUsize::new(0));

        // First frame occupies the only slot.
        try_send_frame(
            &frame_tx,
            &events_tx,
            CameraBackend::Synthetic,
            counted_frame(4, 4, &releases),
        );
        assert_eq!(releases.load(Ordering::SeqCst), 0);

        // Second frame finds the channel full: released, reported dropped.
        try_send_frame(
            &frame_tx,
            &events_tx,
            CameraBackend::Synthetic,
            counted_frame(4, 4, &releases),
        );
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(matches!(
            events_rx.try_recv(),
            Ok(CameraEvent::FrameDropped { .. })
        ));
    }

    #[test]
    fn disconnected_channel_reports_closed() {
        let (frame_tx, frame_rx) = sync_channel(1);
        drop(frame_rx);
        let (events_tx, events_rx) = sync_channel(4);

        try_send_frame(
            &frame_tx,
            &events_tx,
            CameraBackend::Synthetic,
            frame_with_fill(4, 4, 1, 2, 3),
        );
        assert!(matches!(
            events_rx.try_recv(),
            Ok(CameraEvent::Error {
                error: PipelineError::Closed,
                ..
            })
        ));
    }

    #[test]
    fn dispatcher_delivers_frames_to_the_sink() {
        let (events_tx, events_rx) = sync_channel(4);
        let mut dispatcher = Dispatcher::new(1, CameraBackend::Synthetic, events_tx.clone());

        let delivered = Arc::new(AtomicUsize::new(0));
        let delivered2 = Arc::clone(&delivered);
        dispatcher.set_sink(Arc::new(move |frame: Frame| {
            delivered2.fetch_add(1, Ordering::SeqCst);
            frame.release();
        }));

        let tx = dispatcher.sender();
        try_send_frame(
            &tx,
            &events_tx,
            CameraBackend::Synthetic,
            frame_with_fill(4, 4, 1, 2, 3),
        );

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while delivered.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(delivered.load(Ordering::SeqCst), 1);

        dispatcher.stop();
        let events: Vec<_> = events_rx.try_iter().collect();
        assert!(events.iter().any(|e| matches!(e, CameraEvent::Started { .. })));
        assert!(events.iter().any(|e| matches!(e, CameraEvent::Stopped { .. })));
    }

    #[test]
    fn dispatcher_releases_frames_without_a_sink() {
        let (events_tx, _events_rx) = sync_channel(4);
        let mut dispatcher = Dispatcher::new(1, CameraBackend::Synthetic, events_tx.clone());

        let releases = Arc::new(AtomicUsize::new(0));
        let tx = dispatcher.sender();
        try_send_frame(
            &tx,
            &events_tx,
            CameraBackend::Synthetic,
            counted_frame(4, 4, &releases),
        );

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while releases.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(releases.load(Ordering::SeqCst), 1);

        dispatcher.stop();
    }
}
