// This is free and unencumbered software released into the public domain.

use crate::shared::{
    CameraSource, EffectDescriptor, EffectEngine, EffectRoster, EngineEvent, Frame, FrameRepacker,
    FrameSink, PipelineConfig, PipelineError, RenderSurface,
};
use scopeguard::guard;
use std::{
    sync::{Arc, Mutex, mpsc::Receiver},
    time::Duration,
};

/// One pipeline lifetime: the engine handle, the repack state, and the
/// effect selection, owned together and torn down together.
///
/// The per-frame path (camera dispatch thread) and the effect-switch path
/// (app thread) take separate locks; the switch path never touches
/// per-frame state.
pub struct ArSession<E: EffectEngine> {
    engine: Arc<E>,
    pipeline: Arc<Mutex<FrameRepacker>>,
    roster: Arc<Mutex<EffectRoster>>,
    engine_events: Receiver<EngineEvent>,
    effect_slot: String,
    asset_root: String,
}

impl<E: EffectEngine + 'static> ArSession<E> {
    pub fn new(
        engine: Arc<E>,
        engine_events: Receiver<EngineEvent>,
        config: &PipelineConfig,
        roster: EffectRoster,
    ) -> Self {
        Self {
            engine,
            pipeline: Arc::new(Mutex::new(FrameRepacker::new(config.buffer_frames))),
            roster: Arc::new(Mutex::new(roster)),
            engine_events,
            effect_slot: config.effect_slot.clone(),
            asset_root: config.asset_root.clone(),
        }
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Register this session's frame sink on an opened camera.
    pub fn attach(&self, source: &CameraSource) {
        source.set_sink(self.frame_sink());
    }

    /// The per-frame callback: repack, dispatch to the engine, advance the
    /// pool, release the frame. Release happens on every exit path,
    /// including repack and engine failures.
    pub fn frame_sink(&self) -> FrameSink {
        let engine = Arc::clone(&self.engine);
        let pipeline = Arc::clone(&self.pipeline);
        Arc::new(move |frame: Frame| {
            let frame = guard(frame, Frame::release);
            let mut repacker = pipeline.lock().unwrap_or_else(|p| p.into_inner());
            if let Err(_err) = dispatch_frame(&mut repacker, engine.as_ref(), &frame) {
                #[cfg(feature = "tracing")]
                asimov_module::tracing::warn!(
                    target: "ar_camera_pipeline",
                    error = %_err,
                    "frame dispatch failed"
                );
            }
        })
    }

    /// Rotate to the next effect and switch the engine to it. No rollback
    /// on engine failure; selection stays advanced and the error is
    /// returned.
    pub fn advance_effect(&self) -> Result<EffectDescriptor, PipelineError> {
        let (descriptor, path) = {
            let mut roster = self.roster.lock().unwrap_or_else(|p| p.into_inner());
            let descriptor = roster.advance().clone();
            let path = descriptor.resolve_path(&self.asset_root);
            (descriptor, path)
        };

        #[cfg(feature = "tracing")]
        asimov_module::tracing::info!(
            target: "ar_camera_pipeline",
            effect = descriptor.name(),
            "switching effect"
        );

        self.engine
            .switch_effect(&self.effect_slot, path.as_deref())?;
        Ok(descriptor)
    }

    /// Re-issue the current selection to the engine. Engines forget their
    /// active effect across teardown/init, so this runs after every
    /// [`EngineEvent::Initialized`].
    pub fn restore_effect(&self) -> Result<(), PipelineError> {
        let path = {
            let roster = self.roster.lock().unwrap_or_else(|p| p.into_inner());
            roster.current().resolve_path(&self.asset_root)
        };
        self.engine
            .switch_effect(&self.effect_slot, path.as_deref())?;
        Ok(())
    }

    pub fn current_effect(&self) -> EffectDescriptor {
        self.roster
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .current()
            .clone()
    }

    /// Forward a render-surface notification verbatim. `None` with zero
    /// dimensions signals teardown.
    pub fn set_render_surface(
        &self,
        surface: Option<RenderSurface>,
        width: u32,
        height: u32,
    ) -> Result<(), PipelineError> {
        self.engine.set_render_surface(surface, width, height)?;
        Ok(())
    }

    pub fn take_screenshot(&self) -> Result<(), PipelineError> {
        self.engine.take_screenshot()?;
        Ok(())
    }

    pub fn shutdown(&self) -> Result<(), PipelineError> {
        self.engine.shutdown()?;
        Ok(())
    }

    /// The supervising loop: wait up to `timeout` for one engine event,
    /// apply session-level reactions (effect restore after re-init, error
    /// logging), then hand the event to the caller.
    pub fn poll_event(&self, timeout: Duration) -> Option<EngineEvent> {
        let event = self.engine_events.recv_timeout(timeout).ok()?;
        self.react(&event);
        Some(event)
    }

    fn react(&self, event: &EngineEvent) {
        match event {
            EngineEvent::Initialized => {
                if let Err(_err) = self.restore_effect() {
                    #[cfg(feature = "tracing")]
                    asimov_module::tracing::warn!(
                        target: "ar_camera_pipeline",
                        error = %_err,
                        "failed to restore effect after engine init"
                    );
                }
            },
            EngineEvent::Error {
                kind: _kind,
                message: _message,
            } => {
                #[cfg(feature = "tracing")]
                asimov_module::tracing::warn!(
                    target: "ar_camera_pipeline",
                    kind = %_kind,
                    message = %_message,
                    "effect engine reported an error"
                );
            },
            _ => {},
        }
    }
}

fn dispatch_frame(
    repacker: &mut FrameRepacker,
    engine: &dyn EffectEngine,
    frame: &Frame,
) -> Result<(), PipelineError> {
    let repacked = repacker.repack(frame)?;
    let result = engine.receive_frame(repacked.data, &repacked.info);
    // The pool rotates after the hand-off regardless of the engine verdict.
    repacker.advance_after_dispatch();
    result?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::testing::{FaultyEngine, RecordingEngine, counted_frame, frame_with_fill};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc::sync_channel,
    };

    fn session_with_recording_engine() -> (ArSession<RecordingEngine>, Arc<RecordingEngine>) {
        let (_tx, rx) = sync_channel(8);
        let engine = Arc::new(RecordingEngine::new());
        let config = PipelineConfig::default();
        let session = ArSession::new(Arc::clone(&engine), rx, &config, EffectRoster::default());
        (session, engine)
    }

    #[test]
    fn sink_repacks_dispatches_and_releases_once() {
        let (session, engine) = session_with_recording_engine();
        let sink = session.frame_sink();

        let releases = Arc::new(AtomicUsize::new(0));
        sink(counted_frame(4, 4, &releases));

        assert_eq!(releases.load(Ordering::SeqCst), 1);
        let received = engine.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].info.width, 4);
        assert_eq!(received[0].data.len(), 4 * 4 + 2 * (2 * 2));
    }

    #[test]
    fn sink_releases_exactly_once_when_the_engine_fails() {
        let (_tx, rx) = sync_channel(8);
        let engine = Arc::new(FaultyEngine::new());
        let config = PipelineConfig::default();
        let session = ArSession::new(Arc::clone(&engine), rx, &config, EffectRoster::default());
        let sink = session.frame_sink();

        let releases = Arc::new(AtomicUsize::new(0));
        sink(counted_frame(4, 4, &releases));
        assert_eq!(releases.load(Ordering::SeqCst), 1);

        // The engine saw the frame even though it rejected it.
        assert_eq!(engine.frames_seen(), 1);
    }

    #[test]
    fn repacked_content_reaches_the_engine_chroma_swapped() {
        let (session, engine) = session_with_recording_engine();
        let sink = session.frame_sink();

        let frame = frame_with_fill(4, 4, 0xaa, 0xbb, 0xcc);
        let y_size = frame.y().size();
        let v_size = frame.v().size();
        sink(frame);

        let received = engine.received();
        let data = &received[0].data;
        assert!(data[..y_size].iter().all(|&b| b == 0xaa));
        assert!(data[y_size..y_size + v_size].iter().all(|&b| b == 0xcc));
        assert!(data[y_size + v_size..].iter().all(|&b| b == 0xbb));
    }

    #[test]
    fn advance_effect_cycles_and_switches_the_engine() {
        let (session, engine) = session_with_recording_engine();

        let first = session.advance_effect().unwrap();
        assert_eq!(first.name(), "viking_helmet.deepar");

        let switches = engine.switches();
        assert_eq!(switches.len(), 1);
        assert_eq!(switches[0].0, "effect");
        assert_eq!(
            switches[0].1.as_deref(),
            Some("file:///android_asset/viking_helmet.deepar")
        );

        // A full cycle lands back on the sentinel and clears the slot.
        let len = EffectRoster::default().len();
        for _ in 1..len {
            session.advance_effect().unwrap();
        }
        assert!(session.current_effect().is_no_effect());
        assert_eq!(engine.switches().last().unwrap().1, None);
    }

    #[test]
    fn initialized_event_restores_the_current_effect() {
        let (tx, rx) = sync_channel(8);
        let engine = Arc::new(RecordingEngine::new());
        let config = PipelineConfig::default();
        let session = ArSession::new(Arc::clone(&engine), rx, &config, EffectRoster::default());

        session.advance_effect().unwrap();
        let selected = session.current_effect();

        // Engine re-initializes; its effect state is gone.
        tx.send(EngineEvent::Initialized).unwrap();
        let event = session.poll_event(Duration::from_millis(100)).unwrap();
        assert!(matches!(event, EngineEvent::Initialized));

        let switches = engine.switches();
        assert_eq!(switches.len(), 2);
        assert_eq!(
            switches[1].1,
            selected.resolve_path("file:///android_asset")
        );
    }

    #[test]
    fn surface_notifications_forward_verbatim() {
        let (session, engine) = session_with_recording_engine();

        session
            .set_render_surface(Some(RenderSurface::new(7)), 1280, 720)
            .unwrap();
        session.set_render_surface(None, 0, 0).unwrap();

        let surfaces = engine.surfaces();
        assert_eq!(surfaces, vec![
            (Some(RenderSurface::new(7)), 1280, 720),
            (None, 0, 0),
        ]);
    }

    #[test]
    fn poll_event_times_out_quietly() {
        let (session, _engine) = session_with_recording_engine();
        assert!(session.poll_event(Duration::from_millis(10)).is_none());
    }
}
