use crate::{
    CoordMode, GestureClassifier, PixelSampler, PointerSample, RecordedEvent, RecorderError,
    Result, Session, SessionManager,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::{
    broadcast,
    mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender},
    oneshot,
};
use tokio_stream::Stream;
use tracing::{info, warn};

/// How generated subroutines are named
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamingScheme {
    /// Prefix plus the session start timestamp, e.g. `Macro_20250829_101500`
    Timestamp,
    /// Prefix plus a zero-padded counter, e.g. `Macro_001`
    Incremental,
}

/// Configuration for the macro recorder.
///
/// Latched per session at Start; a session is always captured and generated
/// under one consistent coordinate mode and threshold set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Minimum pointer displacement (pixels) for a gesture to be a drag
    pub drag_threshold_px: u32,

    /// Informational only; classification is distance-gated
    pub drag_time_threshold_ms: u64,

    /// Coordinate mode events are captured and replayed in
    pub coord_mode: CoordMode,

    /// Whether to record intermediate pointer movement
    pub record_movement: bool,

    /// Minimum time between recorded movement samples (milliseconds)
    pub move_sample_ms: u64,

    /// Minimum delay emitted between generated statements (milliseconds)
    pub delay_floor_ms: u64,

    /// Value for the generated SetDefaultMouseSpeed statement
    pub replay_speed: u32,

    /// Prefix for generated subroutine names
    pub macro_prefix: String,

    /// How subroutine names are derived
    pub naming: NamingScheme,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            drag_threshold_px: 10,
            drag_time_threshold_ms: 200,
            coord_mode: CoordMode::Screen,
            record_movement: false,
            move_sample_ms: 50,
            delay_floor_ms: 0,
            replay_speed: 0,
            macro_prefix: "Macro".to_string(),
            naming: NamingScheme::Timestamp,
        }
    }
}

/// A message on the capture channel. Stop travels on the same channel as
/// samples, so it is totally ordered after every sample pushed before it.
enum CaptureMessage {
    Sample(PointerSample),
    Stop(oneshot::Sender<Result<Session>>),
}

/// Handle the capture layer uses to push raw pointer samples.
///
/// Cloneable and cheap; pushes never block. Samples pushed after the
/// session has stopped are rejected downstream, never appended.
#[derive(Clone)]
pub struct SampleSink {
    tx: UnboundedSender<CaptureMessage>,
}

impl SampleSink {
    pub fn push(&self, sample: PointerSample) {
        // A closed channel means recording already stopped; the sample is
        // OS input noise at that point.
        let _ = self.tx.send(CaptureMessage::Sample(sample));
    }
}

/// The macro recorder: owns the session manager and drives the
/// classifier from an ordered capture channel.
pub struct MacroRecorder {
    /// The session manager, shared with the processing task
    manager: Arc<Mutex<SessionManager>>,

    /// Sender for live classified events (shell event log)
    event_tx: broadcast::Sender<RecordedEvent>,

    /// The configuration applied to the next session
    config: RecorderConfig,

    /// The pixel sampler used at classification time
    sampler: Arc<dyn PixelSampler>,

    /// Capture channel for the in-flight session, if recording
    capture_tx: Option<UnboundedSender<CaptureMessage>>,
}

impl MacroRecorder {
    /// Create a new macro recorder
    pub fn new(config: RecorderConfig, sampler: Arc<dyn PixelSampler>) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            manager: Arc::new(Mutex::new(SessionManager::new())),
            event_tx,
            config,
            sampler,
            capture_tx: None,
        }
    }

    /// Get a stream of classified events as they are recorded
    pub fn event_stream(&self) -> impl Stream<Item = RecordedEvent> {
        let mut rx = self.event_tx.subscribe();
        Box::pin(async_stream::stream! {
            while let Ok(event) = rx.recv().await {
                yield event;
            }
        })
    }

    /// Start recording; returns the sink the capture layer pushes raw
    /// samples into. Fails with `AlreadyRecording` if a session is open.
    pub fn start(&mut self) -> Result<SampleSink> {
        info!("Starting macro recording");

        self.lock_manager()?.start(self.config.clone())?;

        let (tx, rx) = mpsc::unbounded_channel();
        let classifier = GestureClassifier::new(&self.config, Arc::clone(&self.sampler));
        let manager = Arc::clone(&self.manager);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            Self::process_samples(manager, event_tx, classifier, rx).await;
        });

        self.capture_tx = Some(tx.clone());
        Ok(SampleSink { tx })
    }

    /// Stop recording and return the finalized session.
    ///
    /// The stop marker travels through the capture channel, so every sample
    /// pushed before this call is classified and appended first.
    pub async fn stop(&mut self) -> Result<Session> {
        info!("Stopping macro recording");

        let tx = self.capture_tx.take().ok_or(RecorderError::NotRecording)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(CaptureMessage::Stop(reply_tx))
            .map_err(|_| RecorderError::NotRecording)?;

        reply_rx.await.map_err(|_| RecorderError::NotRecording)?
    }

    pub fn is_recording(&self) -> bool {
        self.capture_tx.is_some()
    }

    /// Update the configuration used for the next session. Has no effect on
    /// a session that is already open.
    pub fn set_config(&mut self, config: RecorderConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    fn lock_manager(&self) -> Result<std::sync::MutexGuard<'_, SessionManager>> {
        self.manager
            .lock()
            .map_err(|e| RecorderError::RecordingError(format!("failed to lock session manager: {e}")))
    }

    /// Process capture messages in channel order until Stop or until the
    /// capture side goes away.
    async fn process_samples(
        manager: Arc<Mutex<SessionManager>>,
        event_tx: broadcast::Sender<RecordedEvent>,
        mut classifier: GestureClassifier,
        mut rx: UnboundedReceiver<CaptureMessage>,
    ) {
        while let Some(message) = rx.recv().await {
            match message {
                CaptureMessage::Sample(sample) => {
                    if let Some(event) = classifier.offer(sample) {
                        // Observers may or may not be listening
                        let _ = event_tx.send(event);
                        Self::append_event(&manager, event);
                    }
                }
                CaptureMessage::Stop(reply) => {
                    let result = manager
                        .lock()
                        .map_err(|e| {
                            RecorderError::RecordingError(format!(
                                "failed to lock session manager: {e}"
                            ))
                        })
                        .and_then(|mut m| m.stop());
                    let _ = reply.send(result);

                    Self::drain_after_stop(&manager, &mut classifier, &mut rx);
                    return;
                }
            }
        }
        // Capture side dropped mid-session; an unterminated gesture is
        // discarded with the classifier, never force-classified.
    }

    /// Reject samples already buffered behind the stop marker. Their events
    /// surface as `NoActiveSession`, they are never silently appended.
    fn drain_after_stop(
        manager: &Arc<Mutex<SessionManager>>,
        classifier: &mut GestureClassifier,
        rx: &mut UnboundedReceiver<CaptureMessage>,
    ) {
        loop {
            match rx.try_recv() {
                Ok(CaptureMessage::Sample(sample)) => {
                    if let Some(event) = classifier.offer(sample) {
                        Self::append_event(manager, event);
                    }
                }
                Ok(CaptureMessage::Stop(reply)) => {
                    let _ = reply.send(Err(RecorderError::NotRecording));
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn append_event(manager: &Arc<Mutex<SessionManager>>, event: RecordedEvent) {
        match manager.lock() {
            Ok(mut m) => {
                if let Err(e) = m.record_event(event) {
                    warn!("rejected event after stop: {}", e);
                }
            }
            Err(e) => warn!("failed to lock session manager: {}", e),
        }
    }
}
