// src/session.rs - Start/stop lifecycle around the pipeline, off the capture thread
use crate::classifier::Classifier;
use crate::config::PipelineConfig;
use crate::diagnostics::DiagnosticsRecorder;
use crate::landmarks::LandmarkSource;
use crate::pipeline::{PipelineSnapshot, RecognitionPipeline};
use crate::stabilizer::StableRecognition;
use image::DynamicImage;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("recognition session must be created inside a tokio runtime")]
    NoRuntime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSubmission {
    Accepted,
    /// A previous frame is still being processed; this one is discarded.
    Dropped,
    Stopped,
}

struct Worker<S, C> {
    source: S,
    pipeline: RecognitionPipeline<C>,
    diagnostics: Option<DiagnosticsRecorder>,
}

struct Shared<S, C> {
    worker: Mutex<Worker<S, C>>,
    running: AtomicBool,
    generation: AtomicU64,
    events: Mutex<Option<mpsc::UnboundedSender<StableRecognition>>>,
    snapshots: watch::Sender<PipelineSnapshot>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: LandmarkSource, C: Classifier> Shared<S, C> {
    fn is_current(&self, generation: u64) -> bool {
        self.running.load(Ordering::Acquire)
            && self.generation.load(Ordering::Acquire) == generation
    }

    fn process(
        &self,
        frame: DynamicImage,
        timestamp: Duration,
        generation: u64,
        permit: OwnedSemaphorePermit,
    ) {
        let mut guard = lock(&self.worker);
        // start()/stop() reset under this lock, so a frame from an older run is discarded here.
        if !self.is_current(generation) {
            return;
        }

        let worker = &mut *guard;
        let detection = worker.source.detect(&frame);
        let outcome = worker.pipeline.process(detection, timestamp);

        if let Some(recorder) = worker.diagnostics.as_mut() {
            recorder.record(&outcome, timestamp);
        }
        if let Some(event) = outcome.stable() {
            if let Some(tx) = lock(&self.events).as_ref() {
                let _ = tx.send(event.clone());
            }
        }
        // The next frame may be accepted as soon as subscribers see this snapshot.
        drop(permit);
        self.snapshots.send_replace(worker.pipeline.snapshot());
    }
}

/// One exercise's recognition run. Frames are handed in from the capture
/// thread; detection, normalization and classification run on the blocking
/// pool with at most one frame in flight.
pub struct RecognitionSession<S, C> {
    shared: Arc<Shared<S, C>>,
    in_flight: Arc<Semaphore>,
    started_at: Option<Instant>,
    runtime: Handle,
}

impl<S, C> RecognitionSession<S, C>
where
    S: LandmarkSource + 'static,
    C: Classifier + 'static,
{
    pub fn new(source: S, classifier: C, config: &PipelineConfig) -> Result<Self, SessionError> {
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;
        let (snapshots, _) = watch::channel(PipelineSnapshot::default());

        Ok(Self {
            shared: Arc::new(Shared {
                worker: Mutex::new(Worker {
                    source,
                    pipeline: RecognitionPipeline::new(classifier, config),
                    diagnostics: None,
                }),
                running: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                events: Mutex::new(None),
                snapshots,
            }),
            in_flight: Arc::new(Semaphore::new(1)),
            started_at: None,
            runtime,
        })
    }

    /// Resets all recognition state and begins accepting frames. Returns the
    /// stable-event stream, or `None` if the session is already running.
    pub fn start(&mut self) -> Option<mpsc::UnboundedReceiver<StableRecognition>> {
        if self.is_running() {
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut worker = lock(&self.shared.worker);
            worker.pipeline.reset();
            *lock(&self.shared.events) = Some(tx);
            self.shared.generation.fetch_add(1, Ordering::AcqRel);
            self.shared.running.store(true, Ordering::Release);
            self.shared.snapshots.send_replace(worker.pipeline.snapshot());
        }
        self.started_at = Some(Instant::now());
        info!("Recognition session started");
        Some(rx)
    }

    /// Stops accepting frames and closes the event stream. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }

        // Waits for the frame in flight, if any, to finish.
        let mut worker = lock(&self.shared.worker);
        worker.pipeline.reset();
        lock(&self.shared.events).take();
        self.shared.snapshots.send_replace(worker.pipeline.snapshot());
        self.started_at = None;
        info!("Recognition session stopped");
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn submit_frame(&self, frame: DynamicImage) -> FrameSubmission {
        let started_at = match self.started_at {
            Some(at) if self.is_running() => at,
            _ => return FrameSubmission::Stopped,
        };

        let permit = match self.in_flight.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                debug!("Frame dropped, previous frame still processing");
                return FrameSubmission::Dropped;
            }
        };

        let timestamp = started_at.elapsed();
        let generation = self.shared.generation.load(Ordering::Acquire);
        let shared = Arc::clone(&self.shared);
        self.runtime
            .spawn_blocking(move || shared.process(frame, timestamp, generation, permit));
        FrameSubmission::Accepted
    }

    /// Read-only view of the pipeline, published after every processed frame.
    pub fn subscribe_snapshots(&self) -> watch::Receiver<PipelineSnapshot> {
        self.shared.snapshots.subscribe()
    }

    pub fn record_diagnostics(&self, recorder: DiagnosticsRecorder) {
        lock(&self.shared.worker).diagnostics = Some(recorder);
    }

    pub fn take_diagnostics(&self) -> Option<DiagnosticsRecorder> {
        lock(&self.shared.worker).diagnostics.take()
    }
}

impl<S, C> Drop for RecognitionSession<S, C> {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        lock(&self.shared.events).take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{DetectError, LandmarkObservation};
    use crate::simulation::{open_hand, ScriptedClassifier, SimulatedHandSource};
    use std::sync::mpsc as std_mpsc;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn frame() -> DynamicImage {
        DynamicImage::new_rgb8(8, 8)
    }

    fn fast_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.stabilizer.classification_interval_ms = 0;
        config
    }

    /// Holds each detection until the test releases it.
    struct GatedSource {
        gate: std_mpsc::Receiver<()>,
    }

    impl LandmarkSource for GatedSource {
        fn detect(&mut self, _frame: &DynamicImage) -> Result<LandmarkObservation, DetectError> {
            self.gate.recv().map_err(|_| DetectError::Backend("gate closed".into()))?;
            Ok(open_hand())
        }
    }

    #[test]
    fn test_requires_runtime() {
        let result = RecognitionSession::new(
            SimulatedHandSource::new(),
            ScriptedClassifier::constant("A", 0.9),
            &PipelineConfig::default(),
        );
        assert!(matches!(result, Err(SessionError::NoRuntime)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_frame_in_flight_causes_drop() {
        let (release, gate) = std_mpsc::channel();
        let mut session = RecognitionSession::new(
            GatedSource { gate },
            ScriptedClassifier::constant("A", 0.9),
            &fast_config(),
        )
        .unwrap();
        let mut snapshots = session.subscribe_snapshots();
        let _events = session.start().unwrap();
        snapshots.borrow_and_update();

        assert_eq!(session.submit_frame(frame()), FrameSubmission::Accepted);
        assert_eq!(session.submit_frame(frame()), FrameSubmission::Dropped);
        assert_eq!(session.submit_frame(frame()), FrameSubmission::Dropped);

        release.send(()).unwrap();
        timeout(WAIT, snapshots.changed()).await.unwrap().unwrap();
        assert_eq!(snapshots.borrow().frames_seen, 1);

        // Permit is released once the worker finishes.
        let mut accepted = false;
        for _ in 0..100 {
            if session.submit_frame(frame()) == FrameSubmission::Accepted {
                accepted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(accepted);
        release.send(()).unwrap();
        session.stop();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_events_delivered_then_stream_closes_on_stop() {
        let mut session = RecognitionSession::new(
            SimulatedHandSource::new(),
            ScriptedClassifier::constant("L", 0.95),
            &fast_config(),
        )
        .unwrap();
        let mut snapshots = session.subscribe_snapshots();
        let mut events = session.start().unwrap();
        assert!(session.start().is_none());

        for _ in 0..8 {
            snapshots.borrow_and_update();
            assert_eq!(session.submit_frame(frame()), FrameSubmission::Accepted);
            timeout(WAIT, snapshots.changed()).await.unwrap().unwrap();
        }

        let first = timeout(WAIT, events.recv()).await.unwrap().unwrap();
        assert_eq!(first.label, "L");
        assert!(first.confidence > 0.85);

        session.stop();
        session.stop();
        assert!(!session.is_running());
        assert_eq!(session.submit_frame(frame()), FrameSubmission::Stopped);

        // Remaining buffered events drain, then the stream ends.
        let mut drained = 0;
        while let Some(event) = timeout(WAIT, events.recv()).await.unwrap() {
            assert_eq!(event.label, "L");
            drained += 1;
        }
        assert_eq!(drained, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_publishes_cleared_snapshot() {
        let mut session = RecognitionSession::new(
            SimulatedHandSource::new(),
            ScriptedClassifier::constant("C", 0.95),
            &fast_config(),
        )
        .unwrap();
        let mut snapshots = session.subscribe_snapshots();
        let _events = session.start().unwrap();
        for _ in 0..4 {
            snapshots.borrow_and_update();
            assert_eq!(session.submit_frame(frame()), FrameSubmission::Accepted);
            timeout(WAIT, snapshots.changed()).await.unwrap().unwrap();
        }
        assert_eq!(snapshots.borrow_and_update().stabilizer.history_len, 4);

        session.stop();
        assert!(snapshots.has_changed().unwrap());
        assert_eq!(*snapshots.borrow(), PipelineSnapshot::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_restart_begins_from_fresh_state() {
        let mut session = RecognitionSession::new(
            SimulatedHandSource::new(),
            ScriptedClassifier::constant("W", 0.95),
            &fast_config(),
        )
        .unwrap();
        let mut snapshots = session.subscribe_snapshots();
        let _events = session.start().unwrap();
        for _ in 0..3 {
            snapshots.borrow_and_update();
            session.submit_frame(frame());
            timeout(WAIT, snapshots.changed()).await.unwrap().unwrap();
        }
        session.stop();

        let _events = session.start().unwrap();
        assert_eq!(*session.subscribe_snapshots().borrow(), PipelineSnapshot::default());
        session.stop();
    }
}
