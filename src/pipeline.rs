// src/pipeline.rs - One-frame-at-a-time driver: normalize, rate limit, classify, stabilize
use crate::classifier::{Classifier, ClassifierError};
use crate::config::PipelineConfig;
use crate::landmarks::{DetectError, LandmarkObservation};
use crate::normalizer::{FeatureNormalizer, NormalizeError};
use crate::stabilizer::{PredictionStabilizer, StabilizerSnapshot, StableRecognition, Tick};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Consecutive unusable frames between "reposition hand" log hints.
const SKIP_LOG_EVERY: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoHand,
    Detector(String),
    Normalize(NormalizeError),
    ClassifierUnavailable(String),
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoHand => "no_hand",
            SkipReason::Detector(_) => "detector_error",
            SkipReason::Normalize(err) => match err {
                NormalizeError::InsufficientConfidence { .. } => "insufficient_confidence",
                NormalizeError::MissingAnchors { .. } => "missing_anchors",
                NormalizeError::DegenerateGeometry { .. } => "degenerate_geometry",
                NormalizeError::InsufficientValidPoints { .. } => "insufficient_valid_points",
            },
            SkipReason::ClassifierUnavailable(_) => "classifier_unavailable",
        }
    }
}

impl From<DetectError> for SkipReason {
    fn from(err: DetectError) -> Self {
        match err {
            DetectError::NoHandDetected => SkipReason::NoHand,
            DetectError::Backend(msg) => SkipReason::Detector(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Skipped(SkipReason),
    RateLimited,
    Classified(Tick),
}

impl FrameOutcome {
    pub fn stable(&self) -> Option<&StableRecognition> {
        match self {
            FrameOutcome::Classified(tick) => tick.stable(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineSnapshot {
    pub stabilizer: StabilizerSnapshot,
    /// Frames in a row that produced no feature vector.
    pub consecutive_skipped: u64,
    pub frames_seen: u64,
    pub stable_events: u64,
}

pub struct RecognitionPipeline<C> {
    normalizer: FeatureNormalizer,
    classifier: C,
    stabilizer: PredictionStabilizer,
    consecutive_skipped: u64,
    frames_seen: u64,
    stable_events: u64,
}

impl<C: Classifier> RecognitionPipeline<C> {
    pub fn new(classifier: C, config: &PipelineConfig) -> Self {
        Self {
            normalizer: FeatureNormalizer::new(config.normalizer.clone()),
            classifier,
            stabilizer: PredictionStabilizer::new(config.stabilizer.clone()),
            consecutive_skipped: 0,
            frames_seen: 0,
            stable_events: 0,
        }
    }

    /// Feeds one detector result taken at `timestamp` (time since session start).
    pub fn process(
        &mut self,
        detection: Result<LandmarkObservation, DetectError>,
        timestamp: Duration,
    ) -> FrameOutcome {
        self.frames_seen += 1;

        let features = match detection
            .map_err(SkipReason::from)
            .and_then(|obs| self.normalizer.normalize(&obs).map_err(SkipReason::Normalize))
        {
            Ok(features) => {
                self.consecutive_skipped = 0;
                features
            }
            Err(reason) => return self.skip(reason),
        };

        if !self.stabilizer.is_due(timestamp) {
            return FrameOutcome::RateLimited;
        }

        // A failed classification leaves the slot open for the next frame.
        let probabilities = match self.classifier.classify(&features) {
            Ok(probabilities) => probabilities,
            Err(ClassifierError::Unavailable(msg)) => {
                warn!("Classifier unavailable, skipping frame: {}", msg);
                return FrameOutcome::Skipped(SkipReason::ClassifierUnavailable(msg));
            }
        };
        self.stabilizer.begin_classification(timestamp);

        let tick = self.stabilizer.observe(&probabilities, timestamp);
        match &tick {
            Tick::Stable(event) => {
                self.stable_events += 1;
                info!(
                    "Stable recognition '{}' ({:.2}) at {:.2}s",
                    event.label,
                    event.confidence,
                    timestamp.as_secs_f64()
                );
            }
            other => debug!("Classification tick: {:?}", other),
        }
        FrameOutcome::Classified(tick)
    }

    fn skip(&mut self, reason: SkipReason) -> FrameOutcome {
        self.consecutive_skipped += 1;
        debug!("Skipping frame: {:?}", reason);
        if self.consecutive_skipped % SKIP_LOG_EVERY == 0 {
            info!(
                "No usable hand for {} frames (last: {}), hand may need repositioning",
                self.consecutive_skipped,
                reason.as_str()
            );
        }
        FrameOutcome::Skipped(reason)
    }

    pub fn consecutive_skipped(&self) -> u64 {
        self.consecutive_skipped
    }

    pub fn reset(&mut self) {
        self.stabilizer.reset();
        self.consecutive_skipped = 0;
        self.frames_seen = 0;
        self.stable_events = 0;
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            stabilizer: self.stabilizer.snapshot(),
            consecutive_skipped: self.consecutive_skipped,
            frames_seen: self.frames_seen,
            stable_events: self.stable_events,
        }
    }
}
