// src/lib.rs
pub mod classifier;
pub mod completion;
pub mod config;
pub mod diagnostics;
pub mod landmarks;
pub mod normalizer;
pub mod pipeline;
pub mod session;
pub mod simulation;
pub mod stabilizer;

pub use classifier::{Classifier, ClassifierError, LabelProbabilities, ASL_LABELS};
pub use completion::{ExerciseSession, TaskCompletionTracker, TaskStatus, UiEvent};
pub use config::PipelineConfig;
pub use landmarks::{DetectError, Joint, JointPoint, LandmarkObservation, LandmarkSource};
pub use normalizer::{FeatureNormalizer, FeatureVector, NormalizeError};
pub use pipeline::{FrameOutcome, PipelineSnapshot, RecognitionPipeline, SkipReason};
pub use session::{FrameSubmission, RecognitionSession, SessionError};
pub use stabilizer::{PredictionStabilizer, StableRecognition, Tick};
