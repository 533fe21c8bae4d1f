// src/simulation.rs - Synthetic detector and classifier for demos and tests
use crate::classifier::{Classifier, ClassifierError, LabelProbabilities};
use crate::landmarks::{
    DetectError, Joint, JointPoint, LandmarkObservation, LandmarkSource, JOINT_COUNT,
};
use crate::normalizer::FeatureVector;
use image::DynamicImage;
use nalgebra::Vector2;

/// Open right hand facing the camera, fingers up, every joint fully confident.
pub fn open_hand() -> LandmarkObservation {
    const LAYOUT: [(f64, f64); JOINT_COUNT] = [
        (0.50, 0.80),
        (0.42, 0.75), (0.36, 0.68), (0.32, 0.62), (0.29, 0.56),
        (0.44, 0.60), (0.43, 0.50), (0.425, 0.44), (0.42, 0.39),
        (0.50, 0.58), (0.50, 0.47), (0.50, 0.41), (0.50, 0.36),
        (0.56, 0.60), (0.57, 0.50), (0.575, 0.45), (0.58, 0.40),
        (0.61, 0.63), (0.63, 0.55), (0.64, 0.50), (0.65, 0.46),
    ];

    LandmarkObservation::from_points(
        Joint::ALL
            .iter()
            .zip(LAYOUT.iter())
            .map(|(joint, (x, y))| (*joint, JointPoint::new(*x, *y, 1.0))),
        0.95,
    )
}

/// Reports `open_hand()` swaying slightly over time. Every `dropout_every`-th
/// frame reports no hand, which exercises the skip path.
pub struct SimulatedHandSource {
    sim_time: f64,
    frame_counter: u64,
    dropout_every: Option<u64>,
}

impl SimulatedHandSource {
    pub fn new() -> Self {
        Self {
            sim_time: 0.0,
            frame_counter: 0,
            dropout_every: None,
        }
    }

    pub fn with_dropout(mut self, every: u64) -> Self {
        self.dropout_every = (every > 0).then_some(every);
        self
    }
}

impl Default for SimulatedHandSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LandmarkSource for SimulatedHandSource {
    fn detect(&mut self, _frame: &DynamicImage) -> Result<LandmarkObservation, DetectError> {
        let t = self.sim_time;
        self.sim_time += 0.033;
        self.frame_counter += 1;

        if let Some(every) = self.dropout_every {
            if self.frame_counter % every == 0 {
                return Err(DetectError::NoHandDetected);
            }
        }

        let sway = Vector2::new(0.02 * (t * 0.5).sin(), 0.01 * t.cos());
        Ok(open_hand().map_positions(|p| p + sway))
    }
}

/// Replays a fixed label sequence, one label per classification, cycling.
pub struct ScriptedClassifier {
    script: Vec<String>,
    probability: f64,
    cursor: usize,
}

impl ScriptedClassifier {
    pub fn new<S: Into<String>>(script: impl IntoIterator<Item = S>, probability: f64) -> Self {
        Self {
            script: script.into_iter().map(Into::into).collect(),
            probability,
            cursor: 0,
        }
    }

    pub fn constant(label: &str, probability: f64) -> Self {
        Self::new([label], probability)
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(
        &mut self,
        _features: &FeatureVector,
    ) -> Result<LabelProbabilities, ClassifierError> {
        if self.script.is_empty() {
            return Err(ClassifierError::Unavailable("empty script".to_string()));
        }
        let label = &self.script[self.cursor % self.script.len()];
        self.cursor += 1;

        let mut probabilities = LabelProbabilities::new().with(label.as_str(), self.probability);
        if label != "NOTHING" {
            probabilities.insert("NOTHING", 1.0 - self.probability);
        }
        Ok(probabilities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::FeatureNormalizer;

    fn blank() -> DynamicImage {
        DynamicImage::new_rgb8(4, 4)
    }

    #[test]
    fn test_open_hand_normalizes() {
        let features = FeatureNormalizer::default().normalize(&open_hand()).unwrap();
        assert_eq!(features.populated_count(), JOINT_COUNT);
    }

    #[test]
    fn test_source_dropout() {
        let mut source = SimulatedHandSource::new().with_dropout(3);
        let results: Vec<bool> = (0..6).map(|_| source.detect(&blank()).is_ok()).collect();
        assert_eq!(results, vec![true, true, false, true, true, false]);
    }

    #[test]
    fn test_scripted_classifier_cycles() {
        let features = FeatureNormalizer::default().normalize(&open_hand()).unwrap();
        let mut classifier = ScriptedClassifier::new(["A", "B"], 0.9);
        let labels: Vec<String> = (0..4)
            .map(|_| classifier.classify(&features).unwrap().top().unwrap().0.to_string())
            .collect();
        assert_eq!(labels, vec!["A", "B", "A", "B"]);
    }

    #[test]
    fn test_empty_script_is_unavailable() {
        let features = FeatureNormalizer::default().normalize(&open_hand()).unwrap();
        let mut classifier = ScriptedClassifier::new(Vec::<String>::new(), 0.9);
        assert!(classifier.classify(&features).is_err());
    }
}
