// src/normalizer.rs - Landmarks to scale/rotation-stabilized classifier input
use crate::config::NormalizerConfig;
use crate::landmarks::{Joint, LandmarkObservation, JOINT_COUNT};
use nalgebra::{Point2, Vector3};
use thiserror::Error;

/// Flattened classifier input length: x, y and confidence for every joint.
pub const FEATURE_LEN: usize = 3 * JOINT_COUNT;

const ANCHORS: [Joint; 3] = [Joint::Wrist, Joint::IndexMcp, Joint::LittleMcp];

#[derive(Debug, Clone, Error, PartialEq)]
pub enum NormalizeError {
    #[error("hand confidence {confidence:.2} below threshold")]
    InsufficientConfidence { confidence: f64 },
    #[error("only {found} of {required} anchor joints detected")]
    MissingAnchors { found: usize, required: usize },
    #[error("hand width {width:.4} too small")]
    DegenerateGeometry { width: f64 },
    #[error("insufficient valid points: {found} (need {required})")]
    InsufficientValidPoints { found: usize, required: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JointFeature {
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    features: [JointFeature; JOINT_COUNT],
}

impl FeatureVector {
    pub fn new(features: [JointFeature; JOINT_COUNT]) -> Self {
        Self { features }
    }

    pub fn get(&self, joint: Joint) -> &JointFeature {
        &self.features[joint.index()]
    }

    pub fn features(&self) -> &[JointFeature; JOINT_COUNT] {
        &self.features
    }

    pub fn populated_count(&self) -> usize {
        self.features.iter().filter(|f| f.confidence > 0.0).count()
    }

    /// Channel-major `[x0..x20, y0..y20, c0..c20]`, i.e. a `[1, 3, 21]` tensor.
    pub fn to_channels(&self) -> [f32; FEATURE_LEN] {
        let mut out = [0.0f32; FEATURE_LEN];
        for (i, f) in self.features.iter().enumerate() {
            out[i] = f.x as f32;
            out[JOINT_COUNT + i] = f.y as f32;
            out[2 * JOINT_COUNT + i] = f.confidence as f32;
        }
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeatureNormalizer {
    config: NormalizerConfig,
}

impl FeatureNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    pub fn normalize(
        &self,
        observation: &LandmarkObservation,
    ) -> Result<FeatureVector, NormalizeError> {
        let cfg = &self.config;

        if observation.hand_confidence() < cfg.min_hand_confidence {
            return Err(NormalizeError::InsufficientConfidence {
                confidence: observation.hand_confidence(),
            });
        }

        let found = ANCHORS
            .iter()
            .filter(|j| observation.joint(**j).confidence > cfg.min_anchor_confidence)
            .count();
        if found < ANCHORS.len() {
            return Err(NormalizeError::MissingAnchors {
                found,
                required: ANCHORS.len(),
            });
        }

        let wrist = observation.joint(Joint::Wrist).position;
        let index_mcp = observation.joint(Joint::IndexMcp).position;
        let little_mcp = observation.joint(Joint::LittleMcp).position;

        let normal = hand_plane_normal(&wrist, &index_mcp, &little_mcp);

        let width = nalgebra::distance(&index_mcp, &little_mcp);
        if width < cfg.min_hand_width {
            return Err(NormalizeError::DegenerateGeometry { width });
        }

        let frame = HandFrame {
            center: nalgebra::center(&index_mcp, &little_mcp),
            width,
            perspective: 1.0 + cfg.perspective_gain * normal.z.abs(),
        };

        let mut features = [JointFeature::default(); JOINT_COUNT];
        for joint in Joint::ALL {
            let point = observation.joint(joint);
            features[joint.index()] = if point.confidence > cfg.min_joint_confidence {
                frame.project(&point.position, point.confidence)
            } else {
                match self.interpolate(joint, observation) {
                    Some(position) => frame.project(&position, cfg.interpolated_confidence),
                    None => JointFeature::default(),
                }
            };
        }

        let vector = FeatureVector::new(features);
        let populated = vector.populated_count();
        if populated < cfg.min_valid_points {
            return Err(NormalizeError::InsufficientValidPoints {
                found: populated,
                required: cfg.min_valid_points,
            });
        }

        Ok(vector)
    }

    // Only the index and middle DIP joints are synthesized; every other
    // low-confidence joint stays zeroed.
    fn interpolate(&self, joint: Joint, observation: &LandmarkObservation) -> Option<Point2<f64>> {
        let (pip, tip) = match joint {
            Joint::IndexDip => (Joint::IndexPip, Joint::IndexTip),
            Joint::MiddleDip => (Joint::MiddlePip, Joint::MiddleTip),
            _ => return None,
        };

        let pip = observation.joint(pip);
        let tip = observation.joint(tip);
        let min = self.config.min_interpolation_confidence;
        if pip.confidence > min && tip.confidence > min {
            Some(nalgebra::center(&pip.position, &tip.position))
        } else {
            None
        }
    }
}

struct HandFrame {
    center: Point2<f64>,
    width: f64,
    perspective: f64,
}

impl HandFrame {
    fn project(&self, position: &Point2<f64>, confidence: f64) -> JointFeature {
        let offset = (*position - self.center) / self.width * self.perspective;
        JointFeature {
            x: offset.x,
            y: offset.y,
            confidence,
        }
    }
}

/// Unit normal of the wrist/index/little triangle lifted into 3-space.
/// Collinear anchors yield the zero vector, which disables perspective correction.
fn hand_plane_normal(
    wrist: &Point2<f64>,
    index: &Point2<f64>,
    little: &Point2<f64>,
) -> Vector3<f64> {
    let v1 = Vector3::new(index.x - wrist.x, index.y - wrist.y, 0.0);
    let v2 = Vector3::new(little.x - wrist.x, little.y - wrist.y, 0.0);
    v1.cross(&v2)
        .try_normalize(f64::EPSILON)
        .unwrap_or_else(Vector3::zeros)
}
