// src/landmarks.rs - Hand joint layout and the landmark detector contract
use image::DynamicImage;
use nalgebra::Point2;
use thiserror::Error;

pub const JOINT_COUNT: usize = 21;

/// Hand joints in canonical order. The discriminant is the feature-vector
/// index and must match the classifier's input layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Joint {
    Wrist,
    ThumbCmc,
    ThumbMp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    LittleMcp,
    LittlePip,
    LittleDip,
    LittleTip,
}

impl Joint {
    pub const ALL: [Joint; JOINT_COUNT] = [
        Joint::Wrist,
        Joint::ThumbCmc,
        Joint::ThumbMp,
        Joint::ThumbIp,
        Joint::ThumbTip,
        Joint::IndexMcp,
        Joint::IndexPip,
        Joint::IndexDip,
        Joint::IndexTip,
        Joint::MiddleMcp,
        Joint::MiddlePip,
        Joint::MiddleDip,
        Joint::MiddleTip,
        Joint::RingMcp,
        Joint::RingPip,
        Joint::RingDip,
        Joint::RingTip,
        Joint::LittleMcp,
        Joint::LittlePip,
        Joint::LittleDip,
        Joint::LittleTip,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Joint::Wrist => "wrist",
            Joint::ThumbCmc => "thumb_cmc",
            Joint::ThumbMp => "thumb_mp",
            Joint::ThumbIp => "thumb_ip",
            Joint::ThumbTip => "thumb_tip",
            Joint::IndexMcp => "index_mcp",
            Joint::IndexPip => "index_pip",
            Joint::IndexDip => "index_dip",
            Joint::IndexTip => "index_tip",
            Joint::MiddleMcp => "middle_mcp",
            Joint::MiddlePip => "middle_pip",
            Joint::MiddleDip => "middle_dip",
            Joint::MiddleTip => "middle_tip",
            Joint::RingMcp => "ring_mcp",
            Joint::RingPip => "ring_pip",
            Joint::RingDip => "ring_dip",
            Joint::RingTip => "ring_tip",
            Joint::LittleMcp => "little_mcp",
            Joint::LittlePip => "little_pip",
            Joint::LittleDip => "little_dip",
            Joint::LittleTip => "little_tip",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointPoint {
    pub position: Point2<f64>,
    pub confidence: f64,
}

impl JointPoint {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self {
            position: Point2::new(x, y),
            confidence,
        }
    }

    pub fn missing() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

/// One frame's worth of detector output. Joints the detector could not see
/// are reported with zero confidence rather than omitted.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkObservation {
    joints: [JointPoint; JOINT_COUNT],
    hand_confidence: f64,
}

impl LandmarkObservation {
    pub fn new(joints: [JointPoint; JOINT_COUNT], hand_confidence: f64) -> Self {
        Self {
            joints,
            hand_confidence,
        }
    }

    /// Builds an observation from `(joint, point)` pairs; unlisted joints are missing.
    pub fn from_points(
        points: impl IntoIterator<Item = (Joint, JointPoint)>,
        hand_confidence: f64,
    ) -> Self {
        let mut joints = [JointPoint::missing(); JOINT_COUNT];
        for (joint, point) in points {
            joints[joint.index()] = point;
        }
        Self::new(joints, hand_confidence)
    }

    pub fn joint(&self, joint: Joint) -> &JointPoint {
        &self.joints[joint.index()]
    }

    pub fn joints(&self) -> &[JointPoint; JOINT_COUNT] {
        &self.joints
    }

    pub fn hand_confidence(&self) -> f64 {
        self.hand_confidence
    }

    /// Copy with every joint position mapped through `f`, confidences unchanged.
    pub fn map_positions(&self, f: impl Fn(Point2<f64>) -> Point2<f64>) -> Self {
        let mut joints = self.joints;
        for point in joints.iter_mut() {
            point.position = f(point.position);
        }
        Self::new(joints, self.hand_confidence)
    }

    pub fn with_joint(&self, joint: Joint, point: JointPoint) -> Self {
        let mut joints = self.joints;
        joints[joint.index()] = point;
        Self::new(joints, self.hand_confidence)
    }

    pub fn with_hand_confidence(&self, hand_confidence: f64) -> Self {
        Self::new(self.joints, hand_confidence)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DetectError {
    #[error("no hand detected in frame")]
    NoHandDetected,
    #[error("landmark detector failed: {0}")]
    Backend(String),
}

/// Hand landmark detector run once per captured frame.
pub trait LandmarkSource: Send {
    fn detect(&mut self, frame: &DynamicImage) -> Result<LandmarkObservation, DetectError>;
}
