//! Normalized detector keypoints and the landmark indexing schemes.
//!
//! Hand sets follow the 21-landmark hand model, pose sets the
//! 33-landmark body model.  Coordinates are normalized to [0, 1] in image
//! space; `z` is relative depth when the detector provides it.

// ── Keypoint ───────────────────────────────────────────────

/// One detector landmark for one frame.  Never mutated; the next frame's
/// set supersedes it wholesale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub z: Option<f32>,
    /// Visibility / confidence score in [0, 1].
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            z: None,
            confidence,
        }
    }

    pub fn with_z(mut self, z: f32) -> Self {
        self.z = Some(z);
        self
    }

    /// Whether this keypoint clears a visibility threshold.
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }

    /// Planar distance in normalized image space.
    pub fn distance_2d(&self, other: &Keypoint) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Distance including depth when both points carry `z`; a missing
    /// depth counts as 0.
    pub fn distance_3d(&self, other: &Keypoint) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z.unwrap_or(0.0) - self.z.unwrap_or(0.0);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

// ── Hand landmarks ─────────────────────────────────────────

/// Total number of landmarks in a hand set.
pub const HAND_LANDMARK_COUNT: usize = 21;

/// The 21 hand landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandLandmark {
    Wrist,
    ThumbCmc,
    ThumbMcp,
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
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

impl HandLandmark {
    /// Convert to array index (0-20).
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wrist => "wrist",
            Self::ThumbCmc => "thumb-cmc",
            Self::ThumbMcp => "thumb-mcp",
            Self::ThumbIp => "thumb-ip",
            Self::ThumbTip => "thumb-tip",
            Self::IndexMcp => "index-mcp",
            Self::IndexPip => "index-pip",
            Self::IndexDip => "index-dip",
            Self::IndexTip => "index-tip",
            Self::MiddleMcp => "middle-mcp",
            Self::MiddlePip => "middle-pip",
            Self::MiddleDip => "middle-dip",
            Self::MiddleTip => "middle-tip",
            Self::RingMcp => "ring-mcp",
            Self::RingPip => "ring-pip",
            Self::RingDip => "ring-dip",
            Self::RingTip => "ring-tip",
            Self::PinkyMcp => "pinky-mcp",
            Self::PinkyPip => "pinky-pip",
            Self::PinkyDip => "pinky-dip",
            Self::PinkyTip => "pinky-tip",
        }
    }
}

// ── Pose landmarks ─────────────────────────────────────────

/// Total number of landmarks in a pose set.
pub const POSE_LANDMARK_COUNT: usize = 33;

/// The 33 body landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoseLandmark {
    Nose,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl PoseLandmark {
    /// Every landmark in index order.
    pub const ALL: [PoseLandmark; POSE_LANDMARK_COUNT] = [
        Self::Nose,
        Self::LeftEyeInner,
        Self::LeftEye,
        Self::LeftEyeOuter,
        Self::RightEyeInner,
        Self::RightEye,
        Self::RightEyeOuter,
        Self::LeftEar,
        Self::RightEar,
        Self::MouthLeft,
        Self::MouthRight,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftPinky,
        Self::RightPinky,
        Self::LeftIndex,
        Self::RightIndex,
        Self::LeftThumb,
        Self::RightThumb,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
        Self::LeftHeel,
        Self::RightHeel,
        Self::LeftFootIndex,
        Self::RightFootIndex,
    ];

    /// Convert to array index (0-32).
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEyeInner => "left-eye-inner",
            Self::LeftEye => "left-eye",
            Self::LeftEyeOuter => "left-eye-outer",
            Self::RightEyeInner => "right-eye-inner",
            Self::RightEye => "right-eye",
            Self::RightEyeOuter => "right-eye-outer",
            Self::LeftEar => "left-ear",
            Self::RightEar => "right-ear",
            Self::MouthLeft => "mouth-left",
            Self::MouthRight => "mouth-right",
            Self::LeftShoulder => "left-shoulder",
            Self::RightShoulder => "right-shoulder",
            Self::LeftElbow => "left-elbow",
            Self::RightElbow => "right-elbow",
            Self::LeftWrist => "left-wrist",
            Self::RightWrist => "right-wrist",
            Self::LeftPinky => "left-pinky",
            Self::RightPinky => "right-pinky",
            Self::LeftIndex => "left-index",
            Self::RightIndex => "right-index",
            Self::LeftThumb => "left-thumb",
            Self::RightThumb => "right-thumb",
            Self::LeftHip => "left-hip",
            Self::RightHip => "right-hip",
            Self::LeftKnee => "left-knee",
            Self::RightKnee => "right-knee",
            Self::LeftAnkle => "left-ankle",
            Self::RightAnkle => "right-ankle",
            Self::LeftHeel => "left-heel",
            Self::RightHeel => "right-heel",
            Self::LeftFootIndex => "left-foot-index",
            Self::RightFootIndex => "right-foot-index",
        }
    }

    /// Parse from the `as_str` form (underscores accepted too).
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.replace('_', "-");
        Self::ALL.iter().copied().find(|l| l.as_str() == normalized)
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Look up a landmark in a frame's set, tolerating short sets.
pub fn landmark(set: &[Keypoint], index: usize) -> Option<&Keypoint> {
    set.get(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hand_indices() {
        assert_eq!(HandLandmark::ThumbTip.index(), 4);
        assert_eq!(HandLandmark::IndexTip.index(), 8);
        assert_eq!(HandLandmark::PinkyTip.index(), HAND_LANDMARK_COUNT - 1);
    }

    #[test]
    fn test_pose_indices() {
        assert_eq!(PoseLandmark::Nose.index(), 0);
        assert_eq!(PoseLandmark::LeftEye.index(), 2);
        assert_eq!(PoseLandmark::RightEar.index(), 8);
        assert_eq!(PoseLandmark::LeftWrist.index(), 15);
        assert_eq!(PoseLandmark::RightWrist.index(), 16);
        assert_eq!(PoseLandmark::LeftKnee.index(), 25);
        assert_eq!(PoseLandmark::RightFootIndex.index(), POSE_LANDMARK_COUNT - 1);
        for (i, l) in PoseLandmark::ALL.iter().enumerate() {
            assert_eq!(l.index(), i);
        }
    }

    #[test]
    fn test_pose_from_str() {
        assert_eq!(PoseLandmark::from_str("left-knee"), Some(PoseLandmark::LeftKnee));
        assert_eq!(PoseLandmark::from_str("right_shoulder"), Some(PoseLandmark::RightShoulder));
        assert_eq!(PoseLandmark::from_str("tail"), None);
        assert_eq!(PoseLandmark::from_index(12), Some(PoseLandmark::RightShoulder));
        assert_eq!(PoseLandmark::from_index(33), None);
    }

    #[test]
    fn test_keypoint_distances() {
        let a = Keypoint::new(0.0, 0.0, 1.0);
        let b = Keypoint::new(0.3, 0.4, 1.0);
        assert!((a.distance_2d(&b) - 0.5).abs() < 1e-6);
        let c = Keypoint::new(0.0, 0.0, 1.0).with_z(0.0);
        let d = Keypoint::new(0.0, 0.0, 1.0).with_z(0.1);
        assert!((c.distance_3d(&d) - 0.1).abs() < 1e-6);
        assert!((a.distance_3d(&b) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_visibility() {
        assert!(Keypoint::new(0.5, 0.5, 0.5).is_visible(0.5));
        assert!(!Keypoint::new(0.5, 0.5, 0.49).is_visible(0.5));
    }
}
