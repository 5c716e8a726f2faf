use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{PoseError, PoseResult};

/// 身体ランドマークのラベル (COCO 17点の順)
pub const BODY_LABELS: [&str; KeypointIndex::COUNT] = [
    "nose",
    "left_eye",
    "right_eye",
    "left_ear",
    "right_ear",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_hip",
    "right_hip",
    "left_knee",
    "right_knee",
    "left_ankle",
    "right_ankle",
];

/// 手ランドマークのラベル (21点の順)
pub const HAND_LABELS: [&str; 21] = [
    "wrist",
    "thumb_cmc",
    "thumb_mcp",
    "thumb_ip",
    "thumb_tip",
    "index_mcp",
    "index_pip",
    "index_dip",
    "index_tip",
    "middle_mcp",
    "middle_pip",
    "middle_dip",
    "middle_tip",
    "ring_mcp",
    "ring_pip",
    "ring_dip",
    "ring_tip",
    "pinky_mcp",
    "pinky_pip",
    "pinky_dip",
    "pinky_tip",
];

/// COCO の 17 キーポイントインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointIndex {
    pub const COUNT: usize = 17;

    pub const ALL: [KeypointIndex; Self::COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// 正規ラベル (例: "left_shoulder")
    pub fn label(self) -> &'static str {
        BODY_LABELS[self as usize]
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.label() == label)
    }

    /// PoseNet 形式の部位名 (camelCase) から変換
    pub fn from_part_name(part: &str) -> Option<Self> {
        match part {
            "nose" => Some(Self::Nose),
            "leftEye" => Some(Self::LeftEye),
            "rightEye" => Some(Self::RightEye),
            "leftEar" => Some(Self::LeftEar),
            "rightEar" => Some(Self::RightEar),
            "leftShoulder" => Some(Self::LeftShoulder),
            "rightShoulder" => Some(Self::RightShoulder),
            "leftElbow" => Some(Self::LeftElbow),
            "rightElbow" => Some(Self::RightElbow),
            "leftWrist" => Some(Self::LeftWrist),
            "rightWrist" => Some(Self::RightWrist),
            "leftHip" => Some(Self::LeftHip),
            "rightHip" => Some(Self::RightHip),
            "leftKnee" => Some(Self::LeftKnee),
            "rightKnee" => Some(Self::RightKnee),
            "leftAnkle" => Some(Self::LeftAnkle),
            "rightAnkle" => Some(Self::RightAnkle),
            _ => None,
        }
    }

    /// BlazePose (33点) のインデックスから変換。対応しない点は None
    pub fn from_blazepose_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Nose),
            2 => Some(Self::LeftEye),
            5 => Some(Self::RightEye),
            7 => Some(Self::LeftEar),
            8 => Some(Self::RightEar),
            11 => Some(Self::LeftShoulder),
            12 => Some(Self::RightShoulder),
            13 => Some(Self::LeftElbow),
            14 => Some(Self::RightElbow),
            15 => Some(Self::LeftWrist),
            16 => Some(Self::RightWrist),
            23 => Some(Self::LeftHip),
            24 => Some(Self::RightHip),
            25 => Some(Self::LeftKnee),
            26 => Some(Self::RightKnee),
            27 => Some(Self::LeftAnkle),
            28 => Some(Self::RightAnkle),
            _ => None,
        }
    }
}

/// ラベル集合の種類（身体 / 手）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkCatalog {
    #[default]
    Body,
    Hand,
}

impl LandmarkCatalog {
    pub fn labels(self) -> &'static [&'static str] {
        match self {
            LandmarkCatalog::Body => &BODY_LABELS,
            LandmarkCatalog::Hand => &HAND_LABELS,
        }
    }

    pub fn contains(self, label: &str) -> bool {
        self.labels().contains(&label)
    }
}

/// 単一ランドマーク（正規座標空間のピクセル座標）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub label: String,
    pub x: f32,
    pub y: f32,
    /// 信頼度スコア (0.0〜1.0)
    pub confidence: f32,
    pub visible: bool,
}

impl Landmark {
    pub fn new(label: impl Into<String>, x: f32, y: f32, confidence: f32) -> Self {
        Self {
            label: label.into(),
            x,
            y,
            confidence: confidence.clamp(0.0, 1.0),
            visible: true,
        }
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// 信頼度が閾値以上か
    pub fn is_valid(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }

    pub fn distance_to(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// 1回の検出サイクルで得られたランドマーク集合
///
/// ラベルはフレーム内で一意。生成後は変更されない。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LandmarkFrame {
    landmarks: BTreeMap<String, Landmark>,
}

impl LandmarkFrame {
    pub fn empty() -> Self {
        Self::default()
    }

    /// ラベルが重複していればエラー
    pub fn from_landmarks<I>(landmarks: I) -> PoseResult<Self>
    where
        I: IntoIterator<Item = Landmark>,
    {
        let mut map = BTreeMap::new();
        for lm in landmarks {
            if map.contains_key(&lm.label) {
                return Err(PoseError::MalformedFrame(format!(
                    "duplicate label {}",
                    lm.label
                )));
            }
            map.insert(lm.label.clone(), lm);
        }
        Ok(Self { landmarks: map })
    }

    pub fn get(&self, label: &str) -> Option<&Landmark> {
        self.landmarks.get(label)
    }

    pub fn point(&self, index: KeypointIndex) -> Option<&Landmark> {
        self.get(index.label())
    }

    /// 存在し、かつ信頼度が閾値以上のランドマーク
    pub fn confident(&self, label: &str, threshold: f32) -> Option<&Landmark> {
        self.get(label).filter(|lm| lm.is_valid(threshold))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Landmark> {
        self.landmarks.values()
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    /// 全ランドマークの平均信頼度
    pub fn average_confidence(&self) -> f32 {
        if self.landmarks.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.landmarks.values().map(|l| l.confidence).sum();
        sum / self.landmarks.len() as f32
    }

    pub fn to_vec(&self) -> Vec<Landmark> {
        self.landmarks.values().cloned().collect()
    }
}
