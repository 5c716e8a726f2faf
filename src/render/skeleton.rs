use serde::Serialize;

use crate::pose::{KeypointIndex, Landmark, LandmarkCatalog, LandmarkFrame};

/// 骨格の接続定義 (開始キーポイント, 終了キーポイント)
pub const SKELETON_CONNECTIONS: [(KeypointIndex, KeypointIndex); 16] = [
    // 顔
    (KeypointIndex::LeftEar, KeypointIndex::LeftEye),
    (KeypointIndex::LeftEye, KeypointIndex::Nose),
    (KeypointIndex::Nose, KeypointIndex::RightEye),
    (KeypointIndex::RightEye, KeypointIndex::RightEar),
    // 上半身
    (KeypointIndex::LeftShoulder, KeypointIndex::RightShoulder),
    (KeypointIndex::LeftShoulder, KeypointIndex::LeftElbow),
    (KeypointIndex::LeftElbow, KeypointIndex::LeftWrist),
    (KeypointIndex::RightShoulder, KeypointIndex::RightElbow),
    (KeypointIndex::RightElbow, KeypointIndex::RightWrist),
    // 胴体
    (KeypointIndex::LeftShoulder, KeypointIndex::LeftHip),
    (KeypointIndex::RightShoulder, KeypointIndex::RightHip),
    (KeypointIndex::LeftHip, KeypointIndex::RightHip),
    // 下半身
    (KeypointIndex::LeftHip, KeypointIndex::LeftKnee),
    (KeypointIndex::LeftKnee, KeypointIndex::LeftAnkle),
    (KeypointIndex::RightHip, KeypointIndex::RightKnee),
    (KeypointIndex::RightKnee, KeypointIndex::RightAnkle),
];

/// 手の接続定義（ラベル）
pub const HAND_CONNECTIONS: [(&str, &str); 21] = [
    ("wrist", "thumb_cmc"),
    ("thumb_cmc", "thumb_mcp"),
    ("thumb_mcp", "thumb_ip"),
    ("thumb_ip", "thumb_tip"),
    ("wrist", "index_mcp"),
    ("index_mcp", "index_pip"),
    ("index_pip", "index_dip"),
    ("index_dip", "index_tip"),
    ("index_mcp", "middle_mcp"),
    ("middle_mcp", "middle_pip"),
    ("middle_pip", "middle_dip"),
    ("middle_dip", "middle_tip"),
    ("middle_mcp", "ring_mcp"),
    ("ring_mcp", "ring_pip"),
    ("ring_pip", "ring_dip"),
    ("ring_dip", "ring_tip"),
    ("ring_mcp", "pinky_mcp"),
    ("wrist", "pinky_mcp"),
    ("pinky_mcp", "pinky_pip"),
    ("pinky_pip", "pinky_dip"),
    ("pinky_dip", "pinky_tip"),
];

/// 描画用の線分（正規化済み座標）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub from: String,
    pub to: String,
    pub start: (f32, f32),
    pub end: (f32, f32),
}

pub fn connections(catalog: LandmarkCatalog) -> Vec<(&'static str, &'static str)> {
    match catalog {
        LandmarkCatalog::Body => SKELETON_CONNECTIONS
            .iter()
            .map(|(a, b)| (a.label(), b.label()))
            .collect(),
        LandmarkCatalog::Hand => HAND_CONNECTIONS.to_vec(),
    }
}

fn segment(a: &Landmark, b: &Landmark) -> Segment {
    Segment {
        from: a.label.clone(),
        to: b.label.clone(),
        start: (a.x, a.y),
        end: (b.x, b.y),
    }
}

/// 両端が visible な隣接ペアだけを線分にする（エディタ用）
pub fn visible_segments(landmarks: &[Landmark], catalog: LandmarkCatalog) -> Vec<Segment> {
    let find = |label: &str| landmarks.iter().find(|l| l.label == label && l.visible);
    connections(catalog)
        .into_iter()
        .filter_map(|(a, b)| Some(segment(find(a)?, find(b)?)))
        .collect()
}

/// 検出フレームから、両端が信頼度閾値以上の線分を作る
pub fn skeleton_edges(
    frame: &LandmarkFrame,
    catalog: LandmarkCatalog,
    min_confidence: f32,
) -> Vec<Segment> {
    connections(catalog)
        .into_iter()
        .filter_map(|(a, b)| {
            let pa = frame.confident(a, min_confidence).filter(|l| l.visible)?;
            let pb = frame.confident(b, min_confidence).filter(|l| l.visible)?;
            Some(segment(pa, pb))
        })
        .collect()
}
