use std::collections::HashMap;

use super::constraint::{Check, Constraint};
use super::definition::{Difficulty, Template, TemplateKind};
use crate::error::{PoseError, PoseResult};
use crate::pose::Landmark;
use crate::scoring::geometry::landmark_angle;

/// 参照ポーズから角度制約を作る関節 (a, vertex, b)
const JOINT_TRIPLES: &[(&str, &str, &str)] = &[
    ("left_shoulder", "left_elbow", "left_wrist"),
    ("right_shoulder", "right_elbow", "right_wrist"),
    ("left_hip", "left_shoulder", "left_elbow"),
    ("right_hip", "right_shoulder", "right_elbow"),
    ("left_shoulder", "left_hip", "left_knee"),
    ("right_shoulder", "right_hip", "right_knee"),
    ("left_hip", "left_knee", "left_ankle"),
    ("right_hip", "right_knee", "right_ankle"),
    // 手
    ("thumb_cmc", "thumb_mcp", "thumb_ip"),
    ("thumb_mcp", "thumb_ip", "thumb_tip"),
    ("index_mcp", "index_pip", "index_dip"),
    ("index_pip", "index_dip", "index_tip"),
    ("middle_mcp", "middle_pip", "middle_dip"),
    ("middle_pip", "middle_dip", "middle_tip"),
    ("ring_mcp", "ring_pip", "ring_dip"),
    ("ring_pip", "ring_dip", "ring_tip"),
    ("pinky_mcp", "pinky_pip", "pinky_dip"),
    ("pinky_pip", "pinky_dip", "pinky_tip"),
];

impl Template {
    /// 手動で作ったランドマーク集合からテンプレートを作る
    ///
    /// 3点とも表示されている関節ごとに「参照角度 ± tolerance」の角度制約を
    /// 均等な重みで並べる。
    pub fn from_reference(
        key: &str,
        display_name: &str,
        landmarks: &[Landmark],
        tolerance_deg: f32,
        target_hold_seconds: f32,
    ) -> PoseResult<Template> {
        let by_label: HashMap<&str, &Landmark> = landmarks
            .iter()
            .filter(|l| l.visible)
            .map(|l| (l.label.as_str(), l))
            .collect();

        let mut constraints = Vec::new();
        for &(a, vertex, b) in JOINT_TRIPLES {
            if let (Some(pa), Some(pv), Some(pb)) =
                (by_label.get(a), by_label.get(vertex), by_label.get(b))
            {
                let reference = landmark_angle(pa, pv, pb);
                let min = (reference - tolerance_deg).max(0.0);
                let max = (reference + tolerance_deg).min(180.0);
                constraints.push((vertex, Constraint::angle(a, vertex, b, min, max)));
            }
        }

        if constraints.is_empty() {
            return Err(PoseError::InvalidTemplate(format!(
                "{}: no complete joint in reference landmarks",
                key
            )));
        }

        let weight = 100.0 / constraints.len() as f32;
        let checks = constraints
            .into_iter()
            .map(|(vertex, c)| {
                Check::new(
                    &format!("{}_angle", vertex),
                    c,
                    weight,
                    &format!("Match the {} angle", vertex.replace('_', " ")),
                )
            })
            .collect();

        let template = Template {
            key: key.to_string(),
            display_name: display_name.to_string(),
            instructions: "Match the reference pose.".to_string(),
            kind: TemplateKind::Static,
            checks,
            target_hold_seconds,
            difficulty: Difficulty::Intermediate,
        };
        template.validate()?;
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arm(elbow_visible: bool) -> Vec<Landmark> {
        vec![
            Landmark::new("left_shoulder", 0.0, 0.0, 0.9),
            Landmark::new("left_elbow", 10.0, 0.0, 0.9).with_visible(elbow_visible),
            Landmark::new("left_wrist", 10.0, 10.0, 0.9),
        ]
    }

    #[test]
    fn test_reference_angle_window() {
        let t = Template::from_reference("custom", "Custom", &arm(true), 15.0, 5.0).unwrap();
        assert_eq!(t.checks.len(), 1);
        assert_eq!(t.checks[0].id, "left_elbow_angle");
        match &t.checks[0].constraint {
            Constraint::AngleRange { min, max, .. } => {
                assert!((min - 75.0).abs() < 1e-3);
                assert!((max - 105.0).abs() < 1e-3);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!((t.total_weight() - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_window_clamped_to_range() {
        let straight = vec![
            Landmark::new("left_hip", 0.0, 0.0, 0.9),
            Landmark::new("left_knee", 0.0, 10.0, 0.9),
            Landmark::new("left_ankle", 0.0, 20.0, 0.9),
        ];
        let t = Template::from_reference("legs", "Legs", &straight, 20.0, 5.0).unwrap();
        match &t.checks[0].constraint {
            Constraint::AngleRange { max, .. } => assert_eq!(*max, 180.0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_hidden_points_excluded() {
        let result = Template::from_reference("custom", "Custom", &arm(false), 15.0, 5.0);
        assert!(matches!(result, Err(PoseError::InvalidTemplate(_))));
    }
}
