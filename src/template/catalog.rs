//! Built-in pose templates.
//!
//! The catalog is built once at startup and shared read-only (`Arc`) with
//! every consumer. Per-template weight buckets and hold targets can be
//! overridden from `[templates.<key>]` in the config file.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::constraint::{Check, Constraint, DistanceBound};
use super::definition::{Difficulty, Template, TemplateKind, TemplateSummary};
use crate::config::Config;
use crate::error::{PoseError, PoseResult};

#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: Vec<Arc<Template>>,
    index: HashMap<String, usize>,
}

impl TemplateCatalog {
    pub fn new(templates: Vec<Template>) -> PoseResult<Self> {
        let mut index = HashMap::new();
        let mut list = Vec::with_capacity(templates.len());
        for template in templates {
            template.validate()?;
            if index.insert(template.key.clone(), list.len()).is_some() {
                return Err(PoseError::InvalidTemplate(format!(
                    "duplicate template key {}",
                    template.key
                )));
            }
            list.push(Arc::new(template));
        }
        Ok(Self {
            templates: list,
            index,
        })
    }

    pub fn builtin() -> PoseResult<Self> {
        Self::new(builtin_templates())
    }

    /// 組み込みテンプレートに設定ファイルの上書きを適用する
    pub fn from_config(config: &Config) -> PoseResult<Self> {
        let mut templates = builtin_templates();
        for (key, o) in &config.templates {
            let template = templates
                .iter_mut()
                .find(|t| &t.key == key)
                .ok_or_else(|| PoseError::InvalidTemplateReference(key.clone()))?;
            let mut updated = template.with_weights(&o.weights)?;
            if let Some(seconds) = o.target_hold_seconds {
                updated.target_hold_seconds = seconds;
            }
            debug!("template {}: applied config overrides", key);
            *template = updated;
        }
        Self::new(templates)
    }

    pub fn lookup(&self, key: &str) -> Option<Arc<Template>> {
        self.index.get(key).map(|&i| self.templates[i].clone())
    }

    /// カタログ順の要約一覧
    pub fn list(&self) -> Vec<TemplateSummary> {
        self.templates.iter().map(|t| t.summary()).collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn builtin_templates() -> Vec<Template> {
    vec![
        Template {
            key: "mountain".into(),
            display_name: "Mountain".into(),
            instructions: "Stand tall with feet together and arms relaxed at your sides.".into(),
            kind: TemplateKind::Static,
            checks: vec![
                Check::new(
                    "shoulders_level",
                    Constraint::level("left_shoulder", "right_shoulder", 20.0),
                    20.0,
                    "Level your shoulders",
                ),
                Check::new(
                    "hips_level",
                    Constraint::level("left_hip", "right_hip", 20.0),
                    20.0,
                    "Level your hips",
                ),
                Check::new(
                    "feet_together",
                    Constraint::distance("left_ankle", "right_ankle", DistanceBound::AtMost(50.0)),
                    20.0,
                    "Bring your feet together",
                ),
                Check::new(
                    "left_arm_down",
                    Constraint::angle("left_hip", "left_shoulder", "left_wrist", 0.0, 40.0),
                    20.0,
                    "Relax your left arm by your side",
                ),
                Check::new(
                    "right_arm_down",
                    Constraint::angle("right_hip", "right_shoulder", "right_wrist", 0.0, 40.0),
                    20.0,
                    "Relax your right arm by your side",
                ),
            ],
            target_hold_seconds: 15.0,
            difficulty: Difficulty::Beginner,
        },
        Template {
            key: "tree".into(),
            display_name: "Tree".into(),
            instructions: "Balance on your left leg and rest your right foot on the inner left leg."
                .into(),
            kind: TemplateKind::Static,
            checks: vec![
                Check::new(
                    "standing_leg",
                    Constraint::angle("left_hip", "left_knee", "left_ankle", 160.0, 180.0),
                    25.0,
                    "Straighten your standing leg",
                ),
                Check::new(
                    "bent_knee",
                    Constraint::angle("right_hip", "right_knee", "right_ankle", 20.0, 100.0),
                    25.0,
                    "Bend your raised knee further",
                ),
                Check::new(
                    "hips_level",
                    Constraint::level("left_hip", "right_hip", 30.0),
                    25.0,
                    "Keep your hips level",
                ),
                Check::new(
                    "shoulders_level",
                    Constraint::level("left_shoulder", "right_shoulder", 30.0),
                    25.0,
                    "Keep your shoulders level",
                ),
            ],
            target_hold_seconds: 20.0,
            difficulty: Difficulty::Intermediate,
        },
        Template {
            key: "warrior_2".into(),
            display_name: "Warrior II".into(),
            instructions: "Step wide, bend the right knee over the ankle and extend both arms."
                .into(),
            kind: TemplateKind::Static,
            checks: vec![
                Check::new(
                    "front_knee",
                    Constraint::angle("right_hip", "right_knee", "right_ankle", 80.0, 120.0),
                    30.0,
                    "Bend your front knee toward 90 degrees",
                ),
                Check::new(
                    "back_leg",
                    Constraint::angle("left_hip", "left_knee", "left_ankle", 160.0, 180.0),
                    20.0,
                    "Straighten your back leg",
                ),
                Check::new(
                    "arms_level",
                    Constraint::level("left_wrist", "right_wrist", 30.0),
                    20.0,
                    "Keep both arms at the same height",
                ),
                Check::new(
                    "left_arm_raised",
                    Constraint::angle("left_hip", "left_shoulder", "left_wrist", 70.0, 110.0),
                    15.0,
                    "Raise your left arm to shoulder height",
                ),
                Check::new(
                    "right_arm_raised",
                    Constraint::angle("right_hip", "right_shoulder", "right_wrist", 70.0, 110.0),
                    15.0,
                    "Raise your right arm to shoulder height",
                ),
            ],
            target_hold_seconds: 30.0,
            difficulty: Difficulty::Intermediate,
        },
        Template {
            key: "plank".into(),
            display_name: "Plank".into(),
            instructions: "Hold a straight line from shoulders to ankles.".into(),
            kind: TemplateKind::Static,
            checks: vec![
                Check::new(
                    "body_line",
                    Constraint::angle("left_shoulder", "left_hip", "left_ankle", 160.0, 180.0),
                    50.0,
                    "Keep your body in a straight line",
                ),
                Check::new(
                    "shoulders_level",
                    Constraint::level("left_shoulder", "right_shoulder", 20.0),
                    25.0,
                    "Square your shoulders",
                ),
                Check::new(
                    "hips_level",
                    Constraint::level("left_hip", "right_hip", 20.0),
                    25.0,
                    "Square your hips",
                ),
            ],
            target_hold_seconds: 30.0,
            difficulty: Difficulty::Intermediate,
        },
        Template {
            key: "t_pose".into(),
            display_name: "T-Pose".into(),
            instructions: "Stand tall and stretch both arms straight out to the sides.".into(),
            kind: TemplateKind::Static,
            checks: vec![
                Check::new(
                    "left_arm_out",
                    Constraint::angle("left_hip", "left_shoulder", "left_wrist", 75.0, 105.0),
                    25.0,
                    "Lift your left arm to shoulder height",
                ),
                Check::new(
                    "right_arm_out",
                    Constraint::angle("right_hip", "right_shoulder", "right_wrist", 75.0, 105.0),
                    25.0,
                    "Lift your right arm to shoulder height",
                ),
                Check::new(
                    "wrists_level",
                    Constraint::level("left_wrist", "right_wrist", 30.0),
                    25.0,
                    "Keep your hands at the same height",
                ),
                Check::new(
                    "shoulders_level",
                    Constraint::level("left_shoulder", "right_shoulder", 20.0),
                    25.0,
                    "Level your shoulders",
                ),
            ],
            target_hold_seconds: 10.0,
            difficulty: Difficulty::Beginner,
        },
        Template {
            key: "squat".into(),
            display_name: "Squat".into(),
            instructions: "Feet shoulder-width apart, sit back until your thighs are near parallel."
                .into(),
            kind: TemplateKind::Static,
            checks: vec![
                Check::new(
                    "left_knee_bend",
                    Constraint::angle("left_hip", "left_knee", "left_ankle", 60.0, 110.0),
                    30.0,
                    "Bend your left knee more",
                ),
                Check::new(
                    "right_knee_bend",
                    Constraint::angle("right_hip", "right_knee", "right_ankle", 60.0, 110.0),
                    30.0,
                    "Bend your right knee more",
                ),
                Check::new(
                    "hips_level",
                    Constraint::level("left_hip", "right_hip", 25.0),
                    20.0,
                    "Keep your hips level",
                ),
                Check::new(
                    "feet_apart",
                    Constraint::distance("left_ankle", "right_ankle", DistanceBound::AtLeast(60.0)),
                    20.0,
                    "Widen your stance",
                ),
            ],
            target_hold_seconds: 15.0,
            difficulty: Difficulty::Beginner,
        },
        Template {
            key: "jumping_jack".into(),
            display_name: "Jumping Jack".into(),
            instructions: "Jump feet apart while swinging your arms overhead, then back together."
                .into(),
            kind: TemplateKind::Dynamic,
            checks: vec![
                Check::new(
                    "hands_apart",
                    Constraint::spread("left_wrist", "right_wrist", 200.0),
                    50.0,
                    "Swing your arms wider",
                ),
                Check::new(
                    "feet_apart",
                    Constraint::spread("left_ankle", "right_ankle", 100.0),
                    50.0,
                    "Jump your feet wider",
                ),
            ],
            target_hold_seconds: 10.0,
            difficulty: Difficulty::Beginner,
        },
    ]
}
