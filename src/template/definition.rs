use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::constraint::{Check, Constraint};
use crate::error::{PoseError, PoseResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

/// 静止ポーズか、毎フレームの開き具合で判定する動的ポーズか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Static,
    Dynamic,
}

/// ポーズテンプレート
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    pub key: String,
    pub display_name: String,
    pub instructions: String,
    pub kind: TemplateKind,
    pub checks: Vec<Check>,
    pub target_hold_seconds: f32,
    pub difficulty: Difficulty,
}

/// 一覧表示用の要約
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateSummary {
    pub key: String,
    pub display_name: String,
    pub difficulty: Difficulty,
    pub kind: TemplateKind,
    pub target_hold_seconds: f32,
    pub constraint_count: usize,
}

impl Template {
    pub fn total_weight(&self) -> f32 {
        self.checks.iter().map(|c| c.weight).sum()
    }

    pub fn summary(&self) -> TemplateSummary {
        TemplateSummary {
            key: self.key.clone(),
            display_name: self.display_name.clone(),
            difficulty: self.difficulty,
            kind: self.kind,
            target_hold_seconds: self.target_hold_seconds,
            constraint_count: self.checks.len(),
        }
    }

    pub fn validate(&self) -> PoseResult<()> {
        let invalid = |msg: String| Err(PoseError::InvalidTemplate(format!("{}: {}", self.key, msg)));

        if self.checks.is_empty() {
            return invalid("no constraints".into());
        }
        if !(self.target_hold_seconds > 0.0) {
            return invalid("target_hold_seconds must be positive".into());
        }
        let mut ids = HashSet::new();
        for check in &self.checks {
            if !ids.insert(check.id.as_str()) {
                return invalid(format!("duplicate constraint id {}", check.id));
            }
            if !(check.weight >= 0.0) || !check.weight.is_finite() {
                return invalid(format!("{} has a negative weight", check.id));
            }
            if let Constraint::AngleRange { min, max, .. } = check.constraint {
                if !(0.0..=180.0).contains(&min) || !(0.0..=180.0).contains(&max) || min > max {
                    return invalid(format!("{} has an invalid angle window", check.id));
                }
            }
            if self.kind == TemplateKind::Dynamic && !check.constraint.is_spread() {
                return invalid(format!("{} is not an instant-spread check", check.id));
            }
        }
        if self.total_weight() <= 0.0 {
            return invalid("weights sum to zero".into());
        }
        Ok(())
    }

    /// 制約IDごとの重みを差し替えたコピーを返す。未知のIDはエラー
    pub fn with_weights(&self, weights: &HashMap<String, f32>) -> PoseResult<Template> {
        let mut template = self.clone();
        for (id, weight) in weights {
            let check = template
                .checks
                .iter_mut()
                .find(|c| &c.id == id)
                .ok_or_else(|| {
                    PoseError::InvalidTemplate(format!("{}: unknown constraint {}", self.key, id))
                })?;
            check.weight = *weight;
        }
        template.validate()?;
        Ok(template)
    }
}
