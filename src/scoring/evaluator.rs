//! Scores one landmark frame against one template.
//!
//! Each check is evaluated independently. A check referencing a landmark that
//! is absent or below `min_confidence` is skipped: it is removed from both the
//! numerator and the denominator of the weighted accuracy.

use serde::Serialize;

use super::geometry::{delta_y, distance, landmark_angle};
use crate::config::ScoringConfig;
use crate::error::{PoseError, PoseResult};
use crate::pose::{Landmark, LandmarkFrame};
use crate::template::{Constraint, DistanceBound, Template, TemplateCatalog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Satisfied,
    Unsatisfied,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckOutcome {
    pub id: String,
    pub status: CheckStatus,
    /// 計測値（角度・距離・Y差）。スキップ時は None
    pub measured: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub template_key: String,
    pub per_constraint: Vec<CheckOutcome>,
    /// 0〜100
    pub accuracy: f32,
    pub feedback: Vec<String>,
}

impl EvaluationResult {
    pub fn evaluable_count(&self) -> usize {
        self.per_constraint
            .iter()
            .filter(|c| c.status != CheckStatus::Skipped)
            .count()
    }

    pub fn satisfied_count(&self) -> usize {
        self.per_constraint
            .iter()
            .filter(|c| c.status == CheckStatus::Satisfied)
            .count()
    }

    pub fn status_of(&self, id: &str) -> Option<CheckStatus> {
        self.per_constraint
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.status)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Evaluator {
    min_confidence: f32,
}

impl Evaluator {
    pub fn new(min_confidence: f32) -> Self {
        Self { min_confidence }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self::new(config.min_confidence)
    }

    /// カタログのキーで評価する。未知のキーはエラー
    pub fn evaluate_key(
        &self,
        frame: &LandmarkFrame,
        catalog: &TemplateCatalog,
        key: &str,
    ) -> PoseResult<EvaluationResult> {
        let template = catalog
            .lookup(key)
            .ok_or_else(|| PoseError::InvalidTemplateReference(key.to_string()))?;
        Ok(self.evaluate(frame, &template))
    }

    pub fn evaluate(&self, frame: &LandmarkFrame, template: &Template) -> EvaluationResult {
        let mut per_constraint = Vec::with_capacity(template.checks.len());
        let mut feedback = Vec::new();
        let mut evaluable_weight = 0.0f32;
        let mut satisfied_weight = 0.0f32;

        for check in &template.checks {
            let outcome = match self.measure(frame, &check.constraint) {
                Ok((passed, value)) => {
                    evaluable_weight += check.weight;
                    if passed {
                        satisfied_weight += check.weight;
                    } else {
                        feedback.push(check.hint.clone());
                    }
                    CheckOutcome {
                        id: check.id.clone(),
                        status: if passed {
                            CheckStatus::Satisfied
                        } else {
                            CheckStatus::Unsatisfied
                        },
                        measured: Some(value),
                    }
                }
                Err(missing) => {
                    let msg = format!("Move so your {} is visible", missing.replace('_', " "));
                    if !feedback.contains(&msg) {
                        feedback.push(msg);
                    }
                    CheckOutcome {
                        id: check.id.clone(),
                        status: CheckStatus::Skipped,
                        measured: None,
                    }
                }
            };
            per_constraint.push(outcome);
        }

        let accuracy = if evaluable_weight > 0.0 {
            (100.0 * satisfied_weight / evaluable_weight).clamp(0.0, 100.0)
        } else {
            0.0
        };

        if frame.is_empty() {
            feedback = vec!["No person detected".to_string()];
        }

        EvaluationResult {
            template_key: template.key.clone(),
            per_constraint,
            accuracy,
            feedback,
        }
    }

    fn point<'a>(&self, frame: &'a LandmarkFrame, label: &'a str) -> Result<&'a Landmark, &'a str> {
        frame.confident(label, self.min_confidence).ok_or(label)
    }

    /// (合否, 計測値)。評価できなければ足りないラベルを返す
    fn measure<'a>(
        &self,
        frame: &'a LandmarkFrame,
        constraint: &'a Constraint,
    ) -> Result<(bool, f32), &'a str> {
        match constraint {
            Constraint::AngleRange { a, vertex, b, min, max } => {
                let pa = self.point(frame, a)?;
                let pv = self.point(frame, vertex)?;
                let pb = self.point(frame, b)?;
                let angle = landmark_angle(pa, pv, pb);
                Ok((angle >= *min && angle <= *max, angle))
            }
            Constraint::HeightLevel { a, b, max_delta_y } => {
                let pa = self.point(frame, a)?;
                let pb = self.point(frame, b)?;
                let dy = delta_y(pa, pb);
                Ok((dy < *max_delta_y, dy))
            }
            Constraint::Distance { a, b, bound } => {
                let pa = self.point(frame, a)?;
                let pb = self.point(frame, b)?;
                let d = distance((pa.x, pa.y), (pb.x, pb.y));
                let passed = match bound {
                    DistanceBound::AtLeast(min) => d >= *min,
                    DistanceBound::AtMost(max) => d <= *max,
                };
                Ok((passed, d))
            }
            Constraint::InstantSpread { a, b, threshold } => {
                let pa = self.point(frame, a)?;
                let pb = self.point(frame, b)?;
                let d = distance((pa.x, pa.y), (pb.x, pb.y));
                Ok((d > *threshold, d))
            }
        }
    }
}
