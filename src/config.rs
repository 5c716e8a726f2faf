use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub recognition: RecognitionConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    /// テンプレートごとの上書き設定 (`[templates.plank]`)
    #[serde(default)]
    pub templates: HashMap<String, TemplateOverride>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// 表示映像に合わせてX軸を反転する
    #[serde(default = "default_mirror_x")]
    pub mirror_x: bool,
    /// バックエンドが信頼度を返さない場合に使う値
    #[serde(default = "default_fallback_confidence")]
    pub fallback_confidence: f32,
    /// バックエンド初期化のタイムアウト（ミリ秒）
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// 1回の推論の上限（ミリ秒）。ティック周期とは別で、応答しないバックエンドだけを打ち切る
    #[serde(default = "default_detect_timeout_ms")]
    pub detect_timeout_ms: u64,
    /// 検出ありのティックレート
    #[serde(default = "default_detect_fps")]
    pub detect_fps: u32,
    /// プレビューのみのティックレート
    #[serde(default = "default_preview_fps")]
    pub preview_fps: u32,
}

fn default_mirror_x() -> bool { true }
fn default_fallback_confidence() -> f32 { 0.9 }
fn default_probe_timeout_ms() -> u64 { 3000 }
fn default_detect_timeout_ms() -> u64 { 2000 }
fn default_detect_fps() -> u32 { 30 }
fn default_preview_fps() -> u32 { 10 }

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            mirror_x: default_mirror_x(),
            fallback_confidence: default_fallback_confidence(),
            probe_timeout_ms: default_probe_timeout_ms(),
            detect_timeout_ms: default_detect_timeout_ms(),
            detect_fps: default_detect_fps(),
            preview_fps: default_preview_fps(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// これ未満のランドマークは評価対象外
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// ホールドタイマーが動く精度の閾値（%）
    #[serde(default = "default_hold_threshold")]
    pub hold_threshold: f32,
    /// 安定度を計算するフレーム数
    #[serde(default = "default_stability_window")]
    pub stability_window: usize,
    /// 保持する履歴フレーム数
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,
    #[serde(default = "default_accuracy_weight")]
    pub accuracy_weight: f32,
    #[serde(default = "default_stability_weight")]
    pub stability_weight: f32,
    #[serde(default = "default_duration_weight")]
    pub duration_weight: f32,
}

fn default_min_confidence() -> f32 { 0.5 }
fn default_hold_threshold() -> f32 { 70.0 }
fn default_stability_window() -> usize { 10 }
fn default_history_depth() -> usize { 30 }
fn default_accuracy_weight() -> f32 { 0.5 }
fn default_stability_weight() -> f32 { 0.3 }
fn default_duration_weight() -> f32 { 0.2 }

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            hold_threshold: default_hold_threshold(),
            stability_window: default_stability_window(),
            history_depth: default_history_depth(),
            accuracy_weight: default_accuracy_weight(),
            stability_weight: default_stability_weight(),
            duration_weight: default_duration_weight(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecognitionConfig {
    /// 左右ペアを「水平」とみなすY差（ピクセル）
    #[serde(default = "default_level_tolerance")]
    pub level_tolerance: f32,
    /// 両足首を「揃っている」とみなす距離（ピクセル）
    #[serde(default = "default_feet_together")]
    pub feet_together: f32,
    /// 腕を「下ろしている」とみなす腕-体幹角度の上限（度）
    #[serde(default = "default_arm_down_max_deg")]
    pub arm_down_max_deg: f32,
    /// これ未満の一致度は「該当なし」
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f32,
}

fn default_level_tolerance() -> f32 { 30.0 }
fn default_feet_together() -> f32 { 50.0 }
fn default_arm_down_max_deg() -> f32 { 40.0 }
fn default_confidence_floor() -> f32 { 0.6 }

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            level_tolerance: default_level_tolerance(),
            feet_together: default_feet_together(),
            arm_down_max_deg: default_arm_down_max_deg(),
            confidence_floor: default_confidence_floor(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditorConfig {
    /// 当たり判定の半径（表示ピクセル）
    #[serde(default = "default_hit_radius")]
    pub hit_radius: f32,
    /// 手動追加した点の信頼度
    #[serde(default = "default_point_confidence")]
    pub default_confidence: f32,
}

fn default_hit_radius() -> f32 { 10.0 }
fn default_point_confidence() -> f32 { 0.9 }

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            hit_radius: default_hit_radius(),
            default_confidence: default_point_confidence(),
        }
    }
}

/// テンプレートの制約重み・目標時間の上書き
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateOverride {
    /// 制約ID → 重み（合計100を想定）
    #[serde(default)]
    pub weights: HashMap<String, f32>,
    #[serde(default)]
    pub target_hold_seconds: Option<f32>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// 読み込みに失敗したらデフォルト設定を返す
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                warn!("config {} not used ({:#}); falling back to defaults", path.as_ref().display(), e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.scoring;
        if s.stability_window < 2 {
            bail!("scoring.stability_window must be at least 2");
        }
        if s.stability_window > s.history_depth {
            bail!(
                "scoring.stability_window ({}) exceeds scoring.history_depth ({})",
                s.stability_window,
                s.history_depth
            );
        }
        if !(0.0..=1.0).contains(&s.min_confidence) {
            bail!("scoring.min_confidence must be within [0, 1]");
        }
        if !(0.0..=100.0).contains(&s.hold_threshold) {
            bail!("scoring.hold_threshold must be within [0, 100]");
        }
        let weight_sum = s.accuracy_weight + s.stability_weight + s.duration_weight;
        if (weight_sum - 1.0).abs() > 1e-3 {
            bail!("scoring weights must sum to 1.0 (got {})", weight_sum);
        }

        let d = &self.detection;
        if d.detect_fps == 0 || d.preview_fps == 0 {
            bail!("detection fps must be positive");
        }
        if d.detect_timeout_ms == 0 {
            bail!("detection.detect_timeout_ms must be positive");
        }
        if !(0.0..=1.0).contains(&d.fallback_confidence) {
            bail!("detection.fallback_confidence must be within [0, 1]");
        }

        if self.editor.hit_radius <= 0.0 {
            bail!("editor.hit_radius must be positive");
        }
        if !(0.0..=1.0).contains(&self.recognition.confidence_floor) {
            bail!("recognition.confidence_floor must be within [0, 1]");
        }

        for (key, o) in &self.templates {
            if o.weights.values().any(|w| *w < 0.0 || !w.is_finite()) {
                bail!("templates.{}: weights must be non-negative", key);
            }
            if let Some(t) = o.target_hold_seconds {
                if t <= 0.0 {
                    bail!("templates.{}: target_hold_seconds must be positive", key);
                }
            }
        }
        Ok(())
    }
}
