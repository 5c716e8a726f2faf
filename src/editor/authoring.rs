//! Interactive keypoint authoring against a static reference image.
//!
//! Pointer positions arrive in display pixels. Every mutation converts them
//! through the current [`Viewport`] so the stored landmarks are always in
//! canonical image space, whatever the display scale is.

use serde::Serialize;
use tracing::{debug, warn};

use super::viewport::Viewport;
use crate::config::EditorConfig;
use crate::error::{PoseError, PoseResult};
use crate::pose::{Landmark, LandmarkCatalog, LandmarkFrame};
use crate::render::{visible_segments, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    #[default]
    Move,
    Add,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    /// 右クリック等: ツールに関係なく削除
    Secondary,
}

/// pointer_down の結果
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    Nothing,
    Selected(String),
    /// 追加候補のラベル（未配置のもののみ）
    PickerOpened(Vec<&'static str>),
    Deleted(Landmark),
    /// ドラッグ中の押下は無視する
    Busy,
}

/// 追加位置が決まり、ラベル選択待ちの状態
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPlacement {
    /// 正規座標
    pub position: (f32, f32),
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    index: usize,
    /// 押下位置から点までのずれ（正規座標）
    offset: (f32, f32),
}

#[derive(Debug, Clone)]
pub struct KeypointEditor {
    landmarks: Vec<Landmark>,
    catalog: LandmarkCatalog,
    tool: Tool,
    selected: Option<usize>,
    drag: Option<Drag>,
    pending: Option<PendingPlacement>,
    viewport: Viewport,
    config: EditorConfig,
}

impl KeypointEditor {
    pub fn new(viewport: Viewport, catalog: LandmarkCatalog, config: EditorConfig) -> Self {
        Self {
            landmarks: Vec::new(),
            catalog,
            tool: Tool::default(),
            selected: None,
            drag: None,
            pending: None,
            viewport,
            config,
        }
    }

    /// 既存の検出結果を修正するモード
    pub fn with_landmarks(
        viewport: Viewport,
        catalog: LandmarkCatalog,
        config: EditorConfig,
        landmarks: Vec<Landmark>,
    ) -> PoseResult<Self> {
        let mut editor = Self::new(viewport, catalog, config);
        for lm in landmarks {
            if editor.position_of(&lm.label).is_some() {
                return Err(PoseError::DuplicateLabelAdd(lm.label));
            }
            editor.landmarks.push(lm);
        }
        Ok(editor)
    }

    pub fn from_frame(
        viewport: Viewport,
        catalog: LandmarkCatalog,
        config: EditorConfig,
        frame: &LandmarkFrame,
    ) -> Self {
        let mut editor = Self::new(viewport, catalog, config);
        editor.landmarks = frame.to_vec();
        editor
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// ツール切り替えで進行中の操作は破棄する
    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
        self.drag = None;
        self.pending = None;
    }

    pub fn catalog(&self) -> LandmarkCatalog {
        self.catalog
    }

    /// 配置済みの点はそのまま残る
    pub fn set_catalog(&mut self, catalog: LandmarkCatalog) {
        debug!("editor catalog -> {:?}", catalog);
        self.catalog = catalog;
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn rescale(&mut self, display_width: f32, display_height: f32) -> PoseResult<()> {
        self.viewport.rescale(display_width, display_height)
    }

    /// 追加ピッカーに出すラベル（未配置のもの）
    pub fn available_labels(&self) -> Vec<&'static str> {
        self.catalog
            .labels()
            .iter()
            .copied()
            .filter(|label| self.position_of(label).is_none())
            .collect()
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    pub fn selected(&self) -> Option<&Landmark> {
        self.selected.and_then(|i| self.landmarks.get(i))
    }

    pub fn pending(&self) -> Option<&PendingPlacement> {
        self.pending.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// 表示座標での (ラベル, x, y)
    pub fn display_points(&self) -> Vec<(&str, f32, f32)> {
        self.landmarks
            .iter()
            .map(|lm| {
                let (x, y) = self.viewport.to_display(lm.x, lm.y);
                (lm.label.as_str(), x, y)
            })
            .collect()
    }

    /// 表示中の隣接ペア（正規座標）
    pub fn segments(&self) -> Vec<Segment> {
        visible_segments(&self.landmarks, self.catalog)
    }

    fn position_of(&self, label: &str) -> Option<usize> {
        self.landmarks.iter().position(|lm| lm.label == label)
    }

    /// 表示座標で当たり半径内にある最も近い点
    pub fn hit_test(&self, x: f32, y: f32) -> Option<usize> {
        let radius = self.config.hit_radius;
        self.landmarks
            .iter()
            .enumerate()
            .filter_map(|(i, lm)| {
                let (dx, dy) = self.viewport.to_display(lm.x, lm.y);
                let d = ((dx - x).powi(2) + (dy - y).powi(2)).sqrt();
                (d <= radius).then_some((i, d))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    fn remove(&mut self, index: usize) -> Landmark {
        self.selected = None;
        self.drag = None;
        let removed = self.landmarks.remove(index);
        debug!("removed {}", removed.label);
        removed
    }

    pub fn pointer_down(&mut self, button: PointerButton, x: f32, y: f32) -> EditorEvent {
        if self.drag.is_some() {
            return EditorEvent::Busy;
        }
        let hit = self.hit_test(x, y);

        if button == PointerButton::Secondary {
            return match hit {
                Some(i) => EditorEvent::Deleted(self.remove(i)),
                None => EditorEvent::Nothing,
            };
        }

        match self.tool {
            Tool::Move => match hit {
                Some(index) => {
                    let (cx, cy) = self.viewport.to_canonical(x, y);
                    let lm = &self.landmarks[index];
                    self.drag = Some(Drag {
                        index,
                        offset: (lm.x - cx, lm.y - cy),
                    });
                    self.selected = Some(index);
                    EditorEvent::Selected(lm.label.clone())
                }
                None => {
                    self.selected = None;
                    EditorEvent::Nothing
                }
            },
            Tool::Add => {
                let options = self.available_labels();
                if options.is_empty() {
                    return EditorEvent::Nothing;
                }
                let (cx, cy) = self.viewport.to_canonical(x, y);
                self.pending = Some(PendingPlacement {
                    position: self.viewport.clamp(cx, cy),
                });
                EditorEvent::PickerOpened(options)
            }
            Tool::Delete => match hit {
                Some(i) => EditorEvent::Deleted(self.remove(i)),
                None => EditorEvent::Nothing,
            },
        }
    }

    /// ドラッグ中なら点を動かす。動いたら true
    pub fn pointer_move(&mut self, x: f32, y: f32) -> bool {
        let Some(drag) = self.drag else {
            return false;
        };
        let (cx, cy) = self.viewport.to_canonical(x, y);
        let (nx, ny) = self
            .viewport
            .clamp(cx + drag.offset.0, cy + drag.offset.1);
        match self.landmarks.get_mut(drag.index) {
            Some(lm) => {
                lm.x = nx;
                lm.y = ny;
                true
            }
            None => {
                self.drag = None;
                false
            }
        }
    }

    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    /// ピッカーで選んだラベルで点を確定する
    pub fn confirm_add(&mut self, label: &str) -> PoseResult<&Landmark> {
        let pending = self.pending.clone().ok_or(PoseError::NoPendingPlacement)?;
        if !self.catalog.contains(label) {
            warn!("rejected add of unknown label {}", label);
            return Err(PoseError::UnknownLabel(label.to_string()));
        }
        if self.position_of(label).is_some() {
            warn!("rejected duplicate add of {}", label);
            return Err(PoseError::DuplicateLabelAdd(label.to_string()));
        }
        self.pending = None;
        let (x, y) = pending.position;
        self.landmarks
            .push(Landmark::new(label, x, y, self.config.default_confidence));
        let index = self.landmarks.len() - 1;
        self.selected = Some(index);
        Ok(&self.landmarks[index])
    }

    pub fn cancel_add(&mut self) {
        self.pending = None;
    }

    /// キーボードの削除
    pub fn delete_selected(&mut self) -> Option<Landmark> {
        let index = self.selected?;
        (index < self.landmarks.len()).then(|| self.remove(index))
    }

    pub fn set_visible(&mut self, label: &str, visible: bool) -> PoseResult<()> {
        let index = self
            .position_of(label)
            .ok_or_else(|| PoseError::UnknownLabel(label.to_string()))?;
        self.landmarks[index].visible = visible;
        Ok(())
    }

    /// 保存用の正規座標リスト
    pub fn finalize(self) -> Vec<Landmark> {
        self.landmarks
    }
}
