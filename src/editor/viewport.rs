use crate::error::{PoseError, PoseResult};

/// 参照画像（正規座標）と表示サイズの対応
///
/// 点は常に正規座標で保持し、表示座標は読み出し時に計算する。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    image_width: f32,
    image_height: f32,
    display_width: f32,
    display_height: f32,
}

fn check(width: f32, height: f32) -> PoseResult<()> {
    if width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite() {
        Ok(())
    } else {
        Err(PoseError::InvalidViewport { width, height })
    }
}

impl Viewport {
    pub fn new(
        image_width: f32,
        image_height: f32,
        display_width: f32,
        display_height: f32,
    ) -> PoseResult<Self> {
        check(image_width, image_height)?;
        check(display_width, display_height)?;
        Ok(Self {
            image_width,
            image_height,
            display_width,
            display_height,
        })
    }

    /// 等倍表示
    pub fn identity(width: f32, height: f32) -> PoseResult<Self> {
        Self::new(width, height, width, height)
    }

    pub fn rescale(&mut self, display_width: f32, display_height: f32) -> PoseResult<()> {
        check(display_width, display_height)?;
        self.display_width = display_width;
        self.display_height = display_height;
        Ok(())
    }

    /// (表示 / 画像) の倍率
    pub fn scale(&self) -> (f32, f32) {
        (
            self.display_width / self.image_width,
            self.display_height / self.image_height,
        )
    }

    pub fn image_size(&self) -> (f32, f32) {
        (self.image_width, self.image_height)
    }

    pub fn display_size(&self) -> (f32, f32) {
        (self.display_width, self.display_height)
    }

    pub fn to_canonical(&self, x: f32, y: f32) -> (f32, f32) {
        let (sx, sy) = self.scale();
        (x / sx, y / sy)
    }

    pub fn to_display(&self, x: f32, y: f32) -> (f32, f32) {
        let (sx, sy) = self.scale();
        (x * sx, y * sy)
    }

    /// 正規座標を画像の範囲に収める
    pub fn clamp(&self, x: f32, y: f32) -> (f32, f32) {
        (x.clamp(0.0, self.image_width), y.clamp(0.0, self.image_height))
    }
}
