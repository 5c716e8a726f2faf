use std::sync::{Arc, Mutex};

/// RGB フレーム（読み取り専用、アダプタは呼び出し後に保持しない）
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// RGB8 (width * height * 3)
    pub data: Arc<[u8]>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            data: data.into(),
        }
    }

    /// 指定サイズの黒フレーム
    pub fn blank(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * 3;
        Self::new(width, height, vec![0u8; len])
    }

    /// 寸法とバッファ長が揃っていれば検出に使える
    pub fn is_ready(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == self.width as usize * self.height as usize * 3
    }

    /// (x, y) の RGB 値
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 3;
        let px = self.data.get(i..i + 3)?;
        Some([px[0], px[1], px[2]])
    }
}

/// プル型のフレーム供給元。まだ準備できていなければ None
pub trait FrameSource {
    fn latest(&mut self) -> Option<Frame>;
}

/// カメラ側スレッドが書き込み、ティック側が最新フレームを読むスロット
#[derive(Clone, Default)]
pub struct FrameSlot {
    latest: Arc<Mutex<Option<Frame>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新しいフレームを書き込む
    pub fn publish(&self, frame: Frame) {
        if let Ok(mut guard) = self.latest.lock() {
            *guard = Some(frame);
        }
    }

    /// 最新フレームを取得。初回フレーム到着前のみNone。
    pub fn get_frame(&self) -> Option<Frame> {
        self.latest.lock().ok().and_then(|guard| guard.clone())
    }
}

impl FrameSource for FrameSlot {
    fn latest(&mut self) -> Option<Frame> {
        self.get_frame()
    }
}

/// 常に同じサイズの黒フレームを返すソース（リプレイ用）
pub struct BlankSource {
    frame: Frame,
}

impl BlankSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            frame: Frame::blank(width, height),
        }
    }
}

impl FrameSource for BlankSource {
    fn latest(&mut self) -> Option<Frame> {
        Some(self.frame.clone())
    }
}
