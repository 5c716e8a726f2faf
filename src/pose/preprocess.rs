use ndarray::Array4;

use crate::camera::Frame;
use crate::error::{PoseError, PoseResult};

/// MoveNet用の入力サイズ
pub const MOVENET_INPUT_SIZE: usize = 192;

/// RGB フレームを MoveNet用の入力テンソルに変換
///
/// - 192x192 に最近傍リサイズ
/// - [1, 192, 192, 3] の f32 テンソル (0.0-255.0)
pub fn preprocess_for_movenet(frame: &Frame) -> PoseResult<Array4<f32>> {
    if !frame.is_ready() {
        return Err(PoseError::MalformedFrame(format!(
            "{}x{} frame with {} bytes",
            frame.width,
            frame.height,
            frame.data.len()
        )));
    }

    let size = MOVENET_INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, size, size, 3));
    let sx = frame.width as f32 / size as f32;
    let sy = frame.height as f32 / size as f32;

    for y in 0..size {
        let src_y = ((y as f32 + 0.5) * sy) as u32;
        for x in 0..size {
            let src_x = ((x as f32 + 0.5) * sx) as u32;
            let pixel = frame
                .pixel(src_x.min(frame.width - 1), src_y.min(frame.height - 1))
                .unwrap_or([0, 0, 0]);
            tensor[[0, y, x, 0]] = pixel[0] as f32;
            tensor[[0, y, x, 1]] = pixel[1] as f32;
            tensor[[0, y, x, 2]] = pixel[2] as f32;
        }
    }

    Ok(tensor)
}
