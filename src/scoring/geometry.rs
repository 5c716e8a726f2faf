use crate::pose::Landmark;

/// 頂点 `vertex` における a-vertex-b の角度（度, 0〜180）
///
/// 2本の atan2 の差を取り、大きさを [0, 180] に畳み込む。
pub fn angle_deg(a: (f32, f32), vertex: (f32, f32), b: (f32, f32)) -> f32 {
    let ang_a = (a.1 - vertex.1).atan2(a.0 - vertex.0);
    let ang_b = (b.1 - vertex.1).atan2(b.0 - vertex.0);
    let mut deg = (ang_b - ang_a).to_degrees().abs();
    if deg > 180.0 {
        deg = 360.0 - deg;
    }
    deg.clamp(0.0, 180.0)
}

pub fn landmark_angle(a: &Landmark, vertex: &Landmark, b: &Landmark) -> f32 {
    angle_deg((a.x, a.y), (vertex.x, vertex.y), (b.x, b.y))
}

pub fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

/// 2点のY差の絶対値
pub fn delta_y(a: &Landmark, b: &Landmark) -> f32 {
    (a.y - b.y).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_right_angle() {
        let deg = angle_deg((1.0, 0.0), (0.0, 0.0), (0.0, 1.0));
        assert!(approx_eq(deg, 90.0, 1e-4));
    }

    #[test]
    fn test_straight_line() {
        let deg = angle_deg((-1.0, 0.0), (0.0, 0.0), (1.0, 0.0));
        assert!(approx_eq(deg, 180.0, 1e-4));
    }

    #[test]
    fn test_wraparound_folded() {
        // atan2 の差が 180 を超えるケース: 170° と -170° の間は 20°
        let a = (170f32.to_radians().cos(), 170f32.to_radians().sin());
        let b = ((-170f32).to_radians().cos(), (-170f32).to_radians().sin());
        assert!(approx_eq(angle_deg(a, (0.0, 0.0), b), 20.0, 1e-3));
    }

    #[test]
    fn test_angle_symmetric() {
        let cases = [
            ((3.0, 4.0), (0.0, 0.0), (-2.0, 7.0)),
            ((100.0, 200.0), (150.0, 260.0), (90.0, 400.0)),
            ((-5.0, -5.0), (1.0, 2.0), (10.0, -3.0)),
        ];
        for (a, v, b) in cases {
            assert!(approx_eq(angle_deg(a, v, b), angle_deg(b, v, a), 1e-4));
            let deg = angle_deg(a, v, b);
            assert!((0.0..=180.0).contains(&deg));
        }
    }

    #[test]
    fn test_distance_and_delta_y() {
        assert!(approx_eq(distance((0.0, 0.0), (3.0, 4.0)), 5.0, 1e-6));
        let a = Landmark::new("a", 0.0, 10.0, 1.0);
        let b = Landmark::new("b", 0.0, 4.0, 1.0);
        assert_eq!(delta_y(&a, &b), 6.0);
    }
}
