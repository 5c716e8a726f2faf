use serde::Serialize;

/// 距離制約の向き
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceBound {
    AtLeast(f32),
    AtMost(f32),
}

/// 1つの幾何ルール。ラベルは正規ラベル (`left_shoulder` など)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Constraint {
    /// `vertex` における `a`-`vertex`-`b` の角度が [min, max] 度
    AngleRange {
        a: String,
        vertex: String,
        b: String,
        min: f32,
        max: f32,
    },
    /// 2点のY差が `max_delta_y` 未満
    HeightLevel {
        a: String,
        b: String,
        max_delta_y: f32,
    },
    /// 2点間のユークリッド距離の上限・下限
    Distance {
        a: String,
        b: String,
        bound: DistanceBound,
    },
    /// 瞬間的な開き具合: 2点間の距離が `threshold` を超える
    InstantSpread {
        a: String,
        b: String,
        threshold: f32,
    },
}

impl Constraint {
    pub fn angle(a: &str, vertex: &str, b: &str, min: f32, max: f32) -> Self {
        Constraint::AngleRange {
            a: a.to_string(),
            vertex: vertex.to_string(),
            b: b.to_string(),
            min,
            max,
        }
    }

    pub fn level(a: &str, b: &str, max_delta_y: f32) -> Self {
        Constraint::HeightLevel {
            a: a.to_string(),
            b: b.to_string(),
            max_delta_y,
        }
    }

    pub fn distance(a: &str, b: &str, bound: DistanceBound) -> Self {
        Constraint::Distance {
            a: a.to_string(),
            b: b.to_string(),
            bound,
        }
    }

    pub fn spread(a: &str, b: &str, threshold: f32) -> Self {
        Constraint::InstantSpread {
            a: a.to_string(),
            b: b.to_string(),
            threshold,
        }
    }

    /// 参照するランドマークのラベル
    pub fn labels(&self) -> Vec<&str> {
        match self {
            Constraint::AngleRange { a, vertex, b, .. } => vec![a.as_str(), vertex.as_str(), b.as_str()],
            Constraint::HeightLevel { a, b, .. }
            | Constraint::Distance { a, b, .. }
            | Constraint::InstantSpread { a, b, .. } => vec![a.as_str(), b.as_str()],
        }
    }

    pub fn is_spread(&self) -> bool {
        matches!(self, Constraint::InstantSpread { .. })
    }
}

/// テンプレート内の1チェック: 制約 + 重み + 失敗時のヒント
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Check {
    pub id: String,
    pub constraint: Constraint,
    /// 精度に占める割合（テンプレート内で合計100）
    pub weight: f32,
    pub hint: String,
}

impl Check {
    pub fn new(id: &str, constraint: Constraint, weight: f32, hint: &str) -> Self {
        Self {
            id: id.to_string(),
            constraint,
            weight,
            hint: hint.to_string(),
        }
    }
}
