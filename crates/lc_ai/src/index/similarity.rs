use lc_core::config::DistanceMetric;

pub fn l2_norm(v: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for x in v {
        sum += x * x;
    }
    sum.sqrt()
}

pub fn cosine_similarity(a: &[f32], b: &[f32], a_norm: f32, b_norm: f32) -> f32 {
    let mut dot = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
    }
    dot / (a_norm * b_norm)
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        let d = x - y;
        sum += d * d;
    }
    sum
}

/// Distance between two equal-length vectors; smaller is closer and never negative.
pub fn distance(metric: DistanceMetric, query: &[f32], query_norm: f32, v: &[f32]) -> f32 {
    match metric {
        DistanceMetric::L2 => squared_l2(query, v),
        DistanceMetric::Cosine => {
            let v_norm = l2_norm(v);
            if query_norm == 0.0 || v_norm == 0.0 {
                // Zero vectors carry no direction: treat as orthogonal.
                return 1.0;
            }
            (1.0 - cosine_similarity(query, v, query_norm, v_norm)).max(0.0)
        }
    }
}
