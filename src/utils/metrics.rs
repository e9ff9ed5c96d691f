use serde::{Deserialize, Serialize};

/// Aggregate ranking quality over a set of evaluated users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingSummary {
    pub hit_rate: f32,
    pub mrr: f32,
    pub soft_mrr: f32,
    pub evaluated_users: usize,
    pub skipped_users: usize,
}

/// Per-list ranking metrics against a single held-out item.
#[derive(Debug, Clone)]
pub struct RankingMetrics {
    k: usize,
}

impl RankingMetrics {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// 0-indexed position of `target` within the first `k` entries of
    /// `ranked`, if present.
    pub fn position(&self, ranked: &[usize], target: usize) -> Option<usize> {
        ranked.iter().take(self.k).position(|&item| item == target)
    }

    /// 1 if `target` appears in the top `k` of `ranked`, else 0.
    pub fn hit_at_k(&self, ranked: &[usize], target: usize) -> u8 {
        if self.position(ranked, target).is_some() {
            1
        } else {
            0
        }
    }

    /// Reciprocal rank `1/(p+1)` of `target` in the top `k`, 0 when absent.
    pub fn reciprocal_rank(&self, ranked: &[usize], target: usize) -> f32 {
        match self.position(ranked, target) {
            Some(p) => 1.0 / (p as f32 + 1.0),
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_at_k() {
        let metrics = RankingMetrics::new(3);
        let ranked = vec![7, 3, 9, 1];

        assert_eq!(metrics.hit_at_k(&ranked, 3), 1);
        // Item 1 is ranked fourth, outside k = 3.
        assert_eq!(metrics.hit_at_k(&ranked, 1), 0);
        assert_eq!(metrics.hit_at_k(&ranked, 42), 0);
    }

    #[test]
    fn test_reciprocal_rank() {
        let metrics = RankingMetrics::new(10);
        let ranked = vec![7, 3, 9];

        assert!((metrics.reciprocal_rank(&ranked, 7) - 1.0).abs() < 1e-6);
        assert!((metrics.reciprocal_rank(&ranked, 3) - 0.5).abs() < 1e-6);
        assert!((metrics.reciprocal_rank(&ranked, 9) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(metrics.reciprocal_rank(&ranked, 42), 0.0);
    }

    #[test]
    fn test_hit_monotone_in_k() {
        let ranked = vec![5, 8, 2, 6, 4];
        let target = 6;

        let mut previous = 0;
        for k in 1..=ranked.len() {
            let hit = RankingMetrics::new(k).hit_at_k(&ranked, target);
            assert!(hit >= previous);
            previous = hit;
        }
        assert_eq!(previous, 1);
    }
}
