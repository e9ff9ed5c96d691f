use crate::models::UserId;
use crate::utils::{cosine_similarity, pearson_correlation};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Pearson and cosine agreement between a method's scores and the CTR
/// baseline, both computed on absolute values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MethodSimilarity {
    pub pearson: f32,
    pub cosine: f32,
}

/// Correlates the CTR baseline against one or more named evaluation-method
/// score mappings.
#[derive(Debug, Clone, Default)]
pub struct SimilarityComparator;

impl SimilarityComparator {
    pub fn new() -> Self {
        Self
    }

    /// Restricts every mapping to the common user intersection, then
    /// compares the sign-stripped score vectors method by method.
    pub fn compare(
        &self,
        ctr: &BTreeMap<UserId, f32>,
        methods: &BTreeMap<String, BTreeMap<UserId, f32>>,
    ) -> BTreeMap<String, MethodSimilarity> {
        let mut common: Vec<UserId> = ctr.keys().copied().collect();
        for scores in methods.values() {
            common.retain(|user| scores.contains_key(user));
        }

        if common.is_empty() {
            warn!("no common users between CTR and method scores");
            return methods
                .keys()
                .map(|name| {
                    (
                        name.clone(),
                        MethodSimilarity {
                            pearson: 0.0,
                            cosine: 0.0,
                        },
                    )
                })
                .collect();
        }

        let ctr_vector: Vec<f32> = common.iter().map(|user| ctr[user].abs()).collect();

        let mut results = BTreeMap::new();
        for (name, scores) in methods {
            let method_vector: Vec<f32> = common.iter().map(|user| scores[user].abs()).collect();

            let similarity = MethodSimilarity {
                pearson: pearson_correlation(&ctr_vector, &method_vector),
                cosine: cosine_similarity(&ctr_vector, &method_vector),
            };

            info!(
                method = name.as_str(),
                users = common.len(),
                pearson = similarity.pearson,
                cosine = similarity.cosine,
                "compared method against CTR baseline"
            );
            results.insert(name.clone(), similarity);
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(pairs: &[(UserId, f32)]) -> BTreeMap<UserId, f32> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_intersection_drops_unshared_users() {
        let ctr = scores(&[(1, 0.5), (2, 0.25), (3, 1.0)]);
        let methods = BTreeMap::from([
            ("bpr".to_string(), scores(&[(1, 0.4), (2, 0.2)])),
            ("pop".to_string(), scores(&[(1, 0.1), (2, 0.9), (3, 0.3)])),
        ]);

        // User 3 is missing from "bpr", so it is dropped everywhere; both
        // comparisons run on users {1, 2}.
        let results = SimilarityComparator::new().compare(&ctr, &methods);
        assert_eq!(results.len(), 2);
        assert!(results["bpr"].cosine > 0.99);
    }

    #[test]
    fn test_absolute_values_make_sign_irrelevant() {
        let ctr = scores(&[(1, 0.5), (2, 0.25), (3, 0.75)]);
        let positive = BTreeMap::from([("m".to_string(), scores(&[(1, 0.5), (2, 0.25), (3, 0.75)]))]);
        let negative = BTreeMap::from([(
            "m".to_string(),
            scores(&[(1, -0.5), (2, -0.25), (3, -0.75)]),
        )]);

        let comparator = SimilarityComparator::new();
        let from_positive = comparator.compare(&ctr, &positive);
        let from_negative = comparator.compare(&ctr, &negative);

        assert_eq!(from_positive["m"], from_negative["m"]);
        assert!((from_positive["m"].pearson - 1.0).abs() < 1e-6);
        assert!((from_positive["m"].cosine - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_intersection() {
        let ctr = scores(&[(1, 0.5)]);
        let methods = BTreeMap::from([("m".to_string(), scores(&[(2, 0.5)]))]);

        let results = SimilarityComparator::new().compare(&ctr, &methods);
        assert_eq!(results["m"].pearson, 0.0);
        assert_eq!(results["m"].cosine, 0.0);
    }
}
