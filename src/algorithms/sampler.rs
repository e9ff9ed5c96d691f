use crate::error::{PipelineError, Result};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Parallel triplet columns consumed by the SGD loop.
#[derive(Debug, Clone, Default)]
pub struct Triplets {
    pub users: Vec<usize>,
    pub pos_items: Vec<usize>,
    pub neg_items: Vec<usize>,
}

impl Triplets {
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Uniform (user, positive, negative) triplet sampler with rejection of the
/// user's own positives. Rejection is capped: a user whose positives cover
/// the whole item universe surfaces a retryable error instead of looping
/// forever.
#[derive(Debug, Clone)]
pub struct NegativeSampler {
    max_retries: usize,
}

impl NegativeSampler {
    pub fn new(max_retries: usize) -> Self {
        Self { max_retries }
    }

    /// Draws `n_samples` triplets. `positives` maps each training user
    /// index to its positive item indices; `n_items` is the size of the
    /// item universe negatives are drawn from.
    pub fn sample<R: Rng>(
        &self,
        positives: &HashMap<usize, Vec<usize>>,
        n_items: usize,
        n_samples: usize,
        rng: &mut R,
    ) -> Result<Triplets> {
        debug!(samples = n_samples, "generating SGD triplets");

        if positives.is_empty() || n_samples == 0 {
            return Ok(Triplets::default());
        }

        let mut users: Vec<usize> = positives.keys().copied().collect();
        users.sort_unstable();

        let positive_sets: HashMap<usize, HashSet<usize>> = positives
            .iter()
            .map(|(&user, items)| (user, items.iter().copied().collect()))
            .collect();

        let mut triplets = Triplets {
            users: Vec::with_capacity(n_samples),
            pos_items: Vec::with_capacity(n_samples),
            neg_items: Vec::with_capacity(n_samples),
        };

        for _ in 0..n_samples {
            let user = users[rng.gen_range(0..users.len())];
            let user_positives = &positives[&user];
            let pos_item = user_positives[rng.gen_range(0..user_positives.len())];
            let neg_item = self.draw_negative(user, &positive_sets[&user], n_items, rng)?;

            triplets.users.push(user);
            triplets.pos_items.push(pos_item);
            triplets.neg_items.push(neg_item);
        }

        Ok(triplets)
    }

    fn draw_negative<R: Rng>(
        &self,
        user: usize,
        exclude: &HashSet<usize>,
        n_items: usize,
        rng: &mut R,
    ) -> Result<usize> {
        for _ in 0..self.max_retries {
            let candidate = rng.gen_range(0..n_items);
            if !exclude.contains(&candidate) {
                return Ok(candidate);
            }
        }

        Err(PipelineError::SamplingExhausted {
            user,
            retries: self.max_retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn positives() -> HashMap<usize, Vec<usize>> {
        HashMap::from([(0, vec![1, 2]), (1, vec![0])])
    }

    #[test]
    fn test_negatives_never_positive_for_user() {
        let sampler = NegativeSampler::new(100);
        let mut rng = StdRng::seed_from_u64(7);
        let positives = positives();

        let triplets = sampler.sample(&positives, 10, 500, &mut rng).unwrap();
        assert_eq!(triplets.len(), 500);

        for ((&user, &pos), &neg) in triplets
            .users
            .iter()
            .zip(&triplets.pos_items)
            .zip(&triplets.neg_items)
        {
            assert!(positives[&user].contains(&pos));
            assert!(!positives[&user].contains(&neg));
        }
    }

    #[test]
    fn test_only_training_users_are_drawn() {
        let sampler = NegativeSampler::new(100);
        let mut rng = StdRng::seed_from_u64(11);

        let triplets = sampler.sample(&positives(), 10, 200, &mut rng).unwrap();
        assert!(triplets.users.iter().all(|user| *user <= 1));
    }

    #[test]
    fn test_exhaustion_is_reported() {
        // User 0's positives cover the entire universe.
        let sampler = NegativeSampler::new(50);
        let mut rng = StdRng::seed_from_u64(3);
        let positives = HashMap::from([(0, vec![0, 1, 2])]);

        let err = sampler.sample(&positives, 3, 1, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::SamplingExhausted { user: 0, retries: 50 }
        ));
    }
}
