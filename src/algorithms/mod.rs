pub mod initializer;
pub mod sampler;

use crate::error::{PipelineError, Result};
use crate::utils;
use ndarray::{Array1, Array2};
use rand::Rng;
use sampler::NegativeSampler;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Hyperparameters fixed at model construction. Defaults follow the
/// standard BPR matrix-factorisation setup (Rendle et al.).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BprHyperparameters {
    pub rank: usize,
    pub lambda_u: f32,
    pub lambda_i: f32,
    pub lambda_j: f32,
    pub lambda_bias: f32,
    pub learning_rate: f32,
}

impl Default for BprHyperparameters {
    fn default() -> Self {
        Self {
            rank: 10,
            lambda_u: 0.0025,
            lambda_i: 0.0025,
            lambda_j: 0.00025,
            lambda_bias: 0.0,
            learning_rate: 0.05,
        }
    }
}

/// Bayesian Personalised Ranking matrix factorisation.
///
/// Owns the user-factor matrix `W` (n_users × rank), the item-factor matrix
/// `H` (n_items × rank) and the item-bias vector `B`. All three are mutated
/// only by the training loop; scoring reads them.
#[derive(Debug, Clone)]
pub struct Bpr {
    hyper: BprHyperparameters,
    n_users: usize,
    n_items: usize,
    w: Array2<f32>,
    h: Array2<f32>,
    b: Array1<f32>,
    train_positives: HashMap<usize, Vec<usize>>,
    train_users: HashSet<usize>,
    train_items: HashSet<usize>,
}

impl Bpr {
    /// Builds a model with `W` and `H` uniform in `[0, 1)` and `B` zeroed.
    pub fn new(n_users: usize, n_items: usize, hyper: BprHyperparameters) -> Self {
        Self::with_rng(n_users, n_items, hyper, &mut rand::thread_rng())
    }

    pub fn with_rng<R: Rng>(
        n_users: usize,
        n_items: usize,
        hyper: BprHyperparameters,
        rng: &mut R,
    ) -> Self {
        let w = initializer::uniform_matrix(n_users, hyper.rank, 0.0, 1.0, rng);
        let h = initializer::uniform_matrix(n_items, hyper.rank, 0.0, 1.0, rng);
        let b = initializer::zeros(n_items);

        Self {
            hyper,
            n_users,
            n_items,
            w,
            h,
            b,
            train_positives: HashMap::new(),
            train_users: HashSet::new(),
            train_items: HashSet::new(),
        }
    }

    pub fn n_users(&self) -> usize {
        self.n_users
    }

    pub fn n_items(&self) -> usize {
        self.n_items
    }

    pub fn hyperparameters(&self) -> &BprHyperparameters {
        &self.hyper
    }

    /// Users seen during training; test users outside this set cannot be
    /// scored.
    pub fn train_users(&self) -> &HashSet<usize> {
        &self.train_users
    }

    pub fn train_items(&self) -> &HashSet<usize> {
        &self.train_items
    }

    /// A user's training positives, empty when the user was not trained on.
    pub fn positives_of(&self, user: usize) -> &[usize] {
        self.train_positives
            .get(&user)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Trains with mini-batch SGD over `epochs × |train_data|` uniformly
    /// sampled triplets. Batches are contiguous and non-overlapping; a
    /// trailing partial batch is dropped. A `batch_size` larger than the
    /// sample count is clamped with a warning.
    pub fn train<R: Rng>(
        &mut self,
        train_data: &[(usize, usize)],
        epochs: usize,
        batch_size: usize,
        sampler: &NegativeSampler,
        rng: &mut R,
    ) -> Result<()> {
        if batch_size == 0 {
            return Err(PipelineError::InvalidParameter {
                name: "batch_size",
                reason: "must be positive".to_string(),
            });
        }
        if train_data.is_empty() {
            warn!("no training pairs, leaving model at initialisation");
            return Ok(());
        }

        let mut batch_size = batch_size;
        if batch_size > train_data.len() {
            warn!(
                requested = batch_size,
                available = train_data.len(),
                "batch size exceeds number of training samples, clamping"
            );
            batch_size = train_data.len();
        }

        self.index_training_data(train_data)?;

        let n_sgd_samples = train_data.len() * epochs;
        let triplets = sampler.sample(&self.train_positives, self.n_items, n_sgd_samples, rng)?;

        let n_batches = n_sgd_samples / batch_size;
        info!(
            samples = n_sgd_samples,
            batches = n_batches,
            batch_size,
            "starting BPR training"
        );

        for z in 0..n_batches {
            let start = z * batch_size;
            let stop = start + batch_size;
            self.apply_batch(
                &triplets.users[start..stop],
                &triplets.pos_items[start..stop],
                &triplets.neg_items[start..stop],
            );

            if (z + 1) % 100 == 0 || z + 1 == n_batches {
                debug!(
                    processed = stop,
                    total = n_sgd_samples,
                    "training progress"
                );
            }
        }

        Ok(())
    }

    fn index_training_data(&mut self, train_data: &[(usize, usize)]) -> Result<()> {
        self.train_positives.clear();
        self.train_users.clear();
        self.train_items.clear();

        for &(user, item) in train_data {
            if user >= self.n_users {
                return Err(PipelineError::IndexOutOfRange {
                    kind: "user",
                    index: user,
                    size: self.n_users,
                });
            }
            if item >= self.n_items {
                return Err(PipelineError::IndexOutOfRange {
                    kind: "item",
                    index: item,
                    size: self.n_items,
                });
            }

            self.train_positives.entry(user).or_default().push(item);
            self.train_users.insert(user);
            self.train_items.insert(item);
        }

        Ok(())
    }

    /// One gradient-descent step on a batch of `(u, i, j)` triplets.
    ///
    /// The objective per triplet is
    /// `log σ(x_uij) − λ_u‖W[u]‖² − λ_i‖H[i]‖² − λ_j‖H[j]‖² − λ_b(B[i]² + B[j]²)`
    /// with `x_uij = B[i] − B[j] + ⟨W[u], H[i]⟩ − ⟨W[u], H[j]⟩`. Gradients
    /// are accumulated over the whole batch against the pre-update state and
    /// applied simultaneously.
    fn apply_batch(&mut self, users: &[usize], pos_items: &[usize], neg_items: &[usize]) {
        let rank = self.hyper.rank;
        let mut grad_w: HashMap<usize, Array1<f32>> = HashMap::new();
        let mut grad_h: HashMap<usize, Array1<f32>> = HashMap::new();
        let mut grad_b: HashMap<usize, f32> = HashMap::new();

        for ((&u, &i), &j) in users.iter().zip(pos_items).zip(neg_items) {
            let w_u = self.w.row(u);
            let h_i = self.h.row(i);
            let h_j = self.h.row(j);

            let x_uij = self.b[i] - self.b[j] + w_u.dot(&h_i) - w_u.dot(&h_j);
            let slope = utils::sigmoid(-x_uij);

            let g_w = grad_w
                .entry(u)
                .or_insert_with(|| Array1::zeros(rank));
            g_w.scaled_add(-slope, &(&h_i - &h_j));
            g_w.scaled_add(2.0 * self.hyper.lambda_u, &w_u);

            let g_hi = grad_h
                .entry(i)
                .or_insert_with(|| Array1::zeros(rank));
            g_hi.scaled_add(-slope, &w_u);
            g_hi.scaled_add(2.0 * self.hyper.lambda_i, &h_i);

            let g_hj = grad_h
                .entry(j)
                .or_insert_with(|| Array1::zeros(rank));
            g_hj.scaled_add(slope, &w_u);
            g_hj.scaled_add(2.0 * self.hyper.lambda_j, &h_j);

            *grad_b.entry(i).or_insert(0.0) +=
                -slope + 2.0 * self.hyper.lambda_bias * self.b[i];
            *grad_b.entry(j).or_insert(0.0) +=
                slope + 2.0 * self.hyper.lambda_bias * self.b[j];
        }

        let lr = self.hyper.learning_rate;
        for (u, grad) in grad_w {
            self.w.row_mut(u).scaled_add(-lr, &grad);
        }
        for (i, grad) in grad_h {
            self.h.row_mut(i).scaled_add(-lr, &grad);
        }
        for (i, grad) in grad_b {
            self.b[i] -= lr * grad;
        }
    }

    /// Scores every item for `user`: `⟨W[user], H⟩ + B`.
    pub fn predictions(&self, user: usize) -> Result<Array1<f32>> {
        if user >= self.n_users {
            return Err(PipelineError::IndexOutOfRange {
                kind: "user",
                index: user,
                size: self.n_users,
            });
        }
        Ok(self.h.dot(&self.w.row(user)) + &self.b)
    }

    /// Score of a single (user, item) pair.
    pub fn prediction(&self, user: usize, item: usize) -> Result<f32> {
        if item >= self.n_items {
            return Err(PipelineError::IndexOutOfRange {
                kind: "item",
                index: item,
                size: self.n_items,
            });
        }
        Ok(self.predictions(user)?[item])
    }

    /// Top `k` items for `user` by descending score, excluding the user's
    /// training positives.
    pub fn top_predictions(&self, user: usize, k: usize) -> Result<Vec<usize>> {
        let scores = self.predictions(user)?;
        let exclude: HashSet<usize> = self.positives_of(user).iter().copied().collect();

        Ok(utils::top_k_indices(&scores.to_vec(), self.n_items)
            .into_iter()
            .filter(|item| !exclude.contains(item))
            .take(k)
            .collect())
    }
}
