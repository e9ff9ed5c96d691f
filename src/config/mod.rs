use crate::algorithms::BprHyperparameters;
use crate::models::InteractionType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub evaluation: EvaluationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Interaction types counted as active engagement.
    pub positive_feedback: Vec<InteractionType>,
    /// Optional JSON snapshot path for the parsed indices.
    pub index_cache: Option<String>,
    /// Directory the pipeline writes its output files into.
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub rank: usize,
    pub lambda_u: f32,
    pub lambda_i: f32,
    pub lambda_j: f32,
    pub lambda_bias: f32,
    pub learning_rate: f32,
}

impl ModelConfig {
    pub fn hyperparameters(&self) -> BprHyperparameters {
        BprHyperparameters {
            rank: self.rank,
            lambda_u: self.lambda_u,
            lambda_i: self.lambda_i,
            lambda_j: self.lambda_j,
            lambda_bias: self.lambda_bias,
            learning_rate: self.learning_rate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    /// Rejection-sampling retry cap per negative draw.
    pub max_sampling_retries: usize,
    /// Optional RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Ranking depth used for Hit@K / MRR / soft-MRR.
    pub top_k: usize,
}

impl Config {
    pub fn positive_feedback_set(&self) -> HashSet<InteractionType> {
        self.data.positive_feedback.iter().copied().collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig {
                positive_feedback: vec![1, 2, 3],
                index_cache: None,
                output_dir: "output".to_string(),
            },
            model: ModelConfig {
                rank: 10,
                lambda_u: 0.0025,
                lambda_i: 0.0025,
                lambda_j: 0.00025,
                lambda_bias: 0.0,
                learning_rate: 0.05,
            },
            training: TrainingConfig {
                epochs: 30,
                batch_size: 1000,
                max_sampling_retries: 10_000,
                seed: None,
            },
            evaluation: EvaluationConfig { top_k: 1000 },
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("FEEDRANK"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_setup() {
        let config = Config::default();
        assert_eq!(config.model.rank, 10);
        assert!((config.model.learning_rate - 0.05).abs() < 1e-9);
        assert_eq!(config.training.epochs, 30);
        assert_eq!(config.training.batch_size, 1000);
        assert_eq!(config.positive_feedback_set(), HashSet::from([1, 2, 3]));
    }
}
