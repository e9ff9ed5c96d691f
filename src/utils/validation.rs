use anyhow::{anyhow, Result};

pub fn validate_finite(values: &[f32], what: &str) -> Result<()> {
    for &value in values {
        if !value.is_finite() {
            return Err(anyhow!("{} contains invalid values (NaN or Infinity)", what));
        }
    }
    Ok(())
}

pub fn validate_embedding_dimension(embedding: &[f32], expected_dim: usize) -> Result<()> {
    if embedding.len() != expected_dim {
        return Err(anyhow!(
            "Embedding dimension mismatch: expected {}, got {}",
            expected_dim,
            embedding.len()
        ));
    }
    Ok(())
}

pub fn validate_batch_size(batch_size: usize, max_batch_size: usize) -> Result<()> {
    if batch_size == 0 {
        return Err(anyhow!("Batch size cannot be zero"));
    }

    if batch_size > max_batch_size {
        return Err(anyhow!(
            "Batch size too large: {} (max {})",
            batch_size,
            max_batch_size
        ));
    }

    Ok(())
}

pub fn validate_rank(rank: usize) -> Result<()> {
    if rank == 0 {
        return Err(anyhow!("Latent rank cannot be zero"));
    }
    if rank > 2048 {
        return Err(anyhow!("Latent rank too large: {} (max 2048)", rank));
    }
    Ok(())
}
