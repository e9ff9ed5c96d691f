use ndarray::{Array1, Array2};
use rand::Rng;

/// Matrix with entries drawn uniformly from `[low, high)`.
pub fn uniform_matrix<R: Rng>(
    rows: usize,
    cols: usize,
    low: f32,
    high: f32,
    rng: &mut R,
) -> Array2<f32> {
    Array2::from_shape_fn((rows, cols), |_| rng.gen_range(low..high))
}

pub fn uniform<R: Rng>(size: usize, low: f32, high: f32, rng: &mut R) -> Vec<f32> {
    (0..size).map(|_| rng.gen_range(low..high)).collect()
}

pub fn zeros(size: usize) -> Array1<f32> {
    Array1::zeros(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_uniform_matrix_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let matrix = uniform_matrix(20, 8, 0.0, 1.0, &mut rng);

        assert_eq!(matrix.dim(), (20, 8));
        for &value in matrix.iter() {
            assert!((0.0..1.0).contains(&value));
        }
    }

    #[test]
    fn test_uniform_range() {
        let mut rng = StdRng::seed_from_u64(2);
        let values = uniform(100, -0.5, 0.5, &mut rng);

        assert_eq!(values.len(), 100);
        for &value in &values {
            assert!(value >= -0.5 && value < 0.5);
        }
    }

    #[test]
    fn test_zeros() {
        let bias = zeros(16);
        assert_eq!(bias.len(), 16);
        assert!(bias.iter().all(|&value| value == 0.0));
    }
}
