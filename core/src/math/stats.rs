use ndarray::Array2;

pub struct StatsHelper;

impl StatsHelper {
    /// Largest cell of a temperature grid, `-inf` when the grid is empty.
    pub fn grid_max(grid: &Array2<f64>) -> f64 {
        grid.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn mean(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    /// Nearest-rank percentile, `p` in [0, 100]. NaN for an empty slice.
    pub fn percentile(samples: &[f64], p: f64) -> f64 {
        if samples.is_empty() {
            return f64::NAN;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let last = sorted.len() - 1;
        let rank = ((p / 100.0) * last as f64).round() as usize;
        sorted[rank.min(last)]
    }
}
