use std::collections::VecDeque;

/// Rolling volatility index σₜ over the last `capacity` undamped composites.
///
/// σ is the population standard deviation of simple returns across the
/// window, divided by `v_target` when one is configured, clamped to [0, 1].
/// Until `min_samples` values are available σ is 0.
#[derive(Clone, Debug)]
pub struct VolatilityEstimator {
    window: VecDeque<f64>,
    capacity: usize,
    min_samples: usize,
    v_target: f64,
}

impl VolatilityEstimator {
    pub fn new(capacity: usize, min_samples: usize, v_target: f64) -> Self {
        VolatilityEstimator {
            window: VecDeque::with_capacity(capacity),
            capacity,
            min_samples,
            v_target,
        }
    }

    /// σ for the window as it would be after recording `candidate`.
    pub fn estimate(&self, candidate: f64) -> f64 {
        if !candidate.is_finite() {
            return self.sigma(self.window.iter().copied());
        }

        let overflow = (self.window.len() + 1).saturating_sub(self.capacity);
        let values = self.window.iter()
            .skip(overflow)
            .copied()
            .chain(std::iter::once(candidate));

        self.sigma(values)
    }

    pub fn record(&mut self, candidate: f64) {
        if !candidate.is_finite() {
            return;
        }
        self.window.push_back(candidate);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
    }

    /// Apply new window parameters, keeping the newest values.
    pub fn resize(&mut self, capacity: usize, min_samples: usize, v_target: f64) {
        self.capacity = capacity;
        self.min_samples = min_samples;
        self.v_target = v_target;
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn is_warm(&self) -> bool {
        self.window.len() >= self.min_samples
    }

    fn sigma(&self, values: impl Iterator<Item = f64>) -> f64 {
        let values: Vec<f64> = values.collect();
        if values.len() < self.min_samples {
            return 0.0;
        }

        let returns: Vec<f64> = values.windows(2)
            .filter(|pair| pair[0] > 0.0)
            .map(|pair| (pair[1] - pair[0]) / pair[0])
            .collect();
        if returns.is_empty() {
            return 0.0;
        }

        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        let dispersion = variance.sqrt();

        let scaled = if self.v_target > 0.0 {
            dispersion / self.v_target
        } else {
            dispersion
        };

        if scaled.is_nan() {
            return 1.0;
        }
        scaled.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_warm_up_reports_zero() {
        let mut estimator = VolatilityEstimator::new(10, 5, 0.0);
        for value in [100.0, 150.0, 80.0] {
            assert_eq!(estimator.estimate(value), 0.0);
            estimator.record(value);
        }
        assert!(!estimator.is_warm());
        // Fifth value completes the minimum window.
        estimator.record(120.0);
        assert!(estimator.estimate(90.0) > 0.0);
    }

    #[test]
    fn test_constant_window_has_zero_volatility() {
        let mut estimator = VolatilityEstimator::new(5, 2, 0.01);
        for _ in 0..10 {
            estimator.record(42.0);
        }
        assert_eq!(estimator.estimate(42.0), 0.0);
    }

    #[test]
    fn test_fifo_eviction() {
        let mut estimator = VolatilityEstimator::new(3, 2, 0.0);
        for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
            estimator.record(value);
        }
        assert_eq!(estimator.len(), 3);
        assert_eq!(estimator.window.iter().copied().collect::<Vec<_>>(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_estimate_does_not_mutate() {
        let mut estimator = VolatilityEstimator::new(4, 2, 0.0);
        estimator.record(1.0);
        estimator.record(1.1);
        let _ = estimator.estimate(5.0);
        assert_eq!(estimator.len(), 2);
    }

    #[test]
    fn test_known_dispersion() {
        // Returns +10% and -10%: mean 0, population std 0.1
        let mut estimator = VolatilityEstimator::new(10, 2, 0.0);
        estimator.record(100.0);
        estimator.record(110.0);
        let sigma = estimator.estimate(99.0);
        assert!((sigma - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_target_rescaling_saturates() {
        let mut estimator = VolatilityEstimator::new(10, 2, 0.05);
        estimator.record(100.0);
        estimator.record(110.0);
        // std 0.1 is twice the target
        assert_eq!(estimator.estimate(99.0), 1.0);

        let mut calm = VolatilityEstimator::new(10, 2, 0.2);
        calm.record(100.0);
        calm.record(110.0);
        assert!((calm.estimate(99.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_estimate_drops_oldest_when_full() {
        let mut estimator = VolatilityEstimator::new(3, 2, 0.0);
        // A wild first value that should fall out of the window
        for value in [1.0, 100.0, 100.0] {
            estimator.record(value);
        }
        assert_eq!(estimator.estimate(100.0), 0.0);
    }

    #[test]
    fn test_resize_keeps_newest() {
        let mut estimator = VolatilityEstimator::new(5, 2, 0.0);
        for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
            estimator.record(value);
        }
        estimator.resize(2, 2, 0.0);
        assert_eq!(estimator.window.iter().copied().collect::<Vec<_>>(), vec![4.0, 5.0]);
    }

    proptest! {
        #[test]
        fn prop_sigma_in_unit_interval(
            values in proptest::collection::vec(0.01f64..1_000_000.0, 0..50),
            candidate in 0.01f64..1_000_000.0,
            v_target in 0.0f64..0.5,
        ) {
            let mut estimator = VolatilityEstimator::new(20, 3, v_target);
            for value in values {
                estimator.record(value);
                let sigma = estimator.estimate(candidate);
                prop_assert!((0.0..=1.0).contains(&sigma));
            }
        }
    }
}
