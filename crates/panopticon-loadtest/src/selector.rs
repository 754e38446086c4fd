//! Weighted action selection
//!
//! Draws one entry per scheduling tick with long-run frequency proportional
//! to its integer weight. The cumulative table is built once; each draw is a
//! uniform integer in `[0, W)` resolved by binary search.

use std::fmt;

use rand::Rng;

use crate::error::ConfigurationError;

/// Immutable weighted table over a fixed entry set
#[derive(Debug, Clone)]
pub struct WeightedSelector<T> {
    entries: Vec<T>,
    weights: Vec<u32>,
    /// `cumulative[i]` is the sum of weights `0..=i`
    cumulative: Vec<u64>,
}

impl<T: fmt::Display> WeightedSelector<T> {
    /// Build a selector from `(entry, weight)` pairs.
    ///
    /// Fails when the set is empty or any weight is zero.
    pub fn new<I>(entries: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (T, u32)>,
    {
        let mut items = Vec::new();
        let mut weights = Vec::new();
        let mut cumulative = Vec::new();
        let mut total = 0u64;

        for (entry, weight) in entries {
            if weight == 0 {
                return Err(ConfigurationError::NonPositiveWeight {
                    action: entry.to_string(),
                    weight: 0,
                });
            }
            total += u64::from(weight);
            items.push(entry);
            weights.push(weight);
            cumulative.push(total);
        }

        if items.is_empty() {
            return Err(ConfigurationError::EmptyActionSet);
        }

        Ok(Self {
            entries: items,
            weights,
            cumulative,
        })
    }
}

impl<T> WeightedSelector<T> {
    /// Draw one entry
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> &T {
        let point = rng.gen_range(0..self.total_weight());
        let index = self.cumulative.partition_point(|&bound| bound <= point);
        &self.entries[index]
    }

    /// Sum of all weights
    pub fn total_weight(&self) -> u64 {
        // Non-empty by construction
        self.cumulative.last().copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(entry, weight, probability)` triples, in insertion order
    pub fn weight_distribution(&self) -> Vec<(&T, u32, f64)> {
        let total = self.total_weight() as f64;
        self.entries
            .iter()
            .zip(self.weights.iter())
            .map(|(entry, &weight)| (entry, weight, f64::from(weight) / total))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    fn frequencies(
        selector: &WeightedSelector<&'static str>,
        draws: usize,
        seed: u64,
    ) -> HashMap<&'static str, usize> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut counts = HashMap::new();
        for _ in 0..draws {
            *counts.entry(*selector.select(&mut rng)).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn test_empty_set_rejected() {
        let err = WeightedSelector::<&str>::new(Vec::new()).unwrap_err();
        assert_eq!(err, ConfigurationError::EmptyActionSet);
    }

    #[test]
    fn test_zero_weight_rejected() {
        let err = WeightedSelector::new(vec![("list", 3), ("create", 0)]).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::NonPositiveWeight {
                action: "create".to_string(),
                weight: 0
            }
        );
    }

    #[test]
    fn test_single_entry_always_selected() {
        let selector = WeightedSelector::new(vec![("only", 5)]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for _ in 0..100 {
            assert_eq!(*selector.select(&mut rng), "only");
        }
    }

    #[test]
    fn test_distribution_matches_weights() {
        let selector = WeightedSelector::new(vec![
            ("list", 3),
            ("create", 2),
            ("update", 1),
            ("delete", 1),
        ])
        .unwrap();
        assert_eq!(selector.total_weight(), 7);

        let draws = 70_000;
        let counts = frequencies(&selector, draws, 42);

        for (name, weight, probability) in selector.weight_distribution() {
            let expected = draws as f64 * probability;
            let observed = counts.get(name).copied().unwrap_or(0) as f64;
            // 5 standard deviations of the binomial count
            let sigma = (draws as f64 * probability * (1.0 - probability)).sqrt();
            assert!(
                (observed - expected).abs() < 5.0 * sigma,
                "{} (weight {}): observed {}, expected {:.0}",
                name,
                weight,
                observed,
                expected
            );
        }
    }

    #[test]
    fn test_weight_distribution_sums_to_one() {
        let selector = WeightedSelector::new(vec![("a", 1), ("b", 2), ("c", 7)]).unwrap();
        let sum: f64 = selector.weight_distribution().iter().map(|(_, _, p)| p).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_frequencies_proportional(weights in prop::collection::vec(1u32..20, 1..6), seed in any::<u64>()) {
            let names = ["a", "b", "c", "d", "e", "f"];
            let selector = WeightedSelector::new(
                names.iter().copied().zip(weights.iter().copied())
            ).unwrap();

            let draws = 10_000;
            let counts = frequencies(&selector, draws, seed);

            for (name, _, probability) in selector.weight_distribution() {
                let expected = draws as f64 * probability;
                let observed = counts.get(name).copied().unwrap_or(0) as f64;
                let sigma = (draws as f64 * probability * (1.0 - probability)).sqrt().max(1.0);
                prop_assert!((observed - expected).abs() < 6.0 * sigma);
            }
        }
    }
}
