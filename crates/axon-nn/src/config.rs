use serde::{Deserialize, Serialize};

/// Hyper-parameters for [`Sequential::train`](crate::Sequential::train).
///
/// Every field has a default, so a partial JSON object such as
/// `{"epochs": 500, "shuffle": true}` deserializes into a usable config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Learning rate.
    pub alpha: f64,
    /// Fraction of the previous update added to the current one.
    pub momentum: f64,
    /// Number of passes over the data.
    pub epochs: usize,
    /// Samples trained per epoch (0 = all of them).
    pub batch_size: usize,
    /// 0 = silent, 1 = log each epoch, 2 = also log each sample.
    pub verbosity: u8,
    /// Reshuffle the samples before every epoch.
    pub shuffle: bool,
    /// Seed for the shuffle RNG; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            alpha: 0.01,
            momentum: 0.5,
            epochs: 1,
            batch_size: 0,
            verbosity: 0,
            shuffle: false,
            seed: None,
        }
    }
}

impl TrainConfig {
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Samples trained per epoch for a dataset of `len` samples.
    pub fn effective_batch(&self, len: usize) -> usize {
        if self.batch_size == 0 || self.batch_size > len {
            len
        } else {
            self.batch_size
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_is_clamped_to_dataset() {
        assert_eq!(TrainConfig::default().effective_batch(4), 4);
        assert_eq!(TrainConfig::default().batch_size(9).effective_batch(4), 4);
        assert_eq!(TrainConfig::default().batch_size(3).effective_batch(4), 3);
    }

    #[test]
    fn test_builder_sets_fields() {
        let c = TrainConfig::default().alpha(0.1).epochs(7).shuffle(true).seed(3);
        assert_eq!(c.alpha, 0.1);
        assert_eq!(c.momentum, 0.5);
        assert_eq!(c.epochs, 7);
        assert!(c.shuffle);
        assert_eq!(c.seed, Some(3));
    }
}
