//! Per-epoch traversal order
//!
//! Chooses between length-sorted and shuffled traversal for each epoch and
//! caches the resulting permutations so every epoch sees one immutable order.

use corpus_core::{Epoch, OrderingConfig};
use dashmap::DashMap;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::sync::Arc;

use crate::CorpusIndex;

/// Traversal strategy for a single epoch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OrderingPolicy {
    /// Shortest inputs first, ties in corpus order
    SortedAscending,

    /// Longest inputs first, ties in corpus order
    SortedDescending,

    /// Uniform random permutation, reseeded per epoch
    Shuffled,

    /// Corpus order
    Sequential,
}

impl OrderingPolicy {
    /// Select the policy for `epoch`
    ///
    /// Length sorting takes precedence over `shuffle` until
    /// `sort_stop_epoch`; from that epoch on the order is shuffled.
    pub fn for_epoch(epoch: Epoch, config: &OrderingConfig) -> Self {
        if config.sort_by_length {
            let sorting = config.sort_stop_epoch.map_or(true, |stop| epoch < stop);
            if sorting {
                return if config.reverse {
                    OrderingPolicy::SortedDescending
                } else {
                    OrderingPolicy::SortedAscending
                };
            }
            return OrderingPolicy::Shuffled;
        }

        if config.shuffle {
            OrderingPolicy::Shuffled
        } else {
            OrderingPolicy::Sequential
        }
    }

    /// Returns true if the permutation depends on the epoch number
    pub fn varies_per_epoch(&self) -> bool {
        matches!(self, OrderingPolicy::Shuffled)
    }
}

/// Cache key: deterministic policies share one entry across epochs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum OrderKey {
    Fixed(OrderingPolicy),
    Shuffled(Epoch),
}

/// Produces and caches the index permutation for each epoch
#[derive(Debug)]
pub struct EpochOrdering {
    /// Policy selection settings
    config: OrderingConfig,

    /// Permutations already computed
    cache: DashMap<OrderKey, Arc<Vec<usize>>>,
}

impl EpochOrdering {
    /// Create an ordering for the given settings
    pub fn new(config: OrderingConfig) -> Self {
        Self {
            config,
            cache: DashMap::new(),
        }
    }

    /// Policy in effect for `epoch`
    pub fn policy(&self, epoch: Epoch) -> OrderingPolicy {
        OrderingPolicy::for_epoch(epoch, &self.config)
    }

    /// Get the permutation of `[0, corpus.size())` for `epoch`
    pub fn order(&self, epoch: Epoch, corpus: &CorpusIndex) -> Arc<Vec<usize>> {
        let policy = self.policy(epoch);
        let key = if policy.varies_per_epoch() {
            OrderKey::Shuffled(epoch)
        } else {
            OrderKey::Fixed(policy)
        };

        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }

        let order = Arc::new(self.compute(policy, epoch, corpus.input_lengths()));
        let order = self.cache.entry(key).or_insert(order).clone();

        tracing::debug!(
            epoch = epoch,
            policy = ?policy,
            utterances = order.len(),
            "Computed epoch ordering"
        );

        order
    }

    /// Drop cached shuffles for epochs before `epoch`
    pub fn release_before(&self, epoch: Epoch) {
        self.cache.retain(|key, _| match key {
            OrderKey::Shuffled(e) => *e >= epoch,
            OrderKey::Fixed(_) => true,
        });
    }

    /// Number of cached permutations
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Base seed for reproducibility
    pub fn seed(&self) -> u64 {
        self.config.seed
    }

    fn compute(&self, policy: OrderingPolicy, epoch: Epoch, lengths: &[usize]) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..lengths.len()).collect();

        match policy {
            OrderingPolicy::SortedAscending => indices.sort_by_key(|&i| lengths[i]),
            OrderingPolicy::SortedDescending => indices.sort_by_key(|&i| Reverse(lengths[i])),
            OrderingPolicy::Shuffled => {
                let mut rng = ChaCha8Rng::seed_from_u64(epoch_seed(self.config.seed, epoch));
                indices.shuffle(&mut rng);
            }
            OrderingPolicy::Sequential => {}
        }

        indices
    }
}

/// Mix the base seed and epoch number (splitmix64 finalizer)
fn epoch_seed(base_seed: u64, epoch: Epoch) -> u64 {
    let mut z = base_seed ^ epoch.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
