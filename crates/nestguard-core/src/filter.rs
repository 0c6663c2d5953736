//! Lock-free Bloom filter used as the first line of defense against
//! lookups for keys that do not exist.
//!
//! The filter answers "definitely absent" or "possibly present". It never
//! produces false negatives: once a key is added, [`MembershipFilter::might_contain`]
//! returns `true` for it, even while other threads keep adding keys.

use std::collections::hash_map::DefaultHasher;
use std::f64::consts::LN_2;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

const WORD_BITS: u64 = 64;

/// Seeds for the two base hashes combined by double hashing.
const SEED_PRIMARY: u64 = 0x9e37_79b9_7f4a_7c15;
const SEED_SECONDARY: u64 = 0xc2b2_ae3d_27d4_eb4f;

/// Sizing of a Bloom filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    /// Number of elements the filter was sized for.
    pub expected_items: usize,
    /// Target false-positive rate used for sizing.
    pub target_fpp: f64,
    /// Size of the bit array (always a multiple of 64).
    pub num_bits: u64,
    /// Number of hash functions.
    pub num_hashes: u32,
}

impl FilterParams {
    /// Computes bit-array size and hash count for `n` elements at false-positive
    /// rate `p`, using `m = -n·ln(p)/(ln2)^2` and `k = (m/n)·ln2`, both rounded up.
    ///
    /// `n` is clamped to at least one and `p` to `(0, 1)`.
    pub fn optimal(expected_items: usize, target_fpp: f64) -> Self {
        let n = expected_items.max(1) as f64;
        let p = target_fpp.clamp(f64::MIN_POSITIVE, 0.999_999);

        let m = (-n * p.ln() / (LN_2 * LN_2)).ceil().max(1.0);
        let k = ((m / n) * LN_2).ceil().max(1.0);

        let words = (m as u64).div_ceil(WORD_BITS);

        Self {
            expected_items: expected_items.max(1),
            target_fpp,
            num_bits: words * WORD_BITS,
            num_hashes: k as u32,
        }
    }

    /// Theoretical false-positive rate after `inserted` distinct insertions:
    /// `(1 - e^(-k·n/m))^k`.
    pub fn expected_fpp(&self, inserted: usize) -> f64 {
        let k = f64::from(self.num_hashes);
        let exponent = -k * inserted as f64 / self.num_bits as f64;
        (1.0 - exponent.exp()).powf(k)
    }

    /// Number of 64-bit words backing the bit array.
    pub fn num_words(&self) -> usize {
        (self.num_bits / WORD_BITS) as usize
    }
}

/// Probabilistic set of every key known to the backing store.
///
/// Bits live in an array of [`AtomicU64`]; `add` sets bits with `fetch_or`, so
/// concurrent adds and probes never block each other and no bit is ever
/// cleared. There is no removal: a deleted key stays "possibly present".
#[derive(Debug)]
pub struct MembershipFilter {
    bits: Box<[AtomicU64]>,
    params: FilterParams,
    inserted: AtomicUsize,
}

impl MembershipFilter {
    /// Creates an empty filter with the given sizing.
    pub fn with_params(params: FilterParams) -> Self {
        let bits = (0..params.num_words())
            .map(|_| AtomicU64::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            bits,
            params,
            inserted: AtomicUsize::new(0),
        }
    }

    /// Builds a filter sized for exactly the number of keys given and inserts
    /// all of them.
    pub fn initialize<I, K>(keys: I, target_fpp: f64) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Hash,
    {
        Self::initialize_with_capacity(keys, 0, target_fpp)
    }

    /// Builds a filter sized for `max(len(keys), min_capacity)` elements and
    /// inserts all keys.
    ///
    /// A floor on the capacity leaves headroom for keys added after startup.
    pub fn initialize_with_capacity<I, K>(keys: I, min_capacity: usize, target_fpp: f64) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Hash,
    {
        let keys: Vec<K> = keys.into_iter().collect();
        let params = FilterParams::optimal(keys.len().max(min_capacity), target_fpp);
        let filter = Self::with_params(params);

        for key in &keys {
            filter.add(key);
        }

        filter
    }

    /// Returns `false` only if `key` was never added.
    pub fn might_contain<K: Hash + ?Sized>(&self, key: &K) -> bool {
        let (h1, h2) = Self::base_hashes(key);
        (0..self.params.num_hashes).all(|i| {
            let (word, mask) = self.locate(h1, h2, i);
            self.bits[word].load(Ordering::Relaxed) & mask != 0
        })
    }

    /// Adds `key` to the set.
    pub fn add<K: Hash + ?Sized>(&self, key: &K) {
        let (h1, h2) = Self::base_hashes(key);
        for i in 0..self.params.num_hashes {
            let (word, mask) = self.locate(h1, h2, i);
            self.bits[word].fetch_or(mask, Ordering::Relaxed);
        }
        self.inserted.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of `add` calls so far (duplicates included).
    pub fn inserted(&self) -> usize {
        self.inserted.load(Ordering::Relaxed)
    }

    /// Sizing this filter was built with.
    pub fn params(&self) -> &FilterParams {
        &self.params
    }

    /// Theoretical false-positive rate at the current insertion count.
    pub fn current_fpp(&self) -> f64 {
        self.params.expected_fpp(self.inserted())
    }

    /// True once more keys were added than the filter was sized for.
    pub fn is_saturated(&self) -> bool {
        self.inserted() > self.params.expected_items
    }

    /// Number of bits currently set.
    pub fn bits_set(&self) -> u64 {
        self.bits
            .iter()
            .map(|w| u64::from(w.load(Ordering::Relaxed).count_ones()))
            .sum()
    }

    fn locate(&self, h1: u64, h2: u64, i: u32) -> (usize, u64) {
        let bit = h1.wrapping_add(u64::from(i).wrapping_mul(h2)) % self.params.num_bits;
        ((bit / WORD_BITS) as usize, 1u64 << (bit % WORD_BITS))
    }

    fn base_hashes<K: Hash + ?Sized>(key: &K) -> (u64, u64) {
        let h1 = seeded_hash(SEED_PRIMARY, key);
        // odd step so the probe sequence never collapses onto one bit
        let h2 = seeded_hash(SEED_SECONDARY, key) | 1;
        (h1, h2)
    }
}

fn seeded_hash<K: Hash + ?Sized>(seed: u64, key: &K) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    key.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_optimal_params_match_standard_relations() {
        let params = FilterParams::optimal(1_000_000, 0.01);

        // m = 9_585_059 bits rounded up to whole words, k = 7
        assert_eq!(params.num_hashes, 7);
        assert!(params.num_bits >= 9_585_059);
        assert!(params.num_bits < 9_585_059 + 64);
        assert_eq!(params.num_bits % 64, 0);
    }

    #[test]
    fn test_expected_fpp_at_capacity_is_near_target() {
        let params = FilterParams::optimal(100_000, 0.01);
        let fpp = params.expected_fpp(100_000);
        assert!(fpp > 0.005 && fpp < 0.012, "fpp was {}", fpp);
    }

    #[test]
    fn test_zero_items_still_sized() {
        let params = FilterParams::optimal(0, 0.01);
        assert!(params.num_bits >= 64);
        assert!(params.num_hashes >= 1);
    }

    #[test]
    fn test_no_false_negatives() {
        let keys: Vec<String> = (0..5_000).map(|i| format!("listing-{}", i)).collect();
        let filter = MembershipFilter::initialize(&keys, 0.01);

        for key in &keys {
            assert!(filter.might_contain(key), "false negative for {}", key);
        }
        assert_eq!(filter.inserted(), 5_000);
    }

    #[test]
    fn test_empty_filter_contains_nothing() {
        let filter = MembershipFilter::with_params(FilterParams::optimal(100, 0.01));
        assert!(!filter.might_contain("anything"));
        assert_eq!(filter.bits_set(), 0);
    }

    #[test]
    fn test_add_after_initialize() {
        let filter = MembershipFilter::initialize_with_capacity(["1", "2", "3"], 1_000, 0.01);

        assert!(filter.might_contain("2"));
        assert!(!filter.might_contain("4"));

        filter.add("4");
        assert!(filter.might_contain("4"));
    }

    #[test]
    fn test_string_and_str_hash_alike() {
        let filter = MembershipFilter::initialize_with_capacity(["abc"], 100, 0.01);
        assert!(filter.might_contain(&"abc".to_string()));
    }

    #[test]
    fn test_false_positive_rate_is_bounded() {
        let n = 10_000;
        let target = 0.01;
        let filter = MembershipFilter::initialize((0..n).map(|i| format!("present-{}", i)), target);

        let probes = 100_000;
        let false_positives = (0..probes)
            .filter(|i| filter.might_contain(&format!("absent-{}", i)))
            .count();

        let rate = false_positives as f64 / probes as f64;
        assert!(rate < target * 2.0, "empirical fpp {} too high", rate);
    }

    #[test]
    fn test_saturation_reported() {
        let filter = MembershipFilter::with_params(FilterParams::optimal(2, 0.01));
        filter.add("a");
        filter.add("b");
        assert!(!filter.is_saturated());
        filter.add("c");
        assert!(filter.is_saturated());
    }

    #[test]
    fn test_concurrent_adds_and_probes() {
        let filter = Arc::new(MembershipFilter::with_params(FilterParams::optimal(
            40_000, 0.01,
        )));

        let writers: Vec<_> = (0..4)
            .map(|t| {
                let filter = Arc::clone(&filter);
                thread::spawn(move || {
                    for i in 0..10_000 {
                        let key = format!("{}-{}", t, i);
                        filter.add(&key);
                        // a key is visible to its writer immediately after add
                        assert!(filter.might_contain(&key));
                    }
                })
            })
            .collect();

        let reader = {
            let filter = Arc::clone(&filter);
            thread::spawn(move || {
                for i in 0..10_000 {
                    let _ = filter.might_contain(&format!("probe-{}", i));
                }
            })
        };

        for handle in writers {
            handle.join().unwrap();
        }
        reader.join().unwrap();

        for t in 0..4 {
            for i in 0..10_000 {
                assert!(filter.might_contain(&format!("{}-{}", t, i)));
            }
        }
        assert_eq!(filter.inserted(), 40_000);
    }
}
