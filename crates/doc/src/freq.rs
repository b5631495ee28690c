//! Frequency-map primitives (§4.1): weighted sampling, percentiles, and
//! summary statistics over string-keyed frequency distributions, with a
//! prepared cumulative-weight cache for repeated sampling.

use std::cell::RefCell;
use std::collections::BTreeMap;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum FreqError {
    #[error("frequency distribution is empty")]
    Empty,
    #[error("quantile {0} is not in [0, 1]")]
    InvalidQuantile(f64),
}

/// Cumulative weights prepared from a distribution's current contents, kept
/// alongside the distribution as a parallel auxiliary structure rather than
/// mutating the distribution itself (Design Note "shared prepared
/// cumulative weights").
#[derive(Debug, Clone)]
struct Prepared {
    // (key, cumulative count through and including this key), in the same
    // deterministic order used to build the table.
    cumulative: Vec<(String, u64)>,
    total: u64,
}

/// A mapping from a stringified value to a positive integer count.
/// Invariant: every count is ≥ 1.
#[derive(Debug, Clone, Default)]
pub struct FrequencyDistribution {
    counts: BTreeMap<String, u64>,
    prepared: RefCell<Option<Prepared>>,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub p95: f64,
    pub total: u64,
    pub unique: usize,
}

impl PartialEq for FrequencyDistribution {
    fn eq(&self, other: &Self) -> bool {
        self.counts == other.counts
    }
}

impl FrequencyDistribution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_counts(counts: BTreeMap<String, u64>) -> Self {
        FrequencyDistribution {
            counts,
            prepared: RefCell::new(None),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn unique(&self) -> usize {
        self.counts.len()
    }

    pub fn counts(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }

    /// Increments the count at key `String(v)`.
    pub fn update(&mut self, key: impl Into<String>) {
        *self.counts.entry(key.into()).or_insert(0) += 1;
        *self.prepared.get_mut() = None;
    }

    pub fn update_by(&mut self, key: impl Into<String>, amount: u64) {
        if amount == 0 {
            return;
        }
        *self.counts.entry(key.into()).or_insert(0) += amount;
        *self.prepared.get_mut() = None;
    }

    /// Merges another distribution's counts into this one.
    pub fn merge(&mut self, other: &FrequencyDistribution) {
        for (k, c) in &other.counts {
            *self.counts.entry(k.clone()).or_insert(0) += c;
        }
        *self.prepared.get_mut() = None;
    }

    fn ensure_prepared(&self) {
        if self.prepared.borrow().is_some() {
            return;
        }
        let mut running = 0u64;
        let cumulative = self
            .counts
            .iter()
            .map(|(k, c)| {
                running += c;
                (k.clone(), running)
            })
            .collect();
        *self.prepared.borrow_mut() = Some(Prepared {
            cumulative,
            total: running,
        });
    }

    /// Draws a key by weighted sample, given `r` drawn uniformly from
    /// `[0, 1)`. The cumulative table is built in sorted (`BTreeMap`)
    /// insertion order, which need not be numeric, and is cached so
    /// repeated sampling is O(log n) via binary search once prepared.
    pub fn sample(&self, r: f64) -> Result<&str, FreqError> {
        if self.counts.is_empty() {
            return Err(FreqError::Empty);
        }
        self.ensure_prepared();
        let prepared = self.prepared.borrow();
        let prepared = prepared.as_ref().unwrap();
        let target = (r * prepared.total as f64).floor() as u64;
        let target = target.min(prepared.total.saturating_sub(1));

        let idx = prepared
            .cumulative
            .partition_point(|(_, cum)| *cum <= target);
        let idx = idx.min(prepared.cumulative.len() - 1);

        // SAFETY-free: we hand back a reference into `self.counts`, whose
        // keys are identical to (and outlive) the prepared table's.
        let key = &prepared.cumulative[idx].0;
        Ok(self.counts.get_key_value(key).unwrap().0.as_str())
    }

    /// Returns the numeric value of the key at quantile `q` ∈ [0, 1],
    /// sorting keys numerically and advancing cumulatively until
    /// `cum ≥ q × total`.
    pub fn percentile(&self, q: f64) -> Result<f64, FreqError> {
        if !(0.0..=1.0).contains(&q) {
            return Err(FreqError::InvalidQuantile(q));
        }
        if self.counts.is_empty() {
            return Err(FreqError::Empty);
        }
        let mut numeric: Vec<(f64, u64)> = self
            .counts
            .iter()
            .filter_map(|(k, c)| k.parse::<f64>().ok().map(|v| (v, *c)))
            .collect();
        numeric.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        let total: u64 = numeric.iter().map(|(_, c)| c).sum();
        if total == 0 {
            return Err(FreqError::Empty);
        }
        let target = (q * total as f64).ceil().max(1.0) as u64;

        let mut cum = 0u64;
        for (v, c) in &numeric {
            cum += c;
            if cum >= target {
                return Ok(*v);
            }
        }
        Ok(numeric.last().unwrap().0)
    }

    /// Single-pass-equivalent min/max/median/p95/total/unique.
    pub fn stats(&self) -> Result<Stats, FreqError> {
        if self.counts.is_empty() {
            return Err(FreqError::Empty);
        }
        Ok(Stats {
            min: self.percentile(0.0)?,
            max: self.percentile(1.0)?,
            median: self.percentile(0.5)?,
            p95: self.percentile(0.95)?,
            total: self.total(),
            unique: self.unique(),
        })
    }
}

impl serde::Serialize for FrequencyDistribution {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.counts.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for FrequencyDistribution {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(FrequencyDistribution::from_counts(BTreeMap::deserialize(
            deserializer,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist(pairs: &[(&str, u64)]) -> FrequencyDistribution {
        let mut d = FrequencyDistribution::new();
        for (k, c) in pairs {
            d.update_by(*k, *c);
        }
        d
    }

    #[test]
    fn empty_distribution_errors() {
        let d = FrequencyDistribution::new();
        assert_eq!(d.sample(0.5), Err(FreqError::Empty));
        assert_eq!(d.percentile(0.5), Err(FreqError::Empty));
        assert_eq!(d.stats(), Err(FreqError::Empty));
    }

    #[test]
    fn single_entry_always_sampled() {
        let d = dist(&[("A", 7)]);
        for r in [0.0, 0.3, 0.999] {
            assert_eq!(d.sample(r).unwrap(), "A");
        }
    }

    #[test]
    fn percentile_bounds() {
        let d = dist(&[("1", 10), ("2", 10), ("3", 10)]);
        assert_eq!(d.percentile(0.0).unwrap(), 1.0);
        assert_eq!(d.percentile(1.0).unwrap(), 3.0);
    }

    #[test]
    fn invalid_quantile_errors() {
        let d = dist(&[("1", 1)]);
        assert_eq!(d.percentile(-0.1), Err(FreqError::InvalidQuantile(-0.1)));
        assert_eq!(d.percentile(1.1), Err(FreqError::InvalidQuantile(1.1)));
    }

    #[test]
    fn stats_invariants() {
        let d = dist(&[("1", 5), ("2", 3), ("10", 50), ("20", 2)]);
        let s = d.stats().unwrap();
        assert_eq!(s.total, 60);
        assert!(s.min <= s.median);
        assert!(s.median <= s.p95);
        assert!(s.p95 <= s.max);
    }

    #[test]
    fn sampling_reproduces_distribution_within_tolerance() {
        let d = dist(&[("A", 50), ("B", 30), ("C", 20)]);
        let mut counts = BTreeMap::new();
        let n = 20_000;
        for i in 0..n {
            // Deterministic low-discrepancy sequence in [0, 1) stands in
            // for a PRNG here; the test only checks the sampler's
            // cumulative-weight math, not RNG quality (explicitly a
            // non-goal, §1).
            let r = ((i as f64) * 0.618_033_988_75) % 1.0;
            let key = d.sample(r).unwrap().to_string();
            *counts.entry(key).or_insert(0u64) += 1;
        }
        for (key, expected) in [("A", 0.5), ("B", 0.3), ("C", 0.2)] {
            let observed = *counts.get(key).unwrap_or(&0) as f64 / n as f64;
            assert!(
                (observed - expected).abs() < 0.05,
                "key {key}: observed {observed}, expected {expected}"
            );
        }
    }

    #[test]
    fn merge_sums_counts() {
        let mut a = dist(&[("x", 1)]);
        let b = dist(&[("x", 2), ("y", 3)]);
        a.merge(&b);
        assert_eq!(*a.counts().get("x").unwrap(), 3);
        assert_eq!(*a.counts().get("y").unwrap(), 3);
    }
}
