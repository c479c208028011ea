use fxhash::FxHashSet;
use rep_stats::JITTER_LOG10;
use rep_types::{Clonotype, ClonotypeKey, ClonotypeWrapper};
use std::sync::Arc;

/// Incidence, read count and log-frequency bookkeeping of one pooled clonotype.
///
/// Clonotypes must be fed sample by sample: the frequency of a clonotype is
/// summed within a sample and the log10 of that sum is added to the running
/// total once the next sample starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    sample_id: usize,
    incidence_count: usize,
    count: u64,
    closed_log_sum: f64,
    freq_rem: f64,
}

impl Accumulator {
    pub fn new(clonotype: &Clonotype, sample_id: usize) -> Self {
        Accumulator {
            sample_id,
            incidence_count: 1,
            count: clonotype.count(),
            closed_log_sum: 0.0,
            freq_rem: clonotype.freq(),
        }
    }

    pub fn combine(&mut self, clonotype: &Clonotype, sample_id: usize) {
        if sample_id != self.sample_id {
            self.closed_log_sum += log10_or_zero(self.freq_rem);
            self.freq_rem = clonotype.freq();
            self.incidence_count += 1;
            self.sample_id = sample_id;
        } else {
            self.freq_rem += clonotype.freq();
        }
        self.count += clonotype.count();
    }

    /// Number of distinct samples the clonotype was seen in.
    pub fn incidence_count(&self) -> usize {
        self.incidence_count
    }

    /// Total reads across samples.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Sum over samples of log10 of the per-sample frequency.
    pub fn freq_log_sum(&self) -> f64 {
        self.closed_log_sum + log10_or_zero(self.freq_rem)
    }

    /// Geometric mean frequency over the samples containing the clonotype.
    pub fn freq_geom_mean(&self) -> f64 {
        10f64.powf(self.freq_log_sum() / self.incidence_count as f64)
    }

    /// Geometric mean frequency over `number_of_samples`, with samples lacking
    /// the clonotype imputed at the jitter frequency.
    pub fn freq_geom_mean_imputed(&self, number_of_samples: usize) -> f64 {
        let missing = number_of_samples.saturating_sub(self.incidence_count) as f64;
        10f64.powf((self.freq_log_sum() + missing * JITTER_LOG10) / number_of_samples as f64)
    }
}

fn log10_or_zero(freq: f64) -> f64 {
    if freq > 0.0 {
        freq.log10()
    } else {
        0.0
    }
}

/// A pooled clonotype, built from the first occurrence and updated with each
/// further occurrence in the order samples are streamed.
pub trait ClonotypeAggregator: Send + Sync {
    fn create(clonotype: &Arc<Clonotype>, sample_id: usize) -> Self
    where
        Self: Sized;

    fn accumulator(&self) -> &Accumulator;

    fn accumulator_mut(&mut self) -> &mut Accumulator;

    /// Offer a new occurrence as representative. True if it was taken.
    fn try_replace(&mut self, clonotype: &Arc<Clonotype>, sample_id: usize) -> bool;

    fn combine(&mut self, clonotype: &Arc<Clonotype>, sample_id: usize) -> bool {
        self.accumulator_mut().combine(clonotype, sample_id);
        self.try_replace(clonotype, sample_id)
    }

    fn count(&self) -> u64 {
        self.accumulator().count()
    }

    fn incidence_count(&self) -> usize {
        self.accumulator().incidence_count()
    }
}

/// Keeps the occurrence with the highest within-sample frequency.
#[derive(Debug, Clone)]
pub struct MaxClonotypeAggregator {
    accumulator: Accumulator,
    representative: Arc<Clonotype>,
    max_freq: f64,
    max_count: u64,
}

impl MaxClonotypeAggregator {
    pub fn representative(&self) -> &Arc<Clonotype> {
        &self.representative
    }

    pub fn max_freq(&self) -> f64 {
        self.max_freq
    }

    /// Largest single-occurrence read count.
    pub fn max_count(&self) -> u64 {
        self.max_count
    }
}

impl ClonotypeAggregator for MaxClonotypeAggregator {
    fn create(clonotype: &Arc<Clonotype>, sample_id: usize) -> Self {
        MaxClonotypeAggregator {
            accumulator: Accumulator::new(clonotype, sample_id),
            representative: clonotype.clone(),
            max_freq: clonotype.freq(),
            max_count: clonotype.count(),
        }
    }

    fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    fn accumulator_mut(&mut self) -> &mut Accumulator {
        &mut self.accumulator
    }

    fn try_replace(&mut self, clonotype: &Arc<Clonotype>, _sample_id: usize) -> bool {
        self.max_count = self.max_count.max(clonotype.count());
        if clonotype.freq() > self.max_freq {
            self.max_freq = clonotype.freq();
            self.representative = clonotype.clone();
            true
        } else {
            false
        }
    }
}

/// Max aggregator that also records its distinct convergent variants and acts
/// as a member of a [`crate::PooledSample`].
#[derive(Debug, Clone)]
pub struct StoringClonotypeAggregator {
    max: MaxClonotypeAggregator,
    variants: FxHashSet<ClonotypeKey>,
    pooled_count: Option<u64>,
}

fn strict_key(clonotype: &Clonotype) -> ClonotypeKey {
    ClonotypeKey::Strict(
        clonotype.v().clone(),
        clonotype.cdr3nt().to_string(),
        clonotype.j().clone(),
    )
}

impl StoringClonotypeAggregator {
    pub fn representative(&self) -> &Arc<Clonotype> {
        self.max.representative()
    }

    pub fn max_freq(&self) -> f64 {
        self.max.max_freq()
    }

    /// Number of distinct (V, CDR3 nucleotide, J) variants merged here.
    pub fn diversity(&self) -> usize {
        self.variants.len()
    }

    /// Share of the pooled reads; NaN until placed in a pooled sample.
    pub fn freq(&self) -> f64 {
        match self.pooled_count {
            Some(0) => 0.0,
            Some(total) => self.count() as f64 / total as f64,
            None => f64::NAN,
        }
    }

    pub fn freq_as_input(&self) -> f64 {
        1.0
    }

    pub(crate) fn set_pooled_count(&mut self, total: u64) {
        self.pooled_count = Some(total);
    }
}

impl ClonotypeAggregator for StoringClonotypeAggregator {
    fn create(clonotype: &Arc<Clonotype>, sample_id: usize) -> Self {
        let mut variants = FxHashSet::default();
        variants.insert(strict_key(clonotype));
        StoringClonotypeAggregator {
            max: MaxClonotypeAggregator::create(clonotype, sample_id),
            variants,
            pooled_count: None,
        }
    }

    fn accumulator(&self) -> &Accumulator {
        self.max.accumulator()
    }

    fn accumulator_mut(&mut self) -> &mut Accumulator {
        self.max.accumulator_mut()
    }

    fn try_replace(&mut self, clonotype: &Arc<Clonotype>, sample_id: usize) -> bool {
        self.variants.insert(strict_key(clonotype));
        self.max.try_replace(clonotype, sample_id)
    }
}

impl ClonotypeWrapper for StoringClonotypeAggregator {
    fn clonotype(&self) -> &Arc<Clonotype> {
        self.representative()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rep_stats::JITTER;
    use rep_types::testing::{sample_of, ClonotypeBuilder};

    fn in_sample(freqs: &[(u64, &str)]) -> Vec<Arc<Clonotype>> {
        let s = sample_of(
            "s",
            freqs
                .iter()
                .map(|&(n, nt)| ClonotypeBuilder::new(nt, "C").count(n).build())
                .collect(),
        );
        s.clonotypes().to_vec()
    }

    fn by_nt<'a>(clonotypes: &'a [Arc<Clonotype>], nt: &str) -> &'a Arc<Clonotype> {
        clonotypes.iter().find(|c| c.cdr3nt() == nt).unwrap()
    }

    #[test]
    fn test_accumulator_geom_mean() {
        // X at 0.1 in sample 0, 0.01 in sample 1, absent from sample 2
        let s0 = in_sample(&[(1, "AAA"), (9, "CCC")]);
        let s1 = in_sample(&[(1, "AAA"), (99, "CCC")]);
        let x0 = by_nt(&s0, "AAA");
        let x1 = by_nt(&s1, "AAA");

        let mut acc = Accumulator::new(x0, 0);
        acc.combine(x1, 1);
        assert_eq!(acc.incidence_count(), 2);
        assert_eq!(acc.count(), 2);
        assert!((acc.freq_log_sum() - (-3.0)).abs() < 1e-12);
        assert!((acc.freq_geom_mean() - 10f64.powf(-1.5)).abs() < 1e-12);
        let expected = 10f64.powf((0.1f64.log10() + 0.01f64.log10() + JITTER.log10()) / 3.0);
        assert!((acc.freq_geom_mean_imputed(3) - expected).abs() < 1e-15);
        assert!((acc.freq_geom_mean_imputed(3) - 1e-4).abs() < 1e-12);
    }

    #[test]
    fn test_within_sample_frequencies_add() {
        let s0 = in_sample(&[(2, "AAA"), (2, "AAC"), (6, "CCC")]);
        let mut acc = Accumulator::new(by_nt(&s0, "AAA"), 0);
        acc.combine(by_nt(&s0, "AAC"), 0);
        assert_eq!(acc.incidence_count(), 1);
        assert!((acc.freq_log_sum() - 0.4f64.log10()).abs() < 1e-12);
    }

    #[test]
    fn test_max_and_storing() {
        let s0 = in_sample(&[(5, "AAA"), (5, "CCC")]);
        let s1 = in_sample(&[(1, "AAC"), (9, "GGG")]);
        let (aaa, aac) = (by_nt(&s0, "AAA"), by_nt(&s1, "AAC"));
        let mut agg = StoringClonotypeAggregator::create(aaa, 0);
        assert!(!agg.combine(aac, 1));
        assert_eq!(agg.representative().cdr3nt(), "AAA");
        assert_eq!(agg.diversity(), 2);
        assert_eq!(agg.count(), 6);
        assert!(agg.freq().is_nan());
        assert_eq!(agg.freq_as_input(), 1.0);

        let mut max = MaxClonotypeAggregator::create(aac, 0);
        assert!(max.combine(aaa, 1));
        assert_eq!(max.max_freq(), 0.5);
        assert_eq!(max.max_count(), 5);
    }
}
