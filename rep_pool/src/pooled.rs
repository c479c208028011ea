use crate::aggregator::{ClonotypeAggregator, StoringClonotypeAggregator};
use crate::sample_aggregator::SampleAggregator;
use rep_types::{ClonotypeContainer, OverlapType, Result, Sample};

/// Union of several samples with one storing aggregator per pooled clonotype,
/// ordered by pooled count, largest first.
#[derive(Debug, Clone)]
pub struct PooledSample {
    aggregators: Vec<StoringClonotypeAggregator>,
    count: u64,
    total_count: u64,
    number_of_samples: usize,
}

impl PooledSample {
    /// Pool under the strict (V, CDR3 nucleotide, J) rule.
    pub fn new<'a>(samples: impl IntoIterator<Item = &'a Sample>) -> Result<Self> {
        Self::with_overlap_type(samples, OverlapType::Strict)
    }

    pub fn with_overlap_type<'a>(
        samples: impl IntoIterator<Item = &'a Sample>,
        overlap_type: OverlapType,
    ) -> Result<Self> {
        let agg = SampleAggregator::new(samples, overlap_type)?;
        Ok(Self::from_aggregator(agg))
    }

    pub fn from_aggregator(agg: SampleAggregator<StoringClonotypeAggregator>) -> Self {
        let total_count = agg.count();
        let number_of_samples = agg.number_of_samples();
        let mut aggregators = agg.into_aggregators();
        let count = aggregators.iter().map(|a| a.count()).sum();
        for a in &mut aggregators {
            a.set_pooled_count(count);
        }
        aggregators.sort_by(|a, b| b.count().cmp(&a.count()));
        PooledSample {
            aggregators,
            count,
            total_count,
            number_of_samples,
        }
    }

    pub fn aggregators(&self) -> &[StoringClonotypeAggregator] {
        &self.aggregators
    }

    /// Reads over all input samples.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn number_of_samples(&self) -> usize {
        self.number_of_samples
    }
}

impl ClonotypeContainer for PooledSample {
    type Wrapper = StoringClonotypeAggregator;

    fn wrappers(&self) -> &[StoringClonotypeAggregator] {
        &self.aggregators
    }

    fn diversity(&self) -> usize {
        self.aggregators.len()
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn freq(&self) -> f64 {
        1.0
    }

    fn freq_as_input(&self) -> f64 {
        1.0
    }
}
