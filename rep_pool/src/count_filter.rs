use crate::aggregator::{ClonotypeAggregator, MaxClonotypeAggregator};
use crate::sample_aggregator::SampleAggregator;
use anyhow::Result;
use rep_filter::{ClonotypeFilter, FilterState};
use rep_types::{Clonotype, OverlapType, Sample};

/// Drops clonotypes that are vastly outnumbered by the same clonotype pooled
/// from a set of reference samples, as happens with cross-sample
/// contamination.
///
/// A clonotype passes when the reference pool lacks it or when the pooled
/// count is below `count * ratio`.
#[derive(Debug)]
pub struct CountRatioFilter {
    pool: SampleAggregator<MaxClonotypeAggregator>,
    ratio: f64,
    state: FilterState,
}

impl CountRatioFilter {
    pub fn new<'a>(
        samples: impl IntoIterator<Item = &'a Sample>,
        ratio: f64,
        negative: bool,
    ) -> Result<Self> {
        Ok(CountRatioFilter {
            pool: SampleAggregator::new(samples, OverlapType::Strict)?,
            ratio,
            state: FilterState::new(negative),
        })
    }

    /// Filter using the configured `count_ratio_threshold`.
    pub fn with_default_ratio<'a>(
        samples: impl IntoIterator<Item = &'a Sample>,
        negative: bool,
    ) -> Result<Self> {
        let ratio = *rep_params::count_ratio_threshold()?;
        Self::new(samples, ratio, negative)
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn pool(&self) -> &SampleAggregator<MaxClonotypeAggregator> {
        &self.pool
    }
}

impl ClonotypeFilter for CountRatioFilter {
    fn check_pass(&self, clonotype: &Clonotype) -> bool {
        match self.pool.get(clonotype) {
            None => true,
            Some(agg) => (agg.count() as f64) < clonotype.count() as f64 * self.ratio,
        }
    }

    fn state(&self) -> &FilterState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rep_filter::SampleFilterExt;
    use rep_types::testing::{sample_of, ClonotypeBuilder};

    fn siblings() -> Vec<Sample> {
        vec![
            sample_of("s1", vec![ClonotypeBuilder::new("TGTGCC", "CA").count(3000).build()]),
            sample_of("s2", vec![ClonotypeBuilder::new("TGTGCC", "CA").count(2000).build()]),
        ]
    }

    fn target() -> Sample {
        sample_of(
            "target",
            vec![
                ClonotypeBuilder::new("TGTGCC", "CA").count(100).build(),
                ClonotypeBuilder::new("TTTTTT", "FF").count(10).build(),
            ],
        )
    }

    #[test]
    fn test_contaminant_dropped() {
        let filter = CountRatioFilter::new(&siblings(), 20.0, false).unwrap();
        let kept = filter.filter_sample(&target(), None);
        assert_eq!(kept.diversity(), 1);
        assert_eq!(kept.clonotypes()[0].cdr3nt(), "TTTTTT");
        let stats = filter.stats();
        assert_eq!(stats.passed_clonotypes, 1);
        assert_eq!(stats.total_clonotypes, 2);
    }

    #[test]
    fn test_higher_ratio_passes() {
        let filter = CountRatioFilter::new(&siblings(), 100.0, false).unwrap();
        assert!(filter.pass(&target().clonotypes()[0]));
        let negated = CountRatioFilter::new(&siblings(), 100.0, true).unwrap();
        assert!(!negated.pass(&target().clonotypes()[0]));
    }

    #[test]
    fn test_default_ratio() {
        let filter = CountRatioFilter::with_default_ratio(&siblings(), false).unwrap();
        assert_eq!(filter.ratio(), 20.0);
    }
}
