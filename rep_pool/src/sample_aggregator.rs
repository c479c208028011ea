use crate::aggregator::ClonotypeAggregator;
use fxhash::FxHashMap;
use log::info;
use rep_types::{AaNotNtKey, Clonotype, ClonotypeKey, ClonotypeKeyGen, OverlapType, Result, Sample};

/// Where aggregators are looked up: by exact key, or for the convergent rule
/// by amino acid bucket followed by a probe match.
#[derive(Debug)]
enum AggregatorIndex {
    Exact(FxHashMap<ClonotypeKey, usize>),
    Convergent(FxHashMap<String, Vec<(AaNotNtKey, usize)>>),
}

/// Streams a set of samples into one aggregator per distinct clonotype key.
///
/// Aggregators keep the order in which their keys were first seen.
#[derive(Debug)]
pub struct SampleAggregator<A> {
    key_gen: ClonotypeKeyGen,
    aggregators: Vec<A>,
    index: AggregatorIndex,
    count: u64,
    number_of_samples: usize,
}

impl<A: ClonotypeAggregator> SampleAggregator<A> {
    pub fn new<'a>(
        samples: impl IntoIterator<Item = &'a Sample>,
        overlap_type: OverlapType,
    ) -> Result<Self> {
        let index = if overlap_type.has_exact_keys() {
            AggregatorIndex::Exact(FxHashMap::default())
        } else {
            AggregatorIndex::Convergent(FxHashMap::default())
        };
        let mut agg = SampleAggregator {
            key_gen: ClonotypeKeyGen::new(overlap_type),
            aggregators: Vec::new(),
            index,
            count: 0,
            number_of_samples: 0,
        };
        for (sample_id, sample) in samples.into_iter().enumerate() {
            info!("Pooling sample {}", sample.sample_id());
            agg.add_sample(sample, sample_id)?;
        }
        Ok(agg)
    }

    fn add_sample(&mut self, sample: &Sample, sample_id: usize) -> Result<()> {
        for clonotype in sample.clonotypes() {
            match self.position(clonotype)? {
                Some(i) => {
                    self.aggregators[i].combine(clonotype, sample_id);
                }
                None => {
                    let i = self.aggregators.len();
                    self.aggregators.push(A::create(clonotype, sample_id));
                    match &mut self.index {
                        AggregatorIndex::Exact(by_key) => {
                            by_key.insert(self.key_gen.key(clonotype)?, i);
                        }
                        AggregatorIndex::Convergent(by_aa) => {
                            let probe = self.key_gen.probe(clonotype);
                            by_aa
                                .entry(probe.cdr3aa.clone())
                                .or_default()
                                .push((probe, i));
                        }
                    }
                }
            }
        }
        self.count += sample.count();
        self.number_of_samples = sample_id + 1;
        Ok(())
    }

    fn position(&self, clonotype: &Clonotype) -> Result<Option<usize>> {
        Ok(match &self.index {
            AggregatorIndex::Exact(by_key) => by_key.get(&self.key_gen.key(clonotype)?).copied(),
            AggregatorIndex::Convergent(by_aa) => {
                let probe = self.key_gen.probe(clonotype);
                by_aa.get(&probe.cdr3aa).and_then(|bucket| {
                    bucket
                        .iter()
                        .find(|(key, _)| key.matches(&probe))
                        .map(|&(_, i)| i)
                })
            }
        })
    }

    /// Aggregator that `clonotype` would be merged into.
    pub fn get(&self, clonotype: &Clonotype) -> Option<&A> {
        self.position(clonotype)
            .ok()
            .flatten()
            .map(|i| &self.aggregators[i])
    }

    pub fn overlap_type(&self) -> OverlapType {
        self.key_gen.overlap_type()
    }

    pub fn aggregators(&self) -> &[A] {
        &self.aggregators
    }

    pub fn into_aggregators(self) -> Vec<A> {
        self.aggregators
    }

    /// Number of distinct pooled clonotypes.
    pub fn diversity(&self) -> usize {
        self.aggregators.len()
    }

    /// Sum of the read counts of all streamed samples.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn number_of_samples(&self) -> usize {
        self.number_of_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::MaxClonotypeAggregator;
    use pretty_assertions::assert_eq;
    use rep_types::testing::{sample_of, ClonotypeBuilder};

    fn samples() -> Vec<Sample> {
        vec![
            sample_of(
                "s1",
                vec![
                    ClonotypeBuilder::new("TGTGCC", "CA").count(6).build(),
                    ClonotypeBuilder::new("TGTGCT", "CA").count(4).build(),
                ],
            ),
            sample_of(
                "s2",
                vec![
                    ClonotypeBuilder::new("TGTGCC", "CA").count(2).build(),
                    ClonotypeBuilder::new("TTTGGG", "FG").count(2).build(),
                ],
            ),
        ]
    }

    #[test]
    fn test_strict_pooling() {
        let samples = samples();
        let agg: SampleAggregator<MaxClonotypeAggregator> =
            SampleAggregator::new(&samples, OverlapType::Strict).unwrap();
        assert_eq!(agg.diversity(), 3);
        assert_eq!(agg.count(), 14);
        assert_eq!(agg.number_of_samples(), 2);
        let shared = agg.get(&samples[1].clonotypes()[0]).unwrap();
        assert_eq!(shared.count(), 8);
        assert_eq!(shared.incidence_count(), 2);
    }

    #[test]
    fn test_amino_acid_pooling() {
        let samples = samples();
        let agg: SampleAggregator<MaxClonotypeAggregator> =
            SampleAggregator::new(&samples, OverlapType::AminoAcid).unwrap();
        assert_eq!(agg.diversity(), 2);
        let ca = agg.get(&samples[0].clonotypes()[1]).unwrap();
        assert_eq!(ca.count(), 12);
        assert_eq!(ca.incidence_count(), 2);
    }

    #[test]
    fn test_convergent_pooling() {
        let samples = samples();
        let agg: SampleAggregator<MaxClonotypeAggregator> =
            SampleAggregator::new(&samples, OverlapType::AminoAcidNonNucleotide).unwrap();
        // TGTGCT joins TGTGCC, the second TGTGCC has no differing variant
        assert_eq!(agg.diversity(), 3);
        assert_eq!(agg.aggregators()[0].count(), 10);
    }
}
