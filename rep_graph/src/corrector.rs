use crate::tree_error;
use fxhash::FxHashMap;
use log::debug;
use rayon::prelude::*;
use rep_types::{Clonotype, Result, Sample, Segment};
use seq_tree::{Alphabet, SequenceTreeMap, TreeSearchParameters};
use std::sync::Arc;

enum Trees {
    Single(SequenceTreeMap<Arc<Clonotype>>),
    ByVj(FxHashMap<(Segment, Segment), SequenceTreeMap<Arc<Clonotype>>>),
}

impl Trees {
    fn build(sample: &Sample, by_vj: bool) -> Result<Self> {
        // insert rarest first so that an abundant clonotype owns its sequence
        let mut trees = if by_vj {
            Trees::ByVj(FxHashMap::default())
        } else {
            Trees::Single(SequenceTreeMap::new(Alphabet::Nucleotide))
        };
        for c in sample.clonotypes().iter().rev() {
            let tree = match &mut trees {
                Trees::Single(tree) => tree,
                Trees::ByVj(trees) => trees
                    .entry((c.v().clone(), c.j().clone()))
                    .or_insert_with(|| SequenceTreeMap::new(Alphabet::Nucleotide)),
            };
            tree.insert(c.cdr3nt(), c.clone()).map_err(tree_error)?;
        }
        Ok(trees)
    }

    fn get(&self, clonotype: &Clonotype) -> Option<&SequenceTreeMap<Arc<Clonotype>>> {
        match self {
            Trees::Single(tree) => Some(tree),
            Trees::ByVj(trees) => trees.get(&(clonotype.v().clone(), clonotype.j().clone())),
        }
    }
}

/// Removes likely sequencing errors from a sample.
///
/// Clonotypes whose CDR3 nucleotide sequences differ by `m` substitutions are
/// compared by read count: when the log10 count ratio exceeds
/// `m * -log10(ratio_threshold)` the smaller one is dropped and its reads are
/// added to the larger one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corrector {
    search: TreeSearchParameters,
    log_ratio_threshold: f64,
    require_segment_match: bool,
}

impl Corrector {
    pub fn new(max_mismatches: usize, ratio_threshold: f64, require_segment_match: bool) -> Self {
        Corrector {
            search: TreeSearchParameters::substitutions_only(max_mismatches),
            log_ratio_threshold: -ratio_threshold.log10(),
            require_segment_match,
        }
    }

    /// Corrector with the configured mismatch and ratio thresholds.
    pub fn from_parameters(require_segment_match: bool) -> anyhow::Result<Self> {
        Ok(Self::new(
            *rep_params::corrector_max_mismatches()?,
            *rep_params::corrector_ratio_threshold()?,
            require_segment_match,
        ))
    }

    pub fn max_mismatches(&self) -> usize {
        self.search.max_substitutions
    }

    pub fn ratio_threshold(&self) -> f64 {
        10f64.powf(-self.log_ratio_threshold)
    }

    pub fn requires_segment_match(&self) -> bool {
        self.require_segment_match
    }

    /// Corrected copy of `sample`. Fails with
    /// [`rep_types::RepError::MissingProperty`] on a CDR3 nucleotide symbol
    /// outside `ACGTN`.
    pub fn correct(&self, sample: &Sample) -> Result<Sample> {
        let trees = Trees::build(sample, self.require_segment_match)?;
        let counts: Vec<u64> = sample
            .clonotypes()
            .par_iter()
            .map(|c| match trees.get(c) {
                Some(tree) => self.corrected_count(c, tree),
                None => c.count(),
            })
            .collect();
        let corrected = sample.reweighted(|i, _| counts[i]);
        debug!(
            "Corrected sample {}: {} of {} clonotypes kept",
            sample.sample_id(),
            corrected.diversity(),
            sample.diversity()
        );
        Ok(corrected)
    }

    fn corrected_count(&self, clonotype: &Clonotype, tree: &SequenceTreeMap<Arc<Clonotype>>) -> u64 {
        let mut total = clonotype.count();
        for hit in tree.neighborhood(clonotype.cdr3nt(), &self.search) {
            let other = hit.value;
            if other.strict_key() == clonotype.strict_key() {
                continue;
            }
            let threshold = hit.mutations.total() as f64 * self.log_ratio_threshold;
            let log_ratio = (clonotype.count() as f64 / other.count() as f64).log10();
            if log_ratio > threshold {
                total += other.count();
            } else if log_ratio < -threshold {
                return 0;
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rep_types::testing::{sample_of, ClonotypeBuilder};
    use rep_types::RepError;

    fn nt(seq: &str, count: u64, j: &str) -> Clonotype {
        ClonotypeBuilder::new(seq, "XXX").count(count).j(j).build()
    }

    fn counts(sample: &Sample) -> Vec<(String, u64)> {
        sample
            .iter()
            .map(|c| (c.cdr3nt().to_string(), c.count()))
            .collect()
    }

    #[test]
    fn test_rare_neighbor_absorbed() {
        let s = sample_of(
            "s",
            vec![
                nt("AAAAAAAAA", 1000, "J1"),
                nt("AAAAAAACC", 100, "J1"),
                nt("AAAAAAAAC", 10, "J1"),
                nt("CCCCCCCCC", 5, "J1"),
            ],
        );
        let corrected = Corrector::new(2, 0.05, false).correct(&s).unwrap();
        assert_eq!(
            counts(&corrected),
            [
                ("AAAAAAAAA".to_string(), 1010),
                ("AAAAAAACC".to_string(), 100),
                ("CCCCCCCCC".to_string(), 5),
            ]
        );
    }

    #[test]
    fn test_segment_match() {
        let s = sample_of(
            "s",
            vec![nt("AAAAAAAAA", 1000, "J1"), nt("AAAAAAAAC", 10, "J2")],
        );
        let corrector = Corrector::new(2, 0.05, true);
        assert!(corrector.requires_segment_match());
        let corrected = corrector.correct(&s).unwrap();
        assert_eq!(corrected.diversity(), 2);
        assert_eq!(corrected.count(), 1010);
        assert_eq!(Corrector::new(2, 0.05, false).correct(&s).unwrap().diversity(), 1);
    }

    #[test]
    fn test_parameters() {
        let corrector = Corrector::from_parameters(false).unwrap();
        assert_eq!(corrector.max_mismatches(), 2);
        assert!((corrector.ratio_threshold() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_bad_symbol() {
        let s = sample_of("s", vec![nt("AAAXAAAAA", 10, "J1")]);
        assert_eq!(
            Corrector::new(2, 0.05, false).correct(&s).unwrap_err(),
            RepError::MissingProperty('X')
        );
    }
}
