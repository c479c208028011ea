use crate::joint::JointClonotype;
use fxhash::FxHashSet;
use rep_types::Sample;

/// Decides whether a joint clonotype is kept in a [`crate::JointSample`].
///
/// Filters see joint clonotypes in the original sample order, before any
/// reversal.
pub trait JoinFilter: Send + Sync {
    fn pass(&self, clonotype: &JointClonotype, samples: &[Sample]) -> bool;
}

impl<F: JoinFilter + ?Sized> JoinFilter for Box<F> {
    fn pass(&self, clonotype: &JointClonotype, samples: &[Sample]) -> bool {
        (**self).pass(clonotype, samples)
    }
}

/// Keeps joint clonotypes present in at least `threshold` samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccurrenceJoinFilter {
    threshold: usize,
}

impl OccurrenceJoinFilter {
    pub fn new(threshold: usize) -> Self {
        OccurrenceJoinFilter { threshold }
    }

    /// Filter with the configured `join_occurrence_threshold`.
    pub fn from_parameters() -> anyhow::Result<Self> {
        Ok(Self::new(*rep_params::join_occurrence_threshold()?))
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

impl Default for OccurrenceJoinFilter {
    fn default() -> Self {
        OccurrenceJoinFilter::new(2)
    }
}

impl JoinFilter for OccurrenceJoinFilter {
    fn pass(&self, clonotype: &JointClonotype, _samples: &[Sample]) -> bool {
        clonotype.occurrences() >= self.threshold
    }
}

/// Keeps joint clonotypes present in one given sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleSpecificJoinFilter {
    sample_index: usize,
}

impl SampleSpecificJoinFilter {
    pub fn new(sample_index: usize) -> Self {
        SampleSpecificJoinFilter { sample_index }
    }

    pub fn sample_index(&self) -> usize {
        self.sample_index
    }
}

impl JoinFilter for SampleSpecificJoinFilter {
    fn pass(&self, clonotype: &JointClonotype, _samples: &[Sample]) -> bool {
        clonotype.present(self.sample_index)
    }
}

/// Counts occurrences among the samples whose ids are listed.
///
/// Reaching `threshold` occurrences yields `enrichment`, so with
/// `enrichment = false` the filter removes clonotypes detected in the listed
/// samples.
#[derive(Debug, Clone)]
pub struct SampleSpecificOccurrenceJoinFilter {
    sample_ids: FxHashSet<String>,
    threshold: usize,
    enrichment: bool,
}

impl SampleSpecificOccurrenceJoinFilter {
    pub fn new<S: Into<String>>(
        sample_ids: impl IntoIterator<Item = S>,
        threshold: usize,
        enrichment: bool,
    ) -> Self {
        SampleSpecificOccurrenceJoinFilter {
            sample_ids: sample_ids.into_iter().map(Into::into).collect(),
            threshold,
            enrichment,
        }
    }

    pub fn sample_ids(&self) -> &FxHashSet<String> {
        &self.sample_ids
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn is_enrichment(&self) -> bool {
        self.enrichment
    }
}

impl JoinFilter for SampleSpecificOccurrenceJoinFilter {
    fn pass(&self, clonotype: &JointClonotype, samples: &[Sample]) -> bool {
        let detected = samples
            .iter()
            .enumerate()
            .filter(|(i, s)| self.sample_ids.contains(s.sample_id()) && clonotype.present(*i))
            .count();
        if detected >= self.threshold {
            self.enrichment
        } else {
            !self.enrichment
        }
    }
}
