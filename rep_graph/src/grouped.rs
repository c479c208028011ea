use crate::grouping::{ClonotypeGroupingFactory, GroupingKind};
use fxhash::FxHashMap;
use rep_types::{Clonotype, ClonotypeContainer, ClonotypeWrapper};
use std::sync::Arc;

/// Coding clonotypes of a container partitioned into groups, by default of
/// equal V, J and CDR3 length.
#[derive(Debug, Clone)]
pub struct GroupedSample<F: ClonotypeGroupingFactory = GroupingKind> {
    factory: F,
    groups: FxHashMap<F::Group, Vec<Arc<Clonotype>>>,
    total: usize,
}

impl Default for GroupedSample<GroupingKind> {
    fn default() -> Self {
        GroupedSample::new(GroupingKind::VJL)
    }
}

impl<F: ClonotypeGroupingFactory> GroupedSample<F> {
    pub fn new(factory: F) -> Self {
        GroupedSample {
            factory,
            groups: FxHashMap::default(),
            total: 0,
        }
    }

    /// Add a clonotype; non-coding ones are skipped.
    pub fn add(&mut self, clonotype: &Arc<Clonotype>) {
        if clonotype.is_coding() {
            self.groups
                .entry(self.factory.group(clonotype))
                .or_default()
                .push(clonotype.clone());
            self.total += 1;
        }
    }

    pub fn add_all<C: ClonotypeContainer>(&mut self, container: &C) {
        for w in container.wrappers() {
            self.add(w.clonotype());
        }
    }

    /// Members of the group `clonotype` would belong to.
    pub fn group(&self, clonotype: &Clonotype) -> Option<&[Arc<Clonotype>]> {
        self.groups
            .get(&self.factory.group(clonotype))
            .map(Vec::as_slice)
    }

    /// Share of the group more abundant than `clonotype`, ties counting half.
    pub fn abundance_p_value(&self, clonotype: &Clonotype) -> Option<f64> {
        let members = self.group(clonotype)?;
        let freq = clonotype.freq();
        let score: f64 = members
            .iter()
            .map(|other| {
                if freq < other.freq() {
                    1.0
                } else if freq == other.freq() {
                    0.5
                } else {
                    0.0
                }
            })
            .sum();
        Some(score / members.len() as f64)
    }

    /// Number of coding clonotypes added.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn number_of_groups(&self) -> usize {
        self.groups.len()
    }
}
