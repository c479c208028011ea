use crate::grouping::{ClonotypeGroupingFactory, GroupingKind};
use crate::tree_error;
use fxhash::{FxHashMap, FxHashSet};
use log::info;
use rayon::prelude::*;
use rep_types::{Clonotype, ClonotypeContainer, ClonotypeWrapper, RepError, Result};
use seq_tree::{Alphabet, SequenceTreeMap, TreeSearchParameters};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Number of neighbors of a clonotype within its group, and the group size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DegreeStatistics {
    pub degree: i64,
    pub group_count: i64,
}

impl DegreeStatistics {
    /// Reported for non-coding clonotypes.
    pub const UNDEF: DegreeStatistics = DegreeStatistics {
        degree: -1,
        group_count: -1,
    };

    pub fn is_undefined(&self) -> bool {
        *self == Self::UNDEF
    }
}

impl fmt::Display for DegreeStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.degree, self.group_count)
    }
}

type ByCdr3aa = FxHashMap<String, Vec<Arc<Clonotype>>>;

/// Counts, for each clonotype, the other clonotypes of its group whose CDR3
/// amino acid sequence is within `substitutions` substitutions, `indels`
/// insertions and deletions (each, and in sum), and `total` mismatches.
///
/// The index is filled by [`DegreeStatisticsCalculator::initialize`] and is
/// read-only afterwards, so queries can run concurrently.
pub struct DegreeStatisticsCalculator<F: ClonotypeGroupingFactory = GroupingKind> {
    factory: F,
    search: TreeSearchParameters,
    max_indels: usize,
    tree: SequenceTreeMap<Vec<Arc<Clonotype>>>,
    group_counts: FxHashMap<F::Group, u64>,
}

impl<F: ClonotypeGroupingFactory> DegreeStatisticsCalculator<F> {
    pub fn new(substitutions: usize, indels: usize, total: usize, factory: F) -> Self {
        DegreeStatisticsCalculator {
            factory,
            search: TreeSearchParameters::new(substitutions, indels, indels, total),
            max_indels: indels,
            tree: SequenceTreeMap::new(Alphabet::AminoAcid),
            group_counts: FxHashMap::default(),
        }
    }

    /// Calculator with the configured neighborhood thresholds.
    pub fn from_parameters(factory: F) -> anyhow::Result<Self> {
        Ok(Self::new(
            *rep_params::degree_substitutions()?,
            *rep_params::degree_indels()?,
            *rep_params::degree_total_mismatches()?,
            factory,
        ))
    }

    pub fn search_parameters(&self) -> &TreeSearchParameters {
        &self.search
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Index the coding clonotypes of `container`. Can be called repeatedly
    /// to index several containers together.
    ///
    /// Fails with [`RepError::MissingProperty`] on a CDR3 amino acid symbol
    /// outside the amino acid alphabet, leaving the index unchanged.
    pub fn initialize<C: ClonotypeContainer>(&mut self, container: &C) -> Result<()> {
        let factory = &self.factory;
        let empty = || (ByCdr3aa::default(), FxHashMap::<F::Group, u64>::default());
        let (by_aa, groups) = container
            .wrappers()
            .par_iter()
            .map(|w| w.clonotype())
            .filter(|c| c.is_coding())
            .fold(empty, |(mut by_aa, mut groups), c| {
                by_aa
                    .entry(c.cdr3aa().to_string())
                    .or_default()
                    .push(c.clone());
                *groups.entry(factory.group(c)).or_default() += 1;
                (by_aa, groups)
            })
            .reduce(empty, |(mut by_aa, mut groups), (other_aa, other_groups)| {
                for (aa, clonotypes) in other_aa {
                    by_aa.entry(aa).or_default().extend(clonotypes);
                }
                for (g, n) in other_groups {
                    *groups.entry(g).or_default() += n;
                }
                (by_aa, groups)
            });
        info!(
            "Indexing {} distinct CDR3 amino acid sequences in {} groups",
            by_aa.len(),
            groups.len()
        );

        if let Some(symbol) = by_aa
            .keys()
            .find_map(|aa| Alphabet::AminoAcid.first_invalid(aa))
        {
            return Err(RepError::MissingProperty(symbol));
        }
        for (aa, clonotypes) in by_aa {
            self.tree
                .get_or_insert_with(&aa, Vec::new)
                .map_err(tree_error)?
                .extend(clonotypes);
        }
        for (g, n) in groups {
            *self.group_counts.entry(g).or_default() += n;
        }
        Ok(())
    }

    /// Number of indexed coding clonotypes in `group`.
    pub fn group_count(&self, group: &F::Group) -> u64 {
        self.group_counts.get(group).copied().unwrap_or(0)
    }

    /// Indexed clonotypes of the same group within the neighborhood of
    /// `clonotype`, excluding the clonotype itself.
    pub fn neighbors(&self, clonotype: &Clonotype) -> Vec<&Arc<Clonotype>> {
        if !clonotype.is_coding() {
            return Vec::new();
        }
        let group = self.factory.group(clonotype);
        let own = clonotype.strict_key();
        let mut seen = FxHashSet::default();
        let mut found = Vec::new();
        for hit in self.tree.neighborhood(clonotype.cdr3aa(), &self.search) {
            if hit.mutations.indels() > self.max_indels {
                continue;
            }
            for m in hit.value {
                if m.strict_key() != own && self.factory.group(m) == group && seen.insert(&**m) {
                    found.push(m);
                }
            }
        }
        found
    }

    pub fn compute(&self, clonotype: &Clonotype) -> DegreeStatistics {
        if !clonotype.is_coding() {
            return DegreeStatistics::UNDEF;
        }
        let group = self.factory.group(clonotype);
        DegreeStatistics {
            degree: self.neighbors(clonotype).len() as i64,
            group_count: self.group_count(&group) as i64,
        }
    }

    /// Degree statistics of every clonotype of `container`, in order.
    pub fn compute_all<C: ClonotypeContainer>(&self, container: &C) -> Vec<DegreeStatistics> {
        container
            .wrappers()
            .par_iter()
            .map(|w| self.compute(w.clonotype()))
            .collect()
    }
}

impl DegreeStatisticsCalculator<GroupingKind> {
    /// Calculator over V, J and CDR3 length groups with the configured
    /// thresholds.
    pub fn with_defaults() -> anyhow::Result<Self> {
        Self::from_parameters(GroupingKind::VJL)
    }
}
