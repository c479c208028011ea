use rep_types::{Clonotype, Segment};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;
use strum_macros::{Display, EnumIter, EnumString};

/// Assigns clonotypes to equivalence groups.
pub trait ClonotypeGroupingFactory: Send + Sync {
    type Group: Debug + Clone + Eq + Hash + Send + Sync;

    fn group(&self, clonotype: &Clonotype) -> Self::Group;
}

/// Group of a clonotype under one of the [`GroupingKind`]s.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClonotypeGroup {
    All,
    V(Segment),
    VJ(Segment, Segment),
    /// V, J and CDR3 nucleotide length.
    VJL(Segment, Segment, usize),
}

/// The built-in groupings.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GroupingKind {
    /// Every clonotype in one group
    Dummy,
    V,
    VJ,
    #[default]
    VJL,
}

impl ClonotypeGroupingFactory for GroupingKind {
    type Group = ClonotypeGroup;

    fn group(&self, clonotype: &Clonotype) -> ClonotypeGroup {
        let (v, j) = (clonotype.v().clone(), clonotype.j().clone());
        match self {
            GroupingKind::Dummy => ClonotypeGroup::All,
            GroupingKind::V => ClonotypeGroup::V(v),
            GroupingKind::VJ => ClonotypeGroup::VJ(v, j),
            GroupingKind::VJL => ClonotypeGroup::VJL(v, j, clonotype.cdr3_length()),
        }
    }
}
