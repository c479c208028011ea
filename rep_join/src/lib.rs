//! rep_join
//!
//! N-way joins of samples under a clonotype equivalence rule. A
//! [`JointSample`] keeps the joint clonotypes that pass a [`JoinFilter`]
//! together with per-sample and pairwise overlap statistics.

mod filters;
mod joint;

pub use filters::{
    JoinFilter, OccurrenceJoinFilter, SampleSpecificJoinFilter, SampleSpecificOccurrenceJoinFilter,
};
pub use joint::{JointClonotype, JointClonotypeRef, JointSample};
