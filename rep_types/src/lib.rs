//! rep_types
//!
//! Core data model of the repertoire tools: interned segments, clonotypes,
//! samples and the clonotype equivalence rules.
// Warning groups (as of rust 1.55)
#![deny(
    future_incompatible,
    nonstandard_style,
    rust_2018_compatibility,
    rust_2021_compatibility,
    rust_2018_idioms,
    unused
)]

pub mod clonotype;
pub mod errors;
pub mod key;
pub mod sample;
pub mod segment;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use clonotype::{by_count_desc, Clonotype, ClonotypeRecord, SampleHandle, SegmentPoints};
pub use errors::{RepError, Result};
pub use key::{AaNotNtKey, ClonotypeKey, ClonotypeKeyGen, KeyIndex, OverlapType};
pub use sample::{
    ClonotypeContainer, ClonotypeSource, ClonotypeWrapper, Sample, SampleBuilder, SampleMetadata,
    Software,
};
pub use segment::{Segment, SegmentTable, MISSING_SEGMENT_NAME};
