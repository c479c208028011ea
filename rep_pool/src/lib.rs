//! rep_pool
//!
//! Merging clonotypes across many samples: streaming aggregators, the pooled
//! sample built from them and the count-ratio filter used to flag clonotypes
//! that are likely contaminants from sibling samples.

mod aggregator;
mod count_filter;
mod pooled;
mod sample_aggregator;

pub use aggregator::{
    Accumulator, ClonotypeAggregator, MaxClonotypeAggregator, StoringClonotypeAggregator,
};
pub use count_filter::CountRatioFilter;
pub use pooled::PooledSample;
pub use sample_aggregator::SampleAggregator;
