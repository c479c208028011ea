//! rep_graph
//!
//! Neighborhoods of clonotypes in CDR3 sequence space: per-clonotype degree
//! statistics within equivalence groups, grouped samples with abundance
//! p-values, and correction of sequencing errors by absorbing rare close
//! neighbors into abundant ones.

mod corrector;
mod degree;
mod grouped;
mod grouping;

pub use corrector::Corrector;
pub use degree::{DegreeStatistics, DegreeStatisticsCalculator};
pub use grouped::GroupedSample;
pub use grouping::{ClonotypeGroup, ClonotypeGroupingFactory, GroupingKind};

use rep_types::RepError;
use seq_tree::TreeError;

fn tree_error(err: TreeError) -> RepError {
    match err {
        TreeError::UnknownSymbol { symbol, .. } => RepError::MissingProperty(symbol),
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use rep_types::testing::ClonotypeBuilder;

    const AMINO_ACIDS: &[u8] = b"ACDEFGHIKLMNPQRSTVWYBZJX*_";

    /// A distinct codon for every amino acid symbol, so clonotypes with
    /// different CDR3 amino acid sequences never share a nucleotide sequence.
    pub fn back_translate(aa: &str) -> String {
        aa.bytes()
            .map(|b| {
                let i = AMINO_ACIDS.iter().position(|&a| a == b).unwrap_or(0);
                let base = |k: usize| b"ACGT"[(i / k) % 4] as char;
                [base(16), base(4), base(1)].iter().collect::<String>()
            })
            .collect()
    }

    pub fn coding(aa: &str) -> ClonotypeBuilder {
        ClonotypeBuilder::new(&back_translate(aa), aa)
    }
}
