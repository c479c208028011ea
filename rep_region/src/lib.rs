//! rep_region
//!
//! Named sub-regions of the CDR3 of a clonotype, extracted in nucleotide or
//! amino acid coordinates.

use rep_types::{Clonotype, RepError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A region given as a range of CDR3 nucleotide positions.
///
/// Implementors only supply the raw range. Negative or reversed ranges are
/// treated as empty, and a codon belongs to the amino acid projection if at
/// least one of its bases falls in the range.
pub trait Cdr3Range {
    fn name(&self) -> String;

    /// Raw `[from, to)` in CDR3 nucleotide coordinates.
    fn nt_range(&self, clonotype: &Clonotype) -> (i64, i64);

    fn safe_range(&self, clonotype: &Clonotype) -> Range<usize> {
        let (from, to) = self.nt_range(clonotype);
        if from < 0 || to < 0 || from >= to {
            return 0..0;
        }
        let len = clonotype.cdr3nt().len();
        (from as usize).min(len)..(to as usize).min(len)
    }

    fn extract_nucleotide<'a>(&self, clonotype: &'a Clonotype) -> &'a str {
        clonotype.cdr3nt().get(self.safe_range(clonotype)).unwrap_or("")
    }

    /// Amino acids of the region; with `exclude_cys_phe` the conserved first
    /// and last CDR3 residues are dropped when the region reaches them.
    fn extract_amino_acid<'a>(
        &self,
        clonotype: &'a Clonotype,
        exclude_cys_phe: bool,
    ) -> Result<&'a str> {
        ensure_coding(clonotype)?;
        let range = self.safe_range(clonotype);
        if range.is_empty() {
            return Ok("");
        }
        let aa = clonotype.cdr3aa();
        let (mut from, mut to) = (range.start / 3, (range.end / 3).min(aa.len()));
        if exclude_cys_phe {
            if from == 0 {
                from += 1;
            }
            if to == aa.len() {
                to = to.saturating_sub(1);
            }
        }
        if from >= to {
            return Ok("");
        }
        Ok(aa.get(from..to).unwrap_or(""))
    }
}

fn ensure_coding(clonotype: &Clonotype) -> Result<()> {
    if clonotype.is_coding() {
        Ok(())
    } else {
        Err(RepError::NotCoding {
            cdr3nt: clonotype.cdr3nt().to_string(),
        })
    }
}

/// `2 * span + 1` amino acids around the CDR3 center.
///
/// The center codon is taken at a sixth of the nucleotide length, which is
/// the convention of existing CDR3 center profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cdr3Center {
    span: usize,
}

impl Cdr3Center {
    /// Five central residues.
    pub const CENTER_5: Cdr3Center = Cdr3Center { span: 2 };
    /// Three central residues.
    pub const CENTER_3: Cdr3Center = Cdr3Center { span: 1 };

    pub fn new(span: usize) -> Self {
        Cdr3Center { span }
    }

    pub fn span(&self) -> usize {
        self.span
    }
}

impl Cdr3Range for Cdr3Center {
    fn name(&self) -> String {
        format!("CDR3-center-{}", 2 * self.span + 1)
    }

    fn nt_range(&self, clonotype: &Clonotype) -> (i64, i64) {
        let len = clonotype.cdr3nt().len() as i64;
        let center = len / 6;
        let span = self.span as i64;
        ((3 * (center - span)).max(0), len.min(3 * (center + span + 1)))
    }
}

/// The built-in regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SequenceRegion {
    FullCdr3,
    Center(Cdr3Center),
}

impl SequenceRegion {
    pub fn name(&self) -> String {
        match self {
            SequenceRegion::FullCdr3 => "CDR3-full".to_string(),
            SequenceRegion::Center(center) => center.name(),
        }
    }

    pub fn extract_nucleotide<'a>(&self, clonotype: &'a Clonotype) -> &'a str {
        match self {
            SequenceRegion::FullCdr3 => clonotype.cdr3nt(),
            SequenceRegion::Center(center) => center.extract_nucleotide(clonotype),
        }
    }

    /// Amino acids of the region. Non-coding clonotypes have no reliable
    /// translation and yield [`RepError::NotCoding`] for every region.
    pub fn extract_amino_acid<'a>(
        &self,
        clonotype: &'a Clonotype,
        exclude_cys_phe: bool,
    ) -> Result<&'a str> {
        match self {
            SequenceRegion::FullCdr3 => {
                ensure_coding(clonotype)?;
                let aa = clonotype.cdr3aa();
                if !exclude_cys_phe {
                    return Ok(aa);
                }
                if aa.len() <= 2 {
                    return Ok("");
                }
                Ok(aa.get(1..aa.len() - 1).unwrap_or(""))
            }
            SequenceRegion::Center(center) => center.extract_amino_acid(clonotype, exclude_cys_phe),
        }
    }

    /// Fails unless this is the full CDR3, for computations such as contact
    /// estimates that are only defined on whole loops.
    pub fn require_full_cdr3(&self, purpose: &str) -> Result<()> {
        match self {
            SequenceRegion::FullCdr3 => Ok(()),
            other => Err(RepError::IllegalArgument(format!(
                "{purpose} can only be used with the CDR3-full region, not {}",
                other.name()
            ))),
        }
    }
}
