//! Clonotype equivalence rules and the keys they produce.
use crate::clonotype::Clonotype;
use crate::errors::{RepError, Result};
use crate::sample::{ClonotypeContainer, ClonotypeWrapper};
use crate::segment::Segment;
use fxhash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::hash::{Hash, Hasher};
use strum_macros::{Display, EnumIter, EnumString};

/// Rule deciding when two clonotypes are considered the same.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Display,
    EnumIter,
    EnumString,
)]
pub enum OverlapType {
    #[strum(serialize = "nt")]
    Nucleotide,
    #[strum(serialize = "ntV")]
    NucleotideV,
    #[strum(serialize = "ntVJ")]
    NucleotideVJ,
    #[strum(serialize = "aa")]
    AminoAcid,
    #[strum(serialize = "aaV")]
    AminoAcidV,
    #[strum(serialize = "aaVJ")]
    AminoAcidVJ,
    /// Same CDR3 protein encoded by a different CDR3 nucleotide sequence.
    #[strum(serialize = "aa!nt")]
    AminoAcidNonNucleotide,
    #[strum(serialize = "strict")]
    Strict,
}

impl OverlapType {
    /// Rules whose keys are proper dictionary keys.
    pub fn has_exact_keys(self) -> bool {
        self != OverlapType::AminoAcidNonNucleotide
    }
}

/// Hashable equivalence key of a clonotype under an exact [`OverlapType`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClonotypeKey {
    Nucleotide(String),
    NucleotideV(String, Segment),
    NucleotideVJ(String, Segment, Segment),
    AminoAcid(String),
    AminoAcidV(String, Segment),
    AminoAcidVJ(String, Segment, Segment),
    Strict(Segment, String, Segment),
}

/// Probe for the `AminoAcidNonNucleotide` rule.
///
/// Hashes by the CDR3 amino acid sequence only, while `matches` additionally
/// requires the nucleotide sequences to differ. The relation is not reflexive,
/// so this type deliberately implements neither `Eq` nor `PartialEq` and must
/// not be used as a map key. [`KeyIndex`] and the sample aggregator bucket
/// probes by `cdr3aa` and test `matches` inside the bucket.
#[derive(Debug, Clone)]
pub struct AaNotNtKey {
    pub cdr3aa: String,
    pub cdr3nt: String,
}

impl AaNotNtKey {
    pub fn matches(&self, other: &AaNotNtKey) -> bool {
        self.cdr3aa == other.cdr3aa && self.cdr3nt != other.cdr3nt
    }
}

impl Hash for AaNotNtKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cdr3aa.hash(state);
    }
}

/// Produces keys for one [`OverlapType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClonotypeKeyGen {
    overlap_type: OverlapType,
}

impl Default for ClonotypeKeyGen {
    fn default() -> Self {
        ClonotypeKeyGen::new(OverlapType::Strict)
    }
}

impl ClonotypeKeyGen {
    pub fn new(overlap_type: OverlapType) -> Self {
        ClonotypeKeyGen { overlap_type }
    }

    pub fn overlap_type(&self) -> OverlapType {
        self.overlap_type
    }

    /// Key of `c`. Fails for `AminoAcidNonNucleotide`, whose keys are only
    /// available as probes through [`ClonotypeKeyGen::probe`].
    pub fn key(&self, c: &Clonotype) -> Result<ClonotypeKey> {
        let nt = || c.cdr3nt().to_string();
        let aa = || c.cdr3aa().to_string();
        Ok(match self.overlap_type {
            OverlapType::Nucleotide => ClonotypeKey::Nucleotide(nt()),
            OverlapType::NucleotideV => ClonotypeKey::NucleotideV(nt(), c.v().clone()),
            OverlapType::NucleotideVJ => {
                ClonotypeKey::NucleotideVJ(nt(), c.v().clone(), c.j().clone())
            }
            OverlapType::AminoAcid => ClonotypeKey::AminoAcid(aa()),
            OverlapType::AminoAcidV => ClonotypeKey::AminoAcidV(aa(), c.v().clone()),
            OverlapType::AminoAcidVJ => {
                ClonotypeKey::AminoAcidVJ(aa(), c.v().clone(), c.j().clone())
            }
            OverlapType::Strict => ClonotypeKey::Strict(c.v().clone(), nt(), c.j().clone()),
            OverlapType::AminoAcidNonNucleotide => {
                return Err(RepError::IllegalArgument(format!(
                    "{} keys can only be used as membership probes",
                    self.overlap_type
                )))
            }
        })
    }

    pub fn probe(&self, c: &Clonotype) -> AaNotNtKey {
        AaNotNtKey {
            cdr3aa: c.cdr3aa().to_string(),
            cdr3nt: c.cdr3nt().to_string(),
        }
    }

    /// Keys of every clonotype of `container`.
    pub fn key_set<C: ClonotypeContainer>(&self, container: &C) -> Result<FxHashSet<ClonotypeKey>> {
        container
            .wrappers()
            .iter()
            .map(|w| self.key(w.clonotype()))
            .collect()
    }

    /// Membership index over `container` that supports every rule.
    pub fn index<C: ClonotypeContainer>(&self, container: &C) -> Result<KeyIndex> {
        if self.overlap_type.has_exact_keys() {
            return Ok(KeyIndex::Exact(self.key_set(container)?));
        }
        let mut by_aa: FxHashMap<String, FxHashSet<String>> = FxHashMap::default();
        for w in container.wrappers() {
            let c = w.clonotype();
            by_aa
                .entry(c.cdr3aa().to_string())
                .or_default()
                .insert(c.cdr3nt().to_string());
        }
        Ok(KeyIndex::Convergent(by_aa))
    }
}

/// Set of clonotype identities used to test membership under one rule.
#[derive(Debug, Clone)]
pub enum KeyIndex {
    Exact(FxHashSet<ClonotypeKey>),
    /// CDR3 amino acid sequence to the nucleotide sequences encoding it.
    Convergent(FxHashMap<String, FxHashSet<String>>),
}

impl KeyIndex {
    pub fn contains(&self, key_gen: &ClonotypeKeyGen, c: &Clonotype) -> Result<bool> {
        Ok(match self {
            KeyIndex::Exact(keys) => keys.contains(&key_gen.key(c)?),
            KeyIndex::Convergent(by_aa) => by_aa
                .get(c.cdr3aa())
                .is_some_and(|nts| nts.iter().any(|nt| nt != c.cdr3nt())),
        })
    }

    pub fn len(&self) -> usize {
        match self {
            KeyIndex::Exact(keys) => keys.len(),
            KeyIndex::Convergent(by_aa) => by_aa.values().map(FxHashSet::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
