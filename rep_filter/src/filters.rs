//! Built-in clonotype filters.
use crate::{ClonotypeFilter, FilterState};
use fxhash::FxHashSet;
use lazy_static::lazy_static;
use regex::Regex;
use rep_types::{
    Clonotype, ClonotypeContainer, ClonotypeKeyGen, KeyIndex, OverlapType, RepError, Result,
    Segment, SegmentTable,
};
use std::sync::RwLock;

lazy_static! {
    static ref AA_PATTERN: Regex = Regex::new(r"^[FLSYCWPHQRIMTNKVADEGX*_\[\]]+$").unwrap();
    static ref NT_PATTERN: Regex = Regex::new(r"^[ATGCN\[\]]+$").unwrap();
}

/// Lets everything through.
#[derive(Debug, Default)]
pub struct PassAllFilter {
    state: FilterState,
}

impl PassAllFilter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClonotypeFilter for PassAllFilter {
    fn check_pass(&self, _clonotype: &Clonotype) -> bool {
        true
    }

    fn state(&self) -> &FilterState {
        &self.state
    }
}

/// Conjunction of filters. Every member sees each clonotype until one rejects
/// it, so member counters stay meaningful.
pub struct CompositeFilter {
    filters: Vec<Box<dyn ClonotypeFilter>>,
    state: FilterState,
}

impl CompositeFilter {
    pub fn new(filters: Vec<Box<dyn ClonotypeFilter>>, negative: bool) -> Self {
        CompositeFilter {
            filters,
            state: FilterState::new(negative),
        }
    }

    pub fn filters(&self) -> &[Box<dyn ClonotypeFilter>] {
        &self.filters
    }
}

impl ClonotypeFilter for CompositeFilter {
    fn check_pass(&self, clonotype: &Clonotype) -> bool {
        self.filters.iter().all(|f| f.pass(clonotype))
    }

    fn state(&self) -> &FilterState {
        &self.state
    }
}

/// Keeps clonotypes whose D segment is one of the given names.
#[derive(Debug)]
pub struct DSegmentFilter {
    names: FxHashSet<String>,
    state: FilterState,
}

impl DSegmentFilter {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>, negative: bool) -> Self {
        DSegmentFilter {
            names: names.into_iter().map(Into::into).collect(),
            state: FilterState::new(negative),
        }
    }
}

impl ClonotypeFilter for DSegmentFilter {
    fn check_pass(&self, clonotype: &Clonotype) -> bool {
        self.names.contains(clonotype.d().name())
    }

    fn state(&self) -> &FilterState {
        &self.state
    }
}

/// Which segment of a clonotype a [`SegmentFilter`] inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    V,
    J,
}

#[derive(Debug, Default)]
struct ResolvedSegments {
    table_size: usize,
    segments: FxHashSet<Segment>,
}

/// Keeps clonotypes whose V (or J) segment matches one of the given patterns.
///
/// Patterns are resolved to segments through [`SegmentTable::lookup_fuzzy`],
/// so `TRBV12` also selects `TRBV12-3` and `TRBV12-4`. Resolution is redone
/// whenever new segments were interned since the last check.
#[derive(Debug)]
pub struct SegmentFilter {
    kind: SegmentKind,
    patterns: Vec<String>,
    table: &'static SegmentTable,
    resolved: RwLock<ResolvedSegments>,
    state: FilterState,
}

impl SegmentFilter {
    pub fn new<S: Into<String>>(
        kind: SegmentKind,
        patterns: impl IntoIterator<Item = S>,
        negative: bool,
    ) -> Self {
        Self::with_table(SegmentTable::global(), kind, patterns, negative)
    }

    pub fn with_table<S: Into<String>>(
        table: &'static SegmentTable,
        kind: SegmentKind,
        patterns: impl IntoIterator<Item = S>,
        negative: bool,
    ) -> Self {
        SegmentFilter {
            kind,
            patterns: patterns.into_iter().map(Into::into).collect(),
            table,
            resolved: RwLock::new(ResolvedSegments::default()),
            state: FilterState::new(negative),
        }
    }

    fn refresh(&self) {
        let size = self.table.len();
        let stale = self
            .resolved
            .read()
            .map_or(true, |r| r.table_size != size);
        if !stale {
            return;
        }
        let mut resolved = self.resolved.write().unwrap_or_else(|e| e.into_inner());
        resolved.segments = self
            .patterns
            .iter()
            .flat_map(|p| self.table.lookup_fuzzy(p))
            .collect();
        resolved.table_size = size;
    }

    /// Segments currently selected by the patterns.
    pub fn segments(&self) -> FxHashSet<Segment> {
        self.refresh();
        self.resolved
            .read()
            .map(|r| r.segments.clone())
            .unwrap_or_else(|e| e.into_inner().segments.clone())
    }
}

impl ClonotypeFilter for SegmentFilter {
    fn check_pass(&self, clonotype: &Clonotype) -> bool {
        self.refresh();
        let segment = match self.kind {
            SegmentKind::V => clonotype.v(),
            SegmentKind::J => clonotype.j(),
        };
        match self.resolved.read() {
            Ok(r) => r.segments.contains(segment),
            Err(e) => e.into_inner().segments.contains(segment),
        }
    }

    fn state(&self) -> &FilterState {
        &self.state
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternToken {
    Symbol(u8),
    Any,
    OneOf(Vec<u8>),
}

impl PatternToken {
    fn accepts(&self, symbol: u8) -> bool {
        match self {
            PatternToken::Symbol(s) => *s == symbol,
            PatternToken::Any => true,
            PatternToken::OneOf(set) => set.contains(&symbol),
        }
    }
}

/// Keeps clonotypes whose CDR3 contains a pattern.
///
/// Patterns are written over the amino acid or nucleotide alphabet; `X` and `N`
/// match any symbol and `[..]` lists alternatives at one position. With a
/// non-zero mismatch budget, a window of the CDR3 matches when at most that
/// many positions disagree with the pattern.
#[derive(Debug)]
pub struct SequenceMatchFilter {
    pattern: String,
    regex: Regex,
    tokens: Vec<PatternToken>,
    amino_acid: bool,
    max_mismatches: usize,
    state: FilterState,
}

impl SequenceMatchFilter {
    pub fn new(pattern: &str, amino_acid: bool, max_mismatches: usize) -> Result<Self> {
        let pattern = pattern.to_uppercase();
        let bad = || RepError::IllegalArgument(format!("Bad sequence pattern: {pattern}"));

        let accepted = if amino_acid { &*AA_PATTERN } else { &*NT_PATTERN };
        if !accepted.is_match(&pattern) {
            return Err(bad());
        }
        let tokens = tokenize(&pattern).ok_or_else(bad)?;

        let regex_src = tokens
            .iter()
            .map(|t| match t {
                PatternToken::Symbol(s) => regex::escape(&(*s as char).to_string()),
                PatternToken::Any => ".".to_string(),
                PatternToken::OneOf(set) => format!(
                    "[{}]",
                    set.iter()
                        .map(|&s| regex::escape(&(s as char).to_string()))
                        .collect::<String>()
                ),
            })
            .collect::<String>();
        let regex = Regex::new(&regex_src).map_err(|_| bad())?;

        Ok(SequenceMatchFilter {
            pattern,
            regex,
            tokens,
            amino_acid,
            max_mismatches,
            state: FilterState::new(false),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_amino_acid(&self) -> bool {
        self.amino_acid
    }

    pub fn max_mismatches(&self) -> usize {
        self.max_mismatches
    }

    fn fuzzy_find(&self, query: &[u8]) -> bool {
        let n = self.tokens.len();
        if query.len() < n {
            return false;
        }
        query.windows(n).any(|window| {
            window
                .iter()
                .zip(&self.tokens)
                .filter(|(&s, t)| !t.accepts(s))
                .take(self.max_mismatches + 1)
                .count()
                <= self.max_mismatches
        })
    }
}

/// Split a validated pattern into positions. `None` for unbalanced or empty
/// brackets.
fn tokenize(pattern: &str) -> Option<Vec<PatternToken>> {
    let mut tokens = Vec::new();
    let mut bytes = pattern.bytes();
    while let Some(b) = bytes.next() {
        tokens.push(match b {
            b'[' => {
                let mut set = Vec::new();
                loop {
                    match bytes.next()? {
                        b']' => break,
                        b'[' => return None,
                        b'X' | b'N' => return None,
                        s => set.push(s),
                    }
                }
                if set.is_empty() {
                    return None;
                }
                PatternToken::OneOf(set)
            }
            b']' => return None,
            b'X' | b'N' => PatternToken::Any,
            s => PatternToken::Symbol(s),
        });
    }
    Some(tokens)
}

impl ClonotypeFilter for SequenceMatchFilter {
    fn check_pass(&self, clonotype: &Clonotype) -> bool {
        let query = if self.amino_acid {
            clonotype.cdr3aa()
        } else {
            clonotype.cdr3nt()
        };
        if self.max_mismatches == 0 {
            self.regex.is_match(query)
        } else {
            self.fuzzy_find(query.as_bytes())
        }
    }

    fn state(&self) -> &FilterState {
        &self.state
    }
}

/// Keeps clonotypes present in another container under an [`OverlapType`].
#[derive(Debug)]
pub struct IntersectionFilter {
    key_gen: ClonotypeKeyGen,
    index: KeyIndex,
    state: FilterState,
}

impl IntersectionFilter {
    pub fn new<C: ClonotypeContainer>(
        overlap_type: OverlapType,
        other: &C,
        negative: bool,
    ) -> Result<Self> {
        let key_gen = ClonotypeKeyGen::new(overlap_type);
        Ok(IntersectionFilter {
            index: key_gen.index(other)?,
            key_gen,
            state: FilterState::new(negative),
        })
    }
}

impl ClonotypeFilter for IntersectionFilter {
    fn check_pass(&self, clonotype: &Clonotype) -> bool {
        // exact-key rules never fail and AminoAcidNonNucleotide uses probes
        self.index
            .contains(&self.key_gen, clonotype)
            .unwrap_or(false)
    }

    fn state(&self) -> &FilterState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SampleFilterExt;
    use pretty_assertions::assert_eq;
    use rep_types::testing::{sample_of, ClonotypeBuilder};
    use rep_types::Sample;

    fn cdr3s(sample: &Sample) -> Vec<String> {
        sample.iter().map(|c| c.cdr3aa().to_string()).collect()
    }

    fn sample() -> Sample {
        sample_of(
            "s",
            vec![
                ClonotypeBuilder::aa("CASSLF").count(4).v("TRBV12-3").j("TRBJ1-1").d("TRBD1").build(),
                ClonotypeBuilder::aa("CASSPF").count(3).v("TRBV12-4").j("TRBJ2-1").build(),
                ClonotypeBuilder::aa("CAWSF").count(2).v("TRBV2").j("TRBJ1-1").d("TRBD2").build(),
                ClonotypeBuilder::aa("CSARDF").count(1).v("TRBV20-1").j("TRBJ2-7").build(),
            ],
        )
    }

    #[test]
    fn test_pass_all() {
        let s = sample();
        let f = PassAllFilter::new();
        assert_eq!(cdr3s(&f.filter_sample(&s, None)), cdr3s(&s));
        assert_eq!(f.stats().passed_clonotypes, 4);
    }

    #[test]
    fn test_d_filter() {
        let s = sample();
        let f = DSegmentFilter::new(["TRBD1", "TRBD2"], false);
        assert_eq!(cdr3s(&f.filter_sample(&s, None)), vec!["CASSLF", "CAWSF"]);
    }

    #[test]
    fn test_segment_filter_family() {
        let s = sample();
        let f = SegmentFilter::new(SegmentKind::V, ["TRBV12"], false);
        assert_eq!(cdr3s(&f.filter_sample(&s, None)), vec!["CASSLF", "CASSPF"]);
        let f = SegmentFilter::new(SegmentKind::J, ["TRBJ1-1"], true);
        assert_eq!(cdr3s(&f.filter_sample(&s, None)), vec!["CASSPF", "CSARDF"]);
    }

    #[test]
    fn test_segment_filter_refreshes() {
        let table: &'static SegmentTable = Box::leak(Box::new(SegmentTable::new()));
        let f = SegmentFilter::with_table(table, SegmentKind::V, ["TRAV1"], false);
        assert!(f.segments().is_empty());
        let seg = table.intern("TRAV1-2");
        assert!(f.segments().contains(&seg));
    }

    #[test]
    fn test_sequence_match() {
        let s = sample();
        let f = SequenceMatchFilter::new("ass[lp]", true, 0).unwrap();
        assert_eq!(f.pattern(), "ASS[LP]");
        assert_eq!(cdr3s(&f.filter_sample(&s, None)), vec!["CASSLF", "CASSPF"]);

        let f = SequenceMatchFilter::new("CXWS", true, 0).unwrap();
        assert_eq!(cdr3s(&f.filter_sample(&s, None)), vec!["CAWSF"]);

        let f = SequenceMatchFilter::new("SARD", true, 1).unwrap();
        assert_eq!(cdr3s(&f.filter_sample(&s, None)), vec!["CSARDF"]);
        let f = SequenceMatchFilter::new("CASSL", true, 1).unwrap();
        assert_eq!(cdr3s(&f.filter_sample(&s, None)), vec!["CASSLF", "CASSPF"]);
    }

    #[test]
    fn test_sequence_match_stop_is_literal() {
        let stop = sample_of("s", vec![ClonotypeBuilder::aa("CA*SF").build()]);
        let f = SequenceMatchFilter::new("A*S", true, 0).unwrap();
        assert_eq!(f.filter_sample(&stop, None).diversity(), 1);
        assert_eq!(f.filter_sample(&sample(), None).diversity(), 0);
    }

    #[test]
    fn test_bad_patterns() {
        for (p, aa) in [("CAS[S", true), ("CASB", true), ("ACGU", false), ("A]C[", false), ("", true)] {
            assert!(
                matches!(SequenceMatchFilter::new(p, aa, 0), Err(RepError::IllegalArgument(_))),
                "{p}"
            );
        }
    }

    #[test]
    fn test_composite() {
        let s = sample();
        let f = CompositeFilter::new(
            vec![
                Box::new(SegmentFilter::new(SegmentKind::V, ["TRBV12"], false)),
                Box::new(SequenceMatchFilter::new("SL", true, 0).unwrap()),
            ],
            false,
        );
        assert_eq!(cdr3s(&f.filter_sample(&s, None)), vec!["CASSLF"]);
        // second member only saw what the first let through
        assert_eq!(f.filters()[1].stats().total_clonotypes, 2);

        let neg = CompositeFilter::new(vec![Box::new(PassAllFilter::new())], true);
        assert_eq!(neg.filter_sample(&s, None).diversity(), 0);
    }

    #[test]
    fn test_intersection() {
        let s = sample();
        let other = sample_of(
            "o",
            vec![
                ClonotypeBuilder::aa("CASSLF").v("TRBV12-3").j("TRBJ1-1").build(),
                ClonotypeBuilder::new("TGTGCATGGAGTTTT", "CAWSF").v("TRBV2").build(),
            ],
        );
        let f = IntersectionFilter::new(OverlapType::Strict, &other, false).unwrap();
        assert_eq!(cdr3s(&f.filter_sample(&s, None)), vec!["CASSLF"]);

        let f = IntersectionFilter::new(OverlapType::AminoAcid, &other, false).unwrap();
        assert_eq!(cdr3s(&f.filter_sample(&s, None)), vec!["CASSLF", "CAWSF"]);

        let f = IntersectionFilter::new(OverlapType::AminoAcidNonNucleotide, &other, false).unwrap();
        assert_eq!(cdr3s(&f.filter_sample(&s, None)), vec!["CAWSF"]);
    }
}
