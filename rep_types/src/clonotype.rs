//! The clonotype record.
use crate::segment::Segment;
use serde::Serialize;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

/// Positions of the segment boundaries inside the CDR3 nucleotide sequence.
/// Zero based, `-1` marks an unknown boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SegmentPoints {
    pub v_end: i32,
    pub d_start: i32,
    pub d_end: i32,
    pub j_start: i32,
}

impl SegmentPoints {
    pub const UNKNOWN: SegmentPoints = SegmentPoints {
        v_end: -1,
        d_start: -1,
        d_end: -1,
        j_start: -1,
    };

    pub fn new(v_end: i32, d_start: i32, d_end: i32, j_start: i32) -> Self {
        SegmentPoints {
            v_end,
            d_start,
            d_end,
            j_start,
        }
    }
}

impl Default for SegmentPoints {
    fn default() -> Self {
        SegmentPoints::UNKNOWN
    }
}

/// Identity and total read count of the sample owning a clonotype.
///
/// Clonotypes keep an `Arc` to this handle, not to the sample, so the
/// clonotype table itself is never kept alive by its members.
#[derive(Debug)]
pub struct SampleHandle {
    id: u64,
    total_count: u64,
}

impl SampleHandle {
    pub(crate) fn new(total_count: u64) -> Arc<Self> {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        Arc::new(SampleHandle {
            id: NEXT_ID.fetch_add(1, AtomicOrdering::Relaxed),
            total_count,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }
}

/// All fields of a clonotype as produced by a parser.
#[derive(Debug, Clone, Default)]
pub struct ClonotypeRecord {
    pub count: u64,
    pub freq: f64,
    pub v: Segment,
    pub d: Segment,
    pub j: Segment,
    pub cdr3nt: String,
    pub cdr3aa: String,
    pub segment_points: SegmentPoints,
    pub in_frame: bool,
    pub no_stop: bool,
    pub is_complete: bool,
    pub annotation: Option<String>,
}

/// A single V(D)J rearrangement with its abundance.
///
/// Two clonotypes are equal when they belong to the same sample and share V,
/// J and CDR3 nucleotide sequence. Sorting helpers order by decreasing count.
#[derive(Debug, Clone)]
pub struct Clonotype {
    record: ClonotypeRecord,
    parent: Option<Arc<SampleHandle>>,
}

impl Clonotype {
    pub fn new(record: ClonotypeRecord) -> Self {
        Clonotype {
            record,
            parent: None,
        }
    }

    pub fn record(&self) -> &ClonotypeRecord {
        &self.record
    }

    pub fn count(&self) -> u64 {
        self.record.count
    }

    /// Frequency as reported by the upstream software.
    pub fn freq_as_input(&self) -> f64 {
        self.record.freq
    }

    /// Share of the parent sample reads. Falls back to the input frequency for a
    /// clonotype that has not been placed in a sample yet.
    pub fn freq(&self) -> f64 {
        match &self.parent {
            Some(p) if p.total_count > 0 => self.record.count as f64 / p.total_count as f64,
            Some(_) => 0.0,
            None => self.record.freq,
        }
    }

    pub fn v(&self) -> &Segment {
        &self.record.v
    }

    pub fn d(&self) -> &Segment {
        &self.record.d
    }

    pub fn j(&self) -> &Segment {
        &self.record.j
    }

    pub fn cdr3nt(&self) -> &str {
        &self.record.cdr3nt
    }

    pub fn cdr3aa(&self) -> &str {
        &self.record.cdr3aa
    }

    pub fn segment_points(&self) -> SegmentPoints {
        self.record.segment_points
    }

    pub fn in_frame(&self) -> bool {
        self.record.in_frame
    }

    pub fn no_stop(&self) -> bool {
        self.record.no_stop
    }

    pub fn is_complete(&self) -> bool {
        self.record.is_complete
    }

    pub fn is_coding(&self) -> bool {
        self.record.in_frame && self.record.no_stop
    }

    pub fn annotation(&self) -> Option<&str> {
        self.record.annotation.as_deref()
    }

    pub fn parent(&self) -> Option<&Arc<SampleHandle>> {
        self.parent.as_ref()
    }

    pub fn parent_id(&self) -> Option<u64> {
        self.parent.as_ref().map(|p| p.id)
    }

    /// A clonotype is a single variant of itself.
    pub fn diversity(&self) -> usize {
        1
    }

    pub fn cdr3_length(&self) -> usize {
        self.record.cdr3nt.len()
    }

    /// Number of inserted bases between V and D, `-1` if unknown.
    pub fn vd_ins(&self) -> i32 {
        let p = self.record.segment_points;
        if self.record.d.is_missing() || p.v_end < 0 || p.d_start < 0 {
            -1
        } else {
            p.d_start - p.v_end - 1
        }
    }

    /// Number of inserted bases between D and J, `-1` if unknown.
    pub fn dj_ins(&self) -> i32 {
        let p = self.record.segment_points;
        if self.record.d.is_missing() || p.d_end < 0 || p.j_start < 0 {
            -1
        } else {
            p.j_start - p.d_end - 1
        }
    }

    /// Total number of inserted bases, `-1` unless all boundaries are known.
    pub fn insert_size(&self) -> i32 {
        let p = self.record.segment_points;
        if self.record.d.is_missing()
            || p.v_end < 0
            || p.d_start < 0
            || p.d_end < 0
            || p.j_start < 0
        {
            -1
        } else {
            self.vd_ins() + self.dj_ins()
        }
    }

    /// Length of the region between the V end and the J start, 0 if unknown.
    pub fn ndn_size(&self) -> i32 {
        let p = self.record.segment_points;
        if p.v_end >= 0 && p.j_start >= 0 {
            p.j_start - p.v_end - 1
        } else {
            0
        }
    }

    /// The `(v, j, cdr3nt)` part of the equality tuple.
    pub fn strict_key(&self) -> (&Segment, &Segment, &str) {
        (&self.record.v, &self.record.j, &self.record.cdr3nt)
    }

    /// Copy with a different count. The input frequency is kept.
    pub fn with_count(&self, count: u64) -> Self {
        let mut copy = self.clone();
        copy.record.count = count;
        copy
    }

    /// Copy with V and J replaced.
    pub fn with_segments(&self, v: Segment, j: Segment) -> Self {
        let mut copy = self.clone();
        copy.record.v = v;
        copy.record.j = j;
        copy
    }

    pub(crate) fn set_parent(&mut self, parent: Arc<SampleHandle>) {
        self.parent = Some(parent);
    }

    /// Merge the abundance of a duplicate record into this one.
    pub(crate) fn append(&mut self, other: &Clonotype) {
        self.record.count += other.record.count;
        self.record.freq += other.record.freq;
    }

    /// Replace the cached input frequency by the share of parent reads.
    pub fn recalculate_frequency(&mut self) -> f64 {
        self.record.freq = self.freq();
        self.record.freq
    }
}

impl PartialEq for Clonotype {
    fn eq(&self, other: &Self) -> bool {
        self.parent_id() == other.parent_id() && self.strict_key() == other.strict_key()
    }
}

impl Eq for Clonotype {}

impl Hash for Clonotype {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parent_id().hash(state);
        self.strict_key().hash(state);
    }
}

/// Order by decreasing count.
pub fn by_count_desc(a: &Clonotype, b: &Clonotype) -> Ordering {
    b.count().cmp(&a.count())
}
