//! Helpers for building clonotypes and samples in tests.
use crate::clonotype::{Clonotype, ClonotypeRecord, SegmentPoints};
use crate::errors::Result;
use crate::sample::{ClonotypeSource, Sample, SampleMetadata, Software};
use crate::segment::Segment;

/// Terse clonotype construction. Defaults to a coding, complete clonotype with
/// count 1 and segments `V`, `.`, `J`.
#[derive(Debug, Clone)]
pub struct ClonotypeBuilder {
    record: ClonotypeRecord,
}

impl ClonotypeBuilder {
    pub fn new(cdr3nt: &str, cdr3aa: &str) -> Self {
        ClonotypeBuilder {
            record: ClonotypeRecord {
                count: 1,
                freq: 0.0,
                v: Segment::intern("V"),
                d: Segment::missing(),
                j: Segment::intern("J"),
                cdr3nt: cdr3nt.to_string(),
                cdr3aa: cdr3aa.to_string(),
                segment_points: SegmentPoints::UNKNOWN,
                in_frame: true,
                no_stop: true,
                is_complete: true,
                annotation: None,
            },
        }
    }

    /// Clonotype identified by its amino acid sequence only. The nucleotide
    /// sequence is a placeholder of matching length.
    pub fn aa(cdr3aa: &str) -> Self {
        let nt = cdr3aa.chars().map(|_| "NNN").collect::<String>();
        ClonotypeBuilder::new(&nt, cdr3aa)
    }

    pub fn count(mut self, count: u64) -> Self {
        self.record.count = count;
        self
    }

    pub fn freq(mut self, freq: f64) -> Self {
        self.record.freq = freq;
        self
    }

    pub fn v(mut self, v: &str) -> Self {
        self.record.v = Segment::intern(v);
        self
    }

    pub fn d(mut self, d: &str) -> Self {
        self.record.d = Segment::intern(d);
        self
    }

    pub fn j(mut self, j: &str) -> Self {
        self.record.j = Segment::intern(j);
        self
    }

    pub fn points(mut self, points: SegmentPoints) -> Self {
        self.record.segment_points = points;
        self
    }

    pub fn coding(mut self, coding: bool) -> Self {
        self.record.in_frame = coding;
        self.record.no_stop = coding;
        self
    }

    pub fn build(self) -> Clonotype {
        Clonotype::new(self.record)
    }
}

/// A [`ClonotypeSource`] over an in-memory list of parse results.
pub struct VecSource {
    software: Software,
    items: std::vec::IntoIter<Result<Clonotype>>,
}

impl VecSource {
    pub fn new(software: Software, items: Vec<Result<Clonotype>>) -> Self {
        VecSource {
            software,
            items: items.into_iter(),
        }
    }

    pub fn ok(software: Software, clonotypes: Vec<Clonotype>) -> Self {
        VecSource::new(software, clonotypes.into_iter().map(Ok).collect())
    }
}

impl Iterator for VecSource {
    type Item = Result<Clonotype>;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next()
    }
}

impl ClonotypeSource for VecSource {
    fn software(&self) -> &Software {
        &self.software
    }
}

/// Sample named `id` holding `clonotypes`.
pub fn sample_of(id: &str, clonotypes: Vec<Clonotype>) -> Sample {
    Sample::from_clonotypes(SampleMetadata::new(id), clonotypes)
}
