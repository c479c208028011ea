//! Clonotype filters with cumulative pass/total statistics.
//!
//! Every filter owns a [`FilterState`]: its negation flag and atomic counters
//! of the clonotypes, reads and frequency mass it has seen and let through.
//! Counters are updated on every call to [`ClonotypeFilter::pass`], from any
//! number of threads.

pub mod converter;
pub mod filters;

pub use converter::SegmentConverter;
pub use filters::{
    CompositeFilter, DSegmentFilter, IntersectionFilter, PassAllFilter, SegmentFilter,
    SegmentKind, SequenceMatchFilter,
};

use rep_types::{Clonotype, Sample};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A predicate over clonotypes that keeps track of what it let through.
pub trait ClonotypeFilter: Send + Sync {
    /// The predicate itself, before negation.
    fn check_pass(&self, clonotype: &Clonotype) -> bool;

    fn state(&self) -> &FilterState;

    /// Apply the filter and record the outcome.
    fn pass(&self, clonotype: &Clonotype) -> bool {
        let state = self.state();
        let pass = state.negative ^ self.check_pass(clonotype);
        state.record(clonotype, pass);
        pass
    }

    fn stats(&self) -> FilterStats {
        self.state().snapshot()
    }

    /// Current statistics; the counters are reset afterwards.
    fn stats_and_flush(&self) -> FilterStats {
        self.state().flush()
    }

    /// This filter with the opposite outcome and fresh counters.
    fn negated(self) -> Negated<Self>
    where
        Self: Sized,
    {
        let negative = !self.state().negative;
        Negated {
            inner: self,
            state: FilterState::new(negative),
        }
    }
}

/// See [`ClonotypeFilter::negated`].
#[derive(Debug)]
pub struct Negated<F> {
    inner: F,
    state: FilterState,
}

impl<F> Negated<F> {
    pub fn into_inner(self) -> F {
        self.inner
    }
}

impl<F: ClonotypeFilter> ClonotypeFilter for Negated<F> {
    fn check_pass(&self, clonotype: &Clonotype) -> bool {
        self.inner.check_pass(clonotype)
    }

    fn state(&self) -> &FilterState {
        &self.state
    }
}

impl<F: ClonotypeFilter + ?Sized> ClonotypeFilter for Box<F> {
    fn check_pass(&self, clonotype: &Clonotype) -> bool {
        (**self).check_pass(clonotype)
    }

    fn state(&self) -> &FilterState {
        (**self).state()
    }

    fn pass(&self, clonotype: &Clonotype) -> bool {
        (**self).pass(clonotype)
    }
}

/// Apply a filter to a whole sample.
pub trait SampleFilterExt: ClonotypeFilter {
    /// Sample holding the clonotypes of `sample` that pass, at most `top` of them.
    fn filter_sample(&self, sample: &Sample, top: Option<usize>) -> Sample {
        sample.filtered(|c| self.pass(c), top)
    }
}

impl<F: ClonotypeFilter + ?Sized> SampleFilterExt for F {}

/// Negation flag and counters shared by all filters.
#[derive(Debug, Default)]
pub struct FilterState {
    negative: bool,
    passed_clonotypes: AtomicU64,
    total_clonotypes: AtomicU64,
    passed_count: AtomicU64,
    total_count: AtomicU64,
    passed_freq: AtomicF64,
    total_freq: AtomicF64,
}

impl FilterState {
    pub fn new(negative: bool) -> Self {
        FilterState {
            negative,
            ..Default::default()
        }
    }

    pub fn negative(&self) -> bool {
        self.negative
    }

    fn record(&self, clonotype: &Clonotype, pass: bool) {
        let count = clonotype.count();
        let freq = clonotype.freq();
        if pass {
            self.passed_clonotypes.fetch_add(1, Ordering::Relaxed);
            self.passed_count.fetch_add(count, Ordering::Relaxed);
            self.passed_freq.add(freq);
        }
        self.total_clonotypes.fetch_add(1, Ordering::Relaxed);
        self.total_count.fetch_add(count, Ordering::Relaxed);
        self.total_freq.add(freq);
    }

    fn snapshot(&self) -> FilterStats {
        FilterStats {
            passed_clonotypes: self.passed_clonotypes.load(Ordering::Relaxed),
            total_clonotypes: self.total_clonotypes.load(Ordering::Relaxed),
            passed_count: self.passed_count.load(Ordering::Relaxed),
            total_count: self.total_count.load(Ordering::Relaxed),
            passed_freq: self.passed_freq.load(),
            total_freq: self.total_freq.load(),
        }
    }

    fn flush(&self) -> FilterStats {
        FilterStats {
            passed_clonotypes: self.passed_clonotypes.swap(0, Ordering::Relaxed),
            total_clonotypes: self.total_clonotypes.swap(0, Ordering::Relaxed),
            passed_count: self.passed_count.swap(0, Ordering::Relaxed),
            total_count: self.total_count.swap(0, Ordering::Relaxed),
            passed_freq: self.passed_freq.take(),
            total_freq: self.total_freq.take(),
        }
    }
}

/// `f64` accumulator stored as bits in an `AtomicU64`.
#[derive(Debug, Default)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn add(&self, value: f64) {
        // the closure never declines, so the update always succeeds
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn take(&self) -> f64 {
        f64::from_bits(self.0.swap(0f64.to_bits(), Ordering::Relaxed))
    }
}

/// Snapshot of the counters of a filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FilterStats {
    pub passed_clonotypes: u64,
    pub total_clonotypes: u64,
    pub passed_count: u64,
    pub total_count: u64,
    pub passed_freq: f64,
    pub total_freq: f64,
}

impl FilterStats {
    /// Column names matching the `Display` output.
    pub const HEADER: &'static str =
        "passed_clones\ttotal_clones\tpassed_count\ttotal_count\tpassed_freq\ttotal_freq";
}

impl fmt::Display for FilterStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.passed_clonotypes,
            self.total_clonotypes,
            self.passed_count,
            self.total_count,
            self.passed_freq,
            self.total_freq
        )
    }
}
