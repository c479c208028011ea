//! Sample: an ordered clonotype table of one specimen.
use crate::clonotype::{by_count_desc, Clonotype, SampleHandle};
use crate::errors::{RepError, Result};
use fxhash::FxHashMap;
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Description of the upstream tool that produced a clonotype table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Software {
    pub name: String,
    /// Frequencies are per-read and must be recomputed after loading.
    pub per_read_output: bool,
    /// The table may list the same clonotype several times.
    pub collapse_required: bool,
}

impl Software {
    pub fn new(name: impl Into<String>, per_read_output: bool, collapse_required: bool) -> Self {
        Software {
            name: name.into(),
            per_read_output,
            collapse_required,
        }
    }
}

/// Opaque per-sample annotation. Only `sample_id` is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SampleMetadata {
    pub sample_id: String,
    pub properties: BTreeMap<String, String>,
}

impl SampleMetadata {
    pub fn new(sample_id: impl Into<String>) -> Self {
        SampleMetadata {
            sample_id: sample_id.into(),
            properties: BTreeMap::new(),
        }
    }
}

/// A lazy producer of parsed clonotypes.
pub trait ClonotypeSource: Iterator<Item = Result<Clonotype>> {
    fn software(&self) -> &Software;
}

/// Anything that exposes a clonotype, e.g. a plain clonotype or a pooled one.
pub trait ClonotypeWrapper {
    fn clonotype(&self) -> &Arc<Clonotype>;
}

impl ClonotypeWrapper for Arc<Clonotype> {
    fn clonotype(&self) -> &Arc<Clonotype> {
        self
    }
}

/// Read-only view shared by samples, pooled samples and joint samples.
pub trait ClonotypeContainer: Sync {
    type Wrapper: ClonotypeWrapper + Send + Sync;

    /// Members in their stored order.
    fn wrappers(&self) -> &[Self::Wrapper];

    fn diversity(&self) -> usize;

    fn count(&self) -> u64;

    fn freq(&self) -> f64;

    fn freq_as_input(&self) -> f64;

    fn get(&self, index: usize) -> Result<&Self::Wrapper> {
        let wrappers = self.wrappers();
        RepError::check_index(index, wrappers.len())?;
        Ok(&wrappers[index])
    }
}

/// Ordered clonotype table with non-increasing counts.
#[derive(Debug, Clone)]
pub struct Sample {
    metadata: Arc<SampleMetadata>,
    handle: Arc<SampleHandle>,
    clonotypes: Vec<Arc<Clonotype>>,
    total_count: u64,
    total_freq_as_input: f64,
    diversity: usize,
}

/// Accumulates clonotypes into a [`Sample`].
#[derive(Debug)]
pub struct SampleBuilder {
    metadata: SampleMetadata,
    collapse: Option<bool>,
    top: Option<usize>,
    store: bool,
    clonotypes: Vec<Clonotype>,
    index: FxHashMap<(crate::Segment, crate::Segment, String), usize>,
    total_count: u64,
    total_freq: f64,
    diversity: usize,
}

impl SampleBuilder {
    pub fn new(metadata: SampleMetadata) -> Self {
        SampleBuilder {
            metadata,
            collapse: None,
            top: None,
            store: true,
            clonotypes: Vec::new(),
            index: FxHashMap::default(),
            total_count: 0,
            total_freq: 0.0,
            diversity: 0,
        }
    }

    /// Merge duplicate clonotypes. Defaults to what the source software requires.
    pub fn collapse(mut self, collapse: bool) -> Self {
        self.collapse = Some(collapse);
        self
    }

    /// Stop after `top` distinct clonotypes.
    pub fn top(mut self, top: usize) -> Self {
        self.top = Some(top);
        self
    }

    /// When false only the totals are kept.
    pub fn store(mut self, store: bool) -> Self {
        self.store = store;
        self
    }

    fn add_clonotype(&mut self, clonotype: Clonotype) {
        self.total_count += clonotype.count();
        self.total_freq += clonotype.freq_as_input();
        self.diversity += 1;
        if self.store {
            self.clonotypes.push(clonotype);
        }
    }

    /// Add `clonotype`, merging it into an existing one with the same V, J and
    /// CDR3 nucleotide sequence. Returns true if it was merged.
    fn collapse_if_duplicate(&mut self, clonotype: Clonotype) -> bool {
        let key = (
            clonotype.v().clone(),
            clonotype.j().clone(),
            clonotype.cdr3nt().to_string(),
        );
        if let Some(&idx) = self.index.get(&key) {
            self.total_count += clonotype.count();
            self.total_freq += clonotype.freq_as_input();
            if self.store {
                self.clonotypes[idx].append(&clonotype);
            }
            true
        } else {
            self.index.insert(key, self.clonotypes.len());
            self.add_clonotype(clonotype);
            false
        }
    }

    fn top_reached(&self) -> bool {
        self.top.is_some_and(|top| self.diversity >= top)
    }

    /// Pull clonotypes from `source` until it is exhausted or the `top` limit is hit.
    pub fn read<S: ClonotypeSource>(mut self, mut source: S) -> Result<Sample> {
        let software = source.software().clone();
        let collapse = self.collapse.unwrap_or(software.collapse_required);

        let mut sorted = !collapse;
        let mut prev_count = u64::MAX;
        while !self.top_reached() {
            let Some(clonotype) = source.next() else {
                break;
            };
            let clonotype = clonotype?;
            if clonotype.count() > prev_count {
                sorted = false;
            }
            prev_count = clonotype.count();

            if collapse {
                self.collapse_if_duplicate(clonotype);
            } else {
                self.add_clonotype(clonotype);
            }
        }
        debug!(
            "read {} clonotypes ({} reads) for sample {}",
            self.diversity, self.total_count, self.metadata.sample_id
        );

        let mut sample = self.finish(!sorted);
        if software.per_read_output {
            debug!(
                "recomputing per-read frequencies for sample {}",
                sample.metadata.sample_id
            );
            sample.recalculate_frequencies();
        }
        Ok(sample)
    }

    fn finish(mut self, sort: bool) -> Sample {
        if sort {
            debug!("sorting sample {}", self.metadata.sample_id);
            self.clonotypes.sort_by(by_count_desc);
        }
        let handle = SampleHandle::new(self.total_count);
        let clonotypes = self
            .clonotypes
            .into_iter()
            .map(|mut c| {
                c.set_parent(handle.clone());
                Arc::new(c)
            })
            .collect();
        Sample {
            metadata: Arc::new(self.metadata),
            handle,
            clonotypes,
            total_count: self.total_count,
            total_freq_as_input: self.total_freq,
            diversity: self.diversity,
        }
    }
}

impl Sample {
    /// Build a sample from in-memory clonotypes, without collapsing.
    pub fn from_clonotypes(
        metadata: SampleMetadata,
        clonotypes: impl IntoIterator<Item = Clonotype>,
    ) -> Sample {
        let mut builder = SampleBuilder::new(metadata);
        for c in clonotypes {
            builder.add_clonotype(c);
        }
        let sorted = builder
            .clonotypes
            .windows(2)
            .all(|w| w[0].count() >= w[1].count());
        builder.finish(!sorted)
    }

    /// Copy of the sample, optionally with new metadata.
    pub fn copy_with(&self, metadata: Option<SampleMetadata>) -> Sample {
        let metadata = metadata.unwrap_or_else(|| (*self.metadata).clone());
        self.derive(metadata, self.clonotypes.iter().map(|c| (**c).clone()), false)
    }

    /// Keep the clonotypes passing `pass`, stopping after `top` of them.
    pub fn filtered(&self, mut pass: impl FnMut(&Clonotype) -> bool, top: Option<usize>) -> Sample {
        let mut kept = Vec::new();
        for c in &self.clonotypes {
            if top.is_some_and(|top| kept.len() >= top) {
                break;
            }
            if pass(c) {
                kept.push((**c).clone());
            }
        }
        self.derive((*self.metadata).clone(), kept.into_iter(), false)
    }

    /// Assign a new count to every clonotype. Clonotypes given a zero count
    /// are dropped and the result is re-sorted.
    pub fn reweighted(&self, mut new_count: impl FnMut(usize, &Clonotype) -> u64) -> Sample {
        let kept = self
            .clonotypes
            .iter()
            .enumerate()
            .filter_map(|(i, c)| match new_count(i, c) {
                0 => None,
                n => Some(c.with_count(n)),
            })
            .collect::<Vec<_>>();
        self.derive((*self.metadata).clone(), kept.into_iter(), true)
    }

    fn derive(
        &self,
        metadata: SampleMetadata,
        clonotypes: impl Iterator<Item = Clonotype>,
        sort: bool,
    ) -> Sample {
        let mut builder = SampleBuilder::new(metadata);
        for c in clonotypes {
            builder.add_clonotype(c);
        }
        builder.finish(sort)
    }

    fn recalculate_frequencies(&mut self) {
        let mut total = 0.0;
        for c in &mut self.clonotypes {
            // freshly built, the sample holds the only reference
            let c = Arc::make_mut(c);
            total += c.recalculate_frequency();
        }
        self.total_freq_as_input = total;
    }

    pub fn metadata(&self) -> &SampleMetadata {
        &self.metadata
    }

    pub fn sample_id(&self) -> &str {
        &self.metadata.sample_id
    }

    pub fn handle(&self) -> &Arc<SampleHandle> {
        &self.handle
    }

    pub fn clonotypes(&self) -> &[Arc<Clonotype>] {
        &self.clonotypes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Clonotype>> {
        self.clonotypes.iter()
    }

    pub fn get(&self, index: usize) -> Result<&Arc<Clonotype>> {
        ClonotypeContainer::get(self, index)
    }

    pub fn diversity(&self) -> usize {
        self.diversity
    }

    pub fn count(&self) -> u64 {
        self.total_count
    }

    pub fn freq(&self) -> f64 {
        self.total_freq_as_input
    }
}

impl ClonotypeContainer for Sample {
    type Wrapper = Arc<Clonotype>;

    fn wrappers(&self) -> &[Arc<Clonotype>] {
        &self.clonotypes
    }

    fn diversity(&self) -> usize {
        self.diversity
    }

    fn count(&self) -> u64 {
        self.total_count
    }

    fn freq(&self) -> f64 {
        self.total_freq_as_input
    }

    fn freq_as_input(&self) -> f64 {
        self.total_freq_as_input
    }
}

impl<'a> IntoIterator for &'a Sample {
    type Item = &'a Arc<Clonotype>;
    type IntoIter = std::slice::Iter<'a, Arc<Clonotype>>;

    fn into_iter(self) -> Self::IntoIter {
        self.clonotypes.iter()
    }
}
