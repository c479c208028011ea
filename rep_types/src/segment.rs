//! Interned V/D/J segment identifiers.
use fxhash::FxHashMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock, RwLock};

/// Name of the placeholder segment used for absent calls.
pub const MISSING_SEGMENT_NAME: &str = ".";

/// A canonical handle to a V, D or J segment name.
///
/// Handles produced by the same [`SegmentTable`] compare equal iff they were
/// interned from the same name. Equality and hashing are by identity and never
/// touch the underlying string.
#[derive(Clone)]
pub struct Segment(Arc<str>);

impl Segment {
    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is_missing(&self) -> bool {
        &*self.0 == MISSING_SEGMENT_NAME
    }

    /// Intern `name` in the process-wide table.
    pub fn intern(name: &str) -> Segment {
        SegmentTable::global().intern(name)
    }

    /// The process-wide placeholder for absent calls.
    pub fn missing() -> Segment {
        SegmentTable::global().missing()
    }
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Segment {}

impl Hash for Segment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as *const u8 as usize).hash(state);
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Segment({})", &*self.0)
    }
}

impl Serialize for Segment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl Default for Segment {
    fn default() -> Self {
        Segment::missing()
    }
}

/// Interning table mapping segment names to canonical handles.
///
/// A single global table backs [`Segment::intern`]; independent tables can be
/// created for tests. Handles from different tables never compare equal.
#[derive(Debug)]
pub struct SegmentTable {
    segments: RwLock<FxHashMap<Arc<str>, Segment>>,
    missing: Segment,
}

impl Default for SegmentTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentTable {
    pub fn new() -> Self {
        let missing = Segment(Arc::from(MISSING_SEGMENT_NAME));
        let mut segments = FxHashMap::default();
        segments.insert(missing.0.clone(), missing.clone());
        SegmentTable {
            segments: RwLock::new(segments),
            missing,
        }
    }

    pub fn global() -> &'static SegmentTable {
        static TABLE: OnceLock<SegmentTable> = OnceLock::new();
        TABLE.get_or_init(SegmentTable::new)
    }

    pub fn missing(&self) -> Segment {
        self.missing.clone()
    }

    /// Return the canonical handle for `name`, creating it on first use.
    pub fn intern(&self, name: &str) -> Segment {
        if let Some(seg) = self.read().get(name) {
            return seg.clone();
        }
        let mut segments = self.write();
        segments
            .entry(Arc::from(name))
            .or_insert_with_key(|key| Segment(key.clone()))
            .clone()
    }

    /// Look up an already interned segment.
    pub fn get(&self, name: &str) -> Option<Segment> {
        self.read().get(name).cloned()
    }

    /// Number of interned segments, including the placeholder.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All interned segments matching `pattern`.
    ///
    /// A segment matches when its name equals the pattern, when it extends the
    /// pattern past an allele (`*`) or family (`-`) separator, or, for patterns
    /// ending with `*`, when it starts with the part before the star. So
    /// `TRBV12` and `TRBV12*` both match `TRBV12-3` and `TRBV12-4*01`, but
    /// `TRBV1` does not match `TRBV12-3`.
    pub fn lookup_fuzzy(&self, pattern: &str) -> Vec<Segment> {
        let mut hits: Vec<Segment> = self
            .read()
            .values()
            .filter(|seg| fuzzy_match(pattern, seg.name()))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.name().cmp(b.name()));
        hits
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, FxHashMap<Arc<str>, Segment>> {
        // a poisoned table still holds valid entries
        self.segments.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, FxHashMap<Arc<str>, Segment>> {
        self.segments.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn fuzzy_match(pattern: &str, name: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix('*') {
        return name.starts_with(prefix) && is_boundary(&name[prefix.len()..]);
    }
    if name == pattern {
        return true;
    }
    name.strip_prefix(pattern).map_or(false, is_boundary)
}

fn is_boundary(rest: &str) -> bool {
    rest.is_empty() || rest.starts_with('*') || rest.starts_with('-')
}
