use fxhash::FxHashMap;
use log::debug;
use rep_types::{Clonotype, Sample, Segment};

/// Renames V and J segments, e.g. to reconcile nomenclature between samples
/// processed with different references before joining them.
#[derive(Debug, Clone, Default)]
pub struct SegmentConverter {
    v_map: FxHashMap<String, Segment>,
    j_map: FxHashMap<String, Segment>,
}

impl SegmentConverter {
    pub fn new<K, V>(
        v_map: impl IntoIterator<Item = (K, V)>,
        j_map: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: AsRef<str>,
    {
        let intern = |(from, to): (K, V)| (from.into(), Segment::intern(to.as_ref()));
        SegmentConverter {
            v_map: v_map.into_iter().map(intern).collect(),
            j_map: j_map.into_iter().map(intern).collect(),
        }
    }

    pub fn convert(&self, clonotype: &Clonotype) -> Clonotype {
        let v = self.v_map.get(clonotype.v().name()).unwrap_or(clonotype.v());
        let j = self.j_map.get(clonotype.j().name()).unwrap_or(clonotype.j());
        clonotype.with_segments(v.clone(), j.clone())
    }

    /// Copy of `sample` with every clonotype converted. Clonotypes that become
    /// identical are kept as separate entries.
    pub fn convert_sample(&self, sample: &Sample) -> Sample {
        debug!("converting segments of sample {}", sample.sample_id());
        Sample::from_clonotypes(
            sample.metadata().clone(),
            sample.iter().map(|c| self.convert(c)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rep_types::testing::{sample_of, ClonotypeBuilder};

    #[test]
    fn test_convert() {
        let conv = SegmentConverter::new([("TRBV6-2", "TRBV6-3")], [("TRBJ2-2P", "TRBJ2-2")]);
        let c = ClonotypeBuilder::aa("CASS").v("TRBV6-2").j("TRBJ1-1").build();
        let converted = conv.convert(&c);
        assert_eq!(converted.v().name(), "TRBV6-3");
        assert_eq!(converted.j().name(), "TRBJ1-1");
        assert_eq!(converted.cdr3aa(), "CASS");

        let s = sample_of("s", vec![c.clone().with_count(3)]);
        let out = conv.convert_sample(&s);
        assert_eq!(out.count(), 3);
        assert_eq!(out.get(0).unwrap().v(), &Segment::intern("TRBV6-3"));
    }
}
