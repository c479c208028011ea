use crate::filters::{JoinFilter, OccurrenceJoinFilter};
use fxhash::FxHashMap;
use log::debug;
use rep_stats::{anscombe, chi_squared_upper_tail, jittered_geometric_mean, rank_scale_correction};
use rep_types::{
    Clonotype, ClonotypeContainer, ClonotypeKeyGen, ClonotypeWrapper, OverlapType, RepError,
    Result, Sample,
};
use std::sync::Arc;

/// Occurrences of one clonotype identity across the samples of a join,
/// stored in the original sample order.
#[derive(Debug, Clone)]
pub struct JointClonotype {
    variants: Vec<Vec<Arc<Clonotype>>>,
    counts: Vec<u64>,
    freqs: Vec<f64>,
    base_freq: f64,
    peak: usize,
    representative: Arc<Clonotype>,
    sampling_p_value: f64,
}

impl JointClonotype {
    fn build(variants: Vec<Vec<Arc<Clonotype>>>, samples: &[Sample]) -> Option<Self> {
        let counts: Vec<u64> = variants
            .iter()
            .map(|vs| vs.iter().map(|c| c.count()).sum())
            .collect();
        let freqs: Vec<f64> = counts
            .iter()
            .zip(samples)
            .map(|(&n, s)| if s.count() == 0 { 0.0 } else { n as f64 / s.count() as f64 })
            .collect();
        let base_freq = jittered_geometric_mean(freqs.iter().copied());

        // first sample with the largest count
        let mut peak = 0;
        for (i, &n) in counts.iter().enumerate() {
            if n > counts[peak] {
                peak = i;
            }
        }
        let mut representative: Option<&Arc<Clonotype>> = None;
        for c in &variants[peak] {
            if representative.map_or(true, |r| c.count() > r.count()) {
                representative = Some(c);
            }
        }
        let representative = representative
            .or_else(|| variants.iter().flatten().next())?
            .clone();

        Some(JointClonotype {
            variants,
            counts,
            freqs,
            base_freq,
            peak,
            representative,
            sampling_p_value: 1.0,
        })
    }

    /// Reads in sample `i`, in original sample order; 0 past the last sample.
    pub fn count(&self, i: usize) -> u64 {
        self.counts.get(i).copied().unwrap_or(0)
    }

    pub fn present(&self, i: usize) -> bool {
        self.count(i) > 0
    }

    /// Number of samples the clonotype is present in.
    pub fn occurrences(&self) -> usize {
        self.counts.iter().filter(|&&n| n > 0).count()
    }

    /// Geometric mean over all samples of the jittered per-sample frequency.
    pub fn base_freq(&self) -> f64 {
        self.base_freq
    }

    pub fn representative(&self) -> &Arc<Clonotype> {
        &self.representative
    }
}

impl ClonotypeWrapper for JointClonotype {
    fn clonotype(&self) -> &Arc<Clonotype> {
        &self.representative
    }
}

#[derive(Debug, Clone)]
struct JointData {
    samples: Vec<Sample>,
    overlap_type: OverlapType,
    clonotypes: Vec<JointClonotype>,
    transformed_count_sum: Vec<f64>,
    total_div: Vec<usize>,
    intersection_div: Vec<usize>,
    intersection_div_matrix: Vec<Vec<usize>>,
    intersection_count: Vec<u64>,
    intersection_count_matrix: Vec<Vec<u64>>,
    intersection_freq: Vec<f64>,
    intersection_freq_matrix: Vec<Vec<f64>>,
    total_mean_freq: f64,
    min_mean_freq: f64,
    count: u64,
}

/// Join of N samples under an [`OverlapType`].
///
/// Joint clonotypes are ordered by base frequency, largest first. Sample
/// indices passed to accessors refer to the current orientation: after
/// [`JointSample::reverse`] index 0 is the last input sample. Per-sample
/// accessors return [`RepError::IndexOutOfBounds`] past the number of samples.
#[derive(Debug, Clone)]
pub struct JointSample {
    data: Arc<JointData>,
    reversed: bool,
}

impl JointSample {
    /// Join keeping clonotypes found in at least two samples.
    pub fn with_default_filter(samples: Vec<Sample>, overlap_type: OverlapType) -> Result<Self> {
        Self::new(samples, overlap_type, &OccurrenceJoinFilter::default())
    }

    pub fn new(
        samples: Vec<Sample>,
        overlap_type: OverlapType,
        filter: &dyn JoinFilter,
    ) -> Result<Self> {
        let n = samples.len();
        let key_gen = ClonotypeKeyGen::new(overlap_type);

        let mut index = FxHashMap::default();
        let mut grouped: Vec<Vec<Vec<Arc<Clonotype>>>> = Vec::new();
        for (i, sample) in samples.iter().enumerate() {
            for c in sample.clonotypes() {
                let key = key_gen.key(c)?;
                let at = *index.entry(key).or_insert_with(|| {
                    grouped.push(vec![Vec::new(); n]);
                    grouped.len() - 1
                });
                grouped[at][i].push(c.clone());
            }
        }

        let mut transformed_count_sum = vec![0.0; n];
        let mut total_div = vec![0; n];
        let mut intersection_div = vec![0; n];
        let mut intersection_div_matrix = vec![vec![0; n]; n];
        let mut intersection_count = vec![0; n];
        let mut intersection_count_matrix = vec![vec![0; n]; n];
        let mut intersection_freq = vec![0.0; n];
        let mut intersection_freq_matrix = vec![vec![0.0; n]; n];
        let mut total_mean_freq = 0.0;
        let mut min_mean_freq = 1.0f64;
        let mut count = 0;

        let joined = grouped.len();
        let mut clonotypes = Vec::new();
        for variants in grouped {
            let Some(jc) = JointClonotype::build(variants, &samples) else {
                continue;
            };
            for i in 0..n {
                if jc.present(i) {
                    total_div[i] += 1;
                }
                transformed_count_sum[i] += anscombe(jc.counts[i]);
            }
            if !filter.pass(&jc, &samples) {
                continue;
            }
            total_mean_freq += jc.base_freq;
            min_mean_freq = min_mean_freq.min(jc.base_freq);
            for i in (0..n).filter(|&i| jc.present(i)) {
                count += jc.counts[i];
                intersection_count[i] += jc.counts[i];
                intersection_freq[i] += jc.freqs[i];
                intersection_div[i] += 1;
                for j in (i + 1..n).filter(|&j| jc.present(j)) {
                    intersection_count_matrix[i][j] += jc.counts[i];
                    intersection_count_matrix[j][i] += jc.counts[j];
                    intersection_freq_matrix[i][j] += jc.freqs[i];
                    intersection_freq_matrix[j][i] += jc.freqs[j];
                    intersection_div_matrix[i][j] += 1;
                    intersection_div_matrix[j][i] += 1;
                }
            }
            clonotypes.push(jc);
        }
        debug!(
            "Joined {} samples into {} clonotypes, {} passed the join filter",
            n,
            joined,
            clonotypes.len()
        );
        clonotypes.sort_by(|a, b| b.base_freq.total_cmp(&a.base_freq));

        Ok(JointSample {
            data: Arc::new(JointData {
                samples,
                overlap_type,
                clonotypes,
                transformed_count_sum,
                total_div,
                intersection_div,
                intersection_div_matrix,
                intersection_count,
                intersection_count_matrix,
                intersection_freq,
                intersection_freq_matrix,
                total_mean_freq,
                min_mean_freq,
                count,
            }),
            reversed: false,
        })
    }

    /// The same join with the sample order reversed. A reversed join cannot
    /// be reversed again.
    pub fn reverse(&self) -> Result<JointSample> {
        if self.reversed {
            return Err(RepError::IllegalState("joint sample is already reversed"));
        }
        Ok(JointSample {
            data: self.data.clone(),
            reversed: true,
        })
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Storage position of an in-range sample index.
    fn orient(&self, i: usize) -> usize {
        if self.reversed {
            self.data.samples.len() - i - 1
        } else {
            i
        }
    }

    fn index(&self, i: usize) -> Result<usize> {
        RepError::check_index(i, self.data.samples.len())?;
        Ok(self.orient(i))
    }

    pub fn number_of_samples(&self) -> usize {
        self.data.samples.len()
    }

    pub fn sample(&self, i: usize) -> Result<&Sample> {
        Ok(&self.data.samples[self.index(i)?])
    }

    pub fn overlap_type(&self) -> OverlapType {
        self.data.overlap_type
    }

    /// Joint clonotype at `index` viewed in the current orientation.
    pub fn at(&self, index: usize) -> Result<JointClonotypeRef<'_>> {
        RepError::check_index(index, self.data.clonotypes.len())?;
        Ok(self.view(&self.data.clonotypes[index]))
    }

    pub fn iter(&self) -> impl Iterator<Item = JointClonotypeRef<'_>> + '_ {
        self.data.clonotypes.iter().map(move |jc| self.view(jc))
    }

    fn view<'a>(&'a self, clonotype: &'a JointClonotype) -> JointClonotypeRef<'a> {
        JointClonotypeRef {
            clonotype,
            parent: self,
        }
    }

    /// Reads of all kept joint clonotypes summed over samples.
    pub fn total_count(&self) -> u64 {
        self.data.count
    }

    /// Number of joint clonotypes present in sample `i`, before filtering.
    pub fn total_div(&self, i: usize) -> Result<usize> {
        Ok(self.data.total_div[self.index(i)?])
    }

    /// Number of kept joint clonotypes present in sample `i`.
    pub fn intersection_div(&self, i: usize) -> Result<usize> {
        Ok(self.data.intersection_div[self.index(i)?])
    }

    /// Number of kept joint clonotypes present in both samples.
    pub fn intersection_div_pair(&self, i: usize, j: usize) -> Result<usize> {
        Ok(self.data.intersection_div_matrix[self.index(i)?][self.index(j)?])
    }

    pub fn intersection_count(&self, i: usize) -> Result<u64> {
        Ok(self.data.intersection_count[self.index(i)?])
    }

    /// Reads in sample `i` of kept clonotypes that are also present in `j`.
    pub fn intersection_count_pair(&self, i: usize, j: usize) -> Result<u64> {
        Ok(self.data.intersection_count_matrix[self.index(i)?][self.index(j)?])
    }

    pub fn intersection_freq(&self, i: usize) -> Result<f64> {
        Ok(self.data.intersection_freq[self.index(i)?])
    }

    /// Frequency in sample `i` of kept clonotypes that are also present in `j`.
    pub fn intersection_freq_pair(&self, i: usize, j: usize) -> Result<f64> {
        Ok(self.data.intersection_freq_matrix[self.index(i)?][self.index(j)?])
    }

    /// Sum of Anscombe-transformed counts in sample `i` over every joint
    /// clonotype, kept or not.
    pub fn transformed_count_sum(&self, i: usize) -> Result<f64> {
        Ok(self.data.transformed_count_sum[self.index(i)?])
    }

    pub fn total_mean_freq(&self) -> f64 {
        self.data.total_mean_freq
    }

    pub fn min_mean_freq(&self) -> f64 {
        self.data.min_mean_freq
    }

    /// Base frequency normalized so that kept clonotypes sum to one.
    pub fn calc_freq(&self, base_freq: f64) -> f64 {
        if self.data.total_mean_freq > 0.0 {
            base_freq / self.data.total_mean_freq
        } else {
            0.0
        }
    }

    /// Base frequency scaled so that the rarest kept clonotype counts one.
    pub fn calc_count(&self, base_freq: f64) -> u64 {
        (base_freq / self.data.min_mean_freq).floor() as u64
    }

    /// Test each kept clonotype for deviation from proportional sampling
    /// with a G-test on Anscombe-transformed counts, then rank-correct the
    /// p-values. Corrected values are capped at 1 and not floored.
    pub fn compute_sampling_p_values(&mut self) {
        self.compute_sampling_p_values_with_floor(0.0);
    }

    /// [`JointSample::compute_sampling_p_values`] clamping every corrected
    /// value to at least `p_value_floor`.
    pub fn compute_sampling_p_values_with_floor(&mut self, p_value_floor: f64) {
        let data = Arc::make_mut(&mut self.data);
        let dof = data.samples.len().saturating_sub(1);
        let totals = &data.transformed_count_sum;
        let total: f64 = totals.iter().sum();
        let mut p_values: Vec<f64> = data
            .clonotypes
            .iter()
            .map(|jc| {
                let observed: Vec<f64> = jc.counts.iter().map(|&n| anscombe(n)).collect();
                let expected = observed.iter().sum::<f64>() / total;
                let g: f64 = observed
                    .iter()
                    .zip(totals)
                    .filter(|(&o, _)| o > 0.0)
                    .map(|(&o, &t)| o * (o / expected / t).ln())
                    .sum();
                chi_squared_upper_tail(2.0 * g, dof)
            })
            .collect();
        rank_scale_correction(&mut p_values, p_value_floor);
        for (jc, p) in data.clonotypes.iter_mut().zip(p_values) {
            jc.sampling_p_value = p;
        }
    }

    /// [`JointSample::compute_sampling_p_values_with_floor`] with the
    /// configured `p_value_floor`.
    pub fn compute_sampling_p_values_with_configured_floor(&mut self) -> anyhow::Result<()> {
        let floor = *rep_params::p_value_floor()?;
        self.compute_sampling_p_values_with_floor(floor);
        Ok(())
    }
}

impl ClonotypeContainer for JointSample {
    type Wrapper = JointClonotype;

    fn wrappers(&self) -> &[JointClonotype] {
        &self.data.clonotypes
    }

    fn diversity(&self) -> usize {
        self.data.clonotypes.len()
    }

    fn count(&self) -> u64 {
        self.data.count
    }

    fn freq(&self) -> f64 {
        1.0
    }

    fn freq_as_input(&self) -> f64 {
        1.0
    }
}

/// A joint clonotype seen through its [`JointSample`], with sample indices
/// in the sample's current orientation.
#[derive(Debug, Clone, Copy)]
pub struct JointClonotypeRef<'a> {
    clonotype: &'a JointClonotype,
    parent: &'a JointSample,
}

impl<'a> JointClonotypeRef<'a> {
    pub fn joint_clonotype(&self) -> &'a JointClonotype {
        self.clonotype
    }

    pub fn parent(&self) -> &'a JointSample {
        self.parent
    }

    /// Occurrence with the most reads in the peak sample.
    pub fn representative(&self) -> &'a Arc<Clonotype> {
        &self.clonotype.representative
    }

    /// Sample with the largest count; the first one on ties in input order.
    pub fn peak(&self) -> usize {
        self.parent.orient(self.clonotype.peak)
    }

    pub fn occurrences(&self) -> usize {
        self.clonotype.occurrences()
    }

    pub fn present(&self, i: usize) -> Result<bool> {
        Ok(self.clonotype.present(self.parent.index(i)?))
    }

    pub fn count_in(&self, i: usize) -> Result<u64> {
        Ok(self.clonotype.count(self.parent.index(i)?))
    }

    /// Share of the reads of sample `i`.
    pub fn freq_in(&self, i: usize) -> Result<f64> {
        Ok(self.clonotype.freqs[self.parent.index(i)?])
    }

    /// Share of the overlapping reads of sample `i`.
    pub fn freq_within_intersection(&self, i: usize) -> Result<f64> {
        let total = self.parent.intersection_freq(i)?;
        Ok(if total > 0.0 {
            self.freq_in(i)? / total
        } else {
            0.0
        })
    }

    pub fn variants(&self, i: usize) -> Result<&'a [Arc<Clonotype>]> {
        Ok(&self.clonotype.variants[self.parent.index(i)?])
    }

    pub fn number_of_variants(&self, i: usize) -> Result<usize> {
        Ok(self.variants(i)?.len())
    }

    pub fn base_freq(&self) -> f64 {
        self.clonotype.base_freq
    }

    pub fn freq(&self) -> f64 {
        self.parent.calc_freq(self.clonotype.base_freq)
    }

    pub fn count(&self) -> u64 {
        self.parent.calc_count(self.clonotype.base_freq)
    }

    /// Rank-corrected sampling p-value, 1 until computed.
    pub fn sampling_p_value(&self) -> f64 {
        self.clonotype.sampling_p_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rep_stats::JITTER;
    use rep_types::testing::{sample_of, ClonotypeBuilder};

    fn c(aa: &str, j: &str, count: u64) -> Clonotype {
        ClonotypeBuilder::aa(aa).j(j).count(count).build()
    }

    fn two_samples() -> Vec<Sample> {
        vec![
            sample_of("s0", vec![c("CASSA", "J1", 10), c("CASSL", "J1", 5)]),
            sample_of(
                "s1",
                vec![c("CASSA", "J1", 8), c("CASSA", "J2", 2), c("CASSK", "J1", 4)],
            ),
        ]
    }

    #[test]
    fn test_amino_acid_join() {
        let joint = JointSample::with_default_filter(two_samples(), OverlapType::AminoAcid).unwrap();
        assert_eq!(joint.diversity(), 1);
        let jc = joint.at(0).unwrap();
        assert_eq!(jc.representative().cdr3aa(), "CASSA");
        assert_eq!(jc.number_of_variants(0).unwrap(), 1);
        assert_eq!(jc.number_of_variants(1).unwrap(), 2);
        assert_eq!((jc.count_in(0).unwrap(), jc.count_in(1).unwrap()), (10, 10));
        let expected = ((10.0 / 15.0 + JITTER) * (10.0 / 14.0 + JITTER)).sqrt();
        assert!((jc.base_freq() - expected).abs() < 1e-12);
        assert_eq!(joint.intersection_div(0).unwrap(), 1);
        assert_eq!(joint.intersection_div(1).unwrap(), 1);
        assert_eq!(joint.intersection_div_pair(0, 1).unwrap(), 1);
        assert_eq!(joint.total_div(0).unwrap(), 2);
        assert_eq!(joint.total_div(1).unwrap(), 2);
        assert_eq!(joint.total_count(), 20);
        assert_eq!(jc.count(), 1);
        assert!((jc.freq() - 1.0).abs() < 1e-12);
        assert!((jc.freq_within_intersection(1).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_strict_join_keeps_variants_apart() {
        let joint = JointSample::with_default_filter(two_samples(), OverlapType::AminoAcidVJ).unwrap();
        assert_eq!(joint.diversity(), 1);
        assert_eq!(joint.at(0).unwrap().count_in(1).unwrap(), 8);
        assert!(joint.at(1).is_err());
    }

    #[test]
    fn test_convergent_rule_is_rejected() {
        let err =
            JointSample::with_default_filter(two_samples(), OverlapType::AminoAcidNonNucleotide)
                .unwrap_err();
        assert!(matches!(err, RepError::IllegalArgument(_)));
    }

    #[test]
    fn test_reverse() {
        let samples = vec![
            sample_of("a", vec![c("CASS", "J1", 3), c("CAST", "J1", 1)]),
            sample_of("b", vec![c("CASS", "J1", 1), c("CAWW", "J1", 1), c("CAYY", "J1", 2)]),
        ];
        let joint = JointSample::with_default_filter(samples, OverlapType::AminoAcid).unwrap();
        let rev = joint.reverse().unwrap();
        assert_eq!(rev.sample(0).unwrap().sample_id(), "b");
        assert_eq!(joint.total_div(0), rev.total_div(1));
        assert_eq!(joint.total_div(1), rev.total_div(0));
        assert_eq!(joint.intersection_freq_pair(0, 1), rev.intersection_freq_pair(1, 0));
        assert_eq!(joint.intersection_freq_pair(1, 0), rev.intersection_freq_pair(0, 1));
        assert!((joint.intersection_freq_pair(0, 1).unwrap() - 0.75).abs() < 1e-12);
        assert!((joint.intersection_freq_pair(1, 0).unwrap() - 0.25).abs() < 1e-12);

        let jc = rev.at(0).unwrap();
        assert_eq!(jc.count_in(0).unwrap(), 1);
        assert_eq!(jc.peak(), 1);
        assert_eq!(joint.at(0).unwrap().peak(), 0);
        assert!(matches!(rev.reverse(), Err(RepError::IllegalState(_))));
    }

    #[test]
    fn test_sample_index_out_of_range() {
        let joint = JointSample::with_default_filter(two_samples(), OverlapType::AminoAcid).unwrap();
        let rev = joint.reverse().unwrap();
        let oob = RepError::IndexOutOfBounds { index: 2, len: 2 };
        for js in [&joint, &rev] {
            assert_eq!(js.total_div(2).unwrap_err(), oob);
            assert_eq!(js.intersection_div(2).unwrap_err(), oob);
            assert_eq!(js.intersection_count(2).unwrap_err(), oob);
            assert_eq!(js.intersection_freq(2).unwrap_err(), oob);
            assert_eq!(js.transformed_count_sum(2).unwrap_err(), oob);
            assert_eq!(js.intersection_div_pair(0, 2).unwrap_err(), oob);
            assert_eq!(js.intersection_count_pair(2, 0).unwrap_err(), oob);
            assert_eq!(js.intersection_freq_pair(2, 1).unwrap_err(), oob);
            assert!(js.sample(2).is_err());

            let jc = js.at(0).unwrap();
            assert_eq!(jc.count_in(2).unwrap_err(), oob);
            assert_eq!(jc.present(2).unwrap_err(), oob);
            assert_eq!(jc.freq_in(2).unwrap_err(), oob);
            assert_eq!(jc.freq_within_intersection(2).unwrap_err(), oob);
            assert_eq!(jc.number_of_variants(2).unwrap_err(), oob);
            assert!(jc.variants(usize::MAX).is_err());
        }
        assert_eq!(rev.at(0).unwrap().count_in(1).unwrap(), 10);
    }

    #[test]
    fn test_normalization() {
        // one sample of 10 reads gives base frequencies 0.4 + ε and 0.1 + ε
        let samples = vec![sample_of(
            "s",
            vec![
                c("CASS", "J1", 4),
                c("CAST", "J1", 1),
                c("CAWW", "J1", 3),
                c("CAYY", "J1", 2),
            ],
        )];
        let keep = |jc: &JointClonotype, _: &[Sample]| matches!(jc.count(0), 1 | 4);
        let joint = JointSample::new(samples, OverlapType::AminoAcid, &FnFilter(keep)).unwrap();
        assert_eq!(joint.diversity(), 2);
        assert_eq!(joint.total_div(0).unwrap(), 4);

        let (top, low) = (joint.at(0).unwrap(), joint.at(1).unwrap());
        assert_eq!(top.representative().cdr3aa(), "CASS");
        assert!((top.base_freq() - 0.4).abs() < 1e-8);
        assert!((low.base_freq() - 0.1).abs() < 1e-8);
        assert!((top.freq() - 0.8).abs() < 1e-8);
        assert!((low.freq() - 0.2).abs() < 1e-8);
        assert!((joint.total_mean_freq() - 0.5).abs() < 1e-8);
        assert!((joint.min_mean_freq() - 0.1).abs() < 1e-8);
        assert_eq!(low.count(), 1);
        // (0.4 + ε) / (0.1 + ε) is just under 4 and counts truncate
        assert_eq!(top.count(), 3);
        assert_eq!(joint.calc_count(top.base_freq() + 4.0 * JITTER), 4);
    }

    struct FnFilter<F>(F);

    impl<F: Fn(&JointClonotype, &[Sample]) -> bool + Send + Sync> JoinFilter for FnFilter<F> {
        fn pass(&self, clonotype: &JointClonotype, samples: &[Sample]) -> bool {
            (self.0)(clonotype, samples)
        }
    }

    #[test]
    fn test_empty_join() {
        let samples = vec![
            sample_of("a", vec![c("CASS", "J1", 3)]),
            sample_of("b", vec![c("CAWW", "J1", 1)]),
        ];
        let joint = JointSample::with_default_filter(samples, OverlapType::AminoAcid).unwrap();
        assert_eq!(joint.diversity(), 0);
        assert_eq!(joint.total_mean_freq(), 0.0);
        assert_eq!(joint.calc_freq(0.5), 0.0);
        assert_eq!(joint.intersection_freq(0).unwrap(), 0.0);
        assert_eq!(joint.total_div(0).unwrap(), 1);
    }

    #[test]
    fn test_sampling_p_values() {
        let samples = vec![
            sample_of(
                "a",
                vec![c("CASS", "J1", 1000), c("CAST", "J1", 100), c("CAWW", "J1", 100)],
            ),
            sample_of(
                "b",
                vec![c("CASS", "J1", 1000), c("CAST", "J1", 1), c("CAWW", "J1", 100)],
            ),
        ];
        let mut joint = JointSample::with_default_filter(samples, OverlapType::AminoAcid).unwrap();
        assert!(joint.iter().all(|jc| jc.sampling_p_value() == 1.0));
        joint.compute_sampling_p_values_with_floor(1e-10);
        let p = |aa: &str| {
            joint
                .iter()
                .find(|jc| jc.representative().cdr3aa() == aa)
                .unwrap()
                .sampling_p_value()
        };
        assert!(p("CAST") < p("CASS"));
        assert!(joint.iter().all(|jc| {
            let p = jc.sampling_p_value();
            (1e-10..=1.0).contains(&p)
        }));
    }

    #[test]
    fn test_sampling_p_values_floor_is_opt_in() {
        let samples = vec![
            sample_of(
                "a",
                vec![c("CASS", "J1", 1000), c("CAST", "J1", 100), c("CAWW", "J1", 100)],
            ),
            sample_of(
                "b",
                vec![c("CASS", "J1", 1000), c("CAST", "J1", 1), c("CAWW", "J1", 100)],
            ),
        ];
        let mut joint = JointSample::with_default_filter(samples, OverlapType::AminoAcid).unwrap();
        let cast = |js: &JointSample| {
            js.iter()
                .find(|jc| jc.representative().cdr3aa() == "CAST")
                .unwrap()
                .sampling_p_value()
        };

        joint.compute_sampling_p_values();
        let p = cast(&joint);
        assert!((p - 0.011137).abs() < 1e-4, "{p}");
        assert!(joint.iter().any(|jc| jc.sampling_p_value() == 1.0));

        joint.compute_sampling_p_values_with_floor(0.5);
        assert_eq!(cast(&joint), 0.5);
        assert!(joint.iter().all(|jc| jc.sampling_p_value() >= 0.5));
    }

    proptest! {
        #[test]
        fn prop_joint_freqs_sum_to_one(
            counts in prop::collection::vec(prop::collection::vec(0u64..20, 4), 2..4)
        ) {
            let samples: Vec<Sample> = counts
                .iter()
                .enumerate()
                .map(|(i, cs)| {
                    let aas = ["CASS", "CAST", "CAWW", "CAYY"];
                    sample_of(
                        &format!("s{i}"),
                        cs.iter()
                            .zip(aas)
                            .filter(|(&n, _)| n > 0)
                            .map(|(&n, aa)| c(aa, "J1", n))
                            .collect(),
                    )
                })
                .collect();
            let joint = JointSample::new(samples, OverlapType::AminoAcid, &OccurrenceJoinFilter::new(1)).unwrap();
            if joint.diversity() > 0 {
                let total: f64 = joint.iter().map(|jc| jc.freq()).sum();
                prop_assert!((total - 1.0).abs() < 1e-9);
                let last = joint.at(joint.diversity() - 1).unwrap();
                prop_assert_eq!(last.count(), 1);
                prop_assert!(joint.iter().collect::<Vec<_>>().windows(2).all(|w| w[0].base_freq() >= w[1].base_freq()));
                for i in 0..joint.number_of_samples() {
                    for j in 0..joint.number_of_samples() {
                        prop_assert_eq!(joint.intersection_div_pair(i, j).unwrap(), joint.intersection_div_pair(j, i).unwrap());
                    }
                }
            }
        }
    }
}
