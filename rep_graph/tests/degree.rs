use pretty_assertions::assert_eq;
use rep_graph::{DegreeStatistics, DegreeStatisticsCalculator, GroupedSample, GroupingKind};
use rep_pool::PooledSample;
use rep_types::testing::{sample_of, ClonotypeBuilder};
use rep_types::{Clonotype, ClonotypeContainer, ClonotypeWrapper};

// distinct codons keep strict keys apart for different amino acid sequences
fn clonotype(aa: &str, count: u64) -> Clonotype {
    let nt: String = aa
        .bytes()
        .map(|b| match b {
            b'A' => "GCC",
            b'B' => "GAC",
            b'C' => "TGT",
            b'D' => "GAT",
            b'K' => "AAG",
            b'L' => "CTG",
            b'S' => "AGC",
            _ => "NNN",
        })
        .collect();
    ClonotypeBuilder::new(&nt, aa).v("TRBV1").j("TRBJ1").count(count).build()
}

#[test]
fn degree_with_vjl_grouping() {
    let s = sample_of(
        "s",
        ["CASSA", "CASSL", "CASSK", "CBSSA", "DDDDD"]
            .iter()
            .map(|aa| clonotype(aa, 1))
            .collect(),
    );
    let mut calc = DegreeStatisticsCalculator::new(1, 0, 1, GroupingKind::VJL);
    calc.initialize(&s).unwrap();

    let degree = |aa: &str| calc.compute(&clonotype(aa, 1));
    assert_eq!(degree("CASSA"), DegreeStatistics { degree: 3, group_count: 5 });
    assert_eq!(degree("DDDDD"), DegreeStatistics { degree: 0, group_count: 5 });
}

#[test]
fn degree_over_pooled_samples() {
    let a = sample_of("a", vec![clonotype("CASSA", 10), clonotype("CASSL", 2)]);
    let b = sample_of("b", vec![clonotype("CASSA", 3), clonotype("CASSK", 7)]);
    let pooled = PooledSample::new([&a, &b]).unwrap();
    assert_eq!(pooled.diversity(), 3);

    let mut calc = DegreeStatisticsCalculator::new(1, 0, 1, GroupingKind::VJL);
    calc.initialize(&pooled).unwrap();
    let stats = calc.compute_all(&pooled);
    assert_eq!(pooled.get(0).unwrap().clonotype().cdr3aa(), "CASSA");
    assert_eq!(stats[0], DegreeStatistics { degree: 2, group_count: 3 });
    assert!(stats.iter().all(|s| s.group_count == 3));

    let mut grouped = GroupedSample::default();
    grouped.add_all(&pooled);
    assert_eq!(grouped.number_of_groups(), 1);
    assert_eq!(grouped.total(), 3);
}
