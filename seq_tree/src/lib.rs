//! seq_tree
//!
//! A trie keyed by biological sequences that can enumerate every stored
//! sequence within a bounded number of substitutions, insertions and deletions
//! of a query.
#![deny(missing_docs)]

use fxhash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Symbol sets accepted by a [`SequenceTreeMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Alphabet {
    /// `ACGTN`
    Nucleotide,
    /// The twenty amino acids, the ambiguity codes `B`, `Z` and `J`, plus stop
    /// (`*`), frameshift (`_`) and unknown (`X`).
    AminoAcid,
}

impl Alphabet {
    fn symbols(self) -> &'static [u8] {
        match self {
            Alphabet::Nucleotide => b"ACGTN",
            Alphabet::AminoAcid => b"ACDEFGHIKLMNPQRSTVWYBZJ*_X",
        }
    }

    /// Does `symbol` belong to the alphabet?
    pub fn contains(self, symbol: u8) -> bool {
        self.symbols().contains(&symbol)
    }

    /// First symbol of `seq` outside the alphabet, if any.
    pub fn first_invalid(self, seq: &str) -> Option<char> {
        seq.chars()
            .find(|&c| !c.is_ascii() || !self.contains(c as u8))
    }
}

/// Errors raised while filling a tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// A sequence contains a symbol that is not part of the tree alphabet.
    #[error("Symbol '{symbol}' is not part of the {alphabet} alphabet")]
    UnknownSymbol {
        /// Offending symbol
        symbol: char,
        /// Alphabet of the tree
        alphabet: Alphabet,
    },
}

/// Bounds of a neighborhood search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSearchParameters {
    /// Maximal number of substitutions
    pub max_substitutions: usize,
    /// Maximal number of symbols present in the stored sequence but not in the query
    pub max_insertions: usize,
    /// Maximal number of query symbols absent from the stored sequence
    pub max_deletions: usize,
    /// Maximal number of mutations of any kind
    pub max_total: usize,
}

impl TreeSearchParameters {
    /// Bounds with a separate cap on each mutation kind and on their total.
    pub fn new(
        max_substitutions: usize,
        max_insertions: usize,
        max_deletions: usize,
        max_total: usize,
    ) -> Self {
        TreeSearchParameters {
            max_substitutions,
            max_insertions,
            max_deletions,
            max_total,
        }
    }

    /// Hamming neighborhood of radius `max_substitutions`.
    pub fn substitutions_only(max_substitutions: usize) -> Self {
        TreeSearchParameters::new(max_substitutions, 0, 0, max_substitutions)
    }
}

/// Mutations separating a query from a stored sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mutations {
    /// Substituted positions
    pub substitutions: usize,
    /// Symbols only present in the stored sequence
    pub insertions: usize,
    /// Symbols only present in the query
    pub deletions: usize,
}

impl Mutations {
    /// Total number of mutations.
    pub fn total(&self) -> usize {
        self.substitutions + self.insertions + self.deletions
    }

    /// Number of insertions and deletions.
    pub fn indels(&self) -> usize {
        self.insertions + self.deletions
    }

    fn rank(&self) -> (usize, usize) {
        (self.indels(), self.total())
    }
}

/// A stored value reached by a neighborhood search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<'a, V> {
    /// The value stored under the matched sequence
    pub value: &'a V,
    /// The fewest-indel alignment of the query to the matched sequence; among
    /// those, the one with fewest mutations overall.
    pub mutations: Mutations,
}

#[derive(Debug, Clone)]
struct Node<V> {
    children: Vec<(u8, usize)>,
    value: Option<V>,
}

impl<V> Node<V> {
    fn empty() -> Self {
        Node {
            children: Vec::new(),
            value: None,
        }
    }

    fn child(&self, symbol: u8) -> Option<usize> {
        self.children
            .binary_search_by_key(&symbol, |&(s, _)| s)
            .ok()
            .map(|i| self.children[i].1)
    }
}

/// Map from sequences over an [`Alphabet`] to values, stored as a trie.
///
/// Filling the map requires `&mut self`; searches only need `&self`, so a
/// filled map can be queried from many threads.
///
/// # Example
/// ```rust
/// use seq_tree::{Alphabet, SequenceTreeMap, TreeSearchParameters};
/// let mut tree = SequenceTreeMap::new(Alphabet::AminoAcid);
/// tree.insert("CASSL", 1).unwrap();
/// tree.insert("CASSLE", 2).unwrap();
/// let hits = tree.neighborhood("CASSA", &TreeSearchParameters::new(1, 1, 1, 2));
/// assert_eq!(hits.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct SequenceTreeMap<V> {
    alphabet: Alphabet,
    nodes: Vec<Node<V>>,
    len: usize,
}

impl<V> SequenceTreeMap<V> {
    /// An empty map over `alphabet`.
    pub fn new(alphabet: Alphabet) -> Self {
        SequenceTreeMap {
            alphabet,
            nodes: vec![Node::empty()],
            len: 0,
        }
    }

    /// Alphabet of the stored sequences.
    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    /// Number of stored sequences.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn validate(&self, seq: &str) -> Result<(), TreeError> {
        match self.alphabet.first_invalid(seq) {
            Some(symbol) => Err(TreeError::UnknownSymbol {
                symbol,
                alphabet: self.alphabet,
            }),
            None => Ok(()),
        }
    }

    fn find(&self, seq: &str) -> Option<usize> {
        seq.bytes()
            .try_fold(0, |node, symbol| self.nodes[node].child(symbol))
    }

    fn find_or_create(&mut self, seq: &str) -> usize {
        let mut node = 0;
        for symbol in seq.bytes() {
            node = match self.nodes[node]
                .children
                .binary_search_by_key(&symbol, |&(s, _)| s)
            {
                Ok(i) => self.nodes[node].children[i].1,
                Err(i) => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::empty());
                    self.nodes[node].children.insert(i, (symbol, child));
                    child
                }
            };
        }
        node
    }

    /// Store `value` under `seq`, returning the value it replaces.
    pub fn insert(&mut self, seq: &str, value: V) -> Result<Option<V>, TreeError> {
        self.validate(seq)?;
        let node = self.find_or_create(seq);
        let old = self.nodes[node].value.replace(value);
        if old.is_none() {
            self.len += 1;
        }
        Ok(old)
    }

    /// Mutable access to the value under `seq`, inserting `default()` first if
    /// the sequence is new.
    pub fn get_or_insert_with(
        &mut self,
        seq: &str,
        default: impl FnOnce() -> V,
    ) -> Result<&mut V, TreeError> {
        self.validate(seq)?;
        let node = self.find_or_create(seq);
        let slot = &mut self.nodes[node].value;
        if slot.is_none() {
            self.len += 1;
        }
        Ok(slot.get_or_insert_with(default))
    }

    /// Value stored under exactly `seq`.
    pub fn get(&self, seq: &str) -> Option<&V> {
        self.find(seq).and_then(|node| self.nodes[node].value.as_ref())
    }

    /// Every stored value whose sequence lies within `params` of `query`,
    /// including an exact match. Each value is reported once.
    pub fn neighborhood(&self, query: &str, params: &TreeSearchParameters) -> Vec<Neighbor<'_, V>> {
        let mut search = Search {
            tree: self,
            query: query.as_bytes(),
            params,
            visited: FxHashSet::default(),
            best: FxHashMap::default(),
        };
        search.visit(0, 0, Mutations::default());

        let mut hits: Vec<_> = search.best.into_iter().collect();
        hits.sort_unstable_by_key(|&(node, m)| (m.rank(), node));
        hits.into_iter()
            .filter_map(|(node, mutations)| {
                self.nodes[node]
                    .value
                    .as_ref()
                    .map(|value| Neighbor { value, mutations })
            })
            .collect()
    }
}

struct Search<'a, V> {
    tree: &'a SequenceTreeMap<V>,
    query: &'a [u8],
    params: &'a TreeSearchParameters,
    visited: FxHashSet<(usize, usize, Mutations)>,
    best: FxHashMap<usize, Mutations>,
}

impl<V> Search<'_, V> {
    fn visit(&mut self, node: usize, pos: usize, m: Mutations) {
        if !self.visited.insert((node, pos, m)) {
            return;
        }
        let p = self.params;
        let budget = m.total() < p.max_total;

        if pos == self.query.len() && self.tree.nodes[node].value.is_some() {
            self.best
                .entry(node)
                .and_modify(|best| {
                    if m.rank() < best.rank() {
                        *best = m;
                    }
                })
                .or_insert(m);
        }

        for i in 0..self.tree.nodes[node].children.len() {
            let (symbol, child) = self.tree.nodes[node].children[i];
            if let Some(&q) = self.query.get(pos) {
                if q == symbol {
                    self.visit(child, pos + 1, m);
                } else if budget && m.substitutions < p.max_substitutions {
                    let next = Mutations {
                        substitutions: m.substitutions + 1,
                        ..m
                    };
                    self.visit(child, pos + 1, next);
                }
            }
            if budget && m.insertions < p.max_insertions {
                let next = Mutations {
                    insertions: m.insertions + 1,
                    ..m
                };
                self.visit(child, pos, next);
            }
        }

        if pos < self.query.len() && budget && m.deletions < p.max_deletions {
            let next = Mutations {
                deletions: m.deletions + 1,
                ..m
            };
            self.visit(node, pos + 1, next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn tree(seqs: &[&str]) -> SequenceTreeMap<String> {
        let mut t = SequenceTreeMap::new(Alphabet::AminoAcid);
        for s in seqs {
            t.insert(s, s.to_string()).unwrap();
        }
        t
    }

    fn hits(t: &SequenceTreeMap<String>, q: &str, p: TreeSearchParameters) -> Vec<(String, Mutations)> {
        let mut h: Vec<_> = t
            .neighborhood(q, &p)
            .into_iter()
            .map(|n| (n.value.clone(), n.mutations))
            .collect();
        h.sort_by(|a, b| a.0.cmp(&b.0));
        h
    }

    fn muts(substitutions: usize, insertions: usize, deletions: usize) -> Mutations {
        Mutations {
            substitutions,
            insertions,
            deletions,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let mut t = SequenceTreeMap::new(Alphabet::Nucleotide);
        assert_eq!(t.insert("ACGT", 1).unwrap(), None);
        assert_eq!(t.insert("ACGT", 2).unwrap(), Some(1));
        assert_eq!(t.insert("AC", 3).unwrap(), None);
        assert_eq!(t.len(), 2);
        assert_eq!(t.get("ACGT"), Some(&2));
        assert_eq!(t.get("ACG"), None);
        assert_eq!(
            t.insert("ACQ", 4),
            Err(TreeError::UnknownSymbol {
                symbol: 'Q',
                alphabet: Alphabet::Nucleotide
            })
        );
        *t.get_or_insert_with("ACG", || 0).unwrap() += 5;
        assert_eq!(t.get("ACG"), Some(&5));
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_substitution_neighborhood() {
        let t = tree(&["CASSA", "CASSL", "CASSK", "CBSSA", "DDDDD", "CASS"]);
        let h = hits(&t, "CASSA", TreeSearchParameters::new(1, 0, 0, 1));
        assert_eq!(
            h,
            vec![
                ("CASSA".to_string(), muts(0, 0, 0)),
                ("CASSK".to_string(), muts(1, 0, 0)),
                ("CASSL".to_string(), muts(1, 0, 0)),
                ("CBSSA".to_string(), muts(1, 0, 0)),
            ]
        );
    }

    #[test]
    fn test_indel_neighborhood() {
        let t = tree(&["CASS", "CASSLA", "CASSA"]);
        let h = hits(&t, "CASSA", TreeSearchParameters::new(0, 1, 1, 1));
        assert_eq!(
            h,
            vec![
                ("CASS".to_string(), muts(0, 0, 1)),
                ("CASSA".to_string(), muts(0, 0, 0)),
                ("CASSLA".to_string(), muts(0, 1, 0)),
            ]
        );
    }

    #[test]
    fn test_total_cap() {
        let t = tree(&["CAGGA"]);
        assert!(hits(&t, "CASSA", TreeSearchParameters::new(2, 0, 0, 1)).is_empty());
        assert_eq!(hits(&t, "CASSA", TreeSearchParameters::new(2, 0, 0, 2)).len(), 1);
    }

    #[test]
    fn test_prefers_fewest_indels() {
        // "CASA" vs "CSSA": one substitution, or a deletion plus an insertion
        let t = tree(&["CSSA"]);
        let h = hits(&t, "CASA", TreeSearchParameters::new(1, 1, 1, 2));
        assert_eq!(h, vec![("CSSA".to_string(), muts(1, 0, 0))]);
    }

    fn hamming(a: &str, b: &str) -> Option<usize> {
        (a.len() == b.len()).then(|| a.bytes().zip(b.bytes()).filter(|(x, y)| x != y).count())
    }

    proptest! {
        #[test]
        fn prop_hamming_search(seqs in proptest::collection::vec("[ACG]{3,5}", 1..20), q in "[ACG]{3,5}") {
            let mut t = SequenceTreeMap::new(Alphabet::Nucleotide);
            for s in &seqs {
                t.insert(s, s.clone()).unwrap();
            }
            let mut found: Vec<String> = t
                .neighborhood(&q, &TreeSearchParameters::substitutions_only(1))
                .into_iter()
                .map(|n| n.value.clone())
                .collect();
            found.sort();
            let mut expected: Vec<String> = seqs
                .iter()
                .filter(|s| hamming(s, &q).is_some_and(|d| d <= 1))
                .cloned()
                .collect();
            expected.sort();
            expected.dedup();
            prop_assert_eq!(found, expected);
        }

        #[test]
        fn prop_symmetric(a in "[ACG]{2,6}", b in "[ACG]{2,6}") {
            let p = TreeSearchParameters::new(1, 1, 1, 2);
            let ta = {
                let mut t = SequenceTreeMap::new(Alphabet::Nucleotide);
                t.insert(&a, ()).unwrap();
                t
            };
            let tb = {
                let mut t = SequenceTreeMap::new(Alphabet::Nucleotide);
                t.insert(&b, ()).unwrap();
                t
            };
            prop_assert_eq!(ta.neighborhood(&b, &p).len(), tb.neighborhood(&a, &p).len());
        }
    }
}
