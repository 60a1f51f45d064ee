#![cfg(test)]

use hexastore_model::{NodeId, Triple, TriplePosition};
use hexastore_storage::{
    Hexastore, IndexConfiguration, IndexOrder, LevelLayout, PositionMask, StorageManager,
};
use itertools::Itertools;

#[test]
fn test_count_matches_inserted_minus_removed() {
    let mut hexastore = create_hexastore(IndexConfiguration::default());
    let triples = example_triples();
    hexastore.add_triple_batch(triples.clone()).unwrap();
    hexastore.add_triple_batch(triples.clone()).unwrap();
    assert_eq!(hexastore.len(), triples.len() as u64);

    let removed = triples.iter().step_by(3).copied().collect_vec();
    for triple in &removed {
        assert!(hexastore.remove_triple(triple));
    }

    let expected = (triples.len() - removed.len()) as u64;
    assert_eq!(
        hexastore.count_statements(wildcard(), wildcard(), wildcard()),
        expected
    );
    let scanned = hexastore
        .get_statements(wildcard(), wildcard(), wildcard(), TriplePosition::Subject)
        .count();
    assert_eq!(scanned as u64, expected);
}

#[test]
fn test_six_indexes_agree() {
    for config in configurations() {
        let mut hexastore = create_hexastore(config);
        let triples = example_triples();
        hexastore.add_triple_batch(triples.clone()).unwrap();

        for order in IndexOrder::ALL {
            let index = hexastore.index(order);
            assert_eq!(index.len(), triples.len() as u64, "{order}");
            for triple in &triples {
                assert!(index.contains(triple), "{order} {triple}");
            }
        }
        for triple in &triples {
            let found = hexastore
                .get_statements(
                    triple.subject,
                    triple.predicate,
                    triple.object,
                    TriplePosition::Subject,
                )
                .collect_vec();
            assert_eq!(found, vec![*triple]);
        }

        for triple in &triples {
            assert!(hexastore.remove_triple(triple));
            for order in IndexOrder::ALL {
                assert!(!hexastore.index(order).contains(triple), "{order} {triple}");
            }
        }
        assert!(hexastore.is_empty());
    }
}

#[test]
fn test_iterators_are_sorted_where_they_claim_to_be() {
    let mut hexastore = create_hexastore(IndexConfiguration::default());
    hexastore.add_triple_batch(example_triples()).unwrap();
    let x = NodeId::variable(1);

    let patterns = [
        [wildcard(), wildcard(), wildcard()],
        [n(1), wildcard(), wildcard()],
        [wildcard(), n(11), wildcard()],
        [wildcard(), wildcard(), n(21)],
        [n(2), n(11), wildcard()],
        [wildcard(), n(12), n(22)],
        [x, wildcard(), x],
    ];
    for pattern in patterns {
        for tiebreak in TriplePosition::ALL {
            let masks = PositionMask::from_pattern(pattern);
            let mut iterator = hexastore.get_statements_masked(&masks, tiebreak);
            let sorted = TriplePosition::ALL
                .into_iter()
                .filter(|position| iterator.is_sorted_by_position(*position))
                .collect_vec();
            assert!(!sorted.is_empty());

            let triples = iterator.by_ref().collect_vec();
            for position in sorted {
                assert!(
                    triples
                        .iter()
                        .tuple_windows()
                        .all(|(a, b)| a.get(position) <= b.get(position)),
                    "{pattern:?} is not sorted by {position}"
                );
            }
        }
    }
}

#[test]
fn test_pattern_results_match_a_scan() {
    let mut hexastore = create_hexastore(IndexConfiguration::default().with_btree_terminals());
    let triples = example_triples();
    hexastore.add_triple_batch(triples.clone()).unwrap();

    for s in [wildcard(), n(1), n(3)] {
        for p in [wildcard(), n(11), n(13)] {
            for o in [wildcard(), n(21), n(24)] {
                let matches = |triple: &&Triple| {
                    [(s, triple.subject), (p, triple.predicate), (o, triple.object)]
                        .iter()
                        .all(|(pattern, node)| pattern.is_wildcard() || pattern == node)
                };
                let expected = triples
                    .iter()
                    .filter(matches)
                    .copied()
                    .sorted()
                    .collect_vec();
                let found = hexastore
                    .get_statements(s, p, o, TriplePosition::Object)
                    .sorted()
                    .collect_vec();
                assert_eq!(found, expected, "({s}, {p}, {o})");
                assert_eq!(hexastore.count_statements(s, p, o), expected.len() as u64);
            }
        }
    }
}

#[test]
fn test_index_selection_ignores_the_data() {
    let masks = [
        PositionMask::Bound(n(1)),
        PositionMask::Bound(n(11)),
        PositionMask::Wildcard,
    ];
    let mut hexastore = create_hexastore(IndexConfiguration::default());
    let before = hexastore.get_statements_masked(&masks, TriplePosition::Object).order();

    hexastore.add_triple_batch(example_triples()).unwrap();
    let after_insert = hexastore.get_statements_masked(&masks, TriplePosition::Object).order();
    hexastore.remove_triple(&Triple::from_raw(1, 11, 21));
    let after_remove = hexastore.get_statements_masked(&masks, TriplePosition::Object).order();

    assert_eq!(before, IndexOrder::SPO);
    assert_eq!(after_insert, IndexOrder::SPO);
    assert_eq!(after_remove, IndexOrder::SPO);
}

#[test]
fn test_dropping_an_iterator_early() {
    let mut hexastore = create_hexastore(IndexConfiguration::default());
    hexastore.add_triple_batch(example_triples()).unwrap();

    let first = hexastore
        .get_statements(wildcard(), wildcard(), wildcard(), TriplePosition::Predicate)
        .take(2)
        .collect_vec();
    assert_eq!(first.len(), 2);

    // The iterator borrowed the hexastore immutably, so mutation is possible again.
    assert!(hexastore.remove_triple(&first[0]));
}

fn configurations() -> Vec<IndexConfiguration> {
    vec![
        IndexConfiguration::default(),
        IndexConfiguration::default().with_btree_terminals(),
        IndexConfiguration {
            head: LevelLayout::BTree { branching: 4 },
            vector: LevelLayout::BTree { branching: 4 },
            terminal: LevelLayout::SortedArray {
                initial_capacity: 1,
            },
        },
    ]
}

fn create_hexastore(config: IndexConfiguration) -> Hexastore {
    Hexastore::new(StorageManager::memory(), config).unwrap()
}

/// Subjects 1..=5, predicates 11..=13, objects 21..=26.
fn example_triples() -> Vec<Triple> {
    (1..=5)
        .cartesian_product(11..=13)
        .cartesian_product(21..=26)
        .filter(|((s, p), o)| (s + p + o) % 3 != 0)
        .map(|((s, p), o)| Triple::from_raw(s, p, o))
        .collect()
}

fn n(value: i64) -> NodeId {
    NodeId::new(value)
}

fn wildcard() -> NodeId {
    NodeId::WILDCARD
}
