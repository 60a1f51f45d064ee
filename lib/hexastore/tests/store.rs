#![cfg(test)]
#![allow(
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Tests"
)]

use assert_fs::prelude::*;
use assert_fs::TempDir;
use hexastore::engine::bgp::BgpOptions;
use hexastore::engine::QueryError;
use hexastore::error::StoreError;
use hexastore::model::{NamedNode, Node, RdfTriple, Subject, Term};
use hexastore::storage::{IndexConfiguration, StorageConfig};
use hexastore::store::{QuerySolutions, Store};
use std::error::Error;

const DATA: &str = r#"
<http://example.com/alice> <http://xmlns.com/foaf/0.1/knows> <http://example.com/bob> .
<http://example.com/alice> <http://xmlns.com/foaf/0.1/knows> <http://example.com/carol> .
<http://example.com/bob> <http://xmlns.com/foaf/0.1/knows> <http://example.com/carol> .
<http://example.com/dave> <http://xmlns.com/foaf/0.1/knows> <http://example.com/alice> .
<http://example.com/alice> <http://xmlns.com/foaf/0.1/name> "Alice" .
<http://example.com/bob> <http://xmlns.com/foaf/0.1/name> "Bob"@en .
<http://example.com/carol> <http://xmlns.com/foaf/0.1/name> "Carol" .
<http://example.com/carol> <http://xmlns.com/foaf/0.1/age> "42"^^<http://www.w3.org/2001/XMLSchema#integer> .
"#;
const NUMBER_OF_TRIPLES: u64 = 8;

const FOAF: &str = "PREFIX foaf: <http://xmlns.com/foaf/0.1/>";

#[test]
fn test_load_ntriples() -> Result<(), Box<dyn Error>> {
    let store = example_store()?;
    assert_eq!(store.len(), NUMBER_OF_TRIPLES);

    let alice = Term::from(ex("alice"));
    let knows = Term::from(foaf("knows"));
    assert!(store.contains(&RdfTriple::new(ex("alice"), foaf("knows"), ex("bob")))?);
    assert_eq!(store.count(None, Some(&knows), None)?, 4);
    assert_eq!(store.count(Some(&alice), None, None)?, 3);
    assert_eq!(store.count(Some(&alice), Some(&knows), Some(&alice))?, 0);
    assert_eq!(store.count(None, None, None)?, NUMBER_OF_TRIPLES);
    Ok(())
}

#[test]
fn test_count_unknown_term() -> Result<(), Box<dyn Error>> {
    let store = example_store()?;
    let unknown = Term::from(ex("nobody"));
    assert_eq!(store.count(Some(&unknown), None, None)?, 0);
    Ok(())
}

#[test]
fn test_load_blank_nodes() -> Result<(), Box<dyn Error>> {
    let mut store = Store::new()?;
    let loaded = store.load_ntriples(
        b"_:a <http://example.com/p> _:b .\n_:b <http://example.com/p> _:a .\n".as_slice(),
    )?;
    assert_eq!(loaded, 2);
    assert_eq!(store.node_map().len(), 3);
    Ok(())
}

#[test]
fn test_load_invalid_ntriples() -> Result<(), Box<dyn Error>> {
    let mut store = Store::new()?;
    let error = store
        .load_ntriples(b"<http://example.com/s> <http://example.com/p> .\n".as_slice())
        .unwrap_err();
    assert!(matches!(error, StoreError::Parse(_)), "{error}");
    Ok(())
}

#[test]
fn test_failed_load_leaves_no_orphan_nodes() -> Result<(), Box<dyn Error>> {
    let mut store = example_store()?;
    let nodes = store.node_map().len();

    let input = "<http://example.com/erin> <http://xmlns.com/foaf/0.1/knows> <http://example.com/alice> .\n\
                 <http://example.com/erin> <http://xmlns.com/foaf/0.1/knows> .\n";
    let error = store.load_ntriples(input.as_bytes()).unwrap_err();
    assert!(matches!(error, StoreError::Parse(_)), "{error}");

    assert_eq!(store.len(), NUMBER_OF_TRIPLES);
    assert_eq!(store.node_map().len(), nodes);
    assert_eq!(store.count(Some(&Term::from(ex("erin"))), None, None)?, 0);
    Ok(())
}

#[test]
fn test_insert_quoted_triple() -> Result<(), Box<dyn Error>> {
    let mut store = Store::new()?;
    let quoted = RdfTriple::new(ex("a"), ex("b"), ex("c"));
    let triple = RdfTriple::new(Subject::Triple(Box::new(quoted)), ex("p"), ex("o"));

    let error = store.insert(&triple).unwrap_err();
    assert!(matches!(error, StoreError::InvalidTerm(_)), "{error}");
    assert!(store.is_empty());
    Ok(())
}

#[test]
fn test_query_two_hops() -> Result<(), Box<dyn Error>> {
    let store = example_store()?;
    let solutions = store.query(&format!(
        "{FOAF} SELECT ?a ?c WHERE {{ ?a foaf:knows ?b . ?b foaf:knows ?c }}"
    ))?;

    insta::assert_snapshot!(render(solutions), @r"
    ?a ?c
    <http://example.com/alice> <http://example.com/carol>
    <http://example.com/dave> <http://example.com/bob>
    <http://example.com/dave> <http://example.com/carol>
    ");
    Ok(())
}

#[test]
fn test_query_literals() -> Result<(), Box<dyn Error>> {
    let store = example_store()?;

    let solutions = store.query(&format!(
        "{FOAF} SELECT ?who WHERE {{ ?who foaf:name \"Bob\"@en }}"
    ))?;
    insta::assert_snapshot!(render(solutions), @r"
    ?who
    <http://example.com/bob>
    ");

    let solutions = store.query(&format!(
        "{FOAF} SELECT ?name WHERE {{ ?who foaf:age 42 . ?who foaf:name ?name }}"
    ))?;
    insta::assert_snapshot!(render(solutions), @r#"
    ?name
    "Carol"
    "#);
    Ok(())
}

#[test]
fn test_query_blank_nodes_are_hidden() -> Result<(), Box<dyn Error>> {
    let store = example_store()?;
    let solutions = store.query(&format!(
        "{FOAF} SELECT * WHERE {{ _:someone foaf:knows ?friend . ?friend foaf:name ?name }}"
    ))?;

    insta::assert_snapshot!(render(solutions), @r#"
    ?friend ?name
    <http://example.com/alice> "Alice"
    <http://example.com/bob> "Bob"@en
    <http://example.com/carol> "Carol"
    <http://example.com/carol> "Carol"
    "#);
    Ok(())
}

#[test]
fn test_query_unknown_term() -> Result<(), Box<dyn Error>> {
    let store = example_store()?;
    let solutions = store.query(
        "SELECT ?x WHERE { ?x <http://xmlns.com/foaf/0.1/knows> <http://example.com/nobody> }",
    )?;

    assert_eq!(solutions.variables(), ["x"]);
    assert_eq!(solutions.count(), 0);
    Ok(())
}

#[test]
fn test_query_unsupported() -> Result<(), Box<dyn Error>> {
    let store = example_store()?;
    let error = store
        .query("CONSTRUCT { ?s ?p ?o } WHERE { ?s ?p ?o }")
        .err()
        .unwrap();
    assert!(matches!(error, StoreError::UnsupportedQuery(_)), "{error}");
    Ok(())
}

#[test]
fn test_query_cartesian_product() -> Result<(), Box<dyn Error>> {
    let store = example_store()?;
    let query = format!("{FOAF} SELECT * WHERE {{ ?a foaf:age ?age . ?b foaf:name \"Bob\"@en }}");

    let error = store.query(&query).err().unwrap();
    assert!(
        matches!(
            error,
            StoreError::Query(QueryError::CartesianProduct { components: 2 })
        ),
        "{error}"
    );

    let options = BgpOptions {
        allow_cartesian_product: true,
    };
    insta::assert_snapshot!(render(store.query_opt(&query, options)?), @r#"
    ?a ?age ?b
    <http://example.com/carol> "42"^^<http://www.w3.org/2001/XMLSchema#integer> <http://example.com/bob>
    "#);
    Ok(())
}

#[test]
fn test_save_and_open() -> Result<(), Box<dyn Error>> {
    let temp = TempDir::new()?;
    let snapshot = temp.child("people.hexastore");
    let mut store = example_store()?;
    store.remove(&RdfTriple::new(ex("dave"), foaf("knows"), ex("alice")))?;
    store.save(snapshot.path())?;
    snapshot.assert(predicates::path::is_file());

    let reopened = Store::open(snapshot.path())?;
    assert_eq!(reopened.len(), NUMBER_OF_TRIPLES - 1);
    assert_eq!(reopened.node_map().len(), store.node_map().len());
    let query = format!("{FOAF} SELECT ?a ?c WHERE {{ ?a foaf:knows ?b . ?b foaf:knows ?c }}");
    assert_eq!(
        render(reopened.query(&query)?),
        render(store.query(&query)?)
    );
    Ok(())
}

#[test]
fn test_open_into_mapped_file() -> Result<(), Box<dyn Error>> {
    let temp = TempDir::new()?;
    let snapshot = temp.child("people.hexastore");
    let mapped = temp.child("people.blocks");
    example_store()?.save(snapshot.path())?;

    let config = IndexConfiguration::default().with_btree_terminals();
    let mut store = Store::open_with_config(
        snapshot.path(),
        &StorageConfig::mapped_file(mapped.path()),
        config,
    )?;
    mapped.assert(predicates::path::is_file());
    assert_eq!(store.hexastore().config(), config);
    assert_eq!(store.len(), NUMBER_OF_TRIPLES);

    assert!(store.insert(&RdfTriple::new(ex("erin"), foaf("knows"), ex("dave")))?);
    let knows = Term::from(foaf("knows"));
    assert_eq!(store.count(None, Some(&knows), None)?, 5);
    Ok(())
}

#[test]
fn test_open_missing_file() -> Result<(), Box<dyn Error>> {
    let temp = TempDir::new()?;
    let error = Store::open(temp.child("missing.hexastore").path())
        .err()
        .unwrap();
    assert!(matches!(error, StoreError::Io(_)), "{error}");
    Ok(())
}

fn example_store() -> Result<Store, StoreError> {
    let mut store = Store::new()?;
    store.load_ntriples(DATA.as_bytes())?;
    Ok(store)
}

/// Renders a header with the variables and one sorted line per solution.
fn render(solutions: QuerySolutions<'_>) -> String {
    let header = solutions
        .variables()
        .iter()
        .map(|variable| format!("?{variable}"))
        .collect::<Vec<_>>()
        .join(" ");
    let mut lines = solutions
        .map(|solution| {
            solution
                .values()
                .iter()
                .map(|value| value.as_ref().map_or("UNDEF".to_owned(), Node::to_string))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>();
    lines.sort();
    lines.insert(0, header);
    lines.join("\n")
}

fn ex(name: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("http://example.com/{name}"))
}

fn foaf(name: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("http://xmlns.com/foaf/0.1/{name}"))
}
