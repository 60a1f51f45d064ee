#![cfg(test)]

use anyhow::Result;
use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

const DATA: &str = "\
<http://example.com/alice> <http://xmlns.com/foaf/0.1/knows> <http://example.com/bob> .
<http://example.com/bob> <http://xmlns.com/foaf/0.1/knows> <http://example.com/carol> .
<http://example.com/alice> <http://xmlns.com/foaf/0.1/name> \"Alice\" .
<http://example.com/bob> <http://xmlns.com/foaf/0.1/name> \"Bob\"@en .
";

fn cli_command() -> Command {
    Command::new(env!("CARGO_BIN_EXE_hexastore"))
}

fn initialized_cli_store(data: &'static str) -> Result<TempDir> {
    let temp = TempDir::new()?;
    cli_command()
        .arg("load")
        .arg("--store")
        .arg(temp.child("store.hexastore").path())
        .write_stdin(data)
        .assert()
        .success()
        .stderr(predicate::str::contains("4 new triples loaded, 4 in total"));
    Ok(temp)
}

#[test]
fn cli_help() {
    cli_command()
        .assert()
        .failure()
        .stdout("")
        .stderr(predicate::str::contains("Usage: hexastore"));
}

#[test]
fn cli_load_file_twice() -> Result<()> {
    let temp = TempDir::new()?;
    let input = temp.child("people.nt");
    input.write_str(DATA)?;
    let store = temp.child("store.hexastore");

    for expected in [
        "4 new triples loaded, 4 in total",
        "0 new triples loaded, 4 in total",
    ] {
        cli_command()
            .arg("load")
            .arg("--store")
            .arg(store.path())
            .arg("--file")
            .arg(input.path())
            .assert()
            .success()
            .stderr(predicate::str::contains(expected));
    }
    store.assert(predicate::path::is_file());
    Ok(())
}

#[test]
fn cli_load_invalid_ntriples() -> Result<()> {
    let temp = TempDir::new()?;
    let store = temp.child("store.hexastore");
    cli_command()
        .arg("load")
        .arg("--store")
        .arg(store.path())
        .write_stdin("<http://example.com/s> <http://example.com/p> .\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load the N-Triples input"));
    store.assert(predicate::path::missing());
    Ok(())
}

#[test]
fn cli_count() -> Result<()> {
    let temp = initialized_cli_store(DATA)?;
    cli_command()
        .arg("count")
        .arg("--store")
        .arg(temp.child("store.hexastore").path())
        .arg("--predicate")
        .arg("<http://xmlns.com/foaf/0.1/knows>")
        .assert()
        .success()
        .stdout("2\n");
    cli_command()
        .arg("count")
        .arg("--store")
        .arg(temp.child("store.hexastore").path())
        .arg("--object")
        .arg("\"Bob\"@en")
        .assert()
        .success()
        .stdout("1\n");
    Ok(())
}

#[test]
fn cli_count_invalid_term() -> Result<()> {
    let temp = initialized_cli_store(DATA)?;
    cli_command()
        .arg("count")
        .arg("--store")
        .arg(temp.child("store.hexastore").path())
        .arg("--subject")
        .arg("alice")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--subject"));
    Ok(())
}

#[test]
fn cli_query() -> Result<()> {
    let temp = initialized_cli_store(DATA)?;
    cli_command()
        .arg("query")
        .arg("--store")
        .arg(temp.child("store.hexastore").path())
        .arg("--query")
        .arg(
            "SELECT ?who ?name WHERE { \
             <http://example.com/alice> <http://xmlns.com/foaf/0.1/knows> ?who . \
             ?who <http://xmlns.com/foaf/0.1/name> ?name }",
        )
        .assert()
        .success()
        .stdout("?who\t?name\n<http://example.com/bob>\t\"Bob\"@en\n");
    Ok(())
}

#[test]
fn cli_query_from_file() -> Result<()> {
    let temp = initialized_cli_store(DATA)?;
    let query = temp.child("query.rq");
    query.write_str("SELECT ?s WHERE { ?s <http://xmlns.com/foaf/0.1/name> \"Alice\" }")?;
    cli_command()
        .arg("query")
        .arg("--store")
        .arg(temp.child("store.hexastore").path())
        .arg("--query-file")
        .arg(query.path())
        .assert()
        .success()
        .stdout("?s\n<http://example.com/alice>\n");
    Ok(())
}

#[test]
fn cli_query_cartesian_product() -> Result<()> {
    let temp = initialized_cli_store(DATA)?;
    let query = "SELECT ?a ?b WHERE { \
                 ?a <http://xmlns.com/foaf/0.1/name> \"Alice\" . \
                 ?b <http://xmlns.com/foaf/0.1/name> \"Bob\"@en }";
    cli_command()
        .arg("query")
        .arg("--store")
        .arg(temp.child("store.hexastore").path())
        .arg("--query")
        .arg(query)
        .assert()
        .failure()
        .stderr(predicate::str::contains("share no variables"));
    cli_command()
        .arg("query")
        .arg("--store")
        .arg(temp.child("store.hexastore").path())
        .arg("--query")
        .arg(query)
        .arg("--allow-cartesian")
        .assert()
        .success()
        .stdout("?a\t?b\n<http://example.com/alice>\t<http://example.com/bob>\n");
    Ok(())
}

#[test]
fn cli_query_missing_store() -> Result<()> {
    let temp = TempDir::new()?;
    cli_command()
        .arg("query")
        .arg("--store")
        .arg(temp.child("missing.hexastore").path())
        .arg("--query")
        .arg("SELECT * WHERE { ?s ?p ?o }")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open the snapshot"));
    Ok(())
}

#[test]
fn cli_stats() -> Result<()> {
    let temp = initialized_cli_store(DATA)?;
    cli_command()
        .arg("stats")
        .arg("--store")
        .arg(temp.child("store.hexastore").path())
        .arg("--btree-terminals")
        .assert()
        .success()
        .stdout(
            predicate::str::starts_with("triples\t4\nnodes\t7\n")
                .and(predicate::str::contains("\nSPO\t"))
                .and(predicate::str::contains("\nOPS\t"))
                .and(predicate::str::contains("\ntotal\t")),
        );
    Ok(())
}
