#![allow(clippy::print_stderr, reason = "Reports progress of the command line tool")]
use crate::cli::{Args, Command, StoreArgs};
use anyhow::Context;
use clap::Parser;
use hexastore::engine::bgp::BgpOptions;
use hexastore::storage::{IndexConfiguration, IndexOrder, StorageConfig};
use hexastore::store::Store;
use std::fs::{self, File};
use std::io::{stdin, stdout, BufReader, BufWriter, Write};
use tracing::Level;

mod cli;

pub fn main() -> anyhow::Result<()> {
    let matches = Args::parse();
    init_logging(matches.verbose);
    match matches.command {
        Command::Load { store, file } => {
            let mut target = if store.store.exists() {
                open_store(&store)?
            } else {
                Store::with_config(&StorageConfig::Memory, index_configuration(&store))?
            };
            let loaded = match &file {
                Some(file) => {
                    let reader = File::open(file)
                        .with_context(|| format!("Failed to open {}", file.display()))?;
                    target.load_ntriples(BufReader::new(reader))
                }
                None => target.load_ntriples(stdin().lock()),
            }
            .context("Failed to load the N-Triples input")?;
            target
                .save(&store.store)
                .with_context(|| format!("Failed to write {}", store.store.display()))?;
            eprintln!("{loaded} new triples loaded, {} in total", target.len());
            Ok(())
        }
        Command::Count {
            store,
            subject,
            predicate,
            object,
        } => {
            let store = open_store(&store)?;
            let count = store.count(subject.as_ref(), predicate.as_ref(), object.as_ref())?;
            writeln!(stdout().lock(), "{count}")?;
            Ok(())
        }
        Command::Query {
            store,
            query,
            query_file,
            allow_cartesian,
        } => {
            let query = match (query, query_file) {
                (Some(query), _) => query,
                (None, Some(file)) => fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read the query from {}", file.display()))?,
                (None, None) => anyhow::bail!("Either --query or --query-file must be set"),
            };
            let store = open_store(&store)?;
            let options = BgpOptions {
                allow_cartesian_product: allow_cartesian,
            };
            let solutions = store
                .query_opt(&query, options)
                .context("Failed to evaluate the query")?;

            let mut writer = BufWriter::new(stdout().lock());
            let header = solutions
                .variables()
                .iter()
                .map(|variable| format!("?{variable}"))
                .collect::<Vec<_>>();
            writeln!(writer, "{}", header.join("\t"))?;
            for solution in solutions {
                let row = solution
                    .values()
                    .iter()
                    .map(|value| value.as_ref().map_or_else(String::new, ToString::to_string))
                    .collect::<Vec<_>>();
                writeln!(writer, "{}", row.join("\t"))?;
            }
            writer.flush()?;
            Ok(())
        }
        Command::Stats { store } => {
            let store = open_store(&store)?;
            let hexastore = store.hexastore();
            let mut writer = stdout().lock();
            writeln!(writer, "triples\t{}", store.len())?;
            writeln!(writer, "nodes\t{}", store.node_map().len())?;
            for order in IndexOrder::ALL {
                let index = hexastore.index(order);
                writeln!(
                    writer,
                    "{order}\t{} bytes\t{} heads",
                    index.memory_size(),
                    index.head_len()
                )?;
            }
            writeln!(writer, "total\t{} bytes", hexastore.memory_size())?;
            Ok(())
        }
    }
}

fn open_store(args: &StoreArgs) -> anyhow::Result<Store> {
    Store::open_with_config(
        &args.store,
        &StorageConfig::Memory,
        index_configuration(args),
    )
    .with_context(|| format!("Failed to open the snapshot {}", args.store.display()))
}

fn index_configuration(args: &StoreArgs) -> IndexConfiguration {
    let config = IndexConfiguration::default();
    if args.btree_terminals {
        config.with_btree_terminals()
    } else {
        config
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clap_debug() {
        use clap::CommandFactory;

        Args::command().debug_assert()
    }

    #[test]
    fn btree_terminals_flag() {
        let args = Args::parse_from([
            "hexastore",
            "stats",
            "--store",
            "people.hexastore",
            "--btree-terminals",
        ]);
        let Command::Stats { store } = args.command else {
            panic!("Expected the stats command");
        };
        assert_eq!(
            index_configuration(&store),
            IndexConfiguration::default().with_btree_terminals()
        );
    }
}
