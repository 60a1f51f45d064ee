use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand, ValueHint};
use hexastore::model::Term;
use std::path::PathBuf;

#[derive(Parser)]
#[command(about, version, name = "hexastore")]
/// Hexastore command line toolkit to load, count, and query RDF triples
pub struct Args {
    /// Print more log messages (repeat for more detail)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load an N-Triples file into a snapshot
    ///
    /// If the snapshot already exists, the triples are added to it.
    Load {
        #[command(flatten)]
        store: StoreArgs,
        /// File to load
        ///
        /// If no file is given, stdin is read.
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
    },
    /// Count the triples matching a pattern
    Count {
        #[command(flatten)]
        store: StoreArgs,
        /// The subject of the pattern in N-Triples syntax (e.g., `<http://example.com/s>`)
        ///
        /// By default any subject matches.
        #[arg(short, long)]
        subject: Option<Term>,
        /// The predicate of the pattern in N-Triples syntax
        #[arg(short, long)]
        predicate: Option<Term>,
        /// The object of the pattern in N-Triples syntax (e.g., `"42"^^<http://www.w3.org/2001/XMLSchema#integer>`)
        #[arg(short, long)]
        object: Option<Term>,
    },
    /// Evaluate a SPARQL SELECT query over a single basic graph pattern
    ///
    /// The solutions are written to stdout as tab-separated values with a header row.
    Query {
        #[command(flatten)]
        store: StoreArgs,
        /// The SPARQL query
        #[arg(short, long, required_unless_present = "query_file")]
        query: Option<String>,
        /// File to read the SPARQL query from
        #[arg(long, conflicts_with = "query", value_hint = ValueHint::FilePath)]
        query_file: Option<PathBuf>,
        /// Evaluate patterns that share no variables as a cartesian product
        #[arg(long)]
        allow_cartesian: bool,
    },
    /// Print the number of triples and nodes and the memory held by every index
    Stats {
        #[command(flatten)]
        store: StoreArgs,
    },
}

#[derive(ClapArgs)]
pub struct StoreArgs {
    /// The snapshot file
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub store: PathBuf,
    /// Store the third level of every index in B-trees instead of sorted arrays
    ///
    /// Useful if many triples share a subject and predicate (or any other pair of positions).
    #[arg(long)]
    pub btree_terminals: bool,
}
