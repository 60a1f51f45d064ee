//! An RDF triple store on top of a [Hexastore].
//!
//! The entry point of the module is the [`Store`] struct. It interns RDF terms into node ids with
//! a [NodeMap] and forwards triples and patterns to the hexastore.
//!
//! Usage example:
//! ```
//! use hexastore::model::{NamedNode, RdfTriple, Term};
//! use hexastore::store::Store;
//!
//! let mut store = Store::new()?;
//!
//! // insertion
//! let ex = NamedNode::new("http://example.com")?;
//! let triple = RdfTriple::new(ex.clone(), ex.clone(), ex.clone());
//! assert!(store.insert(&triple)?);
//!
//! // pattern count
//! let subject = Term::from(ex.clone());
//! assert_eq!(store.count(Some(&subject), None, None)?, 1);
//!
//! // SPARQL query
//! let mut solutions = store.query("SELECT ?s WHERE { ?s ?p ?o }")?;
//! assert_eq!(solutions.next().unwrap().get("s"), Some(&ex.into()));
//! # Result::<_, Box<dyn std::error::Error>>::Ok(())
//! ```

use crate::error::StoreError;
use crate::sparql::prepare_query;
use hexastore_engine::bgp::{execute_bgp, BgpOptions};
use hexastore_engine::bindings::{BindingsIterator, BoxedBindingsIterator};
use hexastore_model::{Node, NodeId, NodeMap, Term, Triple};
use hexastore_storage::{
    read_hexastore, write_hexastore, Hexastore, IndexConfiguration, StorageConfig,
    StorageManager,
};
use oxrdf::Triple as RdfTriple;
use oxttl::NTriplesParser;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;
use std::sync::Arc;

/// The number of parsed triples that are inserted at once while loading.
const LOAD_BATCH_SIZE: usize = 8192;

/// An RDF triple store.
///
/// Every triple is kept in the six indexes of a [Hexastore]. The store can be queried with
/// SPARQL `SELECT` queries over a single basic graph pattern and persisted as a snapshot file.
#[derive(Debug)]
pub struct Store {
    hexastore: Hexastore,
    node_map: NodeMap,
}

impl Store {
    /// Creates an empty in-memory [Store] with the default index layout.
    pub fn new() -> Result<Self, StoreError> {
        Self::with_config(&StorageConfig::Memory, IndexConfiguration::default())
    }

    /// Creates an empty [Store] that places its indexes as described by `storage` and `config`.
    ///
    /// A [StorageConfig::MappedFile] is created from scratch. Use [Store::save] to keep the
    /// node map alongside the triples.
    pub fn with_config(
        storage: &StorageConfig,
        config: IndexConfiguration,
    ) -> Result<Self, StoreError> {
        let storage = StorageManager::from_config(storage)?;
        Ok(Self {
            hexastore: Hexastore::new(storage, config)?,
            node_map: NodeMap::new(),
        })
    }

    /// Restores an in-memory [Store] from a snapshot written by [Store::save].
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_config(path, &StorageConfig::Memory, IndexConfiguration::default())
    }

    /// Restores a [Store] from a snapshot into new storage described by `storage` and `config`.
    pub fn open_with_config(
        path: impl AsRef<Path>,
        storage: &StorageConfig,
        config: IndexConfiguration,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let storage = StorageManager::from_config(storage)?;
        let (hexastore, node_map) = read_hexastore(storage, config, reader)?;
        tracing::info!(path = %path.display(), triples = hexastore.len(), "Opened store");
        Ok(Self {
            hexastore,
            node_map: node_map.unwrap_or_default(),
        })
    }

    /// Writes a snapshot of the triples and the node map to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let writer = BufWriter::new(File::create(path)?);
        write_hexastore(&self.hexastore, Some(&self.node_map), writer)?;
        Ok(())
    }

    /// Loads an [N-Triples](https://www.w3.org/TR/n-triples/) document. Returns the number of
    /// triples that were not part of the store before.
    ///
    /// Loading stops at the first syntax error. Triples parsed before the error may already have
    /// been inserted.
    ///
    /// Usage example:
    /// ```
    /// use hexastore::store::Store;
    ///
    /// let mut store = Store::new()?;
    /// let file = b"<http://example.com/s> <http://example.com/p> \"o\" .\n";
    /// assert_eq!(store.load_ntriples(file.as_slice())?, 1);
    /// assert_eq!(store.load_ntriples(file.as_slice())?, 0);
    /// # Result::<_, Box<dyn std::error::Error>>::Ok(())
    /// ```
    pub fn load_ntriples(&mut self, reader: impl Read) -> Result<u64, StoreError> {
        let mut loaded = 0;
        let mut batch = Vec::with_capacity(LOAD_BATCH_SIZE);
        let mut batch_start = self.node_map.next_id();
        for triple in NTriplesParser::new().for_reader(reader) {
            let triple = match triple
                .map_err(StoreError::from)
                .and_then(|triple| self.intern_triple(triple))
            {
                Ok(triple) => triple,
                Err(error) => {
                    self.forget_unused_nodes(batch_start);
                    return Err(error);
                }
            };
            batch.push(triple);
            if batch.len() == LOAD_BATCH_SIZE {
                loaded += self.add_batch(batch.drain(..), batch_start)?;
                batch_start = self.node_map.next_id();
            }
        }
        loaded += self.add_batch(batch, batch_start)?;

        tracing::info!(
            loaded,
            triples = self.hexastore.len(),
            nodes = self.node_map.len(),
            "Loaded N-Triples"
        );
        Ok(loaded)
    }

    /// Adds a triple. Returns `false` if it was already present.
    pub fn insert(&mut self, triple: &RdfTriple) -> Result<bool, StoreError> {
        let first_new = self.node_map.next_id();
        let triple = self.intern_triple(triple.clone())?;
        match self.hexastore.add_triple(triple) {
            Ok(added) => Ok(added),
            Err(error) => {
                self.forget_unused_nodes(first_new);
                Err(error.into())
            }
        }
    }

    /// Removes a triple. Returns `false` if it was not present.
    pub fn remove(&mut self, triple: &RdfTriple) -> Result<bool, StoreError> {
        Ok(match self.lookup_triple(triple)? {
            Some(triple) => self.hexastore.remove_triple(&triple),
            None => false,
        })
    }

    pub fn contains(&self, triple: &RdfTriple) -> Result<bool, StoreError> {
        Ok(self
            .lookup_triple(triple)?
            .is_some_and(|triple| self.hexastore.contains(&triple)))
    }

    /// The number of triples.
    pub fn len(&self) -> u64 {
        self.hexastore.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hexastore.is_empty()
    }

    /// Counts the triples that match a pattern. [None] matches any term.
    pub fn count(
        &self,
        subject: Option<&Term>,
        predicate: Option<&Term>,
        object: Option<&Term>,
    ) -> Result<u64, StoreError> {
        let mut pattern = [NodeId::WILDCARD; 3];
        for (slot, term) in pattern.iter_mut().zip([subject, predicate, object]) {
            let Some(term) = term else {
                continue;
            };
            match self.node_map.get_id(&Node::try_from(term.clone())?) {
                Some(id) => *slot = id,
                None => return Ok(0),
            }
        }
        let [subject, predicate, object] = pattern;
        Ok(self.hexastore.count_statements(subject, predicate, object))
    }

    /// Evaluates a SPARQL `SELECT` query. See [Store::query_opt].
    pub fn query(&self, query: &str) -> Result<QuerySolutions<'_>, StoreError> {
        self.query_opt(query, BgpOptions::default())
    }

    /// Evaluates a SPARQL `SELECT` query whose `WHERE` clause is a single basic graph pattern.
    ///
    /// Blank nodes in the query act as variables that are not part of the solutions. Patterns
    /// that share no variables are only evaluated if `options` allow cartesian products.
    ///
    /// Usage example:
    /// ```
    /// use hexastore::engine::bgp::BgpOptions;
    /// use hexastore::store::Store;
    ///
    /// let mut store = Store::new()?;
    /// store.load_ntriples(
    ///     b"<http://example.com/a> <http://example.com/p> <http://example.com/b> .\n".as_slice(),
    /// )?;
    ///
    /// let query = "SELECT * WHERE { ?a <http://example.com/p> ?b . ?c <http://example.com/p> ?d }";
    /// assert!(store.query(query).is_err());
    ///
    /// let options = BgpOptions {
    ///     allow_cartesian_product: true,
    /// };
    /// assert_eq!(store.query_opt(query, options)?.count(), 1);
    /// # Result::<_, Box<dyn std::error::Error>>::Ok(())
    /// ```
    pub fn query_opt(
        &self,
        query: &str,
        options: BgpOptions,
    ) -> Result<QuerySolutions<'_>, StoreError> {
        let query = prepare_query(query, &self.node_map)?;
        let bindings = if query.has_unknown_terms {
            None
        } else {
            Some(execute_bgp(&self.hexastore, &query.bgp, options)?)
        };
        Ok(QuerySolutions::new(
            query.variables.into(),
            bindings,
            &self.node_map,
        ))
    }

    pub fn hexastore(&self) -> &Hexastore {
        &self.hexastore
    }

    pub fn node_map(&self) -> &NodeMap {
        &self.node_map
    }

    fn intern_triple(&mut self, triple: RdfTriple) -> Result<Triple, StoreError> {
        let subject = Node::try_from(triple.subject)?;
        let object = Node::try_from(triple.object)?;
        Ok(Triple::new(
            self.node_map.intern(subject),
            self.node_map.intern(triple.predicate.into()),
            self.node_map.intern(object),
        ))
    }

    fn add_batch(
        &mut self,
        batch: impl IntoIterator<Item = Triple>,
        first_new: i64,
    ) -> Result<u64, StoreError> {
        match self.hexastore.add_triple_batch(batch) {
            Ok(inserted) => Ok(inserted),
            Err(error) => {
                self.forget_unused_nodes(first_new);
                Err(error.into())
            }
        }
    }

    /// Removes the nodes interned since `first_new` that no stored triple refers to.
    fn forget_unused_nodes(&mut self, first_new: i64) {
        let unused = self
            .node_map
            .iter()
            .map(|(id, _)| id)
            .filter(|id| id.as_i64() >= first_new && !self.is_referenced(*id))
            .collect::<Vec<_>>();
        if unused.is_empty() {
            return;
        }
        for id in &unused {
            self.node_map.remove(*id);
        }
        tracing::debug!(nodes = unused.len(), "Forgot nodes of failed insertions");
    }

    fn is_referenced(&self, id: NodeId) -> bool {
        let any = NodeId::WILDCARD;
        [[id, any, any], [any, id, any], [any, any, id]]
            .into_iter()
            .any(|[subject, predicate, object]| {
                self.hexastore.count_statements(subject, predicate, object) > 0
            })
    }

    /// Returns [None] if a term of `triple` is not part of the store.
    fn lookup_triple(&self, triple: &RdfTriple) -> Result<Option<Triple>, StoreError> {
        let subject = Node::try_from(triple.subject.clone())?;
        let predicate = Node::from(triple.predicate.clone());
        let object = Node::try_from(triple.object.clone())?;
        let id = |node: &Node| self.node_map.get_id(node);
        let (Some(subject), Some(predicate), Some(object)) =
            (id(&subject), id(&predicate), id(&object))
        else {
            return Ok(None);
        };
        Ok(Some(Triple::new(subject, predicate, object)))
    }
}

/// The solutions of a query, in the order they are produced by the joins.
pub struct QuerySolutions<'a> {
    variables: Arc<[String]>,
    /// The column of each variable in the rows of `bindings`. [None] for variables that do not
    /// occur in the pattern.
    columns: Vec<Option<usize>>,
    bindings: Option<BoxedBindingsIterator<'a>>,
    node_map: &'a NodeMap,
}

impl<'a> QuerySolutions<'a> {
    fn new(
        variables: Arc<[String]>,
        bindings: Option<BoxedBindingsIterator<'a>>,
        node_map: &'a NodeMap,
    ) -> Self {
        let columns = variables
            .iter()
            .map(|variable| {
                let bindings = bindings.as_ref()?;
                bindings
                    .columns()
                    .iter()
                    .position(|column| column == variable)
            })
            .collect();
        Self {
            variables,
            columns,
            bindings,
            node_map,
        }
    }

    /// The projected variables, in order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }
}

impl Iterator for QuerySolutions<'_> {
    type Item = QuerySolution;

    fn next(&mut self) -> Option<QuerySolution> {
        let bindings = self.bindings.as_mut()?;
        let row = bindings.current_row()?;
        let values = self
            .columns
            .iter()
            .map(|column| column.and_then(|index| self.node_map.get_node(row[index]).cloned()))
            .collect();
        bindings.advance();
        Some(QuerySolution {
            variables: Arc::clone(&self.variables),
            values,
        })
    }
}

/// A single solution of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySolution {
    variables: Arc<[String]>,
    values: Vec<Option<Node>>,
}

impl QuerySolution {
    /// Returns the node bound to `variable`.
    pub fn get(&self, variable: &str) -> Option<&Node> {
        let index = self.variables.iter().position(|name| name == variable)?;
        self.values[index].as_ref()
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// The bound nodes, in the order of [QuerySolution::variables].
    pub fn values(&self) -> &[Option<Node>] {
        &self.values
    }
}
