//! Basic graph patterns: conjunctions of triple patterns joined on shared variables.
//!
//! A [Bgp] is planned with [plan_bgp] and evaluated with [execute_bgp]. Planning orders the
//! patterns by their number of matches (read from the cached counts of the hexastore) while
//! keeping every pattern connected to the ones before it. Evaluation chains [MergeJoinIterator]s
//! along that order.
//!
//! [MergeJoinIterator]: crate::bindings::MergeJoinIterator

mod executor;
mod planner;

pub use executor::{execute_bgp, execute_plan, BgpOptions};
pub use planner::{plan_bgp, BgpPlan, PlanOutcome, PlanStep};

use crate::QueryError;
use hexastore_model::{NodeId, Triple, TriplePosition};
use itertools::Itertools;
use rustc_hash::FxHashMap;

/// A set of triple patterns over named variables.
///
/// Variables are negative [NodeId]s. Each variable that occurs in a pattern must have a name,
/// which becomes its column name in the results. [NodeId::WILDCARD] can be used for positions
/// that match anything without being part of the results.
#[derive(Debug, Clone, Default)]
pub struct Bgp {
    patterns: Vec<Triple>,
    names: FxHashMap<NodeId, String>,
}

impl Bgp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the variable called `name`, creating it if it does not exist yet.
    pub fn variable(&mut self, name: &str) -> NodeId {
        if let Some(id) = self.variable_id(name) {
            return id;
        }

        let smallest = self
            .names
            .keys()
            .map(|id| id.as_i64())
            .min()
            .unwrap_or(0);
        let id = NodeId::new(smallest.min(0) - 1);
        self.names.insert(id, name.to_owned());
        id
    }

    /// Names a variable that was created elsewhere (e.g., by
    /// [Hexastore::new_variable](hexastore_storage::Hexastore::new_variable)).
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a variable or if `name` already names another variable.
    pub fn add_variable(&mut self, id: NodeId, name: impl Into<String>) {
        let name = name.into();
        assert!(id.is_variable(), "{id} is not a variable.");
        assert!(
            self.variable_id(&name).map_or(true, |existing| existing == id),
            "The variable name {name} is already in use."
        );
        self.names.insert(id, name);
    }

    /// Adds a pattern. Every variable in `pattern` must be named.
    pub fn add_pattern(&mut self, pattern: Triple) -> Result<(), QueryError> {
        if let Some(unnamed) = pattern
            .to_array()
            .into_iter()
            .find(|node| node.is_variable() && !self.names.contains_key(node))
        {
            return Err(QueryError::UnknownVariable(unnamed.to_string()));
        }
        self.patterns.push(pattern);
        Ok(())
    }

    pub fn patterns(&self) -> &[Triple] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn variable_name(&self, id: NodeId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn variable_id(&self, name: &str) -> Option<NodeId> {
        self.names
            .iter()
            .find(|(_, candidate)| *candidate == name)
            .map(|(id, _)| *id)
    }

    /// The names of the variables used in the patterns, in order of their first occurrence.
    pub fn variables(&self) -> Vec<String> {
        self.patterns
            .iter()
            .copied()
            .flat_map(Triple::to_array)
            .filter_map(|node| self.variable_name(node))
            .unique()
            .map(str::to_owned)
            .collect()
    }

    /// The column name of each position of `pattern`.
    fn column_names(&self, pattern: &Triple) -> [Option<String>; 3] {
        TriplePosition::ALL
            .map(|position| self.variable_name(pattern.get(position)).map(str::to_owned))
    }
}
