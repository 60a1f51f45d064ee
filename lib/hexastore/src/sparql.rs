//! Translates SPARQL `SELECT` queries over a single basic graph pattern into a [Bgp].

use crate::error::StoreError;
use hexastore_engine::bgp::Bgp;
use hexastore_model::{Node, NodeId, NodeMap, Triple};
use spargebra::algebra::GraphPattern;
use spargebra::term::{NamedNodePattern, TermPattern, TriplePattern};
use spargebra::Query;

/// A query ready for evaluation.
#[derive(Debug)]
pub(crate) struct PreparedQuery {
    pub bgp: Bgp,
    /// The variables of the solutions, in order.
    pub variables: Vec<String>,
    /// Set if the query mentions a term that is not part of the store, so it has no solutions.
    pub has_unknown_terms: bool,
}

/// Parses `query` and resolves its terms with `node_map`.
pub(crate) fn prepare_query(query: &str, node_map: &NodeMap) -> Result<PreparedQuery, StoreError> {
    let query = Query::parse(query, None)?;
    let Query::Select {
        dataset, pattern, ..
    } = query
    else {
        return Err(unsupported("Only SELECT queries are supported."));
    };
    if dataset.is_some() {
        return Err(unsupported("FROM and FROM NAMED are not supported."));
    }

    let (inner, projection) = match pattern {
        GraphPattern::Project { inner, variables } => (*inner, Some(variables)),
        other => (other, None),
    };
    let GraphPattern::Bgp { patterns } = inner else {
        return Err(unsupported(format!(
            "Only a single basic graph pattern is supported, found: {inner}"
        )));
    };

    let mut translator = Translator {
        bgp: Bgp::new(),
        node_map,
        has_unknown_terms: false,
    };
    for pattern in &patterns {
        translator.add_pattern(pattern)?;
    }

    let variables = match projection {
        Some(variables) => variables
            .iter()
            .map(|variable| variable.as_str().to_owned())
            .collect(),
        None => translator
            .bgp
            .variables()
            .into_iter()
            .filter(|name| !name.starts_with(BLANK_NODE_PREFIX))
            .collect(),
    };
    Ok(PreparedQuery {
        bgp: translator.bgp,
        variables,
        has_unknown_terms: translator.has_unknown_terms,
    })
}

/// Blank nodes in a query act as variables that are not part of the solutions. Their names
/// cannot clash with variable names, as these never contain a colon.
const BLANK_NODE_PREFIX: &str = "_:";

struct Translator<'a> {
    bgp: Bgp,
    node_map: &'a NodeMap,
    has_unknown_terms: bool,
}

impl Translator<'_> {
    fn add_pattern(&mut self, pattern: &TriplePattern) -> Result<(), StoreError> {
        let subject = self.term_pattern(&pattern.subject)?;
        let predicate = match &pattern.predicate {
            NamedNodePattern::NamedNode(node) => self.node(Node::from(node.clone())),
            NamedNodePattern::Variable(variable) => self.bgp.variable(variable.as_str()),
        };
        let object = self.term_pattern(&pattern.object)?;
        self.bgp
            .add_pattern(Triple::new(subject, predicate, object))?;
        Ok(())
    }

    fn term_pattern(&mut self, pattern: &TermPattern) -> Result<NodeId, StoreError> {
        Ok(match pattern {
            TermPattern::NamedNode(node) => self.node(Node::from(node.clone())),
            TermPattern::Literal(literal) => self.node(Node::from(literal.clone())),
            TermPattern::BlankNode(node) => self
                .bgp
                .variable(&format!("{BLANK_NODE_PREFIX}{}", node.as_str())),
            TermPattern::Variable(variable) => self.bgp.variable(variable.as_str()),
            TermPattern::Triple(_) => {
                return Err(unsupported("Quoted triple patterns are not supported."))
            }
        })
    }

    /// Terms that are not part of the store cannot match, but the query is still valid.
    fn node(&mut self, node: Node) -> NodeId {
        self.node_map.get_id(&node).unwrap_or_else(|| {
            tracing::debug!(%node, "Query mentions an unknown term");
            self.has_unknown_terms = true;
            NodeId::WILDCARD
        })
    }
}

fn unsupported(message: impl Into<String>) -> StoreError {
    StoreError::UnsupportedQuery(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_star_projects_named_variables() {
        let node_map = example_node_map();
        let query = prepare_query(
            "SELECT * WHERE { ?s <http://example.com/p> _:b . _:b ?q ?o }",
            &node_map,
        )
        .unwrap();

        let mut variables = query.variables.clone();
        variables.sort();
        assert_eq!(variables, ["o", "q", "s"]);
        assert_eq!(query.bgp.len(), 2);
        assert!(!query.has_unknown_terms);
    }

    #[test]
    fn projection_keeps_its_order() {
        let node_map = example_node_map();
        let query = prepare_query(
            "SELECT ?o ?s WHERE { ?s <http://example.com/p> ?o }",
            &node_map,
        )
        .unwrap();

        assert_eq!(query.variables, ["o", "s"]);
    }

    #[test]
    fn unknown_terms_are_flagged() {
        let node_map = example_node_map();
        let query = prepare_query(
            "SELECT ?s WHERE { ?s <http://example.com/unknown> ?o }",
            &node_map,
        )
        .unwrap();

        assert!(query.has_unknown_terms);
    }

    #[test]
    fn unsupported_queries() {
        let node_map = example_node_map();
        for query in [
            "ASK { ?s ?p ?o }",
            "SELECT * WHERE { ?s ?p ?o OPTIONAL { ?o ?p ?s } }",
            "SELECT * WHERE { ?s ?p ?o FILTER(?s = ?o) }",
            "SELECT * FROM <http://example.com/g> WHERE { ?s ?p ?o }",
        ] {
            let error = prepare_query(query, &node_map).unwrap_err();
            assert!(
                matches!(error, StoreError::UnsupportedQuery(_)),
                "{query}: {error}"
            );
        }
    }

    #[test]
    fn syntax_errors() {
        let error = prepare_query("SELECT WHERE", &example_node_map()).unwrap_err();
        assert!(matches!(error, StoreError::Syntax(_)));
    }

    fn example_node_map() -> NodeMap {
        let mut node_map = NodeMap::new();
        node_map.intern(Node::resource("http://example.com/p"));
        node_map
    }
}
