use crate::NodeConversionError;
use oxrdf::vocab::xsd;
use oxrdf::{
    BlankNode, BlankNodeRef, Literal, LiteralRef, NamedNode, NamedNodeRef, Subject, Term, TermRef,
};
use std::fmt::{Display, Formatter};

/// The kind of [Node]. Each kind has a single-byte tag that is used in the persisted format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// An IRI.
    Resource,
    /// A blank node.
    Blank,
    /// A plain literal without language tag or datatype.
    Literal,
    /// A language-tagged literal.
    LangLiteral,
    /// A literal with an explicit datatype.
    DatatypeLiteral,
}

impl NodeKind {
    /// Returns the tag of this kind.
    pub const fn as_byte(self) -> u8 {
        match self {
            NodeKind::Resource => b'R',
            NodeKind::Blank => b'B',
            NodeKind::Literal => b'L',
            NodeKind::LangLiteral => b'G',
            NodeKind::DatatypeLiteral => b'D',
        }
    }

    /// Parses a tag. Returns [None] for unknown tags.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'R' => Some(NodeKind::Resource),
            b'B' => Some(NodeKind::Blank),
            b'L' => Some(NodeKind::Literal),
            b'G' => Some(NodeKind::LangLiteral),
            b'D' => Some(NodeKind::DatatypeLiteral),
            _ => None,
        }
    }
}

/// An RDF term as it is interned by the [NodeMap](crate::NodeMap).
///
/// Literals with the datatype `xsd:string` are normalized to [Node::Literal] so that `"a"` and
/// `"a"^^xsd:string` receive the same identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Node {
    /// An IRI.
    Resource(String),
    /// A blank node, identified by its label.
    Blank(String),
    /// A plain literal.
    Literal(String),
    /// A language-tagged literal.
    LangLiteral { value: String, language: String },
    /// A literal with a datatype IRI.
    DatatypeLiteral { value: String, datatype: String },
}

impl Node {
    /// Creates a new [Node::Resource].
    pub fn resource(iri: impl Into<String>) -> Self {
        Node::Resource(iri.into())
    }

    /// Creates a new [Node::Literal].
    pub fn literal(value: impl Into<String>) -> Self {
        Node::Literal(value.into())
    }

    /// Returns the kind of this node.
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Resource(_) => NodeKind::Resource,
            Node::Blank(_) => NodeKind::Blank,
            Node::Literal(_) => NodeKind::Literal,
            Node::LangLiteral { .. } => NodeKind::LangLiteral,
            Node::DatatypeLiteral { .. } => NodeKind::DatatypeLiteral,
        }
    }

    /// Returns the lexical value of the node (the IRI, the blank node label, or the literal
    /// value).
    pub fn value(&self) -> &str {
        match self {
            Node::Resource(value) | Node::Blank(value) | Node::Literal(value) => value,
            Node::LangLiteral { value, .. } | Node::DatatypeLiteral { value, .. } => value,
        }
    }

    /// Returns the side payload of a literal: its language tag or datatype IRI.
    pub fn annotation(&self) -> Option<&str> {
        match self {
            Node::LangLiteral { language, .. } => Some(language),
            Node::DatatypeLiteral { datatype, .. } => Some(datatype),
            _ => None,
        }
    }

    /// Creates a node from its parts. Used when reading persisted nodes.
    ///
    /// Returns [None] if the presence of `annotation` does not match `kind`.
    pub fn from_parts(kind: NodeKind, value: String, annotation: Option<String>) -> Option<Self> {
        Some(match (kind, annotation) {
            (NodeKind::Resource, None) => Node::Resource(value),
            (NodeKind::Blank, None) => Node::Blank(value),
            (NodeKind::Literal, None) => Node::Literal(value),
            (NodeKind::LangLiteral, Some(language)) => Node::LangLiteral { value, language },
            (NodeKind::DatatypeLiteral, Some(datatype)) => Node::DatatypeLiteral { value, datatype },
            _ => return None,
        })
    }

    /// Returns a borrowed oxrdf view of this node.
    pub fn as_term_ref(&self) -> TermRef<'_> {
        match self {
            Node::Resource(iri) => NamedNodeRef::new_unchecked(iri).into(),
            Node::Blank(id) => BlankNodeRef::new_unchecked(id).into(),
            Node::Literal(value) => LiteralRef::new_simple_literal(value).into(),
            Node::LangLiteral { value, language } => {
                LiteralRef::new_language_tagged_literal_unchecked(value, language).into()
            }
            Node::DatatypeLiteral { value, datatype } => {
                LiteralRef::new_typed_literal(value, NamedNodeRef::new_unchecked(datatype)).into()
            }
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.as_term_ref().fmt(f)
    }
}

impl From<NamedNode> for Node {
    fn from(value: NamedNode) -> Self {
        Node::Resource(value.into_string())
    }
}

impl From<NamedNodeRef<'_>> for Node {
    fn from(value: NamedNodeRef<'_>) -> Self {
        Node::Resource(value.as_str().to_owned())
    }
}

impl From<BlankNode> for Node {
    fn from(value: BlankNode) -> Self {
        Node::Blank(value.into_string())
    }
}

impl From<Literal> for Node {
    fn from(value: Literal) -> Self {
        Node::from(value.as_ref())
    }
}

impl From<LiteralRef<'_>> for Node {
    fn from(value: LiteralRef<'_>) -> Self {
        if let Some(language) = value.language() {
            return Node::LangLiteral {
                value: value.value().to_owned(),
                language: language.to_owned(),
            };
        }

        if value.datatype() == xsd::STRING {
            Node::Literal(value.value().to_owned())
        } else {
            Node::DatatypeLiteral {
                value: value.value().to_owned(),
                datatype: value.datatype().as_str().to_owned(),
            }
        }
    }
}

impl TryFrom<Term> for Node {
    type Error = NodeConversionError;

    fn try_from(value: Term) -> Result<Self, Self::Error> {
        match value {
            Term::NamedNode(node) => Ok(node.into()),
            Term::BlankNode(node) => Ok(node.into()),
            Term::Literal(literal) => Ok(literal.into()),
            Term::Triple(_) => Err(NodeConversionError::QuotedTriple),
        }
    }
}

impl TryFrom<Subject> for Node {
    type Error = NodeConversionError;

    fn try_from(value: Subject) -> Result<Self, Self::Error> {
        match value {
            Subject::NamedNode(node) => Ok(node.into()),
            Subject::BlankNode(node) => Ok(node.into()),
            Subject::Triple(_) => Err(NodeConversionError::QuotedTriple),
        }
    }
}

impl From<Node> for Term {
    fn from(value: Node) -> Self {
        value.as_term_ref().into_owned()
    }
}

impl TryFrom<Node> for Subject {
    type Error = NodeConversionError;

    fn try_from(value: Node) -> Result<Self, Self::Error> {
        match value {
            Node::Resource(iri) => Ok(NamedNode::new_unchecked(iri).into()),
            Node::Blank(id) => Ok(BlankNode::new_unchecked(id).into()),
            other => Err(NodeConversionError::InvalidPosition(
                other.to_string(),
                "a subject",
            )),
        }
    }
}

impl TryFrom<Node> for NamedNode {
    type Error = NodeConversionError;

    fn try_from(value: Node) -> Result<Self, Self::Error> {
        match value {
            Node::Resource(iri) => Ok(NamedNode::new_unchecked(iri)),
            other => Err(NodeConversionError::InvalidPosition(
                other.to_string(),
                "a predicate",
            )),
        }
    }
}
