use crate::bindings::{column_index, BindingsIterator, Columns};
use hexastore_model::{NodeId, TriplePosition};
use hexastore_storage::{IndexOrder, TripleIndexIterator};

/// Exposes the triples of a [TripleIndexIterator] as rows of variable bindings.
///
/// Each triple position can be given a column name. Positions without a name (bound nodes or
/// wildcards) are not part of the rows. If two positions share a name, they form a single column;
/// the masks of the index iterator must ensure that both positions hold the same node.
pub struct PatternIterator<'index> {
    triples: TripleIndexIterator<'index>,
    columns: Columns,
    /// The triple position that provides the value of each column.
    positions: Vec<TriplePosition>,
    current: Option<Vec<NodeId>>,
}

impl<'index> PatternIterator<'index> {
    /// Creates a new iterator. `names` holds the column names of the subject, predicate, and
    /// object.
    pub fn new(triples: TripleIndexIterator<'index>, names: [Option<String>; 3]) -> Self {
        let mut columns = Vec::new();
        let mut positions = Vec::new();
        for (position, name) in TriplePosition::ALL.into_iter().zip(names) {
            if let Some(name) = name {
                if column_index(&columns, &name).is_none() {
                    columns.push(name);
                    positions.push(position);
                }
            }
        }

        let mut result = Self {
            triples,
            columns: columns.into(),
            positions,
            current: None,
        };
        result.advance();
        result
    }

    /// The order of the index that provides the triples.
    pub fn order(&self) -> IndexOrder {
        self.triples.order()
    }
}

impl BindingsIterator for PatternIterator<'_> {
    fn columns(&self) -> &Columns {
        &self.columns
    }

    fn is_sorted_by_column(&self, column: &str) -> bool {
        column_index(&self.columns, column)
            .is_some_and(|index| self.triples.is_sorted_by_position(self.positions[index]))
    }

    fn current_row(&self) -> Option<&[NodeId]> {
        self.current.as_deref()
    }

    fn advance(&mut self) {
        self.current = self.triples.next().map(|triple| {
            self.positions
                .iter()
                .map(|position| triple.get(*position))
                .collect()
        });
    }
}
