//! Pull-based iterators over rows of [VariableBindings].
//!
//! Every iterator in this module implements [BindingsIterator]. A freshly created iterator is
//! already positioned on its first row (if any), and [BindingsIterator::advance] moves it to the
//! next one. Joins rely on [BindingsIterator::is_sorted_by_column] to decide whether an input must
//! be materialized and sorted first (see [ensure_sorted]).

mod cross_join;
mod materialized;
mod merge_join;
mod pattern;

pub use cross_join::CrossJoinIterator;
pub use materialized::{ensure_sorted, MaterializedIterator};
pub use merge_join::MergeJoinIterator;
pub use pattern::PatternIterator;

use hexastore_model::{NodeId, NodeMap};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// The column names of a [BindingsIterator], shared by all rows it produces.
pub type Columns = Arc<[String]>;

/// A boxed [BindingsIterator] that borrows from a hexastore for `'a`.
pub type BoxedBindingsIterator<'a> = Box<dyn BindingsIterator + 'a>;

/// One row of a query result: a node for each named column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableBindings {
    columns: Columns,
    values: Vec<NodeId>,
}

impl VariableBindings {
    /// Creates a new row.
    ///
    /// # Panics
    ///
    /// Panics if the number of values does not match the number of columns.
    pub fn new(columns: Columns, values: Vec<NodeId>) -> Self {
        assert_eq!(
            columns.len(),
            values.len(),
            "Every column of a binding needs exactly one value."
        );
        Self { columns, values }
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    pub fn values(&self) -> &[NodeId] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the node bound to `column`.
    pub fn get(&self, column: &str) -> Option<NodeId> {
        column_index(&self.columns, column).map(|index| self.values[index])
    }

    /// Iterates over `(column, node)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// Displays the row with the nodes looked up in `node_map`. Ids that are not part of the map
    /// are printed as is.
    pub fn display_with<'a>(&'a self, node_map: &'a NodeMap) -> impl Display + 'a {
        DisplayWithNodes {
            bindings: self,
            node_map,
        }
    }
}

impl Display for VariableBindings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (column, node)) in self.iter().enumerate() {
            let separator = if i == 0 { "" } else { "," };
            write!(f, "{separator} {column}={node}")?;
        }
        write!(f, " }}")
    }
}

struct DisplayWithNodes<'a> {
    bindings: &'a VariableBindings,
    node_map: &'a NodeMap,
}

impl Display for DisplayWithNodes<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (column, node)) in self.bindings.iter().enumerate() {
            let separator = if i == 0 { "" } else { "," };
            match self.node_map.get_node(node) {
                Some(term) => write!(f, "{separator} {column}={term}")?,
                None => write!(f, "{separator} {column}={node}")?,
            }
        }
        write!(f, " }}")
    }
}

/// A cursor over rows of variable bindings.
pub trait BindingsIterator {
    /// The names of the columns of every row.
    fn columns(&self) -> &Columns;

    fn column_count(&self) -> usize {
        self.columns().len()
    }

    /// Returns whether consecutive rows are non-decreasing in `column`. Unknown columns are never
    /// sorted.
    fn is_sorted_by_column(&self, column: &str) -> bool;

    /// The values of the current row, in column order. [None] once the iterator is finished.
    fn current_row(&self) -> Option<&[NodeId]>;

    /// Moves to the next row. Does nothing if the iterator is finished.
    fn advance(&mut self);

    fn finished(&self) -> bool {
        self.current_row().is_none()
    }

    /// The current row as [VariableBindings].
    fn current(&self) -> Option<VariableBindings> {
        self.current_row()
            .map(|values| VariableBindings::new(Arc::clone(self.columns()), values.to_vec()))
    }

    /// Turns the cursor into an [Iterator] over the remaining rows.
    fn into_rows(self) -> Rows<Self>
    where
        Self: Sized,
    {
        Rows { inner: self }
    }
}

impl<I: BindingsIterator + ?Sized> BindingsIterator for Box<I> {
    fn columns(&self) -> &Columns {
        (**self).columns()
    }

    fn is_sorted_by_column(&self, column: &str) -> bool {
        (**self).is_sorted_by_column(column)
    }

    fn current_row(&self) -> Option<&[NodeId]> {
        (**self).current_row()
    }

    fn advance(&mut self) {
        (**self).advance();
    }
}

/// An [Iterator] over the rows of a [BindingsIterator].
pub struct Rows<I> {
    inner: I,
}

impl<I: BindingsIterator> Rows<I> {
    pub fn columns(&self) -> &Columns {
        self.inner.columns()
    }
}

impl<I: BindingsIterator> Iterator for Rows<I> {
    type Item = VariableBindings;

    fn next(&mut self) -> Option<VariableBindings> {
        let current = self.inner.current()?;
        self.inner.advance();
        Some(current)
    }
}

pub(crate) fn column_index(columns: &[String], column: &str) -> Option<usize> {
    columns.iter().position(|candidate| candidate == column)
}

/// Combines rows of two inputs into rows over the union of their columns.
///
/// Columns present on both sides appear once. Pairs of rows that disagree on such a column do not
/// combine.
struct RowMerger {
    columns: Columns,
    /// Indexes of the right columns that are not part of the left columns.
    right_only: Vec<usize>,
    /// `(left, right)` indexes of columns present on both sides.
    shared: Vec<(usize, usize)>,
}

impl RowMerger {
    fn new(left: &[String], right: &[String]) -> Self {
        let mut columns = left.to_vec();
        let mut right_only = Vec::new();
        let mut shared = Vec::new();
        for (right_index, column) in right.iter().enumerate() {
            match column_index(left, column) {
                Some(left_index) => shared.push((left_index, right_index)),
                None => {
                    columns.push(column.clone());
                    right_only.push(right_index);
                }
            }
        }
        Self {
            columns: columns.into(),
            right_only,
            shared,
        }
    }

    fn merge(&self, left: &[NodeId], right: &[NodeId]) -> Option<Vec<NodeId>> {
        if self.shared.iter().any(|(l, r)| left[*l] != right[*r]) {
            return None;
        }
        let mut row = Vec::with_capacity(self.columns.len());
        row.extend_from_slice(left);
        row.extend(self.right_only.iter().map(|index| right[*index]));
        Some(row)
    }
}
