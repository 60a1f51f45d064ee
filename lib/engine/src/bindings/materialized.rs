use crate::bindings::{column_index, BindingsIterator, BoxedBindingsIterator, Columns};
use crate::QueryError;
use hexastore_model::NodeId;

/// Holds all rows of a result in memory.
///
/// A materialized iterator can be sorted by one column, which is the only column it reports as
/// sorted.
#[derive(Debug, Clone)]
pub struct MaterializedIterator {
    columns: Columns,
    rows: Vec<Vec<NodeId>>,
    position: usize,
    sorted_by: Option<usize>,
}

impl MaterializedIterator {
    /// Creates a new iterator over `rows`.
    ///
    /// # Panics
    ///
    /// Panics if a row does not have a value for every column.
    pub fn new(columns: Columns, rows: Vec<Vec<NodeId>>) -> Self {
        assert!(
            rows.iter().all(|row| row.len() == columns.len()),
            "Every row must have a value for every column."
        );
        Self {
            columns,
            rows,
            position: 0,
            sorted_by: None,
        }
    }

    /// An iterator without any rows.
    pub fn empty(columns: Columns) -> Self {
        Self::new(columns, Vec::new())
    }

    /// Collects the remaining rows of `source`.
    pub fn drain(mut source: impl BindingsIterator) -> Self {
        let mut rows = Vec::new();
        while let Some(row) = source.current_row() {
            rows.push(row.to_vec());
            source.advance();
        }
        Self::new(source.columns().clone(), rows)
    }

    /// Collects the remaining rows of `source` and sorts them by `column`. Rows with the same
    /// value keep their order.
    pub fn sorted(source: impl BindingsIterator, column: &str) -> Result<Self, QueryError> {
        let index = column_index(source.columns(), column)
            .ok_or_else(|| QueryError::UnknownVariable(column.to_owned()))?;
        let mut result = Self::drain(source);
        result.rows[result.position..].sort_by_key(|row| row[index]);
        result.sorted_by = Some(index);
        Ok(result)
    }

    /// The number of rows that have not been consumed yet.
    pub fn remaining(&self) -> usize {
        self.rows.len() - self.position
    }

    pub(crate) fn into_rows_vec(self) -> Vec<Vec<NodeId>> {
        let mut rows = self.rows;
        rows.drain(..self.position);
        rows
    }
}

impl BindingsIterator for MaterializedIterator {
    fn columns(&self) -> &Columns {
        &self.columns
    }

    fn is_sorted_by_column(&self, column: &str) -> bool {
        self.sorted_by.is_some() && self.sorted_by == column_index(&self.columns, column)
    }

    fn current_row(&self) -> Option<&[NodeId]> {
        self.rows.get(self.position).map(Vec::as_slice)
    }

    fn advance(&mut self) {
        if self.position < self.rows.len() {
            self.position += 1;
        }
    }
}

/// Returns `source` if it is sorted by `column`, otherwise a sorted, materialized copy of it.
pub fn ensure_sorted<'a>(
    source: BoxedBindingsIterator<'a>,
    column: &str,
) -> Result<BoxedBindingsIterator<'a>, QueryError> {
    if column_index(source.columns(), column).is_none() {
        return Err(QueryError::UnknownVariable(column.to_owned()));
    }
    if source.is_sorted_by_column(column) {
        return Ok(source);
    }

    let sorted = MaterializedIterator::sorted(source, column)?;
    tracing::debug!(column, rows = sorted.remaining(), "Materialized input to sort it");
    Ok(Box::new(sorted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_is_stable() {
        let source = MaterializedIterator::new(
            columns(&["a", "b"]),
            vec![row(&[3, 1]), row(&[1, 2]), row(&[3, 3]), row(&[1, 4])],
        );
        let sorted = MaterializedIterator::sorted(source, "a").unwrap();

        assert!(sorted.is_sorted_by_column("a"));
        assert!(!sorted.is_sorted_by_column("b"));
        assert_eq!(
            sorted.into_rows_vec(),
            vec![row(&[1, 2]), row(&[1, 4]), row(&[3, 1]), row(&[3, 3])]
        );
    }

    #[test]
    fn sorted_skips_consumed_rows() {
        let mut source =
            MaterializedIterator::new(columns(&["a"]), vec![row(&[9]), row(&[2]), row(&[1])]);
        source.advance();

        let sorted = MaterializedIterator::sorted(source, "a").unwrap();
        assert_eq!(sorted.remaining(), 2);
        assert_eq!(sorted.current_row(), Some(row(&[1]).as_slice()));
    }

    #[test]
    fn ensure_sorted_keeps_sorted_sources() {
        let source = MaterializedIterator::new(columns(&["a"]), vec![row(&[2]), row(&[1])]);
        let sorted = MaterializedIterator::sorted(source, "a").unwrap();

        let result = ensure_sorted(Box::new(sorted), "a").unwrap();
        assert!(result.is_sorted_by_column("a"));
        assert_eq!(result.current_row(), Some(row(&[1]).as_slice()));
    }

    #[test]
    fn ensure_sorted_sorts_unsorted_sources() {
        let source =
            MaterializedIterator::new(columns(&["a", "b"]), vec![row(&[1, 5]), row(&[2, 4])]);

        let result = ensure_sorted(Box::new(source), "b").unwrap();
        assert!(result.is_sorted_by_column("b"));
        assert_eq!(result.current_row(), Some(row(&[2, 4]).as_slice()));
    }

    #[test]
    fn ensure_sorted_rejects_unknown_columns() {
        let source = MaterializedIterator::empty(columns(&["a"]));
        let error = ensure_sorted(Box::new(source), "z").err().unwrap();
        assert_eq!(error.to_string(), "The variable z is unknown.");
    }

    fn columns(names: &[&str]) -> Columns {
        names.iter().map(|name| (*name).to_owned()).collect()
    }

    fn row(values: &[i64]) -> Vec<NodeId> {
        values.iter().copied().map(NodeId::new).collect()
    }
}
